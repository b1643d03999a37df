//! Debug highlighting of the node an item extractor is working on.
//!
//! Highlighting is a diagnostic capability orthogonal to extraction
//! correctness. The engine acquires a [`HighlightGuard`] around each
//! item attempt; the guard calls [`Highlighter::leave`] on every exit
//! path, including errors, so a highlight can never outlive the item
//! that triggered it. The default implementation does nothing.

use std::sync::Arc;

use tracing::debug;

use crate::document::Node;

/// Observer notified when an item extractor starts and stops working on
/// a node.
pub trait Highlighter: std::fmt::Debug + Send + Sync {
    /// The node is now being extracted.
    fn enter(&self, node: &Node<'_>);

    /// Extraction of the node finished (successfully or not).
    fn leave(&self, node: &Node<'_>);
}

/// The default highlighter: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHighlighter;

impl Highlighter for NoopHighlighter {
    fn enter(&self, _: &Node<'_>) {}
    fn leave(&self, _: &Node<'_>) {}
}

/// Highlighter that logs node boundaries at DEBUG level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceHighlighter;

impl Highlighter for TraceHighlighter {
    fn enter(&self, node: &Node<'_>) {
        debug!(target: "elements::highlight", node = %node.describe(), "highlight on");
    }

    fn leave(&self, node: &Node<'_>) {
        debug!(target: "elements::highlight", node = %node.describe(), "highlight off");
    }
}

/// Scoped acquisition: enter on creation, leave on drop.
pub(crate) struct HighlightGuard<'d> {
    highlighter: Arc<dyn Highlighter>,
    node: Node<'d>,
}

impl<'d> HighlightGuard<'d> {
    pub(crate) fn new(highlighter: Arc<dyn Highlighter>, node: Node<'d>) -> Self {
        highlighter.enter(&node);
        HighlightGuard { highlighter, node }
    }
}

impl Drop for HighlightGuard<'_> {
    fn drop(&mut self) {
        self.highlighter.leave(&self.node);
    }
}
