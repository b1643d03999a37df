//! Extraction scopes.
//!
//! A [`Scope`] is everything a selector can see: the current node, the
//! environment, the per-item loader cache, the enclosing table's column
//! map, and the highlight capability. Environments are copied when a
//! child scope is created, so mutations made inside a nested extraction
//! never leak back to the parent and sibling scopes never observe each
//! other.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::document::{Document, Node};
use crate::elements::table::ColumnMap;
use crate::highlight::{Highlighter, NoopHighlighter};
use crate::value::Value;

/// The evaluation context of one extractor or filter.
#[derive(Debug, Clone)]
pub struct Scope<'d> {
    node: Node<'d>,
    env: IndexMap<String, Value>,
    loaders: IndexMap<String, Value>,
    columns: Option<Arc<ColumnMap>>,
    highlighter: Arc<dyn Highlighter>,
}

impl<'d> Scope<'d> {
    /// Root scope of a document, with an empty environment.
    pub fn new(document: &'d Document) -> Self {
        Scope::at(document.root())
    }

    /// Root scope seeded with page parameters.
    pub fn with_params<K, I>(document: &'d Document, params: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut scope = Scope::at(document.root());
        for (key, value) in params {
            scope.env.insert(key.into(), value);
        }
        scope
    }

    /// Scope positioned directly at a node.
    pub fn at(node: Node<'d>) -> Self {
        Scope {
            node,
            env: IndexMap::new(),
            loaders: IndexMap::new(),
            columns: None,
            highlighter: Arc::new(NoopHighlighter),
        }
    }

    /// The current node.
    pub fn node(&self) -> Node<'d> {
        self.node
    }

    /// The environment.
    pub fn env(&self) -> &IndexMap<String, Value> {
        &self.env
    }

    /// Set an environment value in this scope only.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.env.insert(key.into(), value);
    }

    /// Read an environment value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.env.get(key)
    }

    /// Read a memoized loader result.
    pub fn loader(&self, name: &str) -> Option<&Value> {
        self.loaders.get(name)
    }

    pub(crate) fn set_loader(&mut self, name: String, value: Value) {
        self.loaders.insert(name, value);
    }

    /// The enclosing table's column map, inside a table extraction.
    pub fn columns(&self) -> Option<&ColumnMap> {
        self.columns.as_deref()
    }

    /// The highlight capability (no-op unless installed).
    pub fn highlighter(&self) -> &Arc<dyn Highlighter> {
        &self.highlighter
    }

    /// Install a highlighter; inherited by all child scopes.
    pub fn with_highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    /// Child scope at another node. The environment is copied: the
    /// child sees the parent's bindings as of now, and its own
    /// mutations stay local. Loader results are not inherited.
    pub fn child(&self, node: Node<'d>) -> Scope<'d> {
        Scope {
            node,
            env: self.env.clone(),
            loaders: IndexMap::new(),
            columns: self.columns.clone(),
            highlighter: self.highlighter.clone(),
        }
    }

    /// Move this scope to another node, keeping everything else.
    pub(crate) fn set_node(&mut self, node: Node<'d>) {
        self.node = node;
    }

    /// Same scope with a column map installed.
    pub(crate) fn with_columns(&self, columns: Arc<ColumnMap>) -> Scope<'d> {
        let mut scope = self.clone();
        scope.columns = Some(columns);
        scope
    }
}
