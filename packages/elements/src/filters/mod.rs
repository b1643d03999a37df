//! Composable selectors and filters.
//!
//! A [`Selector`] is anything that can sit where a field value comes
//! from: a node-set path, a [`Filter`], a nested item or list
//! extractor, a plain function, or a constant. Filters compose by
//! nesting (`CleanText::new(Dict::path("label"))` evaluates the inner
//! selector first and cleans its result), are side-effect-free with
//! respect to the document, and absorb their own failures into a
//! declared default value when one was given.
//!
//! Two string conventions, kept distinct on purpose: a `&str` converted
//! into a [`Selector`] is a node-set *path* (CSS for HTML nodes, a
//! `/`-separated path for JSON nodes), while a constant string value is
//! spelled `Value::from("...")` or [`Selector::constant`].
//!
//! Every selector evaluation is logged at TRACE level under the
//! `elements::filters` target as the pair (selector, result).

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::document::Node;
use crate::elements::{ItemElement, ListElement};
use crate::error::{ExtractError, Result};
use crate::scope::Scope;
use crate::value::Value;

pub mod html;
pub mod json;
pub mod standard;

pub use html::{Attr, Link, TableCell};
pub use json::{Dict, PathSegment};
pub use standard::{
    CleanDecimal, CleanText, Coalesce, Date, DecimalStyle, Env, Format, Loaded, Map, Regexp,
};

/// A composable value filter.
///
/// Implementations read the scope's current node (or their nested
/// sub-selector's result) and produce one value, failing with
/// [`ExtractError::NotFound`] when the underlying lookup misses and no
/// default was declared.
pub trait Filter: fmt::Debug + Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Evaluate against a scope.
    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>>;
}

/// The result of evaluating a selector: either an owned value, or
/// borrowed document nodes that a downstream filter may keep refining.
#[derive(Debug, Clone)]
pub enum Selected<'d> {
    /// An owned value.
    Value(Value),
    /// A single document node.
    Node(Node<'d>),
    /// A node set, in document order. May be empty.
    Nodes(Vec<Node<'d>>),
}

impl<'d> Selected<'d> {
    /// Convert into an owned [`Value`]. HTML nodes become their raw
    /// text; a node set becomes an array.
    pub fn into_value(self) -> Value {
        match self {
            Selected::Value(value) => value,
            Selected::Node(node) => node.to_value(),
            Selected::Nodes(nodes) => Value::Array(nodes.iter().map(Node::to_value).collect()),
        }
    }

    /// Coerce to text: scalars render, a node yields its text, a node
    /// set concatenates with spaces (an empty set yields the empty
    /// string). `None` for values with no textual form.
    pub fn text(&self) -> Option<String> {
        match self {
            Selected::Value(value) => value.to_text(),
            Selected::Node(node) => node.text(),
            Selected::Nodes(nodes) => Some(
                nodes
                    .iter()
                    .filter_map(Node::text)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        }
    }

    /// The first node, when the selection carries nodes.
    pub fn first_node(&self) -> Option<Node<'d>> {
        match self {
            Selected::Node(node) => Some(*node),
            Selected::Nodes(nodes) => nodes.first().copied(),
            Selected::Value(_) => None,
        }
    }

    /// Truthiness for condition checks: an empty node set is falsy, a
    /// JSON node follows its value's truthiness, an HTML node is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Selected::Value(value) => value.is_truthy(),
            Selected::Node(Node::Html(_)) => true,
            Selected::Node(node @ Node::Json(_)) => node.to_value().is_truthy(),
            Selected::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    /// Short description of the selection's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Selected::Value(value) => value.kind(),
            Selected::Node(node) => node.kind(),
            Selected::Nodes(_) => "a node set",
        }
    }
}

/// Function usable as a selector.
pub type SelectorFn = dyn for<'d> Fn(&Scope<'d>) -> Result<Selected<'d>> + Send + Sync;

/// Anything that can produce a field value.
///
/// The union is closed on purpose: these five shapes compose uniformly
/// wherever a selector is expected, and nothing else does.
#[derive(Clone)]
pub enum Selector {
    /// A node-set path resolved against the current node: CSS for HTML,
    /// a `/`-separated path for JSON.
    Path(String),
    /// A filter.
    Filter(Arc<dyn Filter>),
    /// A nested item extractor; evaluates to the built record, or null
    /// when the item produced nothing.
    Item(Arc<ItemElement>),
    /// A nested list extractor; evaluates to the array of produced
    /// records, materialized eagerly.
    List(Arc<ListElement>),
    /// A plain function.
    Func(Arc<SelectorFn>),
    /// A constant, copied on every evaluation.
    Const(Value),
}

impl Selector {
    /// A node-set path selector.
    pub fn path(expr: impl Into<String>) -> Self {
        Selector::Path(expr.into())
    }

    /// A constant selector.
    pub fn constant(value: impl Into<Value>) -> Self {
        Selector::Const(value.into())
    }

    /// A function selector over the full [`Selected`] type.
    pub fn func<F>(f: F) -> Self
    where
        F: for<'d> Fn(&Scope<'d>) -> Result<Selected<'d>> + Send + Sync + 'static,
    {
        Selector::Func(Arc::new(f))
    }

    /// A function selector producing an owned value. This is the
    /// convenient form for closures, which cannot easily spell the
    /// higher-ranked signature [`Selector::func`] requires.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Selector::Func(Arc::new(move |scope| f(scope).map(Selected::Value)))
    }

    /// Evaluate against a scope, tracing the outcome.
    pub fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let result = self.evaluate_inner(scope);
        match &result {
            Ok(selected) => {
                trace!(target: "elements::filters", selector = ?self, result = ?selected, "selector evaluated");
            }
            Err(error) => {
                trace!(target: "elements::filters", selector = ?self, %error, "selector failed");
            }
        }
        result
    }

    fn evaluate_inner<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        match self {
            Selector::Path(expr) => resolve_path(scope, expr),
            Selector::Filter(filter) => filter.evaluate(scope),
            Selector::Item(item) => {
                let record = item.extract(&scope.child(scope.node()))?;
                Ok(Selected::Value(match record {
                    Some(record) => Value::Record(Box::new(record)),
                    None => Value::Null,
                }))
            }
            Selector::List(list) => {
                let records: Vec<_> = list
                    .run(&scope.child(scope.node()))
                    .collect::<Result<_>>()?;
                Ok(Selected::Value(Value::Array(
                    records
                        .into_iter()
                        .map(|record| Value::Record(Box::new(record)))
                        .collect(),
                )))
            }
            Selector::Func(f) => f(scope),
            Selector::Const(value) => Ok(Selected::Value(value.clone())),
        }
    }
}

fn resolve_path<'d>(scope: &Scope<'d>, expr: &str) -> Result<Selected<'d>> {
    match scope.node() {
        Node::Html(el) => Ok(Selected::Nodes(crate::document::select_html(el, expr)?)),
        Node::Json(root) => {
            let segments: Vec<&str> = if expr.is_empty() {
                Vec::new()
            } else {
                expr.split('/').collect()
            };
            match json::navigate(root, &segments) {
                Some(value) => Ok(Selected::Node(Node::Json(value))),
                None => Err(ExtractError::not_found(expr)),
            }
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Path(expr) => write!(f, "Path({expr:?})"),
            Selector::Filter(filter) => filter.fmt(f),
            Selector::Item(item) => write!(f, "Item({})", item.record_name()),
            Selector::List(_) => write!(f, "List(..)"),
            Selector::Func(_) => write!(f, "Func(..)"),
            Selector::Const(value) => write!(f, "Const({value:?})"),
        }
    }
}

impl From<&str> for Selector {
    fn from(expr: &str) -> Selector {
        Selector::Path(expr.to_string())
    }
}

impl From<String> for Selector {
    fn from(expr: String) -> Selector {
        Selector::Path(expr)
    }
}

impl From<Value> for Selector {
    fn from(value: Value) -> Selector {
        Selector::Const(value)
    }
}

impl From<ItemElement> for Selector {
    fn from(item: ItemElement) -> Selector {
        Selector::Item(Arc::new(item))
    }
}

impl From<ListElement> for Selector {
    fn from(list: ListElement) -> Selector {
        Selector::List(Arc::new(list))
    }
}

/// Implements `From<$filter> for Selector` so filter values can be used
/// anywhere a selector is expected.
macro_rules! impl_filter_selector {
    ($($filter:ty),+ $(,)?) => {
        $(
            impl From<$filter> for $crate::filters::Selector {
                fn from(filter: $filter) -> Self {
                    $crate::filters::Selector::Filter(std::sync::Arc::new(filter))
                }
            }
        )+
    };
}
pub(crate) use impl_filter_selector;

/// Input of a filter that declared a default value.
pub(crate) enum FilterInput<'d> {
    /// The sub-selector (or current node) is available.
    Ready(Selected<'d>),
    /// The sub-selector missed and the default applies.
    Defaulted(Value),
}

/// Evaluate a filter's sub-selector, falling back to the current node
/// when none was declared, and to the default value when the
/// sub-selector raised a not-found error.
pub(crate) fn filter_input<'d>(
    sub: &Option<Selector>,
    default: &Option<Value>,
    scope: &Scope<'d>,
) -> Result<FilterInput<'d>> {
    let result = match sub {
        Some(selector) => selector.evaluate(scope),
        None => Ok(Selected::Node(scope.node())),
    };
    match result {
        Ok(selected) => Ok(FilterInput::Ready(selected)),
        Err(error) if error.is_not_found() => match default {
            Some(value) => Ok(FilterInput::Defaulted(value.clone())),
            None => Err(error),
        },
        Err(error) => Err(error),
    }
}

/// The filter's own lookup failed: return the default if one was
/// declared, otherwise the error.
pub(crate) fn or_default<'d>(default: &Option<Value>, error: ExtractError) -> Result<Selected<'d>> {
    match default {
        Some(value) => Ok(Selected::Value(value.clone())),
        None => Err(error),
    }
}
