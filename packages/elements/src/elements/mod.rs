//! The three extractor kinds: item, list and table.
//!
//! Extractors are immutable declarative templates assembled with
//! builders. Running one creates fresh per-invocation state (scope
//! copy, loader cache, dedup store), so a template can be reused across
//! documents while each run behaves like a single-use instance.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::filters::Selector;
use crate::scope::Scope;

pub mod item;
pub mod list;
pub mod table;

pub use item::ItemElement;
pub use list::{ListElement, ListIter, Page};
pub use table::{scaffold, ColumnMap, TableElement};

/// Function usable as a condition.
pub type CondFn = dyn for<'d> Fn(&Scope<'d>) -> bool + Send + Sync;

/// Hook run once before extraction, typically to stash computed values
/// in the environment for several fields to share.
pub type ParseFn = dyn for<'d> Fn(&mut Scope<'d>) -> Result<()> + Send + Sync;

/// Gate deciding whether an extractor proceeds on the current node.
#[derive(Clone, Default)]
pub enum Condition {
    /// Always proceed.
    #[default]
    Always,
    /// Never proceed.
    Never,
    /// Proceed when the selector evaluates truthy against the node. A
    /// not-found miss counts as falsy.
    When(Selector),
    /// Proceed when the function returns true.
    Func(Arc<CondFn>),
}

impl Condition {
    /// Condition from a selector.
    pub fn when(selector: impl Into<Selector>) -> Self {
        Condition::When(selector.into())
    }

    /// Condition from a function.
    pub fn func<F>(f: F) -> Self
    where
        F: for<'d> Fn(&Scope<'d>) -> bool + Send + Sync + 'static,
    {
        Condition::Func(Arc::new(f))
    }

    pub(crate) fn check<'d>(&self, scope: &Scope<'d>) -> Result<bool> {
        match self {
            Condition::Always => Ok(true),
            Condition::Never => Ok(false),
            Condition::When(selector) => match selector.evaluate(scope) {
                Ok(selected) => Ok(selected.is_truthy()),
                Err(error) if error.is_not_found() => Ok(false),
                Err(error) => Err(error),
            },
            Condition::Func(f) => Ok(f(scope)),
        }
    }
}

impl From<bool> for Condition {
    fn from(b: bool) -> Condition {
        if b {
            Condition::Always
        } else {
            Condition::Never
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => write!(f, "Always"),
            Condition::Never => write!(f, "Never"),
            Condition::When(selector) => write!(f, "When({selector:?})"),
            Condition::Func(_) => write!(f, "Func(..)"),
        }
    }
}
