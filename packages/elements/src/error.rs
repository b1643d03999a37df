//! Typed errors for the extraction engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Two variants are control
//! flow rather than failures: [`ExtractError::Skip`] drops the current
//! item and never escapes the enclosing list extraction, and
//! [`ExtractError::NextPage`] asks the surrounding fetch loop to load a
//! continuation document.

use thiserror::Error;

use crate::value::Value;

/// Errors that can occur during an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A selector matched nothing and no default was declared.
    #[error("no element matched selector: {selector}")]
    NotFound {
        /// Rendering of the selector or path that missed.
        selector: String,
    },

    /// The current item was deliberately skipped.
    ///
    /// Raised from a field selector or a `parse` hook; caught at the
    /// item boundary, so the enclosing list continues with the next
    /// candidate node.
    #[error("item skipped")]
    Skip,

    /// Two records in the same list run share a non-empty identity.
    #[error("two records share the same identity: {identity}")]
    DuplicateIdentity {
        /// The offending identity value.
        identity: String,
    },

    /// A field selector failed, annotated with the field name and the
    /// source location where the field was declared.
    #[error("field `{field}` (declared at {declared_at}) failed: {source}")]
    Field {
        /// Field name on the record.
        field: String,
        /// `file:line` of the `.field(...)` declaration.
        declared_at: String,
        /// The underlying failure.
        #[source]
        source: Box<ExtractError>,
    },

    /// A table cell lookup named a column the table never declared.
    ///
    /// This is a configuration mistake, not missing data, and cannot be
    /// masked by a default value.
    #[error("column `{name}` is not declared on this table")]
    UndeclaredColumn {
        /// The undeclared logical column name.
        name: String,
    },

    /// A table cell lookup ran in a scope without a column map.
    #[error("table cell `{name}` used outside a table row")]
    CellOutsideTable {
        /// The logical column name.
        name: String,
    },

    /// A value was assigned to a field the record never declared.
    #[error("record `{record}` has no field `{field}`")]
    UnknownField {
        /// Record spec name.
        record: String,
        /// The unknown field name.
        field: String,
    },

    /// A node-set query string could not be compiled.
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector {
        /// The offending selector source.
        selector: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A filter was applied to a value of the wrong shape.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// What the filter needed.
        expected: &'static str,
        /// What it got.
        found: String,
    },

    /// A textual value could not be parsed into the requested type.
    #[error("cannot parse `{input}` as {kind}")]
    Parse {
        /// Target kind ("decimal", "date", ...).
        kind: &'static str,
        /// The input text.
        input: String,
    },

    /// The list is exhausted and declared a continuation target.
    #[error(transparent)]
    NextPage(#[from] NextPage),
}

/// Control signal carrying the continuation target of a paginated list.
///
/// Raised by a list extractor after all current-page records have been
/// yielded. The value is opaque to the engine: a URL string, a request
/// descriptor, whatever the surrounding fetch loop understands.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("extraction continues on the next page")]
pub struct NextPage(pub Value);

impl ExtractError {
    /// Not-found error for the given selector rendering.
    pub fn not_found(selector: impl Into<String>) -> Self {
        ExtractError::NotFound {
            selector: selector.into(),
        }
    }

    /// Whether this is a lookup miss (recoverable via a default value,
    /// or by dropping the current item).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExtractError::NotFound { .. })
    }

    /// Whether this is the deliberate skip-item signal.
    pub fn is_skip(&self) -> bool {
        matches!(self, ExtractError::Skip)
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
