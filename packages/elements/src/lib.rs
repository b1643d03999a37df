//! Declarative element extraction for scraped documents.
//!
//! A general-purpose engine that turns parsed site documents (HTML
//! trees or decoded JSON) into domain records, driven by declarative
//! extractor templates instead of hand-written walking code.
//!
//! # Design Philosophy
//!
//! - Declarative templates, not imperative parsing
//! - Composable filters with per-filter default values
//! - Copy-on-inherit environments, no shared mutable state
//! - Control flow the caller can see: skip, not-found, next-page
//! - The engine never fetches; documents come from the caller
//!
//! # Usage
//!
//! ```rust,ignore
//! use elements::{Document, ItemElement, ListElement, RecordSpec, Scope};
//! use elements::filters::{CleanText, Dict};
//!
//! let spec = RecordSpec::builder("account")
//!     .identity("id")
//!     .mandatory_field("label")
//!     .build();
//!
//! let accounts = ListElement::new()
//!     .item_path("accounts/*")
//!     .item(ItemElement::new(spec)
//!         .field("id", Dict::path("id"))
//!         .field("label", CleanText::new(Dict::path("label"))))
//!     .next_page(Dict::path("pagination/next"));
//!
//! // The fetch loop owns pagination: collect a page, follow the
//! // continuation value, run the same template again.
//! let mut doc = Document::json(first_page)?;
//! loop {
//!     let page = accounts.collect_page(&Scope::new(&doc))?;
//!     handle(page.records);
//!     match page.next_page {
//!         Some(target) => doc = fetch(target)?,
//!         None => break,
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`document`] - Parsed documents and borrowed node handles
//! - [`value`] - The owned value type fields are made of
//! - [`record`] - Record specs and records
//! - [`scope`] - Per-extraction context (node, environment, loaders)
//! - [`filters`] - Selectors and the standard filter set
//! - [`elements`] - The item, list and table extractors
//! - [`highlight`] - Debug-highlight capability
//! - [`error`] - Error taxonomy and control signals
//! - [`testing`] - Fixtures and test support

pub mod document;
pub mod elements;
pub mod error;
pub mod filters;
pub mod highlight;
pub mod record;
pub mod scope;
pub mod testing;
pub mod value;

// Re-export core types at crate root
pub use document::{Document, Node};
pub use elements::{
    scaffold, ColumnMap, Condition, ItemElement, ListElement, ListIter, Page, TableElement,
};
pub use error::{ExtractError, NextPage, Result};
pub use filters::{
    Attr, CleanDecimal, CleanText, Coalesce, Date, DecimalStyle, Dict, Env, Filter, Format, Link,
    Loaded, Map, PathSegment, Regexp, Selected, Selector, TableCell,
};
pub use highlight::{Highlighter, NoopHighlighter, TraceHighlighter};
pub use record::{FieldSpec, Record, RecordSpec, RecordSpecBuilder};
pub use scope::Scope;
pub use value::Value;
