//! The table extractor: rows of records, addressed by column name.
//!
//! Before any row runs, the header cells are scanned once to map each
//! declared logical column name onto a zero-based column index. A name
//! may carry several literal candidates (matched case-insensitively)
//! and pattern candidates; the leftmost matching header cell claims the
//! name, and a claimed name is never reassigned. The running column
//! counter advances by each header cell's `colspan` (1 when missing or
//! unparsable). Row filters reach their cells through
//! [`TableCell`](crate::filters::TableCell).

use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use crate::document::{Document, Node};
use crate::error::{ExtractError, Result};
use crate::filters::html::cell_span;
use crate::filters::standard::squash;
use crate::filters::Selector;
use crate::scope::Scope;
use crate::value::Value;

use super::{Condition, ItemElement, ListElement, ListIter, Page};

#[derive(Debug, Clone)]
enum ColumnMatch {
    /// Lowercased literal header text.
    Text(String),
    /// Pattern matched against the header text.
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct ColumnDecl {
    name: String,
    candidates: Vec<ColumnMatch>,
}

/// The header-derived mapping from logical column name to column index.
///
/// Once computed, the mapping is fixed for the rest of the table run.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    declared: Vec<String>,
    resolved: IndexMap<String, usize>,
}

impl ColumnMap {
    /// Index of a declared column: `Ok(None)` when no header cell
    /// matched it, `Err` when the name was never declared (a
    /// configuration mistake, distinct from missing data).
    pub fn index_of(&self, name: &str) -> Result<Option<usize>> {
        if !self.declared.iter().any(|declared| declared == name) {
            return Err(ExtractError::UndeclaredColumn {
                name: name.to_string(),
            });
        }
        Ok(self.resolved.get(name).copied())
    }
}

/// A list extractor over table rows, with column-name resolution.
#[derive(Debug, Clone)]
pub struct TableElement {
    head_path: String,
    columns: Vec<ColumnDecl>,
    list: ListElement,
}

impl TableElement {
    /// Template reading header cells from the given CSS query.
    pub fn new(head_path: impl Into<String>) -> Self {
        TableElement {
            head_path: head_path.into(),
            columns: Vec::new(),
            list: ListElement::new(),
        }
    }

    /// Declare a logical column with literal header candidates, matched
    /// case-insensitively. The first header cell matching any candidate
    /// claims the column.
    pub fn column<I, S>(mut self, name: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matches = candidates
            .into_iter()
            .map(|text| ColumnMatch::Text(text.into().to_lowercase()));
        self.push_candidates(name.into(), matches);
        self
    }

    /// Declare (or extend) a logical column with a header pattern.
    pub fn column_pattern(mut self, name: impl Into<String>, pattern: Regex) -> Self {
        self.push_candidates(name.into(), [ColumnMatch::Pattern(pattern)]);
        self
    }

    fn push_candidates(
        &mut self,
        name: String,
        candidates: impl IntoIterator<Item = ColumnMatch>,
    ) {
        match self.columns.iter_mut().find(|decl| decl.name == name) {
            Some(decl) => decl.candidates.extend(candidates),
            None => self.columns.push(ColumnDecl {
                name,
                candidates: candidates.into_iter().collect(),
            }),
        }
    }

    /// See [`ListElement::item_path`].
    pub fn item_path(mut self, path: impl Into<String>) -> Self {
        self.list = self.list.item_path(path);
        self
    }

    /// See [`ListElement::empty_path`].
    pub fn empty_path(mut self, path: impl Into<String>) -> Self {
        self.list = self.list.empty_path(path);
        self
    }

    /// See [`ListElement::condition`].
    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.list = self.list.condition(condition);
        self
    }

    /// See [`ListElement::item`].
    pub fn item(mut self, item: ItemElement) -> Self {
        self.list = self.list.item(item);
        self
    }

    /// See [`ListElement::flush_at_end`].
    pub fn flush_at_end(mut self) -> Self {
        self.list = self.list.flush_at_end();
        self
    }

    /// See [`ListElement::ignore_duplicates`].
    pub fn ignore_duplicates(mut self) -> Self {
        self.list = self.list.ignore_duplicates();
        self
    }

    /// See [`ListElement::next_page`].
    pub fn next_page(mut self, selector: impl Into<Selector>) -> Self {
        self.list = self.list.next_page(selector);
        self
    }

    /// Compute the column map from the header row.
    pub fn resolve_columns<'d>(&self, scope: &Scope<'d>) -> Result<ColumnMap> {
        let Some(root) = scope.node().as_html() else {
            return Err(ExtractError::TypeMismatch {
                expected: "an HTML document",
                found: scope.node().kind().to_string(),
            });
        };

        let mut map = ColumnMap {
            declared: self.columns.iter().map(|decl| decl.name.clone()).collect(),
            resolved: IndexMap::new(),
        };

        let mut position = 0usize;
        for header in crate::document::select_html(root, &self.head_path)? {
            let Node::Html(cell) = header else { continue };
            let title = squash(&cell.text().collect::<String>());
            let lowered = title.to_lowercase();
            for decl in &self.columns {
                if map.resolved.contains_key(&decl.name) {
                    continue;
                }
                let hit = decl.candidates.iter().any(|candidate| match candidate {
                    ColumnMatch::Text(text) => *text == lowered,
                    ColumnMatch::Pattern(pattern) => pattern.is_match(&title),
                });
                if hit {
                    map.resolved.insert(decl.name.clone(), position);
                }
            }
            position += cell_span(cell);
        }
        Ok(map)
    }

    /// Lazily iterate row records. The column map is computed once,
    /// before enumeration.
    pub fn run<'t, 'd>(&'t self, scope: &Scope<'d>) -> Result<ListIter<'t, 'd>> {
        let columns = self.resolve_columns(scope)?;
        Ok(self.list.run(&scope.with_columns(Arc::new(columns))))
    }

    /// Run eagerly, splitting the records from the continuation value.
    pub fn collect_page<'d>(&self, scope: &Scope<'d>) -> Result<Page> {
        let columns = self.resolve_columns(scope)?;
        self.list.collect_page(&scope.with_columns(Arc::new(columns)))
    }

    /// Iterate with extra environment values for this run.
    pub fn run_with<'t, 'd, K, I>(&'t self, scope: &Scope<'d>, params: I) -> Result<ListIter<'t, 'd>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let columns = self.resolve_columns(scope)?;
        Ok(self
            .list
            .run_with(&scope.with_columns(Arc::new(columns)), params))
    }
}

/// Development helper: inspect a header row and print a starting
/// `TableElement` builder for it. Intended for interactive debugging
/// while writing a new table extractor.
pub fn scaffold(document: &Document, head_path: &str) -> Result<String> {
    let scope = Scope::new(document);
    let Some(root) = scope.node().as_html() else {
        return Err(ExtractError::TypeMismatch {
            expected: "an HTML document",
            found: scope.node().kind().to_string(),
        });
    };

    let mut columns: Vec<(String, String)> = Vec::new();
    for header in crate::document::select_html(root, head_path)? {
        let Node::Html(cell) = header else { continue };
        let title = squash(&cell.text().collect::<String>());
        let slug: String = title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let slug = slug.trim_matches('_').to_string();
        let slug = if slug.is_empty() {
            format!("col{}", columns.len())
        } else {
            slug
        };
        if !columns.iter().any(|(existing, _)| *existing == slug) {
            columns.push((slug, title));
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "TableElement::new({head_path:?})");
    for (slug, title) in &columns {
        let _ = writeln!(out, "    .column({slug:?}, [{title:?}])");
    }
    let _ = writeln!(out, "    .item_path(\"...\")");
    let _ = writeln!(out, "    .item(ItemElement::new(spec)");
    for (i, (slug, _)) in columns.iter().enumerate() {
        let terminator = if i + 1 == columns.len() { ")" } else { "" };
        let _ = writeln!(
            out,
            "        .field({slug:?}, CleanText::new(TableCell::new({slug:?}))){terminator}"
        );
    }
    Ok(out)
}
