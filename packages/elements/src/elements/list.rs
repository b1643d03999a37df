//! The list extractor: many records from a node set.
//!
//! One `ListElement` serves both document kinds. Candidate nodes come
//! from a CSS query (HTML), a wildcard-aware `/`-path (JSON: the final
//! containers' members become the candidates), or a custom enumeration
//! function. Each candidate node is offered to every declared item
//! template; produced records are deduplicated by identity and yielded
//! lazily in encounter order, unless flush-at-end buffering is on.
//!
//! After the node set is exhausted, a declared `next_page` selector is
//! evaluated: a non-null result ends the iteration with
//! [`ExtractError::NextPage`], which the surrounding fetch loop catches
//! to load the continuation document and run the extraction again.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::warn;

use crate::document::{json_kind, select_html, Node};
use crate::error::{ExtractError, NextPage, Result};
use crate::filters::json::expand;
use crate::filters::Selector;
use crate::record::Record;
use crate::scope::Scope;
use crate::value::Value;

use super::{Condition, ItemElement, ParseFn};

/// Function enumerating candidate nodes, replacing the declared path.
pub type FindFn = dyn for<'d> Fn(&Scope<'d>) -> Result<Vec<Node<'d>>> + Send + Sync;

/// Extracts a sequence of records from the current node.
#[derive(Clone, Default)]
pub struct ListElement {
    item_path: Option<String>,
    empty_path: Option<String>,
    find: Option<Arc<FindFn>>,
    condition: Condition,
    parse: Option<Arc<ParseFn>>,
    items: Vec<Arc<ItemElement>>,
    flush_at_end: bool,
    ignore_duplicates: bool,
    next_page: Option<Selector>,
}

impl ListElement {
    /// Empty template. Without an item path, the current node itself is
    /// the single candidate (HTML), or its members are the candidates
    /// (JSON).
    pub fn new() -> Self {
        ListElement::default()
    }

    /// Where to find candidate nodes: CSS for HTML documents, a
    /// `/`-separated path for JSON documents (`*` expands to all
    /// members of the current containers).
    pub fn item_path(mut self, path: impl Into<String>) -> Self {
        self.item_path = Some(path.into());
        self
    }

    /// Fallback query used only to decide whether an empty candidate
    /// set deserves a warning: when the item path matches nothing and
    /// this marker is absent too, the page layout probably changed.
    pub fn empty_path(mut self, path: impl Into<String>) -> Self {
        self.empty_path = Some(path.into());
        self
    }

    /// Replace candidate enumeration entirely.
    pub fn find_with<F>(mut self, find: F) -> Self
    where
        F: for<'d> Fn(&Scope<'d>) -> Result<Vec<Node<'d>>> + Send + Sync + 'static,
    {
        self.find = Some(Arc::new(find));
        self
    }

    /// Gate the whole list on a condition, checked once before
    /// enumeration.
    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Hook run once before enumeration, free to mutate the list's
    /// environment (inherited by every item scope).
    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: for<'d> Fn(&mut Scope<'d>) -> Result<()> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    /// Declare an item template. Every template is offered every
    /// candidate node; its own condition decides whether it produces a
    /// record there.
    pub fn item(mut self, item: ItemElement) -> Self {
        self.items.push(Arc::new(item));
        self
    }

    /// Buffer all records and emit them only after enumeration, in
    /// first-stored order. Needed when later candidates amend records
    /// already seen.
    pub fn flush_at_end(mut self) -> Self {
        self.flush_at_end = true;
        self
    }

    /// Drop identity duplicates with a warning instead of failing.
    pub fn ignore_duplicates(mut self) -> Self {
        self.ignore_duplicates = true;
        self
    }

    /// Continuation selector, evaluated after the node set is
    /// exhausted. A non-null result is surfaced as
    /// [`ExtractError::NextPage`]; a not-found miss means no
    /// continuation.
    pub fn next_page(mut self, selector: impl Into<Selector>) -> Self {
        self.next_page = Some(selector.into());
        self
    }

    /// Lazily iterate records against a scope.
    pub fn run<'l, 'd>(&'l self, scope: &Scope<'d>) -> ListIter<'l, 'd> {
        ListIter::new(self, scope.clone())
    }

    /// Iterate with extra environment values for this run.
    pub fn run_with<'l, 'd, K, I>(&'l self, scope: &Scope<'d>, params: I) -> ListIter<'l, 'd>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut scope = scope.clone();
        for (key, value) in params {
            scope.set(key, value);
        }
        ListIter::new(self, scope)
    }

    /// Run eagerly, splitting the records from the continuation value.
    pub fn collect_page<'d>(&self, scope: &Scope<'d>) -> Result<Page> {
        let mut records = Vec::new();
        for item in self.run(scope) {
            match item {
                Ok(record) => records.push(record),
                Err(ExtractError::NextPage(next)) => {
                    return Ok(Page {
                        records,
                        next_page: Some(next.0),
                    })
                }
                Err(error) => return Err(error),
            }
        }
        Ok(Page {
            records,
            next_page: None,
        })
    }

    fn find_nodes<'d>(&self, scope: &Scope<'d>) -> Result<Vec<Node<'d>>> {
        if let Some(find) = &self.find {
            return find(scope);
        }
        match scope.node() {
            Node::Html(el) => {
                let Some(css) = &self.item_path else {
                    return Ok(vec![scope.node()]);
                };
                let nodes = select_html(el, css)?;
                if nodes.is_empty() {
                    if let Some(empty) = &self.empty_path {
                        if select_html(el, empty)?.is_empty() {
                            warn!(
                                target: "elements",
                                item_path = %css,
                                empty_path = %empty,
                                "no candidate matched and the empty marker is absent"
                            );
                        }
                    }
                }
                Ok(nodes)
            }
            Node::Json(root) => {
                let segments: Vec<&str> = match &self.item_path {
                    Some(path) if !path.is_empty() => path.split('/').collect(),
                    _ => Vec::new(),
                };
                let bases = expand(root, &segments)?;
                let mut nodes = Vec::new();
                for base in bases {
                    match base {
                        Json::Object(map) => nodes.extend(map.values().map(Node::Json)),
                        Json::Array(items) => nodes.extend(items.iter().map(Node::Json)),
                        other => {
                            return Err(ExtractError::TypeMismatch {
                                expected: "a JSON container of candidate nodes",
                                found: json_kind(other).to_string(),
                            })
                        }
                    }
                }
                Ok(nodes)
            }
        }
    }
}

impl fmt::Debug for ListElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListElement")
            .field("item_path", &self.item_path)
            .field("items", &self.items.len())
            .field("flush_at_end", &self.flush_at_end)
            .field("ignore_duplicates", &self.ignore_duplicates)
            .field("next_page", &self.next_page.is_some())
            .finish()
    }
}

/// One eager page of records plus the continuation value, if any.
#[derive(Debug, Clone)]
pub struct Page {
    /// The records, in yield order.
    pub records: Vec<Record>,
    /// The continuation target the list surfaced, if any.
    pub next_page: Option<Value>,
}

/// Lazy iteration state of one list run.
///
/// Yields `Ok(record)` per produced record; a declared continuation
/// ends the iteration with `Err(ExtractError::NextPage(_))` after all
/// records. Any other error is terminal.
pub struct ListIter<'l, 'd> {
    list: &'l ListElement,
    scope: Scope<'d>,
    started: bool,
    done: bool,
    nodes: std::vec::IntoIter<Node<'d>>,
    pending: VecDeque<Record>,
    store: IndexMap<String, Record>,
    flushing: Option<indexmap::map::IntoValues<String, Record>>,
}

impl<'l, 'd> ListIter<'l, 'd> {
    fn new(list: &'l ListElement, scope: Scope<'d>) -> Self {
        ListIter {
            list,
            scope,
            started: false,
            done: false,
            nodes: Vec::new().into_iter(),
            pending: VecDeque::new(),
            store: IndexMap::new(),
            flushing: None,
        }
    }

    fn fail(&mut self, error: ExtractError) -> Option<Result<Record>> {
        self.done = true;
        Some(Err(error))
    }

    /// The node set is exhausted (and flushed): check pagination.
    fn finish(&mut self) -> Option<Result<Record>> {
        self.done = true;
        if let Some(selector) = &self.list.next_page {
            match selector.evaluate(&self.scope) {
                Ok(selected) => {
                    let value = selected.into_value();
                    if !matches!(value, Value::Null) {
                        return Some(Err(ExtractError::NextPage(NextPage(value))));
                    }
                }
                Err(error) if error.is_not_found() => {}
                Err(error) => return Some(Err(error)),
            }
        }
        None
    }

    /// Record every identity once; a repeat is a data-consistency
    /// error unless duplicates are tolerated, in which case the repeat
    /// is dropped with a warning and the first stored record wins.
    fn store_record(&mut self, record: Record) -> Result<Option<Record>> {
        if let Some(identity) = record.identity() {
            if self.store.contains_key(&identity) {
                if self.list.ignore_duplicates {
                    warn!(target: "elements", %identity, "two records share the same identity, dropping the repeat");
                    return Ok(None);
                }
                return Err(ExtractError::DuplicateIdentity { identity });
            }
            self.store.insert(identity, record.clone());
        }
        Ok(Some(record))
    }
}

impl Iterator for ListIter<'_, '_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let list = self.list;
        if !self.started {
            self.started = true;
            match list.condition.check(&self.scope) {
                Ok(true) => {}
                // A falsy list condition produces nothing, and no
                // pagination check either.
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(error) => return self.fail(error),
            }
            if let Some(parse) = &list.parse {
                if let Err(error) = parse(&mut self.scope) {
                    self.done = true;
                    if error.is_skip() {
                        return None;
                    }
                    return Some(Err(error));
                }
            }
            match list.find_nodes(&self.scope) {
                Ok(nodes) => self.nodes = nodes.into_iter(),
                Err(error) => return self.fail(error),
            }
        }

        loop {
            if let Some(flushing) = &mut self.flushing {
                match flushing.next() {
                    Some(record) => return Some(Ok(record)),
                    None => return self.finish(),
                }
            }

            if let Some(record) = self.pending.pop_front() {
                match self.store_record(record) {
                    Ok(Some(record)) if !list.flush_at_end => return Some(Ok(record)),
                    Ok(_) => continue,
                    Err(error) => return self.fail(error),
                }
            }

            match self.nodes.next() {
                Some(node) => {
                    for item in &list.items {
                        let child = self.scope.child(node);
                        match item.extract(&child) {
                            Ok(Some(record)) => self.pending.push_back(record),
                            Ok(None) => {}
                            Err(error) => return self.fail(error),
                        }
                    }
                }
                None => {
                    if list.flush_at_end {
                        self.flushing = Some(std::mem::take(&mut self.store).into_values());
                        continue;
                    }
                    return self.finish();
                }
            }
        }
    }
}
