//! The item extractor: one record from one node.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::document::Node;
use crate::error::{ExtractError, Result};
use crate::filters::json::navigate;
use crate::filters::Selector;
use crate::highlight::HighlightGuard;
use crate::record::{Record, RecordSpec};
use crate::scope::Scope;
use crate::value::Value;

use super::{Condition, ParseFn};

/// Predicate accepting or rejecting a fully-built record.
pub type ValidateFn = dyn Fn(&Record) -> bool + Send + Sync;

#[derive(Clone)]
struct FieldDef {
    name: String,
    selector: Selector,
    declared_at: String,
}

/// Builds exactly one [`Record`] from exactly one document node.
///
/// Assembled as a template:
///
/// ```rust,ignore
/// let item = ItemElement::new(transaction_spec())
///     .field("id", Dict::path("id"))
///     .field("label", CleanText::new(Dict::path("wording")))
///     .field("amount", CleanDecimal::french(Dict::path("amount")));
/// ```
///
/// Field evaluation order is deterministic: constant selectors first,
/// then filters, paths and nested extractors, then plain functions,
/// declaration order within each tier. The order is fixed when the
/// field is declared.
#[derive(Clone)]
pub struct ItemElement {
    spec: Arc<RecordSpec>,
    reroot: Option<String>,
    condition: Condition,
    parse: Option<Arc<ParseFn>>,
    loaders: Vec<(String, Selector)>,
    fields: Vec<FieldDef>,
    validate: Option<Arc<ValidateFn>>,
    tolerate_field_errors: bool,
}

impl ItemElement {
    /// Template producing records of the given spec.
    pub fn new(spec: Arc<RecordSpec>) -> Self {
        ItemElement {
            spec,
            reroot: None,
            condition: Condition::Always,
            parse: None,
            loaders: Vec::new(),
            fields: Vec::new(),
            validate: None,
            tolerate_field_errors: false,
        }
    }

    /// Re-root the node before any field runs: a CSS selector (first
    /// match) for HTML nodes, a `/`-path for JSON nodes. A miss drops
    /// the item. Sibling iteration is unaffected: the parent scope
    /// keeps its own node.
    pub fn reroot(mut self, path: impl Into<String>) -> Self {
        self.reroot = Some(path.into());
        self
    }

    /// Gate this item on a condition.
    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Hook run once before loaders and fields, free to mutate the
    /// item's environment. Returning [`ExtractError::Skip`] drops the
    /// item.
    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: for<'d> Fn(&mut Scope<'d>) -> Result<()> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    /// Declare a loader: evaluated once per item before fields,
    /// memoized by name, read back with the
    /// [`Loaded`](crate::filters::Loaded) filter.
    pub fn load(mut self, name: impl Into<String>, selector: impl Into<Selector>) -> Self {
        self.loaders.push((name.into(), selector.into()));
        self
    }

    /// Declare a field. The caller's source location is recorded for
    /// error messages.
    #[track_caller]
    pub fn field(mut self, name: impl Into<String>, selector: impl Into<Selector>) -> Self {
        let location = std::panic::Location::caller();
        let def = FieldDef {
            name: name.into(),
            selector: selector.into(),
            declared_at: format!("{}:{}", location.file(), location.line()),
        };
        // Keep the tiered order (constants, selectors, functions) as
        // fields are declared.
        let rank = selector_rank(&def.selector);
        let position = self
            .fields
            .iter()
            .rposition(|f| selector_rank(&f.selector) <= rank)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.fields.insert(position, def);
        self
    }

    /// Reject the built record without failing.
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Downgrade failures of optional fields to
    /// [`Value::FetchError`] instead of propagating. Mandatory fields
    /// always propagate.
    pub fn tolerate_field_errors(mut self) -> Self {
        self.tolerate_field_errors = true;
        self
    }

    /// The record type this template builds.
    pub fn record_name(&self) -> &str {
        self.spec.name()
    }

    /// Extract against a scope. `Ok(None)` means the node produced no
    /// record: the condition gated it off, a selector raised skip or an
    /// undefaulted not-found, or validation rejected it.
    pub fn extract<'d>(&self, scope: &Scope<'d>) -> Result<Option<Record>> {
        self.extract_into(scope.clone(), None)
    }

    /// Extract with extra environment values for this run.
    pub fn extract_with<'d, K, I>(&self, scope: &Scope<'d>, params: I) -> Result<Option<Record>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut scope = scope.clone();
        for (key, value) in params {
            scope.set(key, value);
        }
        self.extract_into(scope, None)
    }

    /// Populate an existing record in place instead of building a
    /// fresh one.
    pub fn fill<'d>(&self, scope: &Scope<'d>, record: Record) -> Result<Option<Record>> {
        self.extract_into(scope.clone(), Some(record))
    }

    fn extract_into<'d>(
        &self,
        mut scope: Scope<'d>,
        prebuilt: Option<Record>,
    ) -> Result<Option<Record>> {
        if let Some(path) = &self.reroot {
            match reroot_node(&scope, path)? {
                Some(node) => scope.set_node(node),
                None => {
                    debug!(target: "elements", record = self.spec.name(), path = %path, "reroot missed, dropping item");
                    return Ok(None);
                }
            }
        }

        if !self.condition.check(&scope)? {
            return Ok(None);
        }

        let _highlight = HighlightGuard::new(scope.highlighter().clone(), scope.node());

        if let Some(parse) = &self.parse {
            if let Err(error) = parse(&mut scope) {
                if error.is_skip() {
                    debug!(target: "elements", record = self.spec.name(), "parse hook skipped the item");
                    return Ok(None);
                }
                return Err(error);
            }
        }

        for (name, selector) in &self.loaders {
            if scope.loader(name).is_some() {
                continue;
            }
            match selector.evaluate(&scope) {
                Ok(selected) => scope.set_loader(name.clone(), selected.into_value()),
                Err(error) if error.is_skip() || error.is_not_found() => {
                    debug!(target: "elements", record = self.spec.name(), loader = %name, %error, "loader dropped the item");
                    return Ok(None);
                }
                Err(error) => return Err(error),
            }
        }

        let mut record = match prebuilt {
            Some(record) => record,
            None => Record::new(self.spec.clone()),
        };

        for field in &self.fields {
            match field.selector.evaluate(&scope) {
                Ok(selected) => {
                    let value = selected.into_value();
                    trace!(
                        target: "elements::fields",
                        record = self.spec.name(),
                        field = %field.name,
                        value = ?value,
                        "field assigned"
                    );
                    record.set(&field.name, value)?;
                }
                Err(error) if error.is_skip() => {
                    debug!(target: "elements", record = self.spec.name(), field = %field.name, "field skipped the item");
                    return Ok(None);
                }
                Err(error) if error.is_not_found() => {
                    debug!(target: "elements", record = self.spec.name(), field = %field.name, %error, "field not found, dropping item");
                    return Ok(None);
                }
                Err(error @ ExtractError::NextPage(_)) => return Err(error),
                Err(error) => {
                    let mandatory = self
                        .spec
                        .field(&field.name)
                        .map(|f| f.mandatory)
                        .unwrap_or(true);
                    if self.tolerate_field_errors && !mandatory {
                        warn!(
                            target: "elements",
                            record = self.spec.name(),
                            field = %field.name,
                            %error,
                            "optional field failed, recording a fetch error"
                        );
                        record.set(&field.name, Value::FetchError)?;
                    } else {
                        warn!(
                            target: "elements",
                            record = self.spec.name(),
                            field = %field.name,
                            declared_at = %field.declared_at,
                            %error,
                            "field failed"
                        );
                        return Err(ExtractError::Field {
                            field: field.name.clone(),
                            declared_at: field.declared_at.clone(),
                            source: Box::new(error),
                        });
                    }
                }
            }
        }

        if let Some(validate) = &self.validate {
            if !validate(&record) {
                debug!(target: "elements", record = self.spec.name(), "validation rejected the record");
                return Ok(None);
            }
        }

        Ok(Some(record))
    }

    #[cfg(test)]
    fn field_order(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

fn selector_rank(selector: &Selector) -> u8 {
    match selector {
        Selector::Const(_) => 0,
        Selector::Func(_) => 2,
        _ => 1,
    }
}

fn reroot_node<'d>(scope: &Scope<'d>, path: &str) -> Result<Option<Node<'d>>> {
    match scope.node() {
        Node::Html(el) => Ok(crate::document::select_html(el, path)?.into_iter().next()),
        Node::Json(root) => {
            let segments: Vec<&str> = path.split('/').collect();
            Ok(navigate(root, &segments).map(Node::Json))
        }
    }
}

impl fmt::Debug for ItemElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemElement")
            .field("record", &self.spec.name())
            .field("condition", &self.condition)
            .field(
                "fields",
                &self.fields.iter().map(|x| x.name.as_str()).collect::<Vec<_>>(),
            )
            .field("tolerate_field_errors", &self.tolerate_field_errors)
            .finish()
    }
}
