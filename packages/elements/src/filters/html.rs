//! HTML-specific filters: attribute lookup, link resolution, and table
//! cell indirection.

use scraper::ElementRef;
use url::Url;

use crate::document::Node;
use crate::error::{ExtractError, Result};
use crate::filters::{filter_input, impl_filter_selector, or_default, Filter, FilterInput, Selected, Selector};
use crate::scope::Scope;
use crate::value::Value;

/// Read an attribute of the selected element.
#[derive(Debug, Clone)]
pub struct Attr {
    sub: Option<Selector>,
    name: String,
    default: Option<Value>,
}

impl Attr {
    /// Attribute of the first element behind a sub-selector.
    pub fn new(selector: impl Into<Selector>, name: impl Into<String>) -> Self {
        Attr {
            sub: Some(selector.into()),
            name: name.into(),
            default: None,
        }
    }

    /// Attribute of the current node.
    pub fn here(name: impl Into<String>) -> Self {
        Attr {
            sub: None,
            name: name.into(),
            default: None,
        }
    }

    /// Value returned when the element or attribute is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Attr {
    fn name(&self) -> &'static str {
        "Attr"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let input = match filter_input(&self.sub, &self.default, scope)? {
            FilterInput::Defaulted(value) => return Ok(Selected::Value(value)),
            FilterInput::Ready(input) => input,
        };
        let Some(node) = input.first_node() else {
            return or_default(
                &self.default,
                ExtractError::TypeMismatch {
                    expected: "an HTML element",
                    found: input.kind().to_string(),
                },
            );
        };
        match node.attr(&self.name) {
            Some(value) => Ok(Selected::Value(Value::Str(value.to_string()))),
            None => or_default(
                &self.default,
                ExtractError::not_found(format!("@{}", self.name)),
            ),
        }
    }
}

/// Extract an `href`, optionally resolved against a base URL.
#[derive(Debug, Clone)]
pub struct Link {
    sub: Option<Selector>,
    base: Option<Url>,
    default: Option<Value>,
}

impl Link {
    /// Link target of the first element behind a sub-selector.
    pub fn new(selector: impl Into<Selector>) -> Self {
        Link {
            sub: Some(selector.into()),
            base: None,
            default: None,
        }
    }

    /// Link target of the current node.
    pub fn here() -> Self {
        Link {
            sub: None,
            base: None,
            default: None,
        }
    }

    /// Resolve relative targets against this base.
    pub fn resolved_against(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    /// Value returned when the link is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Link {
    fn name(&self) -> &'static str {
        "Link"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let input = match filter_input(&self.sub, &self.default, scope)? {
            FilterInput::Defaulted(value) => return Ok(Selected::Value(value)),
            FilterInput::Ready(input) => input,
        };
        let Some(node) = input.first_node() else {
            return or_default(
                &self.default,
                ExtractError::TypeMismatch {
                    expected: "an HTML element",
                    found: input.kind().to_string(),
                },
            );
        };
        let Some(href) = node.attr("href") else {
            return or_default(&self.default, ExtractError::not_found("@href"));
        };
        match &self.base {
            None => Ok(Selected::Value(Value::Str(href.to_string()))),
            Some(base) => match base.join(href) {
                Ok(resolved) => Ok(Selected::Value(Value::Str(resolved.to_string()))),
                Err(_) => or_default(
                    &self.default,
                    ExtractError::Parse {
                        kind: "URL",
                        input: href.to_string(),
                    },
                ),
            },
        }
    }
}

/// Locate the data cell for a logical column of the enclosing table.
///
/// Resolves the column name through the table's column map, then walks
/// the current row's cells (accounting for `colspan`) to the cell
/// covering that index. Looking up a column the table never declared is
/// a configuration error and is not masked by a default.
#[derive(Debug, Clone)]
pub struct TableCell {
    name: String,
    default: Option<Value>,
}

impl TableCell {
    /// Cell of the named logical column.
    pub fn new(name: impl Into<String>) -> Self {
        TableCell {
            name: name.into(),
            default: None,
        }
    }

    /// Value returned when the column resolved to no cell.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for TableCell {
    fn name(&self) -> &'static str {
        "TableCell"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let Some(columns) = scope.columns() else {
            return Err(ExtractError::CellOutsideTable {
                name: self.name.clone(),
            });
        };
        let Some(index) = columns.index_of(&self.name)? else {
            return or_default(
                &self.default,
                ExtractError::not_found(format!("column `{}` in the header row", self.name)),
            );
        };
        let Some(row) = scope.node().as_html() else {
            return or_default(
                &self.default,
                ExtractError::TypeMismatch {
                    expected: "an HTML table row",
                    found: scope.node().kind().to_string(),
                },
            );
        };

        let mut position = 0usize;
        for child in row.children().filter_map(ElementRef::wrap) {
            let tag = child.value().name();
            if !tag.eq_ignore_ascii_case("td") && !tag.eq_ignore_ascii_case("th") {
                continue;
            }
            let span = cell_span(child).max(1);
            if (position..position + span).contains(&index) {
                return Ok(Selected::Nodes(vec![Node::Html(child)]));
            }
            position += span;
        }
        or_default(
            &self.default,
            ExtractError::not_found(format!("cell for column `{}`", self.name)),
        )
    }
}

/// A cell's `colspan`, falling back to 1 when missing or unparsable.
pub(crate) fn cell_span(cell: ElementRef<'_>) -> usize {
    cell.value()
        .attr("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
}

impl_filter_selector!(Attr, Link, TableCell);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_attr() {
        let doc = Document::html(r#"<a href="/acc/1" class="x">Account</a>"#);
        let scope = Scope::new(&doc);

        let value = Attr::new("a", "href").evaluate(&scope).unwrap().into_value();
        assert_eq!(value, Value::from("/acc/1"));

        let err = Attr::new("a", "title").evaluate(&scope).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_attr_missing_element_uses_default() {
        let doc = Document::html("<p></p>");
        let scope = Scope::new(&doc);
        // An empty node set carries no first node.
        let err = Attr::new("a", "href").evaluate(&scope).unwrap_err();
        assert!(matches!(err, ExtractError::TypeMismatch { .. }));

        let value = Attr::new("a", "href")
            .with_default(Value::Null)
            .evaluate(&scope)
            .unwrap()
            .into_value();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_link_resolution() {
        let doc = Document::html(r#"<a href="history?page=2">next</a>"#);
        let scope = Scope::new(&doc);

        let relative = Link::new("a").evaluate(&scope).unwrap().into_value();
        assert_eq!(relative, Value::from("history?page=2"));

        let base = Url::parse("https://bank.example/accounts/").unwrap();
        let absolute = Link::new("a")
            .resolved_against(base)
            .evaluate(&scope)
            .unwrap()
            .into_value();
        assert_eq!(
            absolute,
            Value::from("https://bank.example/accounts/history?page=2")
        );
    }

    #[test]
    fn test_table_cell_outside_table_is_a_hard_error() {
        let doc = Document::html("<tr><td>x</td></tr>");
        let scope = Scope::new(&doc);
        let err = TableCell::new("amount").evaluate(&scope).unwrap_err();
        assert!(matches!(err, ExtractError::CellOutsideTable { .. }));
    }
}
