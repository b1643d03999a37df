//! Documents and document nodes.
//!
//! The engine never fetches anything: a collaborator hands it a parsed
//! [`Document`], either an HTML tree or a decoded JSON value, and
//! extraction walks borrowed [`Node`] handles into it. Nodes are
//! `Copy`; the document is read-only for the duration of a run.

use scraper::{ElementRef, Html, Selector as CssSelector};
use serde_json::Value as Json;

use crate::error::{ExtractError, Result};
use crate::value::Value;

/// A parsed document handed to the engine by the fetch layer.
#[derive(Debug, Clone)]
pub enum Document {
    /// An HTML tree, queried with CSS selectors.
    Html(Html),
    /// A decoded JSON value, queried with `/`-separated paths.
    Json(Json),
}

impl Document {
    /// Parse an HTML document.
    pub fn html(source: &str) -> Self {
        Document::Html(Html::parse_document(source))
    }

    /// Decode a JSON document. Key order is preserved, so candidate
    /// enumeration follows document order.
    pub fn json(source: &str) -> serde_json::Result<Self> {
        Ok(Document::Json(serde_json::from_str(source)?))
    }

    /// Wrap an already-decoded JSON value.
    pub fn from_json(value: Json) -> Self {
        Document::Json(value)
    }

    /// The document's root node.
    pub fn root(&self) -> Node<'_> {
        match self {
            Document::Html(html) => Node::Html(html.root_element()),
            Document::Json(json) => Node::Json(json),
        }
    }
}

/// A borrowed handle on one document node.
#[derive(Debug, Clone, Copy)]
pub enum Node<'d> {
    /// An HTML element.
    Html(ElementRef<'d>),
    /// A JSON value (mapping, sequence or scalar).
    Json(&'d Json),
}

impl<'d> Node<'d> {
    /// The JSON value behind this node, if it is one.
    pub fn as_json(&self) -> Option<&'d Json> {
        match self {
            Node::Json(json) => Some(json),
            Node::Html(_) => None,
        }
    }

    /// The HTML element behind this node, if it is one.
    pub fn as_html(&self) -> Option<ElementRef<'d>> {
        match self {
            Node::Html(el) => Some(*el),
            Node::Json(_) => None,
        }
    }

    /// Raw text of the node: concatenated descendant text for HTML,
    /// rendered scalar for JSON. `None` for JSON containers.
    pub fn text(&self) -> Option<String> {
        match self {
            Node::Html(el) => Some(el.text().collect()),
            Node::Json(json) => Value::from_json(json).to_text(),
        }
    }

    /// An attribute of the underlying HTML element.
    pub fn attr(&self, name: &str) -> Option<&'d str> {
        match self {
            Node::Html(el) => el.value().attr(name),
            Node::Json(_) => None,
        }
    }

    /// Convert into an owned value. HTML becomes its raw text, JSON
    /// converts structurally.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Html(el) => Value::Str(el.text().collect()),
            Node::Json(json) => Value::from_json(json),
        }
    }

    /// Short description of the node's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Html(_) => "an HTML element",
            Node::Json(json) => json_kind(json),
        }
    }

    /// One-line rendering used by highlighters and trace logs.
    pub fn describe(&self) -> String {
        match self {
            Node::Html(el) => format!("<{}>", el.value().name()),
            Node::Json(json) => json_kind(json).to_string(),
        }
    }
}

/// Short description of a JSON value's shape.
pub(crate) fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "JSON null",
        Json::Bool(_) => "a JSON boolean",
        Json::Number(_) => "a JSON number",
        Json::String(_) => "a JSON string",
        Json::Array(_) => "a JSON array",
        Json::Object(_) => "a JSON object",
    }
}

/// Compile a CSS selector, mapping parse failures onto the engine's
/// error type.
pub(crate) fn parse_css(css: &str) -> Result<CssSelector> {
    CssSelector::parse(css).map_err(|e| ExtractError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// All descendants of `el` matching a CSS selector, in document order.
pub(crate) fn select_html<'d>(el: ElementRef<'d>, css: &str) -> Result<Vec<Node<'d>>> {
    let selector = parse_css(css)?;
    Ok(el.select(&selector).map(Node::Html).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_selection_and_text() {
        let doc = Document::html("<ul><li>one</li><li>two</li></ul>");
        let Node::Html(root) = doc.root() else {
            panic!("expected an HTML root");
        };
        let items = select_html(root, "li").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text().as_deref(), Some("one"));
        assert_eq!(items[1].text().as_deref(), Some("two"));
    }

    #[test]
    fn test_invalid_css_is_reported() {
        let doc = Document::html("<p></p>");
        let Node::Html(root) = doc.root() else {
            panic!("expected an HTML root");
        };
        let err = select_html(root, "li[").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { .. }));
    }

    #[test]
    fn test_json_node_text() {
        let doc = Document::json(r#"{"a": 12}"#).unwrap();
        let root = doc.root();
        assert_eq!(root.text(), None);
        assert_eq!(root.kind(), "a JSON object");
    }

    #[test]
    fn test_attr() {
        let doc = Document::html(r#"<a href="/next">more</a>"#);
        let Node::Html(root) = doc.root() else {
            panic!("expected an HTML root");
        };
        let link = select_html(root, "a").unwrap()[0];
        assert_eq!(link.attr("href"), Some("/next"));
        assert_eq!(link.attr("title"), None);
    }
}
