//! Path navigation over decoded JSON.
//!
//! [`Dict`] walks nested mappings and sequences with a `/`-separated
//! path. Segments may be literal keys, numeric indices into sequences,
//! or nested selectors evaluated against the extraction scope (not the
//! navigated value) to compute a key dynamically. Navigation fails
//! closed: a missing key, an out-of-range index or a type mismatch at
//! any depth yields the same not-found outcome as a missing top-level
//! key.
//!
//! ```text
//! value          {"a": {"b": "c", "d": null}}
//! Dict("")       the whole value
//! Dict("a/b")    "c"
//! Dict("a/d")    null
//! Dict("x")      not-found error
//! Dict("x") + default    the default
//! ```

use serde_json::Value as Json;

use crate::document::Node;
use crate::error::{ExtractError, Result};
use crate::filters::{impl_filter_selector, or_default, Filter, Selected, Selector};
use crate::scope::Scope;
use crate::value::Value;

/// One path segment.
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// A literal key (or index, for sequences).
    Key(String),
    /// A selector evaluated against the extraction scope; its textual
    /// result becomes the key.
    Dynamic(Selector),
}

impl PathSegment {
    /// A dynamically computed segment.
    pub fn dynamic(selector: impl Into<Selector>) -> Self {
        PathSegment::Dynamic(selector.into())
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Key(index.to_string())
    }
}

impl From<Selector> for PathSegment {
    fn from(selector: Selector) -> Self {
        PathSegment::Dynamic(selector)
    }
}

/// Filter navigating the current JSON node by path.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    segments: Vec<PathSegment>,
    default: Option<Value>,
}

impl Dict {
    /// The root: no navigation, the current node itself.
    pub fn new() -> Self {
        Dict::default()
    }

    /// A `/`-separated literal path. The empty path is the root.
    pub fn path(path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').map(PathSegment::from).collect()
        };
        Dict {
            segments,
            default: None,
        }
    }

    /// A single dynamic segment.
    pub fn with(selector: impl Into<Selector>) -> Self {
        Dict {
            segments: vec![PathSegment::Dynamic(selector.into())],
            default: None,
        }
    }

    /// A pre-split sequence of segments.
    pub fn segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Dict {
            segments: segments.into_iter().map(Into::into).collect(),
            default: None,
        }
    }

    /// Append one segment, extending the path incrementally.
    pub fn at(mut self, segment: impl Into<PathSegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Value returned instead of failing when navigation misses.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn rendered(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => key.clone(),
                PathSegment::Dynamic(_) => "<dynamic>".to_string(),
            })
            .collect();
        parts.join("/")
    }
}

impl Filter for Dict {
    fn name(&self) -> &'static str {
        "Dict"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let Some(root) = scope.node().as_json() else {
            // Navigating a non-JSON node is the same failure as a
            // missing key: fail closed, honor the default.
            return or_default(&self.default, ExtractError::not_found(self.rendered()));
        };

        let mut resolved: Vec<String> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => resolved.push(key.clone()),
                PathSegment::Dynamic(selector) => {
                    let value = selector.evaluate(scope)?.into_value();
                    match value.to_text() {
                        Some(key) => resolved.push(key),
                        None => {
                            return or_default(
                                &self.default,
                                ExtractError::not_found(self.rendered()),
                            )
                        }
                    }
                }
            }
        }

        let segments: Vec<&str> = resolved.iter().map(String::as_str).collect();
        match navigate(root, &segments) {
            Some(value) => Ok(Selected::Node(Node::Json(value))),
            None => or_default(&self.default, ExtractError::not_found(self.rendered())),
        }
    }
}

impl_filter_selector!(Dict);

/// Walk literal segments down a JSON value. `None` on any miss.
pub(crate) fn navigate<'d>(root: &'d Json, segments: &[&str]) -> Option<&'d Json> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Json::Object(map) => map.get(*segment)?,
            Json::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Wildcard-aware navigation used for candidate-node enumeration: a
/// `*` segment expands to every value of the current mappings or every
/// element of the current sequences.
pub(crate) fn expand<'d>(root: &'d Json, segments: &[&str]) -> Result<Vec<&'d Json>> {
    let mut bases = vec![root];
    for segment in segments {
        let mut next = Vec::new();
        if *segment == "*" {
            for base in bases {
                match base {
                    Json::Array(items) => next.extend(items.iter()),
                    Json::Object(map) => next.extend(map.values()),
                    _ => return Err(ExtractError::not_found(segments.join("/"))),
                }
            }
        } else {
            for base in bases {
                let child = match base {
                    Json::Object(map) => map.get(*segment),
                    Json::Array(items) => {
                        segment.parse::<usize>().ok().and_then(|i| items.get(i))
                    }
                    _ => None,
                };
                match child {
                    Some(child) => next.push(child),
                    None => return Err(ExtractError::not_found(segments.join("/"))),
                }
            }
        }
        bases = next;
    }
    Ok(bases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::filters::standard::Env;

    fn scope_of(doc: &Document) -> Scope<'_> {
        Scope::new(doc)
    }

    #[test]
    fn test_nested_lookup() {
        let doc = Document::json(r#"{"a": {"b": "c", "d": null}}"#).unwrap();
        let scope = scope_of(&doc);

        assert_eq!(
            Dict::path("a/b").evaluate(&scope).unwrap().into_value(),
            Value::from("c")
        );
        assert_eq!(
            Dict::path("a/d").evaluate(&scope).unwrap().into_value(),
            Value::Null
        );
    }

    #[test]
    fn test_root_paths() {
        let doc = Document::json(r#"{"a": 1}"#).unwrap();
        let scope = scope_of(&doc);

        let whole = serde_json::json!({"a": 1});
        assert_eq!(
            Dict::new().evaluate(&scope).unwrap().into_value(),
            Value::from_json(&whole)
        );
        assert_eq!(
            Dict::path("").evaluate(&scope).unwrap().into_value(),
            Value::from_json(&whole)
        );
    }

    #[test]
    fn test_missing_key_raises_or_defaults() {
        let doc = Document::json(r#"{"a": {"b": "c"}}"#).unwrap();
        let scope = scope_of(&doc);

        let err = Dict::path("notfound").evaluate(&scope).unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(
            Dict::path("notfound")
                .with_default(Value::Null)
                .evaluate(&scope)
                .unwrap()
                .into_value(),
            Value::Null
        );
    }

    #[test]
    fn test_navigation_fails_closed_on_type_mismatch() {
        let doc = Document::json(r#"{"a": "scalar"}"#).unwrap();
        let scope = scope_of(&doc);

        // "a" exists but is not navigable further.
        let err = Dict::path("a/b").evaluate(&scope).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_numeric_index() {
        let doc = Document::json(r#"{"items": ["x", "y"]}"#).unwrap();
        let scope = scope_of(&doc);

        assert_eq!(
            Dict::path("items/1").evaluate(&scope).unwrap().into_value(),
            Value::from("y")
        );
        assert!(Dict::path("items/9")
            .evaluate(&scope)
            .unwrap_err()
            .is_not_found());
        assert!(Dict::path("items/notanumber")
            .evaluate(&scope)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_subscript_extension() {
        let doc = Document::json(r#"{"a": {"b": [10, 20]}}"#).unwrap();
        let scope = scope_of(&doc);

        let selector = Dict::path("a").at("b").at(1usize);
        assert_eq!(
            selector.evaluate(&scope).unwrap().into_value(),
            Value::Int(20)
        );
    }

    #[test]
    fn test_dynamic_segment_reads_the_scope() {
        let doc = Document::json(r#"{"fr": "bonjour", "en": "hello"}"#).unwrap();
        let mut scope = scope_of(&doc);
        scope.set("lang", Value::from("en"));

        let selector = Dict::with(Selector::from(Env::new("lang")));
        assert_eq!(
            selector.evaluate(&scope).unwrap().into_value(),
            Value::from("hello")
        );
    }

    #[test]
    fn test_expand_wildcard() {
        let json: Json =
            serde_json::from_str(r#"{"pages": {"p1": {"rows": [1]}, "p2": {"rows": [2]}}}"#)
                .unwrap();
        let bases = expand(&json, &["pages", "*", "rows"]).unwrap();
        assert_eq!(bases.len(), 2);
        assert!(expand(&json, &["pages", "missing"]).is_err());
    }

    mod path_round_trip {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Segment {
            Key(String),
            Index(usize),
        }

        fn segment() -> impl Strategy<Value = Segment> {
            prop_oneof![
                "[a-z]{1,6}".prop_map(Segment::Key),
                (0usize..3).prop_map(Segment::Index),
            ]
        }

        /// Build a nested value containing `leaf` at exactly `path`.
        fn nest(path: &[Segment], leaf: Json) -> Json {
            path.iter().rev().fold(leaf, |inner, segment| match segment {
                Segment::Key(key) => {
                    let mut map = serde_json::Map::new();
                    map.insert(key.clone(), inner);
                    Json::Object(map)
                }
                Segment::Index(index) => {
                    let mut items = vec![Json::Null; index + 1];
                    items[*index] = inner;
                    Json::Array(items)
                }
            })
        }

        fn rendered(path: &[Segment]) -> Vec<String> {
            path.iter()
                .map(|segment| match segment {
                    Segment::Key(key) => key.clone(),
                    Segment::Index(index) => index.to_string(),
                })
                .collect()
        }

        proptest! {
            #[test]
            fn resolves_exactly_the_nested_value(
                path in proptest::collection::vec(segment(), 0..5),
                leaf in "[a-z0-9]{1,8}",
            ) {
                let leaf = Json::String(leaf);
                let value = nest(&path, leaf.clone());
                let segments = rendered(&path);
                let refs: Vec<&str> = segments.iter().map(String::as_str).collect();

                // The valid path reaches the leaf.
                prop_assert_eq!(navigate(&value, &refs), Some(&leaf));

                // A one-segment-longer invalid extension misses, and a
                // Dict with a default absorbs the miss.
                let mut longer = segments.clone();
                longer.push("zz_missing".to_string());
                let longer_refs: Vec<&str> = longer.iter().map(String::as_str).collect();
                prop_assert_eq!(navigate(&value, &longer_refs), None);

                let doc = Document::from_json(value);
                let scope = Scope::new(&doc);
                let selector = Dict::segments(longer).with_default(Value::Null);
                prop_assert_eq!(
                    selector.evaluate(&scope).unwrap().into_value(),
                    Value::Null
                );
            }
        }
    }
}
