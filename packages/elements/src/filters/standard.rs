//! The standard filter set.
//!
//! Text cleanup, number and date parsing, regular expressions, string
//! formatting, environment and loader lookups, translation tables, and
//! first-usable-alternative selection. Every filter takes an optional
//! sub-selector (defaulting to the current node) and an optional
//! default value absorbing its own failures.

use std::sync::OnceLock;

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{ExtractError, Result};
use crate::filters::{
    filter_input, impl_filter_selector, or_default, Filter, FilterInput, Selected, Selector,
};
use crate::scope::Scope;
use crate::value::Value;

/// Collapse whitespace runs into single spaces and trim.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the text behind a selection, or fall back to the default.
fn text_of(input: &Selected<'_>, default: &Option<Value>) -> Result<std::result::Result<String, Selected<'static>>> {
    match input.text() {
        Some(text) => Ok(Ok(text)),
        None => match or_default(
            default,
            ExtractError::TypeMismatch {
                expected: "text",
                found: input.kind().to_string(),
            },
        ) {
            Ok(selected) => Ok(Err(selected)),
            Err(error) => Err(error),
        },
    }
}

/// Shorthand used by every textual filter: evaluate the sub-selector,
/// coerce to text, short-circuiting to the declared default on a miss.
macro_rules! input_text {
    ($self:ident, $scope:ident) => {
        match filter_input(&$self.sub, &$self.default, $scope)? {
            FilterInput::Defaulted(value) => return Ok(Selected::Value(value)),
            FilterInput::Ready(input) => match text_of(&input, &$self.default)? {
                Ok(text) => text,
                Err(selected) => return Ok(selected),
            },
        }
    };
}

// ---------------------------------------------------------------------------
// CleanText
// ---------------------------------------------------------------------------

/// Normalize text: concatenate, collapse whitespace, strip symbols,
/// apply literal replacements.
#[derive(Debug, Clone, Default)]
pub struct CleanText {
    sub: Option<Selector>,
    default: Option<Value>,
    symbols: Vec<char>,
    replacements: Vec<(String, String)>,
}

impl CleanText {
    /// Clean the current node's text.
    pub fn here() -> Self {
        CleanText::default()
    }

    /// Clean the text behind a sub-selector.
    pub fn new(selector: impl Into<Selector>) -> Self {
        CleanText {
            sub: Some(selector.into()),
            ..CleanText::default()
        }
    }

    /// Remove every occurrence of these characters.
    pub fn strip(mut self, symbols: impl IntoIterator<Item = char>) -> Self {
        self.symbols.extend(symbols);
        self
    }

    /// Replace a literal substring before whitespace normalization.
    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replacements.push((from.into(), to.into()));
        self
    }

    /// Value returned instead of failing.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for CleanText {
    fn name(&self) -> &'static str {
        "CleanText"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let mut text = input_text!(self, scope);
        for (from, to) in &self.replacements {
            text = text.replace(from.as_str(), to);
        }
        if !self.symbols.is_empty() {
            text.retain(|c| !self.symbols.contains(&c));
        }
        Ok(Selected::Value(Value::Str(squash(&text))))
    }
}

// ---------------------------------------------------------------------------
// CleanDecimal
// ---------------------------------------------------------------------------

/// Thousands/decimal separator conventions understood by
/// [`CleanDecimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalStyle {
    /// `1,234.56`
    Us,
    /// `1 234,56` or `1.234,56`
    French,
    /// `1 234.56` or `1'234.56`
    Si,
}

/// Parse a monetary amount out of messy text.
#[derive(Debug, Clone)]
pub struct CleanDecimal {
    sub: Option<Selector>,
    default: Option<Value>,
    style: DecimalStyle,
}

impl CleanDecimal {
    fn styled(sub: Option<Selector>, style: DecimalStyle) -> Self {
        CleanDecimal {
            sub,
            default: None,
            style,
        }
    }

    /// US-style amount behind a sub-selector.
    pub fn us(selector: impl Into<Selector>) -> Self {
        CleanDecimal::styled(Some(selector.into()), DecimalStyle::Us)
    }

    /// French-style amount behind a sub-selector.
    pub fn french(selector: impl Into<Selector>) -> Self {
        CleanDecimal::styled(Some(selector.into()), DecimalStyle::French)
    }

    /// SI-style amount behind a sub-selector.
    pub fn si(selector: impl Into<Selector>) -> Self {
        CleanDecimal::styled(Some(selector.into()), DecimalStyle::Si)
    }

    /// US-style amount from the current node.
    pub fn here(style: DecimalStyle) -> Self {
        CleanDecimal::styled(None, style)
    }

    /// Value returned instead of failing.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn normalize(&self, token: &str) -> String {
        let mut out = String::with_capacity(token.len());
        for c in token.chars() {
            match (self.style, c) {
                (_, ' ' | '\u{a0}') => {}
                (DecimalStyle::Us, ',') => {}
                (DecimalStyle::French, '.') => {}
                (DecimalStyle::French, ',') => out.push('.'),
                (DecimalStyle::Si, '\'' | ',') => {}
                (_, c) => out.push(c),
            }
        }
        out
    }
}

impl Filter for CleanDecimal {
    fn name(&self) -> &'static str {
        "CleanDecimal"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        static NUMBER: OnceLock<Regex> = OnceLock::new();
        let number = NUMBER
            .get_or_init(|| Regex::new(r"[+-]?[0-9][0-9 \u{a0},.']*").expect("static regex"));

        let text = input_text!(self, scope);
        let Some(token) = number.find(&text) else {
            return or_default(
                &self.default,
                ExtractError::Parse {
                    kind: "decimal",
                    input: text,
                },
            );
        };
        match self.normalize(token.as_str()).parse::<Decimal>() {
            Ok(amount) => Ok(Selected::Value(Value::Decimal(amount))),
            Err(_) => or_default(
                &self.default,
                ExtractError::Parse {
                    kind: "decimal",
                    input: text,
                },
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Regexp
// ---------------------------------------------------------------------------

/// Match a pattern against the selected text and expand a capture
/// template.
#[derive(Debug, Clone)]
pub struct Regexp {
    sub: Option<Selector>,
    default: Option<Value>,
    pattern: Regex,
    template: Option<String>,
    nth: usize,
}

impl Regexp {
    /// Match against the text behind a sub-selector.
    pub fn new(selector: impl Into<Selector>, pattern: Regex) -> Self {
        Regexp {
            sub: Some(selector.into()),
            default: None,
            pattern,
            template: None,
            nth: 0,
        }
    }

    /// Match against the current node's text.
    pub fn here(pattern: Regex) -> Self {
        Regexp {
            sub: None,
            default: None,
            pattern,
            template: None,
            nth: 0,
        }
    }

    /// Expansion template using `$1`-style capture references. Without
    /// a template the first capture group (or the whole match) is
    /// returned.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Use the nth match instead of the first.
    pub fn nth(mut self, nth: usize) -> Self {
        self.nth = nth;
        self
    }

    /// Value returned instead of failing.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Regexp {
    fn name(&self) -> &'static str {
        "Regexp"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let text = input_text!(self, scope);
        let Some(captures) = self.pattern.captures_iter(&text).nth(self.nth) else {
            return or_default(
                &self.default,
                ExtractError::Parse {
                    kind: "pattern match",
                    input: text,
                },
            );
        };

        let result = match &self.template {
            Some(template) => {
                let mut out = String::new();
                captures.expand(template, &mut out);
                out
            }
            None => match captures.get(1) {
                Some(group) if self.pattern.captures_len() > 1 => group.as_str().to_string(),
                _ => captures
                    .get(0)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            },
        };
        Ok(Selected::Value(Value::Str(result)))
    }
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Interpolate sub-selector results into a `{}` template.
#[derive(Debug, Clone)]
pub struct Format {
    template: String,
    args: Vec<Selector>,
}

impl Format {
    /// `Format::new("{} ({})", [sel_a, sel_b])`
    pub fn new<I, S>(template: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        Format {
            template: template.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter for Format {
    fn name(&self) -> &'static str {
        "Format"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let parts: Vec<&str> = self.template.split("{}").collect();
        if parts.len() != self.args.len() + 1 {
            return Err(ExtractError::InvalidSelector {
                selector: self.template.clone(),
                message: format!(
                    "template has {} placeholders but {} arguments were given",
                    parts.len() - 1,
                    self.args.len()
                ),
            });
        }

        let mut out = String::new();
        for (part, arg) in parts.iter().zip(&self.args) {
            out.push_str(part);
            let value = arg.evaluate(scope)?.into_value();
            match value.to_text() {
                Some(text) => out.push_str(&text),
                None => {
                    return Err(ExtractError::TypeMismatch {
                        expected: "text",
                        found: value.kind().to_string(),
                    })
                }
            }
        }
        out.push_str(parts[parts.len() - 1]);
        Ok(Selected::Value(Value::Str(out)))
    }
}

// ---------------------------------------------------------------------------
// Env / Loaded
// ---------------------------------------------------------------------------

/// Read a value from the scope's environment.
#[derive(Debug, Clone)]
pub struct Env {
    key: String,
    default: Option<Value>,
}

impl Env {
    /// Lookup by key.
    pub fn new(key: impl Into<String>) -> Self {
        Env {
            key: key.into(),
            default: None,
        }
    }

    /// Value returned when the key is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Env {
    fn name(&self) -> &'static str {
        "Env"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        match scope.get(&self.key) {
            Some(value) => Ok(Selected::Value(value.clone())),
            None => or_default(
                &self.default,
                ExtractError::not_found(format!("env:{}", self.key)),
            ),
        }
    }
}

/// Read a memoized loader result.
#[derive(Debug, Clone)]
pub struct Loaded {
    name: String,
    default: Option<Value>,
}

impl Loaded {
    /// Lookup by loader name.
    pub fn new(name: impl Into<String>) -> Self {
        Loaded {
            name: name.into(),
            default: None,
        }
    }

    /// Value returned when the loader is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Loaded {
    fn name(&self) -> &'static str {
        "Loaded"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        match scope.loader(&self.name) {
            Some(value) => Ok(Selected::Value(value.clone())),
            None => or_default(
                &self.default,
                ExtractError::not_found(format!("loader:{}", self.name)),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Translate the selected text through a lookup table.
#[derive(Debug, Clone)]
pub struct Map {
    sub: Option<Selector>,
    table: IndexMap<String, Value>,
    default: Option<Value>,
}

impl Map {
    /// Translate the sub-selector's result.
    pub fn new<I, K, V>(selector: impl Into<Selector>, table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Map {
            sub: Some(selector.into()),
            table: table
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            default: None,
        }
    }

    /// Value returned when the key is not in the table.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Map {
    fn name(&self) -> &'static str {
        "Map"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let key = input_text!(self, scope);
        match self.table.get(&key) {
            Some(value) => Ok(Selected::Value(value.clone())),
            None => or_default(
                &self.default,
                ExtractError::not_found(format!("map key `{key}`")),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

/// Parse a date, trying several formats in order.
#[derive(Debug, Clone)]
pub struct Date {
    sub: Option<Selector>,
    formats: Vec<String>,
    default: Option<Value>,
}

impl Date {
    /// Parse the sub-selector's text with `strftime`-style formats.
    pub fn new<I, S>(selector: impl Into<Selector>, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Date {
            sub: Some(selector.into()),
            formats: formats.into_iter().map(Into::into).collect(),
            default: None,
        }
    }

    /// Parse the current node's text.
    pub fn here<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Date {
            sub: None,
            formats: formats.into_iter().map(Into::into).collect(),
            default: None,
        }
    }

    /// Value returned instead of failing.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Date {
    fn name(&self) -> &'static str {
        "Date"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        let text = input_text!(self, scope);
        let trimmed = text.trim();
        for format in &self.formats {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Ok(Selected::Value(Value::Date(date)));
            }
        }
        or_default(
            &self.default,
            ExtractError::Parse {
                kind: "date",
                input: text,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Coalesce
// ---------------------------------------------------------------------------

/// The first alternative that evaluates to a truthy value. Not-found
/// alternatives are passed over; other errors propagate.
#[derive(Debug, Clone)]
pub struct Coalesce {
    alternatives: Vec<Selector>,
    default: Option<Value>,
}

impl Coalesce {
    /// Try alternatives in order.
    pub fn new<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        Coalesce {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
            default: None,
        }
    }

    /// Value returned when no alternative matched.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Coalesce {
    fn name(&self) -> &'static str {
        "Coalesce"
    }

    fn evaluate<'d>(&self, scope: &Scope<'d>) -> Result<Selected<'d>> {
        for alternative in &self.alternatives {
            match alternative.evaluate(scope) {
                Ok(selected) if selected.is_truthy() => return Ok(selected),
                Ok(_) => {}
                Err(error) if error.is_not_found() => {}
                Err(error) => return Err(error),
            }
        }
        or_default(
            &self.default,
            ExtractError::not_found("coalesce: no alternative matched"),
        )
    }
}

impl_filter_selector!(
    CleanText, CleanDecimal, Regexp, Format, Env, Loaded, Map, Date, Coalesce
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::filters::json::Dict;

    fn scope_of(doc: &Document) -> Scope<'_> {
        Scope::new(doc)
    }

    #[test]
    fn test_clean_text_normalizes() {
        let doc = Document::html("<p>  hello \n\t world  </p>");
        let scope = scope_of(&doc);
        let value = CleanText::new("p").evaluate(&scope).unwrap().into_value();
        assert_eq!(value, Value::from("hello world"));
    }

    #[test]
    fn test_clean_text_strip_and_replace() {
        let doc = Document::json(r#"{"label": "CB* ACME  CORP"}"#).unwrap();
        let scope = scope_of(&doc);
        let value = CleanText::new(Dict::path("label"))
            .replace("CB*", "")
            .strip(['*'])
            .evaluate(&scope)
            .unwrap()
            .into_value();
        assert_eq!(value, Value::from("ACME CORP"));
    }

    #[test]
    fn test_clean_text_of_missing_node_uses_default() {
        let doc = Document::json(r#"{}"#).unwrap();
        let scope = scope_of(&doc);
        let value = CleanText::new(Dict::path("label"))
            .with_default(Value::Str("n/a".into()))
            .evaluate(&scope)
            .unwrap()
            .into_value();
        assert_eq!(value, Value::from("n/a"));
    }

    #[test]
    fn test_clean_decimal_styles() {
        let doc = Document::json(
            r#"{"us": "$1,234.56", "fr": "1 234,56 EUR", "si": "1'234.56", "neg": "-12,50 €"}"#,
        )
        .unwrap();
        let scope = scope_of(&doc);

        let us = CleanDecimal::us(Dict::path("us")).evaluate(&scope).unwrap();
        assert_eq!(us.into_value(), Value::Decimal("1234.56".parse().unwrap()));

        let fr = CleanDecimal::french(Dict::path("fr"))
            .evaluate(&scope)
            .unwrap();
        assert_eq!(fr.into_value(), Value::Decimal("1234.56".parse().unwrap()));

        let si = CleanDecimal::si(Dict::path("si")).evaluate(&scope).unwrap();
        assert_eq!(si.into_value(), Value::Decimal("1234.56".parse().unwrap()));

        let neg = CleanDecimal::french(Dict::path("neg"))
            .evaluate(&scope)
            .unwrap();
        assert_eq!(neg.into_value(), Value::Decimal("-12.50".parse().unwrap()));
    }

    #[test]
    fn test_clean_decimal_failure_and_default() {
        let doc = Document::json(r#"{"x": "no numbers here"}"#).unwrap();
        let scope = scope_of(&doc);

        let err = CleanDecimal::us(Dict::path("x")).evaluate(&scope).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { kind: "decimal", .. }));

        let value = CleanDecimal::us(Dict::path("x"))
            .with_default(Value::Null)
            .evaluate(&scope)
            .unwrap()
            .into_value();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_regexp_template_and_nth() {
        let doc = Document::json(r#"{"x": "12/03/2024 and 25/12/2024"}"#).unwrap();
        let scope = scope_of(&doc);
        let pattern = Regex::new(r"(\d{2})/(\d{2})/(\d{4})").unwrap();

        let first = Regexp::new(Dict::path("x"), pattern.clone())
            .template("$3-$2-$1")
            .evaluate(&scope)
            .unwrap();
        assert_eq!(first.into_value(), Value::from("2024-03-12"));

        let second = Regexp::new(Dict::path("x"), pattern.clone())
            .template("$1")
            .nth(1)
            .evaluate(&scope)
            .unwrap();
        assert_eq!(second.into_value(), Value::from("25"));

        let group = Regexp::new(Dict::path("x"), Regex::new(r"(\d{2})/").unwrap())
            .evaluate(&scope)
            .unwrap();
        assert_eq!(group.into_value(), Value::from("12"));
    }

    #[test]
    fn test_format_interpolates() {
        let doc = Document::json(r#"{"a": "x", "n": 3}"#).unwrap();
        let scope = scope_of(&doc);
        let value = Format::new(
            "{}-{}",
            [Selector::from(Dict::path("a")), Selector::from(Dict::path("n"))],
        )
        .evaluate(&scope)
        .unwrap()
        .into_value();
        assert_eq!(value, Value::from("x-3"));
    }

    #[test]
    fn test_format_placeholder_mismatch() {
        let doc = Document::json("{}").unwrap();
        let scope = scope_of(&doc);
        let err = Format::new("{} {}", [Selector::constant("only one")])
            .evaluate(&scope)
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { .. }));
    }

    #[test]
    fn test_env_lookup() {
        let doc = Document::json("{}").unwrap();
        let mut scope = scope_of(&doc);
        scope.set("page", Value::Int(4));

        let value = Env::new("page").evaluate(&scope).unwrap().into_value();
        assert_eq!(value, Value::Int(4));

        assert!(Env::new("missing").evaluate(&scope).unwrap_err().is_not_found());
        assert_eq!(
            Env::new("missing")
                .with_default(Value::Null)
                .evaluate(&scope)
                .unwrap()
                .into_value(),
            Value::Null
        );
    }

    #[test]
    fn test_map_translation() {
        let doc = Document::json(r#"{"type": "DEB"}"#).unwrap();
        let scope = scope_of(&doc);
        let filter = Map::new(
            Dict::path("type"),
            [("DEB", Value::from("debit")), ("CRE", Value::from("credit"))],
        );
        assert_eq!(
            filter.evaluate(&scope).unwrap().into_value(),
            Value::from("debit")
        );

        let doc = Document::json(r#"{"type": "???"}"#).unwrap();
        let scope = scope_of(&doc);
        let filter = Map::new(
            Dict::path("type"),
            [("DEB", Value::from("debit"))],
        );
        assert!(filter.evaluate(&scope).unwrap_err().is_not_found());
    }

    #[test]
    fn test_date_formats() {
        let doc = Document::json(r#"{"d": " 07/03/2024 "}"#).unwrap();
        let scope = scope_of(&doc);
        let value = Date::new(Dict::path("d"), ["%Y-%m-%d", "%d/%m/%Y"])
            .evaluate(&scope)
            .unwrap()
            .into_value();
        assert_eq!(
            value,
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
        );

        let err = Date::new(Dict::path("d"), ["%Y-%m-%d"])
            .evaluate(&scope)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse { kind: "date", .. }));
    }

    #[test]
    fn test_coalesce_picks_first_truthy() {
        let doc = Document::json(r#"{"b": "", "c": "kept"}"#).unwrap();
        let scope = scope_of(&doc);
        let filter = Coalesce::new([
            Selector::from(Dict::path("a")), // missing: passed over
            Selector::from(Dict::path("b")), // empty: falsy
            Selector::from(Dict::path("c")),
        ]);
        assert_eq!(
            filter.evaluate(&scope).unwrap().into_value(),
            Value::from("kept")
        );

        let exhausted = Coalesce::new([Selector::from(Dict::path("a"))]);
        assert!(exhausted.evaluate(&scope).unwrap_err().is_not_found());
    }
}
