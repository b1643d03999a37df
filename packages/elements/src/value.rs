//! The engine's owned value type.
//!
//! Field selectors produce [`Value`]s, records store them, and the
//! environment passes them between scopes. The variants cover what site
//! documents actually contain: JSON scalars and containers, cleaned
//! text, monetary decimals, dates, nested records, and the
//! [`Value::FetchError`] sentinel recorded when a tolerated optional
//! field fails.

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value as Json;

use crate::record::Record;

/// A value extracted from a document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / JSON null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Exact decimal, used for monetary amounts.
    Decimal(Decimal),
    /// Calendar date.
    Date(NaiveDate),
    /// Text.
    Str(String),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Insertion-ordered mapping.
    Map(IndexMap<String, Value>),
    /// A nested record built by a nested item extractor.
    Record(Box<Record>),
    /// Sentinel recorded when an optional field failed and field-error
    /// tolerance is enabled.
    FetchError,
}

impl Value {
    /// Truthiness used by conditions and [`Coalesce`](crate::filters::Coalesce):
    /// empty containers, empty strings, zero numbers, `Null` and
    /// `FetchError` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::FetchError => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Date(_) | Value::Record(_) => true,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Borrow the text of a `Str` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar rendered as text; `None` for containers, records and the
    /// fetch-error sentinel. `Null` renders as the empty string.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::Array(_) | Value::Map(_) | Value::Record(_) | Value::FetchError => None,
        }
    }

    /// Short description of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Int(_) => "an integer",
            Value::Float(_) => "a float",
            Value::Decimal(_) => "a decimal",
            Value::Date(_) => "a date",
            Value::Str(_) => "a string",
            Value::Array(_) => "an array",
            Value::Map(_) => "a map",
            Value::Record(_) => "a record",
            Value::FetchError => "a fetch error",
        }
    }

    /// Convert a decoded JSON value, preserving key order.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render back into JSON. Decimals and dates become strings, the
    /// fetch-error sentinel becomes null.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null | Value::FetchError => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Str(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Record(record) => record.to_json(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Value {
        Value::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Value {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Value {
        Value::from_json(&json)
    }
}
