use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fmt;

/// A node in a record tree.
///
/// Leaves are primitives or dates; the four container kinds mirror the shapes
/// a record source can produce. Traversal code matches exhaustively on this
/// enum instead of probing types at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    /// Integer-indexed list
    Seq(Vec<Value>),
    /// Unique values, addressed only by iteration position
    Set(Vec<Value>),
    /// Explicit key/value pairs; keys may be any value
    Map(Vec<(Value, Value)>),
    /// String-keyed record, insertion order kept for display
    Record(Vec<(String, Value)>),
}

/// Coarse classification used by display and sorting code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Date,
    Seq,
    Set,
    Map,
    Record,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a keyed record from `(key, value)` pairs
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a set, dropping duplicate members while keeping first-seen order
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(unique)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Date(_) => ValueKind::Date,
            Value::Seq(_) => ValueKind::Seq,
            Value::Set(_) => ValueKind::Set,
            Value::Map(_) => ValueKind::Map,
            Value::Record(_) => ValueKind::Record,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Seq(_) | Value::Set(_) | Value::Map(_) | Value::Record(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Members of a sequence or set
    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a field of a keyed record
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Look up an ordered-map entry by the textual form of its key
    pub fn map_entry(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.to_text() == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// The row identity of a record: a non-empty string `id` field
    pub fn record_id(&self) -> Option<&str> {
        match self.field("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }

    /// Numeric coercion used by comparison operators.
    ///
    /// Strings are trimmed and parsed; an empty string is not a number.
    /// Booleans coerce to 0/1 and dates to epoch milliseconds.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Date(d) => Some(d.timestamp_millis() as f64),
            _ => None,
        }
    }

    /// Textual form used for string matching and map-key addressing
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::String(s) => Cow::Borrowed(s.as_str()),
            Value::Null => Cow::Borrowed("null"),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::Date(d) => Cow::Owned(format_date(d)),
            Value::Seq(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Null => String::new(),
                        other => other.to_text().into_owned(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Set(_) | Value::Map(_) | Value::Record(_) => {
                Cow::Owned(crate::data::json_codec::to_json(self).to_string())
            }
        }
    }
}

/// Render a number the way a record author would write it: integral values
/// carry no fraction.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}
