//! Conversion between JSON documents and record values.
//!
//! Reading understands three tagged single-key objects so that a JSON feed
//! can carry the richer container kinds:
//!
//! * `{"$map": [[key, value], ...]}` - ordered map
//! * `{"$set": [...]}` - set
//! * `{"$date": "2024-01-01T00:00:00Z"}` - date
//!
//! Writing is deliberately lossy but stable: maps become plain objects keyed
//! by the textual form of their keys, sets become arrays and dates become
//! ISO-8601 strings. Reading that output back yields records, sequences and
//! strings.

use crate::data::value::{format_date, Value};
use chrono::{DateTime, Utc};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

const MAP_TAG: &str = "$map";
const SET_TAG: &str = "$set";
const DATE_TAG: &str = "$date";

/// Convert a JSON document into a record value
pub fn from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::Seq(items.iter().map(from_json).collect()),
        JsonValue::Object(obj) => from_json_object(obj),
    }
}

fn from_json_object(obj: &JsonMap<String, JsonValue>) -> Value {
    if obj.len() == 1 {
        if let Some(tagged) = from_tagged(obj) {
            return tagged;
        }
    }

    Value::Record(
        obj.iter()
            .map(|(key, value)| (key.clone(), from_json(value)))
            .collect(),
    )
}

fn from_tagged(obj: &JsonMap<String, JsonValue>) -> Option<Value> {
    if let Some(JsonValue::Array(entries)) = obj.get(MAP_TAG) {
        let mut pairs = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                JsonValue::Array(pair) if pair.len() == 2 => {
                    pairs.push((from_json(&pair[0]), from_json(&pair[1])));
                }
                // Not a well-formed map literal, keep it as an ordinary record
                _ => return None,
            }
        }
        return Some(Value::Map(pairs));
    }

    if let Some(JsonValue::Array(items)) = obj.get(SET_TAG) {
        return Some(Value::set(items.iter().map(from_json)));
    }

    if let Some(JsonValue::String(raw)) = obj.get(DATE_TAG) {
        return DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|d| Value::Date(d.with_timezone(&Utc)));
    }

    None
}

/// Serialize a value to JSON, flattening maps and sets
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Date(d) => JsonValue::String(format_date(d)),
        Value::Seq(items) | Value::Set(items) => {
            JsonValue::Array(items.iter().map(to_json).collect())
        }
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_text().into_owned(), to_json(v)))
                .collect(),
        ),
        Value::Record(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        JsonValue::Number(JsonNumber::from(n as i64))
    } else {
        // NaN and infinities have no JSON form
        JsonNumber::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serializer.serialize_i64(*n as i64)
                } else if n.is_finite() {
                    serializer.serialize_f64(*n)
                } else {
                    serializer.serialize_unit()
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&format_date(d)),
            Value::Seq(items) | Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k.to_text().as_ref(), v)?;
                }
                map.end()
            }
            Value::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Ok(from_json(&json))
    }
}
