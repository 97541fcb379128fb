use crate::data::json_codec;
use crate::data::value::Value;
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// The immutable collection of records handed to the explorer by a data
/// source. Invalid rows (no usable `id`) are kept so the source is never
/// rewritten, but they are counted and never shown.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Value>,
    invalid_count: usize,
}

impl RecordSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_values(records: Vec<Value>) -> Self {
        let invalid_count = records.iter().filter(|r| r.record_id().is_none()).count();
        if invalid_count > 0 {
            debug!(target: "records", "{} of {} records have no usable id", invalid_count, records.len());
        }
        Self {
            records,
            invalid_count,
        }
    }

    /// Build from a parsed JSON document. Anything other than an array
    /// (including `null`) is treated as "no data".
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Array(items) => {
                Self::from_values(items.iter().map(json_codec::from_json).collect())
            }
            JsonValue::Null => {
                debug!(target: "records", "Record source is null, treating as empty");
                Self::empty()
            }
            other => {
                warn!(
                    target: "records",
                    "Record source is not an array (found {}), treating as empty",
                    json_kind(other)
                );
                Self::empty()
            }
        }
    }

    /// Parse a JSON document held in a string
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: JsonValue = serde_json::from_str(text).context("Record source is not valid JSON")?;
        Ok(Self::from_json(&json))
    }

    /// Load a JSON file of records
    pub fn load_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read record file {}", path.display()))?;
        let set = Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse record file {}", path.display()))?;
        info!(
            target: "records",
            "Loaded {} records ({} invalid) from {}",
            set.len(),
            set.invalid_count(),
            path.display()
        );
        Ok(set)
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records without a usable `id`
    pub fn invalid_count(&self) -> usize {
        self.invalid_count
    }

    pub fn valid_count(&self) -> usize {
        self.records.len() - self.invalid_count
    }

    /// Position of the record with the given id
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.record_id() == Some(id))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Value> {
        self.position_of(id).and_then(|idx| self.records.get(idx))
    }
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
