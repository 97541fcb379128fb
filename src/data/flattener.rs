use crate::data::path::{child_index, child_key, FieldPath};
use crate::data::value::Value;
use anyhow::{bail, Result};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use tracing::{trace, warn};

/// Key of the single entry emitted when flattening degrades
pub const ERROR_MARKER: &str = "__error__";

/// Suffix of the entry emitted in place of children beyond the depth limit
pub const TRUNCATED_MARKER: &str = "__truncated__";

/// Container nesting below which children are no longer expanded
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Entry name used when flattening a primitive
pub const DEFAULT_FIELD_NAME: &str = "value";

/// Flat path -> value view of one record, in traversal order.
///
/// Container nodes get an entry of their own next to their children so the
/// inspector can offer the whole container as a column.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord<'a> {
    entries: Vec<(String, Cow<'a, Value>)>,
}

impl<'a> FlatRecord<'a> {
    fn degraded(reason: String) -> Self {
        Self {
            entries: vec![(ERROR_MARKER.to_string(), Cow::Owned(Value::String(reason)))],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when flattening hit a structural error and only the error
    /// marker is present
    pub fn is_degraded(&self) -> bool {
        self.get(ERROR_MARKER).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v.as_ref())
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v.as_ref()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Entries whose path or value text contains `query`, case-insensitively.
    /// Container entries match on their path only; their members are
    /// listed separately.
    pub fn search(&self, query: &str) -> Vec<(&str, &Value)> {
        if query.is_empty() {
            return self.iter().collect();
        }

        let needle = query.to_lowercase();
        self.iter()
            .filter(|(path, value)| {
                path.to_lowercase().contains(&needle)
                    || (!value.is_container() && value.to_text().to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Entries grouped by their top-level section, sections in first-seen
    /// order
    pub fn group_by_section(&self) -> Vec<(String, Vec<(&str, &Value)>)> {
        let mut groups: Vec<(String, Vec<(&str, &Value)>)> = Vec::new();

        for (path, value) in self.iter() {
            let section = section_of(path);
            match groups.iter_mut().find(|(name, _)| *name == section) {
                Some((_, members)) => members.push((path, value)),
                None => groups.push((section, vec![(path, value)])),
            }
        }

        groups
    }

    pub fn into_owned(self) -> Vec<(String, Value)> {
        self.entries
            .into_iter()
            .map(|(p, v)| (p, v.into_owned()))
            .collect()
    }
}

fn section_of(path: &str) -> String {
    FieldPath::parse(path)
        .segments()
        .first()
        .map_or_else(|| path.to_string(), |segment| segment.name.clone())
}

/// Walks a record and produces its flat path mapping.
#[derive(Debug, Clone)]
pub struct Flattener {
    max_depth: usize,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Flattener {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn flatten<'a>(&self, value: &'a Value) -> FlatRecord<'a> {
        self.flatten_named(value, DEFAULT_FIELD_NAME)
    }

    /// Flatten `value`; primitives (and empty records) become a single entry
    /// named `field_name`. Never fails: a structural error yields a
    /// degraded record holding only the error marker.
    pub fn flatten_named<'a>(&self, value: &'a Value, field_name: &str) -> FlatRecord<'a> {
        let mut walk = Walk {
            max_depth: self.max_depth,
            entries: Vec::new(),
            seen: HashSet::new(),
        };

        let outcome = match value {
            Value::Record(fields) => walk.record_fields("", fields, 0),
            Value::Seq(_) | Value::Set(_) | Value::Map(_) => {
                // The root container is listed under the caller's name; its
                // members keep bracket paths that resolve against the root.
                walk.push(field_name.to_string(), value)
                    .and_then(|_| walk.children("", value, 0))
            }
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Date(_) => walk.push(field_name.to_string(), value),
        };

        if let Err(e) = outcome {
            warn!(target: "flatten", "Flattening degraded: {}", e);
            return FlatRecord::degraded(format!("Error processing object: {}", e));
        }

        if walk.entries.is_empty() {
            walk.entries
                .push((field_name.to_string(), Cow::Borrowed(value)));
        }

        FlatRecord {
            entries: walk.entries,
        }
    }
}

struct Walk<'a> {
    max_depth: usize,
    entries: Vec<(String, Cow<'a, Value>)>,
    seen: HashSet<String>,
}

impl<'a> Walk<'a> {
    fn push(&mut self, path: String, value: &'a Value) -> Result<()> {
        if !self.seen.insert(path.clone()) {
            bail!("path '{}' is produced twice", path);
        }
        self.entries.push((path, Cow::Borrowed(value)));
        Ok(())
    }

    fn record_fields(&mut self, prefix: &str, fields: &'a [(String, Value)], depth: usize) -> Result<()> {
        for (key, value) in fields {
            self.node(child_key(prefix, key), value, depth)?;
        }
        Ok(())
    }

    /// Emit the entry for `value` and expand it if it is a container
    fn node(&mut self, path: String, value: &'a Value, depth: usize) -> Result<()> {
        self.push(path.clone(), value)?;
        if value.is_container() {
            self.children(&path, value, depth)?;
        }
        Ok(())
    }

    fn children(&mut self, path: &str, value: &'a Value, depth: usize) -> Result<()> {
        if depth >= self.max_depth {
            trace!(target: "flatten", "Depth limit {} reached at '{}'", self.max_depth, path);
            let marker = child_key(path, TRUNCATED_MARKER);
            if !self.seen.insert(marker.clone()) {
                bail!("path '{}' is produced twice", marker);
            }
            self.entries.push((
                marker,
                Cow::Owned(Value::String(format!(
                    "max depth {} reached",
                    self.max_depth
                ))),
            ));
            return Ok(());
        }

        match value {
            Value::Record(fields) => self.record_fields(path, fields, depth + 1),
            Value::Seq(items) => {
                for (idx, item) in items.iter().enumerate() {
                    self.node(child_index(path, &idx.to_string()), item, depth + 1)?;
                }
                Ok(())
            }
            Value::Set(items) => {
                for (idx, item) in items.iter().enumerate() {
                    self.member(child_index(path, &idx.to_string()), item, depth + 1)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (key, item) in entries {
                    self.member(child_index(path, &key.to_text()), item, depth + 1)?;
                }
                Ok(())
            }
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Date(_) => Ok(()),
        }
    }

    /// Set and map members are expanded only when they are keyed records
    fn member(&mut self, path: String, value: &'a Value, depth: usize) -> Result<()> {
        match value {
            Value::Record(_) => self.node(path, value, depth),
            _ => self.push(path, value),
        }
    }
}

/// Sorted union of the flattened paths of every record, error markers
/// excluded
pub fn all_field_paths(records: &[Value], flattener: &Flattener) -> Vec<String> {
    let mut paths = BTreeSet::new();
    for record in records {
        let flat = flattener.flatten(record);
        if flat.is_degraded() {
            continue;
        }
        for path in flat.paths() {
            paths.insert(path.to_string());
        }
    }
    paths.into_iter().collect()
}
