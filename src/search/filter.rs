use crate::data::json_codec::to_json;
use crate::data::path::title_for;
use crate::data::value::Value;
use crate::utils::id_gen::next_id;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Contains,
    Greater,
    Less,
    Range,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::Contains => "contains",
            FilterOperator::Greater => "greater",
            FilterOperator::Less => "less",
            FilterOperator::Range => "range",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "equals" | "eq" | "=" => Ok(FilterOperator::Equals),
            "contains" | ":" => Ok(FilterOperator::Contains),
            "greater" | "gt" | ">" => Ok(FilterOperator::Greater),
            "less" | "lt" | "<" => Ok(FilterOperator::Less),
            "range" | "between" => Ok(FilterOperator::Range),
            other => Err(anyhow!("Unknown filter operator '{}'", other)),
        }
    }
}

/// Operand of a filter. `range` carries bounds, every other operator a
/// scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range { min: Value, max: Value },
    Scalar(Value),
}

impl FilterValue {
    /// JSON text used to decide whether two filters target the same value
    pub fn identity(&self) -> String {
        match self {
            FilterValue::Scalar(v) => to_json(v).to_string(),
            FilterValue::Range { min, max } => {
                serde_json::json!({"min": to_json(min), "max": to_json(max)}).to_string()
            }
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Scalar(v) => write!(f, "{}", v),
            FilterValue::Range { min, max } => write!(f, "{}..{}", min, max),
        }
    }
}

/// A structured predicate over one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = FilterValue::Scalar(value.into());
        let label = generate_filter_label(&field, operator, &value);
        Self {
            id: next_id("filter"),
            field,
            operator,
            value,
            label: Some(label),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Equals, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }

    pub fn range(field: impl Into<String>, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        let field = field.into();
        let value = FilterValue::Range {
            min: min.into(),
            max: max.into(),
        };
        let label = generate_filter_label(&field, FilterOperator::Range, &value);
        Self {
            id: next_id("filter"),
            field,
            operator: FilterOperator::Range,
            value,
            label: Some(label),
        }
    }

    /// Build a filter from a value picked in the inspector: containers are
    /// matched by `contains`, scalars by `equals`
    pub fn from_picked_value(field: impl Into<String>, value: &Value) -> Result<Self> {
        let field = field.into();
        match value {
            Value::Null => bail!("Cannot filter on an empty value"),
            Value::Map(_) => bail!("Maps require manual filter setup"),
            Value::Set(items) => {
                let joined = items
                    .iter()
                    .map(|v| v.to_text().into_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(Self::contains(field, joined))
            }
            Value::Seq(items) => match items.first() {
                Some(first) => Ok(Self::contains(field, first.clone())),
                None => bail!("Cannot filter on empty arrays"),
            },
            Value::Record(_) => Ok(Self::contains(field, to_json(value).to_string())),
            Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Date(_) => {
                Ok(Self::equals(field, value.clone()))
            }
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Display label, generated when the filter carries none
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| generate_filter_label(&self.field, self.operator, &self.value))
    }

    /// Reject filters that could never be evaluated meaningfully
    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            bail!("Filter field must not be empty");
        }

        match (&self.operator, &self.value) {
            (FilterOperator::Range, FilterValue::Range { min, max }) => {
                let (Some(lo), Some(hi)) = (min.to_number(), max.to_number()) else {
                    bail!("Range bounds for '{}' must be numeric", self.field);
                };
                if lo > hi {
                    bail!("Range for '{}' has min {} above max {}", self.field, min, max);
                }
            }
            (FilterOperator::Range, FilterValue::Scalar(_)) => {
                bail!("Range filter on '{}' needs min and max", self.field);
            }
            (op, FilterValue::Range { .. }) => {
                bail!("Operator '{}' takes a single value, not a range", op);
            }
            (_, FilterValue::Scalar(value)) => {
                if value.is_null() || value.to_text().trim().is_empty() {
                    bail!("Filter value for '{}' must not be empty", self.field);
                }
            }
        }

        Ok(())
    }

    /// True when both filters target the same field with the same value
    pub fn same_target(&self, other: &Filter) -> bool {
        self.field == other.field && self.value.identity() == other.value.identity()
    }
}

/// Human-readable summary such as `email = "jo@x.io"` or
/// `score between 10 and 20`
pub fn generate_filter_label(field: &str, operator: FilterOperator, value: &FilterValue) -> String {
    let name = title_for(field);
    match (operator, value) {
        (FilterOperator::Equals, v) => format!("{} = \"{}\"", name, v),
        (FilterOperator::Contains, v) => format!("{} contains \"{}\"", name, v),
        (FilterOperator::Greater, v) => format!("{} > {}", name, v),
        (FilterOperator::Less, v) => format!("{} < {}", name, v),
        (FilterOperator::Range, FilterValue::Range { min, max }) => {
            format!("{} between {} and {}", name, min, max)
        }
        (FilterOperator::Range, v) => format!("{} range {}", name, v),
    }
}

/// The active, ordered filter list. Ids are unique and no two filters share
/// a (field, value) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterList {
    filters: Vec<Filter>,
}

impl FilterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Filter] {
        &self.filters
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.id == id)
    }

    /// Append a filter. Invalid and duplicate filters are rejected with an
    /// advisory and leave the list untouched.
    pub fn add(&mut self, filter: Filter) -> Result<&Filter> {
        filter.validate()?;

        if let Some(existing) = self.filters.iter().find(|f| f.same_target(&filter)) {
            debug!(target: "filter", "Rejected duplicate filter on '{}'", filter.field);
            bail!("Filter already applied: {}", existing.label());
        }
        if self.get(&filter.id).is_some() {
            bail!("Filter id '{}' is already in use", filter.id);
        }

        info!(target: "filter", "Added filter {}", filter.label());
        self.filters.push(filter);
        let last = self.filters.len() - 1;
        Ok(&self.filters[last])
    }

    pub fn remove(&mut self, id: &str) -> Result<Filter> {
        let Some(index) = self.filters.iter().position(|f| f.id == id) else {
            bail!("No filter with id '{}'", id);
        };
        let removed = self.filters.remove(index);
        info!(target: "filter", "Removed filter {}", removed.label());
        Ok(removed)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Filter> {
        if index >= self.filters.len() {
            bail!(
                "No filter at position {} ({} active)",
                index + 1,
                self.filters.len()
            );
        }
        let removed = self.filters.remove(index);
        info!(target: "filter", "Removed filter {}", removed.label());
        Ok(removed)
    }

    /// Remove every filter, returning how many were active
    pub fn clear(&mut self) -> usize {
        let count = self.filters.len();
        self.filters.clear();
        if count > 0 {
            info!(target: "filter", "Cleared {} filters", count);
        }
        count
    }

    /// Replace the list wholesale, e.g. from a saved view. Entries that
    /// would violate the list invariants are skipped.
    pub fn replace_all(&mut self, filters: impl IntoIterator<Item = Filter>) {
        self.filters.clear();
        for filter in filters {
            let label = filter.label();
            if let Err(e) = self.add(filter) {
                warn!(target: "filter", "Skipping filter {}: {}", label, e);
            }
        }
    }
}
