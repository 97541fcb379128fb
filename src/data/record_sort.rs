use crate::data::path::resolve;
use crate::data::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Column sort request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Rank used to order the `priority` column; unknown values rank lowest
pub fn priority_rank(value: Option<&Value>) -> u8 {
    match value.and_then(Value::as_str) {
        Some("low") => 1,
        Some("medium") => 2,
        Some("high") => 3,
        Some("critical") => 4,
        _ => 0,
    }
}

/// Compare two records on the given column key
pub fn compare_records(column: &str, a: &Value, b: &Value) -> Ordering {
    match column {
        "priority" => priority_rank(a.field("priority")).cmp(&priority_rank(b.field("priority"))),
        "user" => compare_text(resolve(a, "user.name"), resolve(b, "user.name")),
        "tags" => collection_len(resolve(a, "tags")).cmp(&collection_len(resolve(b, "tags"))),
        "timestamp" => compare_chronological(resolve(a, "timestamp"), resolve(b, "timestamp")),
        "score" | "revenue" => compare_numeric(resolve(a, column), resolve(b, column)),
        _ => compare_values(resolve(a, column), resolve(b, column)),
    }
}

/// Generic comparison for resolved values. Values of different kinds order
/// by kind (bool < number < string < date < containers); within a kind,
/// numbers compare numerically, strings case-insensitively and dates
/// chronologically. Missing values sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (a, b) = match (present(a), present(b)) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a)
            .cmp(&kind_rank(b))
            .then_with(|| a.to_text().cmp(&b.to_text())),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Date(_) => 4,
        Value::Seq(_) => 5,
        Value::Set(_) => 6,
        Value::Map(_) => 7,
        Value::Record(_) => 8,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn compare_text(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let text = |v: Option<&Value>| {
        present(v)
            .map(|v| v.to_text().to_lowercase())
            .unwrap_or_default()
    };
    text(a).cmp(&text(b))
}

fn compare_numeric(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let num = |v: Option<&Value>| v.and_then(Value::to_number);
    match (num(a), num(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// Timestamps may be dates or ISO strings
fn compare_chronological(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let millis = |v: Option<&Value>| match v {
        Some(Value::Date(d)) => Some(d.timestamp_millis()),
        Some(Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.timestamp_millis()),
        Some(Value::Number(n)) if n.is_finite() => Some(*n as i64),
        _ => None,
    };
    millis(a).cmp(&millis(b))
}

fn collection_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_collection).map_or(0, <[Value]>::len)
}

/// Stable ordering of `indices` (positions into `records`) by `sort`
pub fn sort_indices(records: &[Value], indices: &mut [usize], sort: &SortSpec) {
    indices.sort_by(|&left, &right| {
        let (Some(a), Some(b)) = (records.get(left), records.get(right)) else {
            return Ordering::Equal;
        };
        let ordering = compare_records(&sort.column, a, b);
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}
