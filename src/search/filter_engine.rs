use crate::data::path::FieldPath;
use crate::data::record_set::RecordSet;
use crate::data::value::Value;
use crate::search::filter::{Filter, FilterOperator, FilterValue};
use crate::search::query_parser::{QueryParser, SearchTerm};
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Operand of a field criterion, prepared once per compile
#[derive(Debug, Clone)]
enum Matcher {
    /// Lowercased needle
    Equals(String),
    /// Lowercased needle
    Contains(String),
    Greater(Option<f64>),
    Less(Option<f64>),
    Range(Option<f64>, Option<f64>),
    /// Operator and operand disagree; evaluating it is an error
    Malformed(String),
}

#[derive(Debug, Clone)]
enum Criterion {
    Field { path: FieldPath, matcher: Matcher },
    Global { needle: String },
}

/// A compiled conjunction of structured filters and search terms.
///
/// A record passes when it satisfies every criterion. A missing or null
/// field fails its criterion, and so does a criterion that cannot be
/// evaluated.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    criteria: Vec<Criterion>,
}

impl FilterEngine {
    pub fn compile(filters: &[Filter], terms: &[SearchTerm]) -> Self {
        let mut criteria = Vec::with_capacity(filters.len() + terms.len());

        for filter in filters {
            if filter.field.is_empty() {
                continue;
            }
            criteria.push(Criterion::Field {
                path: FieldPath::parse(&filter.field),
                matcher: matcher_for_filter(filter),
            });
        }

        for term in terms {
            match (&term.field, term.operator) {
                (Some(field), Some(op)) if !term.is_global => {
                    criteria.push(Criterion::Field {
                        path: FieldPath::parse(field),
                        matcher: matcher_for_text(op, &term.value),
                    });
                }
                _ => criteria.push(Criterion::Global {
                    needle: term.value.to_lowercase(),
                }),
            }
        }

        Self { criteria }
    }

    /// Compile structured filters together with a raw search query
    pub fn from_query(filters: &[Filter], query: &str) -> Self {
        Self::compile(filters, &QueryParser::parse(query))
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Evaluate every criterion against `record`
    pub fn evaluate(&self, record: &Value) -> Result<bool> {
        for criterion in &self.criteria {
            if !evaluate_criterion(criterion, record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fail-closed evaluation: an evaluation error excludes the record
    pub fn matches(&self, record: &Value) -> bool {
        match self.evaluate(record) {
            Ok(passed) => passed,
            Err(e) => {
                debug!(
                    target: "filter",
                    "Excluding record {:?}: {}",
                    record.record_id(),
                    e
                );
                false
            }
        }
    }

    /// Positions of the records that pass, in input order. Records without
    /// a usable id never pass.
    pub fn apply_indices(&self, records: &[Value]) -> Vec<usize> {
        let start = Instant::now();
        let indices: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| self.matches(record))
            .filter(|(_, record)| record.record_id().is_some())
            .map(|(idx, _)| idx)
            .collect();

        debug!(
            target: "filter",
            "Filtered {} -> {} records with {} criteria in {:?}",
            records.len(),
            indices.len(),
            self.criteria.len(),
            start.elapsed()
        );
        indices
    }

    pub fn apply<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        self.apply_indices(records)
            .into_iter()
            .filter_map(|idx| records.get(idx))
            .collect()
    }
}

/// Records passing every structured filter and every search term
pub fn apply<'a>(records: &'a [Value], filters: &[Filter], terms: &[SearchTerm]) -> Vec<&'a Value> {
    FilterEngine::compile(filters, terms).apply(records)
}

fn matcher_for_filter(filter: &Filter) -> Matcher {
    match (filter.operator, &filter.value) {
        (FilterOperator::Range, FilterValue::Range { min, max }) => {
            Matcher::Range(min.to_number(), max.to_number())
        }
        (FilterOperator::Range, FilterValue::Scalar(_)) => {
            Matcher::Malformed(format!("range filter on '{}' has no bounds", filter.field))
        }
        (op, FilterValue::Range { .. }) => Matcher::Malformed(format!(
            "'{}' filter on '{}' carries range bounds",
            op, filter.field
        )),
        (FilterOperator::Equals, FilterValue::Scalar(v)) => {
            Matcher::Equals(v.to_text().to_lowercase())
        }
        (FilterOperator::Contains, FilterValue::Scalar(v)) => {
            Matcher::Contains(v.to_text().to_lowercase())
        }
        (FilterOperator::Greater, FilterValue::Scalar(v)) => Matcher::Greater(v.to_number()),
        (FilterOperator::Less, FilterValue::Scalar(v)) => Matcher::Less(v.to_number()),
    }
}

fn matcher_for_text(operator: FilterOperator, text: &str) -> Matcher {
    let operand = Value::string(text);
    match operator {
        FilterOperator::Equals => Matcher::Equals(text.to_lowercase()),
        FilterOperator::Contains => Matcher::Contains(text.to_lowercase()),
        FilterOperator::Greater => Matcher::Greater(operand.to_number()),
        FilterOperator::Less => Matcher::Less(operand.to_number()),
        FilterOperator::Range => {
            Matcher::Malformed(format!("search term '{}' cannot express a range", text))
        }
    }
}

fn evaluate_criterion(criterion: &Criterion, record: &Value) -> Result<bool> {
    match criterion {
        Criterion::Global { needle } => Ok(search_in_value(record, needle)),
        Criterion::Field { path, matcher } => {
            let value = match path.resolve(record) {
                None | Some(Value::Null) => return Ok(false),
                Some(v) => v,
            };
            let passed = match_value(matcher, value)?;
            trace!(target: "filter", "{} on {:?} -> {}", path, record.record_id(), passed);
            Ok(passed)
        }
    }
}

fn match_value(matcher: &Matcher, value: &Value) -> Result<bool> {
    let passed = match matcher {
        Matcher::Equals(needle) => match value.as_collection() {
            Some(items) => items
                .iter()
                .any(|item| item.to_text().to_lowercase() == *needle),
            None => value.to_text().to_lowercase() == *needle,
        },
        Matcher::Contains(needle) => match value.as_collection() {
            Some(items) => items
                .iter()
                .any(|item| item.to_text().to_lowercase().contains(needle.as_str())),
            None => value.to_text().to_lowercase().contains(needle.as_str()),
        },
        Matcher::Greater(operand) => match (value.to_number(), operand) {
            (Some(n), Some(limit)) => n > *limit,
            _ => false,
        },
        Matcher::Less(operand) => match (value.to_number(), operand) {
            (Some(n), Some(limit)) => n < *limit,
            _ => false,
        },
        Matcher::Range(min, max) => match (value.to_number(), min, max) {
            (Some(n), Some(lo), Some(hi)) => n >= *lo && n <= *hi,
            _ => false,
        },
        Matcher::Malformed(reason) => bail!("{}", reason),
    };
    Ok(passed)
}

/// Case-insensitive free-text search over every key and leaf of `value`.
/// `needle` must already be lowercase.
pub fn search_in_value(value: &Value, needle: &str) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) | Value::Number(_) | Value::Date(_) => {
            value.to_text().to_lowercase().contains(needle)
        }
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Seq(items) | Value::Set(items) => {
            items.iter().any(|item| search_in_value(item, needle))
        }
        Value::Map(entries) => entries.iter().any(|(k, v)| {
            k.to_text().to_lowercase().contains(needle) || search_in_value(v, needle)
        }),
        Value::Record(fields) => fields
            .iter()
            .any(|(k, v)| k.to_lowercase().contains(needle) || search_in_value(v, needle)),
    }
}

#[derive(Debug, Clone)]
struct CacheKey {
    records: Arc<RecordSet>,
    filters: Vec<Filter>,
    query: String,
}

impl CacheKey {
    fn matches(&self, records: &Arc<RecordSet>, filters: &[Filter], query: &str) -> bool {
        Arc::ptr_eq(&self.records, records) && self.filters == filters && self.query == query
    }
}

/// Memoized filter result keyed on the identity of the record set, the
/// filter list and the search string
#[derive(Debug, Default)]
pub struct FilterCache {
    key: Option<CacheKey>,
    result: Arc<Vec<usize>>,
    hits: u64,
    misses: u64,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        records: &Arc<RecordSet>,
        filters: &[Filter],
        query: &str,
    ) -> Arc<Vec<usize>> {
        if let Some(key) = &self.key {
            if key.matches(records, filters, query) {
                self.hits += 1;
                trace!(target: "filter", "Filter cache hit");
                return Arc::clone(&self.result);
            }
        }

        self.misses += 1;
        let engine = FilterEngine::from_query(filters, query);
        self.result = Arc::new(engine.apply_indices(records.records()));
        self.key = Some(CacheKey {
            records: Arc::clone(records),
            filters: filters.to_vec(),
            query: query.to_string(),
        });
        Arc::clone(&self.result)
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Value> {
        RecordSet::from_json(&json!([
            {"id": "a", "status": "active", "score": 600, "tags": ["VIP", "beta"],
             "user": {"email": "ann@example.com"}},
            {"id": "b", "status": "Active", "score": "100", "tags": [],
             "user": {"email": "bob@example.com"}},
            {"id": "c", "status": "inactive", "score": null, "tags": ["trial"],
             "lookup": {"$map": [["region-eu", 1]]}},
            {"status": "active", "score": 900}
        ]))
        .records()
        .to_vec()
    }

    fn ids(rows: &[&Value]) -> Vec<String> {
        rows.iter()
            .filter_map(|r| r.record_id().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_equals_is_case_insensitive_and_membership() {
        let data = records();
        let rows = apply(&data, &[Filter::equals("status", "ACTIVE")], &[]);
        assert_eq!(ids(&rows), vec!["a", "b"]);

        let rows = apply(&data, &[Filter::equals("tags", "vip")], &[]);
        assert_eq!(ids(&rows), vec!["a"]);
    }

    #[test]
    fn test_numeric_comparisons_coerce() {
        let data = records();
        let gt = Filter::new("score", FilterOperator::Greater, 50);
        assert_eq!(ids(&apply(&data, &[gt], &[])), vec!["a", "b"]);

        let range = Filter::range("score", 100, 600);
        assert_eq!(ids(&apply(&data, &[range], &[])), vec!["a", "b"]);

        let non_numeric = Filter::new("status", FilterOperator::Less, 10);
        assert!(apply(&data, &[non_numeric], &[]).is_empty());
    }

    #[test]
    fn test_missing_fields_never_match() {
        let data = records();
        let rows = apply(&data, &[Filter::contains("user.email", "")], &[]);
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn test_global_terms_search_keys_and_map_keys() {
        let data = records();
        let engine = FilterEngine::from_query(&[], "region");
        assert_eq!(ids(&engine.apply(&data)), vec!["c"]);

        let engine = FilterEngine::from_query(&[], "EMAIL bob");
        assert_eq!(ids(&engine.apply(&data)), vec!["b"]);
    }

    #[test]
    fn test_invalid_ids_dropped_without_filters() {
        let data = records();
        assert_eq!(FilterEngine::default().apply_indices(&data), vec![0, 1, 2]);
    }

    #[test]
    fn test_malformed_filter_fails_closed() {
        let data = records();
        let mut broken = Filter::equals("status", "active");
        broken.operator = FilterOperator::Range;
        assert!(apply(&data, &[broken], &[]).is_empty());
    }

    #[test]
    fn test_cache_reuses_result_for_same_inputs() {
        let set = Arc::new(RecordSet::from_values(records()));
        let filters = vec![Filter::equals("status", "active")];
        let mut cache = FilterCache::new();

        let first = cache.get_or_compute(&set, &filters, "");
        let second = cache.get_or_compute(&set, &filters, "");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);

        cache.get_or_compute(&set, &filters, "ann");
        assert_eq!(cache.misses(), 2);

        // A different record set with the same content is a new input
        let copy = Arc::new(RecordSet::from_values(records()));
        cache.get_or_compute(&copy, &filters, "ann");
        assert_eq!(cache.misses(), 3);
    }
}
