use crate::search::filter::FilterOperator;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, trace};

// `<path><op><value>` where the value is a quoted phrase or a bare run
static FIELD_TERM: OnceLock<Option<Regex>> = OnceLock::new();
static FREE_TEXT: OnceLock<Option<Regex>> = OnceLock::new();

fn field_term_pattern() -> Option<&'static Regex> {
    FIELD_TERM
        .get_or_init(|| {
            Regex::new(
                r#"(?P<field>[A-Za-z0-9_.\[\]]+)\s*(?P<op>[:=<>]+)\s*(?:"(?P<quoted>[^"]*)"|(?P<bare>\S+))"#,
            )
            .ok()
        })
        .as_ref()
}

fn free_text_pattern() -> Option<&'static Regex> {
    FREE_TEXT
        .get_or_init(|| Regex::new(r#""[^"]*"|\S+"#).ok())
        .as_ref()
}

/// One parsed piece of a search query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTerm {
    pub field: Option<String>,
    pub operator: Option<FilterOperator>,
    pub value: String,
    pub is_global: bool,
}

impl SearchTerm {
    pub fn global(value: impl Into<String>) -> Self {
        Self {
            field: None,
            operator: None,
            value: value.into(),
            is_global: true,
        }
    }

    pub fn fielded(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            operator: Some(operator),
            value: value.into(),
            is_global: false,
        }
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.field, self.operator) {
            (Some(field), Some(op)) => write!(f, "{} {} \"{}\"", field, op, self.value),
            _ => write!(f, "\"{}\"", self.value),
        }
    }
}

/// Parser for the search box mini-language:
///
/// ```text
/// status:active score>500 user.email="jo@example.com" "free text" error
/// ```
///
/// Fielded terms use `:` (contains), `=` (equals), `>`/`>=` (greater) and
/// `<`/`<=` (less). Whatever is left over becomes global free-text terms.
/// All terms are combined with AND.
pub struct QueryParser;

impl QueryParser {
    pub fn parse(query: &str) -> Vec<SearchTerm> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let mut terms = Vec::new();
        let mut remainder = String::with_capacity(query.len());
        let mut last_end = 0;

        if let Some(pattern) = field_term_pattern() {
            for caps in pattern.captures_iter(query) {
                let (Some(whole), Some(field), Some(op)) =
                    (caps.get(0), caps.name("field"), caps.name("op"))
                else {
                    continue;
                };

                // Field-like text inside a quoted phrase stays part of the phrase
                let before = &query[last_end..whole.start()];
                if before.matches('"').count() % 2 == 1 {
                    continue;
                }

                let value = caps
                    .name("quoted")
                    .or_else(|| caps.name("bare"))
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();

                terms.push(SearchTerm::fielded(
                    field.as_str(),
                    operator_for(op.as_str()),
                    value,
                ));

                remainder.push_str(&query[last_end..whole.start()]);
                remainder.push(' ');
                last_end = whole.end();
            }
        }
        remainder.push_str(&query[last_end..]);

        if let Some(pattern) = free_text_pattern() {
            for token in pattern.find_iter(&remainder) {
                let raw = token.as_str();
                let cleaned = strip_phrase_quotes(raw);
                if cleaned.trim().is_empty() {
                    continue;
                }
                terms.push(SearchTerm::global(cleaned));
            }
        }

        debug!(target: "query", "Parsed '{}' into {} terms", query, terms.len());
        for term in &terms {
            trace!(target: "query", "  term: {}", term);
        }

        terms
    }
}

/// Any run of operator characters is accepted; runs other than the ones
/// below (`==`, `=>`, `::`) mean equals.
fn operator_for(op: &str) -> FilterOperator {
    match op {
        ":" => FilterOperator::Contains,
        ">" | ">=" => FilterOperator::Greater,
        "<" | "<=" => FilterOperator::Less,
        _ => FilterOperator::Equals,
    }
}

fn strip_phrase_quotes(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queries() {
        assert!(QueryParser::parse("").is_empty());
        assert!(QueryParser::parse("   \t ").is_empty());
    }

    #[test]
    fn test_fielded_and_global_terms() {
        let terms = QueryParser::parse("status:active score>500 timeout");
        assert_eq!(
            terms,
            vec![
                SearchTerm::fielded("status", FilterOperator::Contains, "active"),
                SearchTerm::fielded("score", FilterOperator::Greater, "500"),
                SearchTerm::global("timeout"),
            ]
        );
    }

    #[test]
    fn test_operator_mapping() {
        let ops: Vec<Option<FilterOperator>> = QueryParser::parse("a=1 b>=2 c<=3 d<4")
            .into_iter()
            .map(|t| t.operator)
            .collect();
        assert_eq!(
            ops,
            vec![
                Some(FilterOperator::Equals),
                Some(FilterOperator::Greater),
                Some(FilterOperator::Less),
                Some(FilterOperator::Less),
            ]
        );
    }

    #[test]
    fn test_quoted_values_keep_inner_whitespace() {
        let terms = QueryParser::parse(r#"user.name="Jo  Smith" "disk full""#);
        assert_eq!(terms[0].field.as_deref(), Some("user.name"));
        assert_eq!(terms[0].value, "Jo  Smith");
        assert_eq!(terms[1], SearchTerm::global("disk full"));
    }

    #[test]
    fn test_text_before_fielded_terms_is_kept() {
        let terms = QueryParser::parse("login tags:vip geolocation.nearby[0].name:cafe");
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[1].field.as_deref(), Some("geolocation.nearby[0].name"));
        assert_eq!(terms[2], SearchTerm::global("login"));
    }

    #[test]
    fn test_operator_runs_are_consumed_whole() {
        assert_eq!(
            QueryParser::parse("a==b"),
            vec![SearchTerm::fielded("a", FilterOperator::Equals, "b")]
        );
        assert_eq!(
            QueryParser::parse("score>=10 name::jo"),
            vec![
                SearchTerm::fielded("score", FilterOperator::Greater, "10"),
                SearchTerm::fielded("name", FilterOperator::Equals, "jo"),
            ]
        );
    }

    #[test]
    fn test_colon_inside_quoted_phrase_stays_global() {
        assert_eq!(
            QueryParser::parse(r#""error: timeout""#),
            vec![SearchTerm::global("error: timeout")]
        );
        assert_eq!(
            QueryParser::parse(r#""disk: full" status:active"#),
            vec![
                SearchTerm::fielded("status", FilterOperator::Contains, "active"),
                SearchTerm::global("disk: full"),
            ]
        );
    }

    #[test]
    fn test_spaces_around_operator() {
        let terms = QueryParser::parse("score > 10");
        assert_eq!(
            terms,
            vec![SearchTerm::fielded("score", FilterOperator::Greater, "10")]
        );
    }
}
