use crate::data::value::Value;
use std::fmt;

/// One step of a path. `bracketed` records whether the segment was written
/// as `[key]`; resolution treats both forms alike so `a.0` and `a[0]` reach
/// the same element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub bracketed: bool,
}

/// A parsed dotted/bracketed address such as `geolocation.nearby[2].name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if !current.is_empty() {
                        segments.push(PathSegment {
                            name: std::mem::take(&mut current),
                            bracketed: false,
                        });
                    }
                    i += 1;
                }
                '[' => match bracket_segment(&chars, i) {
                    Some((name, next)) => {
                        if !current.is_empty() {
                            segments.push(PathSegment {
                                name: std::mem::take(&mut current),
                                bracketed: false,
                            });
                        }
                        segments.push(PathSegment {
                            name,
                            bracketed: true,
                        });
                        i = next;
                    }
                    None => {
                        // Unterminated bracket is literal text
                        current.extend(&chars[i..]);
                        i = chars.len();
                    }
                },
                ch => {
                    current.push(ch);
                    i += 1;
                }
            }
        }

        if !current.is_empty() {
            segments.push(PathSegment {
                name: current,
                bracketed: false,
            });
        }

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path through `root`. Any missing step yields `None`.
    /// A path that does not resolve structurally is tried once more as a
    /// literal top-level key, so `http.status` reaches a field named that way.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        if self.segments.is_empty() {
            return None;
        }

        let walked = self
            .segments
            .iter()
            .try_fold(root, |current, segment| step(current, &segment.name));
        walked.or_else(|| match root {
            Value::Record(fields) => fields.iter().find(|(k, _)| *k == self.raw).map(|(_, v)| v),
            _ => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Record(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
        Value::Seq(items) | Value::Set(items) => {
            let index = key.parse::<usize>().ok()?;
            items.get(index)
        }
        Value::Map(_) => value.map_entry(key),
        Value::Null
        | Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::Date(_) => None,
    }
}

/// Bracket segment starting at `open`: the segment name and the position
/// after the closing `]`. Quoted contents may hold `]` and use `\` escapes.
fn bracket_segment(chars: &[char], open: usize) -> Option<(String, usize)> {
    if let Some(&quote) = chars.get(open + 1).filter(|c| **c == '"' || **c == '\'') {
        let mut name = String::new();
        let mut i = open + 2;
        while let Some(&ch) = chars.get(i) {
            if ch == '\\' {
                name.push(*chars.get(i + 1)?);
                i += 2;
            } else if ch == quote {
                if chars.get(i + 1) == Some(&']') {
                    return Some((name, i + 2));
                }
                break;
            } else {
                name.push(ch);
                i += 1;
            }
        }
    }

    let close = chars[open + 1..].iter().position(|c| *c == ']')? + open + 1;
    let inner: String = chars[open + 1..close].iter().collect();
    Some((strip_quotes(&inner).to_string(), close + 1))
}

fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn quoted(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    out.push_str("[\"");
    for ch in key.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push_str("\"]");
    out
}

/// Keys that would split or change meaning if written bare
fn needs_quoting(key: &str, in_brackets: bool) -> bool {
    key.is_empty()
        || key.starts_with('\'')
        || key
            .chars()
            .any(|c| matches!(c, '[' | ']' | '"' | '\\') || (c == '.' && !in_brackets))
}

/// Resolve `path` inside `record`; `None` stands for "undefined"
pub fn resolve<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    FieldPath::parse(path).resolve(record)
}

/// Path of a named child of `prefix`. Keys holding path syntax are
/// written as quoted brackets: `["http.status"]`.
pub fn child_key(prefix: &str, key: &str) -> String {
    if needs_quoting(key, false) {
        format!("{}{}", prefix, quoted(key))
    } else if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Path of an indexed or keyed member of the container at `prefix`
pub fn child_index(prefix: &str, key: &str) -> String {
    if needs_quoting(key, true) {
        format!("{}{}", prefix, quoted(key))
    } else {
        format!("{}[{}]", prefix, key)
    }
}

/// Display title for a column path: its last dotted segment, or the key
/// of a trailing quoted bracket
pub fn title_for(path: &str) -> String {
    if path.ends_with("\"]") {
        if let Some(last) = FieldPath::parse(path).segments().last() {
            return last.name.clone();
        }
    }
    path.rsplit('.')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
        .to_string()
}
