use crate::data::json_codec::to_json;
use crate::data::value::{format_date, Value};

const PREVIEW_ITEMS: usize = 3;
const PREVIEW_VALUE_LEN: usize = 15;

/// Human-facing cell text for a value
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        Value::Number(n) => format_grouped(*n),
        Value::String(s) => s.clone(),
        Value::Date(d) => format_date(d),
        Value::Seq(items) => items
            .iter()
            .map(|item| {
                if item.is_container() {
                    to_json(item).to_string()
                } else {
                    item.to_text().into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Map(entries) => {
            let shown: Vec<String> = entries
                .iter()
                .take(PREVIEW_ITEMS)
                .map(|(k, v)| format!("{}: {}", k.to_text(), v.to_text()))
                .collect();
            format!(
                "Map({}) {{{}{}}}",
                entries.len(),
                shown.join(", "),
                if entries.len() > PREVIEW_ITEMS { "..." } else { "" }
            )
        }
        Value::Set(items) => {
            let shown: Vec<String> = items
                .iter()
                .take(PREVIEW_ITEMS)
                .map(|v| v.to_text().into_owned())
                .collect();
            format!(
                "Set({}) {{{}{}}}",
                items.len(),
                shown.join(", "),
                if items.len() > PREVIEW_ITEMS { "..." } else { "" }
            )
        }
        Value::Record(fields) => format_record_preview(fields),
    }
}

fn format_record_preview(fields: &[(String, Value)]) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }

    if fields.len() > PREVIEW_ITEMS {
        let keys: Vec<&str> = fields
            .iter()
            .take(PREVIEW_ITEMS)
            .map(|(k, _)| k.as_str())
            .collect();
        return format!(
            "{{{}, ...{} more}}",
            keys.join(", "),
            fields.len() - PREVIEW_ITEMS
        );
    }

    let preview: Vec<String> = fields
        .iter()
        .take(2)
        .map(|(key, val)| {
            let text = if val.is_container() {
                "{...}".to_string()
            } else {
                val.to_text().into_owned()
            };
            format!("{}: {}", key, truncate_text(&text, PREVIEW_VALUE_LEN))
        })
        .collect();

    format!(
        "{{{}{}}}",
        preview.join(", "),
        if fields.len() > 2 { ", ..." } else { "" }
    )
}

/// Cut `text` to `max_len` characters, marking the cut with `...`
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_len).collect();
    format!("{}...", kept)
}

/// Number with `,` thousands separators and at most three fraction digits
pub fn format_grouped(n: f64) -> String {
    if !n.is_finite() {
        return crate::data::value::format_number(n);
    }

    let rendered = format!("{:.3}", n.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (rendered.as_str(), ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = n < 0.0 && (int_part != "0" || !frac_part.is_empty());
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
