//! Dotted-path variable lookup

use serde_json::Value;

/// Split a path like `@input.items[0]?.name` into segments
pub fn parse_path(path: &str) -> Vec<String> {
    let normalized = path.trim().replace('[', ".").replace(']', "");
    normalized
        .split('.')
        .map(|segment| segment.trim().trim_end_matches('?').to_string())
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Follow one segment into an object key or array index
pub fn get_segment<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Resolve a path against a value; missing segments resolve to `None`
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path);
    if segments.is_empty() {
        return Some(root);
    }
    segments
        .iter()
        .try_fold(root, |current, segment| get_segment(current, segment))
}

/// Render a value the way template output shows it
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// HTML-escape template output
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
