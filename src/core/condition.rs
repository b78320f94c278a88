//! Step condition coercion

use serde_json::Value;

/// Strings that read as "no" even though they are non-empty
const FALSY_STRINGS: &[&str] = &["false", "f", "no", "n", "off", "0"];

/// Coerce a rendered `if` value to a boolean
///
/// `None` (undefined) and `null` are false. Strings are false when empty or
/// one of the negative words, case-insensitively. Collections are true when
/// non-empty.
pub fn coerce_condition(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => {
            let normalized = s.trim().to_lowercase();
            !normalized.is_empty() && !FALSY_STRINGS.contains(&normalized.as_str())
        }
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
