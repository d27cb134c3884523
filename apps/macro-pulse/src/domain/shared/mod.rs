//! Shared Value Helpers
//!
//! Text coercion and truncation used when decoding loosely-typed provider
//! records. Providers mix strings, numbers and nulls for the same field, so
//! every free-text field goes through [`lenient_text`].

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Truncate to at most `max` characters without splitting a code point.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Render a scalar JSON value as trimmed text.
///
/// Empty strings, nulls, arrays and objects yield `None`.
#[must_use]
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Deserialize an optional text field sent as string, number or null.
///
/// Use with `#[serde(default, deserialize_with = "lenient_text")]`.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_text))
}
