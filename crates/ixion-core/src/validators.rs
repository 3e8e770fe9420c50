// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value validators.
//!
//! A validator inspects one JSON value and returns `Some(description)` on
//! failure or `None` on success. Record classes attach validators to
//! properties; the `/set` operator runs them after structural checks.

use std::sync::Arc;

use serde_json::Value;

/// A value-level predicate: error description, or `None` when valid.
pub type Validator = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Any string.
pub fn string() -> Validator {
    Arc::new(|v| match v {
        Value::String(_) => None,
        _ => Some("not a string".into()),
    })
}

/// A non-empty string.
pub fn nonempty_string() -> Validator {
    Arc::new(|v| match v {
        Value::String(s) if !s.is_empty() => None,
        Value::String(_) => Some("string must not be empty".into()),
        _ => Some("not a string".into()),
    })
}

/// A string whose length lies within `min..=max` bytes.
pub fn string_length(min: usize, max: usize) -> Validator {
    Arc::new(move |v| match v {
        Value::String(s) if s.len() < min => {
            Some(format!("string shorter than {min} bytes"))
        }
        Value::String(s) if s.len() > max => {
            Some(format!("string longer than {max} bytes"))
        }
        Value::String(_) => None,
        _ => Some("not a string".into()),
    })
}

/// A single-line string without control characters.
pub fn simple_string() -> Validator {
    Arc::new(|v| match v {
        Value::String(s) => {
            if s.chars().any(|c| c.is_control()) {
                Some("string contains control characters".into())
            } else {
                None
            }
        }
        _ => Some("not a string".into()),
    })
}

/// Any integer (JSON number with no fractional part).
pub fn integer() -> Validator {
    Arc::new(|v| match v.as_i64() {
        Some(_) => None,
        None => Some("not an integer".into()),
    })
}

/// An integer within `min..=max`.
pub fn integer_range(min: i64, max: i64) -> Validator {
    Arc::new(move |v| match v.as_i64() {
        Some(n) if n < min => Some(format!("integer below minimum {min}")),
        Some(n) if n > max => Some(format!("integer above maximum {max}")),
        Some(_) => None,
        None => Some("not an integer".into()),
    })
}

/// A strictly positive integer.
pub fn positive_integer() -> Validator {
    Arc::new(|v| match v.as_i64() {
        Some(n) if n > 0 => None,
        Some(_) => Some("integer must be positive".into()),
        None => Some("not an integer".into()),
    })
}

/// A boolean.
pub fn boolean() -> Validator {
    Arc::new(|v| match v {
        Value::Bool(_) => None,
        _ => Some("not a boolean".into()),
    })
}

/// One of a fixed set of string values.
pub fn enum_of(allowed: &[&str]) -> Validator {
    let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
    Arc::new(move |v| match v {
        Value::String(s) if allowed.iter().any(|a| a == s) => None,
        Value::String(s) => Some(format!("`{s}` is not one of [{}]", allowed.join(", "))),
        _ => Some("not a string".into()),
    })
}

/// A GUID-formatted id string.
pub fn id_string() -> Validator {
    Arc::new(|v| match v {
        Value::String(s) => match uuid::Uuid::parse_str(s) {
            Ok(_) => None,
            Err(_) => Some(format!("`{s}` is not a valid id")),
        },
        _ => Some("not a string".into()),
    })
}

/// An array of strings.
pub fn string_array() -> Validator {
    Arc::new(|v| match v {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    return Some(format!("element {i} is not a string"));
                }
            }
            None
        }
        _ => Some("not an array".into()),
    })
}

/// An RFC 3339 timestamp string.
pub fn timestamp() -> Validator {
    Arc::new(|v| match v {
        Value::String(s) => match chrono::DateTime::parse_from_rfc3339(s) {
            Ok(_) => None,
            Err(_) => Some(format!("`{s}` is not an RFC 3339 timestamp")),
        },
        _ => Some("not a string".into()),
    })
}
