// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modified JSON-Pointer resolution.
//!
//! RFC 6901, with the deviations required by RFC 8620 back-references:
//!
//! - A pointer must begin with `/`; the empty pointer is malformed.
//! - The token `*` at an array position maps the remaining tokens over
//!   every element and flattens the results one level.
//! - The array-append token `-` is rejected.
//!
//! Escapes are standard: `~1` decodes to `/`, `~0` to `~`.

use serde_json::Value;

/// A failed pointer resolution.
///
/// Carries the accumulated path at the point of failure and, when the
/// failure happened under `*` expansion, the element indices involved
/// (outermost last).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerError {
    message: String,
    path: String,
    indices: Vec<usize>,
}

impl PointerError {
    fn new(message: impl Into<String>, path: &[String]) -> Self {
        Self {
            message: message.into(),
            path: format!("/{}", path.join("/")),
            indices: Vec::new(),
        }
    }

    fn with_index(mut self, index: usize) -> Self {
        self.indices.push(index);
        self
    }

    /// What went wrong.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for PointerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.path)?;
        if !self.indices.is_empty() {
            let list: Vec<String> = self.indices.iter().map(usize::to_string).collect();
            write!(f, " (indices {})", list.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for PointerError {}

/// Resolve `pointer` against `value`, returning the pointed-to value.
///
/// The result is an owned deep copy; `*` expansion builds new arrays.
pub fn resolve(value: &Value, pointer: &str) -> Result<Value, PointerError> {
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PointerError::new(
            format!("pointer `{pointer}` does not begin with `/`"),
            &[],
        ));
    };
    let tokens: Vec<String> = rest.split('/').map(unescape).collect();
    descend(value, &tokens, &mut Vec::new())
}

/// Decode `~1` to `/` and then `~0` to `~` (RFC 6901 §4 order).
fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn descend(value: &Value, tokens: &[String], path: &mut Vec<String>) -> Result<Value, PointerError> {
    let Some((token, rest)) = tokens.split_first() else {
        return Ok(value.clone());
    };
    path.push(token.clone());

    match value {
        Value::Object(map) => match map.get(token) {
            Some(inner) => descend(inner, rest, path),
            None => Err(PointerError::new(format!("no such key `{token}`"), path)),
        },
        Value::Array(items) => {
            if token == "*" {
                let mut collected = Vec::new();
                for (index, item) in items.iter().enumerate() {
                    let resolved = descend(item, rest, &mut path.clone())
                        .map_err(|e| e.with_index(index))?;
                    // Flatten one level: array results splice into the output.
                    match resolved {
                        Value::Array(inner) => collected.extend(inner),
                        other => collected.push(other),
                    }
                }
                Ok(Value::Array(collected))
            } else if token == "-" {
                Err(PointerError::new("token `-` is not supported", path))
            } else {
                let index = parse_index(token)
                    .ok_or_else(|| PointerError::new(format!("invalid array index `{token}`"), path))?;
                match items.get(index) {
                    Some(inner) => descend(inner, rest, path),
                    None => Err(PointerError::new(
                        format!("index {index} out of bounds (length {})", items.len()),
                        path,
                    )),
                }
            }
        }
        _ => Err(PointerError::new(
            format!("cannot descend into non-container with `{token}`"),
            path,
        )),
    }
}

/// RFC 6901 array index: digits only, no leading zeros (except `0`).
fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
