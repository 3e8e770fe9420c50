// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call triples: the client side of the wire format.
//!
//! A call is `["Method/name", {arguments}, "clientId"]`. The transport
//! decodes the JSON body into a list of [`Call`]s; shape violations are
//! decode errors (HTTP 400), not per-call errors.

use serde_json::{Map, Value};

/// One parsed method call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Method name, e.g. `Cookie/set`.
    pub name: String,
    /// Call arguments (may contain unexpanded `#key` back-references).
    pub arguments: Map<String, Value>,
    /// Client-chosen correlation id. `None` when the triple omitted it;
    /// the dispatcher rejects or synthesises depending on configuration.
    pub client_id: Option<String>,
}

impl Call {
    /// Build a call directly (used by tests and `optimize_calls` hooks).
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>, client_id: Option<String>) -> Self {
        Self {
            name: name.into(),
            arguments,
            client_id,
        }
    }

    /// Parse one call triple from its JSON form.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let items = value
            .as_array()
            .ok_or_else(|| "method call must be an array".to_string())?;
        if items.len() != 2 && items.len() != 3 {
            return Err(format!(
                "method call must have 2 or 3 elements, got {}",
                items.len()
            ));
        }

        let name = items[0]
            .as_str()
            .ok_or_else(|| "method name must be a string".to_string())?
            .to_string();
        let arguments = items[1]
            .as_object()
            .ok_or_else(|| format!("arguments of `{name}` must be an object"))?
            .clone();
        let client_id = match items.get(2) {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(format!("client id of `{name}` must be a string")),
        };

        Ok(Self {
            name,
            arguments,
            client_id,
        })
    }
}

/// Parse a JSON array of call triples.
pub fn parse_call_list(value: &Value) -> Result<Vec<Call>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| "method calls must be an array".to_string())?;
    items.iter().map(Call::from_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_full_triple() {
        let call = Call::from_value(&json!(["Cookie/get", {"ids": null}, "c1"])).unwrap();
        assert_eq!(call.name, "Cookie/get");
        assert_eq!(call.arguments.get("ids"), Some(&Value::Null));
        assert_eq!(call.client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn accepts_a_pair_without_client_id() {
        let call = Call::from_value(&json!(["Cookie/get", {}])).unwrap();
        assert!(call.client_id.is_none());
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(Call::from_value(&json!("Cookie/get")).is_err());
        assert!(Call::from_value(&json!([])).is_err());
        assert!(Call::from_value(&json!(["Cookie/get"])).is_err());
        assert!(Call::from_value(&json!([42, {}, "c1"])).is_err());
        assert!(Call::from_value(&json!(["Cookie/get", [], "c1"])).is_err());
        assert!(Call::from_value(&json!(["Cookie/get", {}, 7])).is_err());
        assert!(Call::from_value(&json!(["Cookie/get", {}, "c1", "extra"])).is_err());
    }

    #[test]
    fn parse_call_list_keeps_order() {
        let calls = parse_call_list(&json!([
            ["Cookie/set", {"create": {}}, "a"],
            ["Cookie/get", {}, "b"]
        ]))
        .unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "Cookie/set");
        assert_eq!(calls[1].client_id.as_deref(), Some("b"));
    }

    #[test]
    fn parse_call_list_rejects_non_arrays() {
        assert!(parse_call_list(&json!({"methodCalls": []})).is_err());
        assert!(parse_call_list(&json!([["ok", {}, "a"], "nope"])).is_err());
    }
}
