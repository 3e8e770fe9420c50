// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generated `/get` operator.

use std::sync::Arc;

use serde_json::{Map, Value};

use ixion_core::{MethodError, MethodResult};

use crate::context::{CallError, Context};
use crate::record::class::RecordClass;
use crate::record::row::Row;
use crate::record::store;

/// Handle `K/get(ids?, properties?, …extra)`.
///
/// Returns `(accountId, state, list, notFound)`. `ids` may contain
/// `#creationId` references to records created earlier in the request.
pub fn ix_get(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    args: &Map<String, Value>,
) -> Result<Vec<MethodResult>, CallError> {
    check_argument_names(rc, args)?;
    check_account_argument(ctx, args)?;

    let properties = requested_properties(rc, args.get("properties"))?;
    let state = rc.encode_state(ctx.state()?.seq_for(&rc.type_key));

    let mut list = Vec::new();
    let mut not_found = Vec::new();

    match args.get("ids") {
        None | Some(Value::Null) => {
            for row in store::load_active(ctx.conn(), rc, ctx.account_id())? {
                list.push(render(rc, &row, &properties));
            }
        }
        Some(Value::Array(raw_ids)) => {
            let mut wanted = Vec::new();
            for raw in raw_ids {
                let Some(raw) = raw.as_str() else {
                    return Err(MethodError::invalid_arguments("ids must be strings").into());
                };
                match ctx.resolve_id_ref(&rc.type_key, raw) {
                    Ok(id) => wanted.push(id),
                    Err(err) if err.kind == "duplicateCreationId" => return Err(err.into()),
                    Err(_) => not_found.push(Value::String(raw.to_string())),
                }
            }
            let rows = store::load_by_ids(ctx.conn(), rc, ctx.account_id(), &wanted)?;
            // Answer in request order; absent ids land in notFound.
            for id in &wanted {
                match rows.iter().find(|r| &r.id == id) {
                    Some(row) => list.push(render(rc, row, &properties)),
                    None => not_found.push(Value::String(id.clone())),
                }
            }
        }
        Some(_) => {
            return Err(MethodError::invalid_arguments("ids must be an array or null").into())
        }
    }

    let result = MethodResult::new(format!("{}/get", rc.type_key))
        .arg("accountId", Value::String(ctx.account_id().to_string()))
        .arg("state", Value::String(state))
        .arg("list", Value::Array(list))
        .arg("notFound", Value::Array(not_found));
    Ok(vec![result])
}

/// Reject argument names outside `ids`, `properties`, `accountId`, and
/// the class's declared extras.
fn check_argument_names(
    rc: &RecordClass,
    args: &Map<String, Value>,
) -> Result<(), CallError> {
    for name in args.keys() {
        let known = matches!(name.as_str(), "ids" | "properties" | "accountId")
            || rc.extra_get_args.iter().any(|a| a == name);
        if !known {
            return Err(
                MethodError::invalid_arguments(format!("unknown argument `{name}`")).into(),
            );
        }
    }
    Ok(())
}

/// An explicit `accountId` argument must match the request's account.
pub(crate) fn check_account_argument(
    ctx: &Context<'_>,
    args: &Map<String, Value>,
) -> Result<(), CallError> {
    if let Some(requested) = args.get("accountId").and_then(Value::as_str) {
        if requested != ctx.account_id() {
            return Err(MethodError::new("accountNotFound").into());
        }
    }
    Ok(())
}

/// Resolve the `properties` argument to a validated name list.
fn requested_properties(
    rc: &RecordClass,
    argument: Option<&Value>,
) -> Result<Vec<String>, CallError> {
    match argument {
        None | Some(Value::Null) => Ok(rc.get_default_property_names()),
        Some(Value::Array(names)) => {
            let mut wanted = Vec::new();
            for name in names {
                let Some(name) = name.as_str() else {
                    return Err(
                        MethodError::invalid_arguments("properties must be strings").into()
                    );
                };
                if name != "id" && rc.property_named(name).is_none() {
                    return Err(MethodError::invalid_arguments(format!(
                        "unknown property `{name}`"
                    ))
                    .into());
                }
                wanted.push(name.to_string());
            }
            Ok(wanted)
        }
        Some(_) => {
            Err(MethodError::invalid_arguments("properties must be an array or null").into())
        }
    }
}

/// Render one row as a `/get` list entry: `id` always, then the
/// requested properties (virtual ones computed on the spot).
fn render(rc: &RecordClass, row: &Row, properties: &[String]) -> Value {
    let mut object = Map::new();
    object.insert("id".into(), Value::String(row.id.clone()));
    for name in properties {
        if name == "id" {
            continue;
        }
        let Some(property) = rc.property_named(name) else {
            continue;
        };
        let value = if property.is_virtual {
            property
                .compute
                .map(|compute| compute(row))
                .unwrap_or(Value::Null)
        } else {
            row.property(name).clone()
        };
        object.insert(name.clone(), value);
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use crate::testing::{created_id, harness, submit};
    use serde_json::json;

    #[test]
    fn get_all_active_records_with_default_properties() {
        let (engine, _dir) = harness();
        let response = submit(
            &engine,
            json!([
                ["Cookie/set", {"create": {
                    "c1": {"type": "chocolate", "delicious": "yes"},
                    "c2": {"type": "oatmeal"}
                }}, "a"],
                ["Cookie/get", {}, "b"]
            ]),
        );

        assert_eq!(response[1][0], json!("Cookie/get"));
        let list = response[1][1]["list"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(response[1][1]["state"], json!("1"));
        assert_eq!(response[1][1]["notFound"], json!([]));
        let types: Vec<&str> = list
            .iter()
            .map(|r| r["type"].as_str().unwrap())
            .collect();
        assert!(types.contains(&"chocolate"));
        assert!(types.contains(&"oatmeal"));
    }

    #[test]
    fn get_by_id_preserves_request_order_and_reports_not_found() {
        let (engine, _dir) = harness();
        let setup = submit(
            &engine,
            json!([["Cookie/set", {"create": {
                "c1": {"type": "a"},
                "c2": {"type": "b"}
            }}, "a"]]),
        );
        let id_a = created_id(&setup[0], "c1");
        let id_b = created_id(&setup[0], "c2");

        let response = submit(
            &engine,
            json!([["Cookie/get", {"ids": [id_b, "missing-id", id_a]}, "g"]]),
        );
        let list = response[0][1]["list"].as_array().unwrap();
        assert_eq!(list[0]["id"], json!(id_b));
        assert_eq!(list[1]["id"], json!(id_a));
        assert_eq!(response[0][1]["notFound"], json!(["missing-id"]));
    }

    #[test]
    fn get_honours_an_explicit_property_list() {
        let (engine, _dir) = harness();
        submit(
            &engine,
            json!([["Cookie/set", {"create": {
                "c1": {"type": "a", "delicious": "very"}
            }}, "a"]]),
        );

        let response = submit(
            &engine,
            json!([["Cookie/get", {"properties": ["type"]}, "g"]]),
        );
        let entry = &response[0][1]["list"][0];
        assert!(entry.get("id").is_some());
        assert!(entry.get("type").is_some());
        assert!(entry.get("delicious").is_none());
    }

    #[test]
    fn get_rejects_unknown_arguments_and_properties() {
        let (engine, _dir) = harness();

        let response = submit(&engine, json!([["Cookie/get", {"bogus": 1}, "g"]]));
        assert_eq!(response[0][0], json!("error"));
        assert_eq!(response[0][1]["type"], json!("invalidArguments"));

        let response = submit(
            &engine,
            json!([["Cookie/get", {"properties": ["nope"]}, "g"]]),
        );
        assert_eq!(response[0][1]["type"], json!("invalidArguments"));
    }

    #[test]
    fn get_resolves_creation_id_references_in_ids() {
        let (engine, _dir) = harness();
        let response = submit(
            &engine,
            json!([
                ["Cookie/set", {"create": {"c1": {"type": "ref-me"}}}, "a"],
                ["Cookie/get", {"ids": ["#c1"]}, "b"]
            ]),
        );
        let list = response[1][1]["list"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["type"], json!("ref-me"));
    }

    #[test]
    fn destroyed_records_are_not_found() {
        let (engine, _dir) = harness();
        let setup = submit(
            &engine,
            json!([["Cookie/set", {"create": {"c1": {"type": "gone"}}}, "a"]]),
        );
        let id = created_id(&setup[0], "c1");

        submit(&engine, json!([["Cookie/set", {"destroy": [id]}, "d"]]));
        let response = submit(&engine, json!([["Cookie/get", {"ids": [id]}, "g"]]));
        assert_eq!(response[0][1]["list"], json!([]));
        assert_eq!(response[0][1]["notFound"], json!([id]));
    }

    #[test]
    fn virtual_properties_compute_on_read() {
        let (engine, _dir) = harness();
        submit(
            &engine,
            json!([["Cookie/set", {"create": {"c1": {"type": "loud"}}}, "a"]]),
        );
        let response = submit(
            &engine,
            json!([["Cookie/get", {"properties": ["type", "shoutedType"]}, "g"]]),
        );
        assert_eq!(response[0][1]["list"][0]["shoutedType"], json!("LOUD"));
    }

    #[test]
    fn mismatched_account_argument_is_rejected() {
        let (engine, _dir) = harness();
        let response = submit(
            &engine,
            json!([["Cookie/get", {"accountId": "some-other-account"}, "g"]]),
        );
        assert_eq!(response[0][1]["type"], json!("accountNotFound"));
    }
}
