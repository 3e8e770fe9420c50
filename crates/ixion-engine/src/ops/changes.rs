// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generated `/changes` operator.

use std::sync::Arc;

use serde_json::{Map, Value};

use ixion_core::{compare_seq, MethodError, MethodResult, StateComparison};

use crate::context::{CallError, Context};
use crate::ops::get::check_account_argument;
use crate::record::class::RecordClass;
use crate::record::row::Row;
use crate::record::store;

/// Handle `K/changes(sinceState, maxChanges?)`.
///
/// The four-valued comparator decides the shape of the answer:
/// in-sync returns an empty diff, okay computes one, resync reports
/// `cannotCalculateChanges`, bogus reports `invalidArguments`.
pub fn ix_changes(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    args: &Map<String, Value>,
) -> Result<Vec<MethodResult>, CallError> {
    for name in args.keys() {
        if !matches!(name.as_str(), "accountId" | "sinceState" | "maxChanges") {
            return Err(
                MethodError::invalid_arguments(format!("unknown argument `{name}`")).into(),
            );
        }
    }
    check_account_argument(ctx, args)?;

    let Some(since) = args.get("sinceState").and_then(Value::as_str) else {
        return Err(MethodError::invalid_arguments("sinceState is required").into());
    };
    let max_changes = match args.get("maxChanges") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(n) if n > 0 => Some(n as usize),
            _ => {
                return Err(MethodError::invalid_arguments(
                    "maxChanges must be a positive integer",
                )
                .into())
            }
        },
    };

    let (lowest, highest) = ctx.state()?.window(&rc.type_key);
    let since_seq = rc.decode_state(since);
    match compare_seq(since_seq, lowest, highest) {
        StateComparison::Bogus => {
            Err(MethodError::invalid_arguments("invalid sinceState").into())
        }
        StateComparison::Resync => Err(MethodError::cannot_calculate_changes().into()),
        StateComparison::InSync => Ok(vec![diff_result(
            rc,
            ctx.account_id(),
            since,
            since.to_string(),
            false,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )]),
        StateComparison::Okay => {
            let since_seq = since_seq
                .ok_or_else(|| MethodError::invalid_arguments("invalid sinceState"))?;
            let rows = store::changed_since(ctx.conn(), rc, ctx.account_id(), since_seq)?;
            let (kept, truncated) = truncate_on_group_boundary(&rows, max_changes);

            let new_state = if truncated {
                match kept.last() {
                    Some(row) => rc.encode_state(row.mod_seq_changed),
                    None => since.to_string(),
                }
            } else {
                let seq = ctx.state()?.seq_for(&rc.type_key);
                rc.encode_state(seq)
            };

            let mut created = Vec::new();
            let mut updated = Vec::new();
            let mut destroyed = Vec::new();
            for row in kept {
                let created_in_window = row.mod_seq_created > since_seq;
                if row.is_active {
                    if created_in_window {
                        created.push(Value::String(row.id.clone()));
                    } else {
                        updated.push(Value::String(row.id.clone()));
                    }
                } else if !created_in_window {
                    destroyed.push(Value::String(row.id.clone()));
                }
                // Created and destroyed inside the window: omitted entirely.
            }

            Ok(vec![diff_result(
                rc,
                ctx.account_id(),
                since,
                new_state,
                truncated,
                created,
                updated,
                destroyed,
            )])
        }
    }
}

/// Truncate the changed-row list to at most `max` rows without ever
/// splitting a modseq group, so the intermediate state stays resumable.
/// When even the first group exceeds `max`, the whole group is kept.
fn truncate_on_group_boundary(
    rows: &[Row],
    max: Option<usize>,
) -> (Vec<&Row>, bool) {
    let Some(max) = max else {
        return (rows.iter().collect(), false);
    };
    if rows.len() <= max {
        return (rows.iter().collect(), false);
    }

    let mut cut = max;
    while cut > 0 && rows[cut].mod_seq_changed == rows[cut - 1].mod_seq_changed {
        cut -= 1;
    }
    if cut == 0 {
        let first = rows[0].mod_seq_changed;
        cut = rows
            .iter()
            .take_while(|r| r.mod_seq_changed == first)
            .count();
    }
    (rows[..cut].iter().collect(), cut < rows.len())
}

#[allow(clippy::too_many_arguments)]
fn diff_result(
    rc: &RecordClass,
    account_id: &str,
    old_state: &str,
    new_state: String,
    has_more: bool,
    created: Vec<Value>,
    updated: Vec<Value>,
    destroyed: Vec<Value>,
) -> MethodResult {
    MethodResult::new(format!("{}/changes", rc.type_key))
        .arg("accountId", Value::String(account_id.to_string()))
        .arg("oldState", Value::String(old_state.to_string()))
        .arg("newState", Value::String(new_state))
        .arg("hasMoreUpdates", Value::Bool(has_more))
        .arg("created", Value::Array(created))
        .arg("updated", Value::Array(updated))
        .arg("destroyed", Value::Array(destroyed))
}

#[cfg(test)]
mod tests {
    use crate::testing::{created_id, harness, submit};
    use serde_json::json;

    #[test]
    fn in_sync_clients_get_an_empty_diff() {
        let (engine, _dir) = harness();
        submit(
            &engine,
            json!([["Cookie/set", {"create": {"c1": {"type": "a"}}}, "a"]]),
        );

        let response = submit(
            &engine,
            json!([["Cookie/changes", {"sinceState": "1"}, "c"]]),
        );
        let args = &response[0][1];
        assert_eq!(args["oldState"], json!("1"));
        assert_eq!(args["newState"], json!("1"));
        assert_eq!(args["hasMoreUpdates"], json!(false));
        assert_eq!(args["created"], json!([]));
        assert_eq!(args["updated"], json!([]));
        assert_eq!(args["destroyed"], json!([]));
    }

    #[test]
    fn diff_splits_created_updated_destroyed() {
        let (engine, _dir) = harness();
        // State 1: create two cookies.
        let setup = submit(
            &engine,
            json!([["Cookie/set", {"create": {
                "c1": {"type": "keep"},
                "c2": {"type": "change"}
            }}, "a"]]),
        );
        let id_keep = created_id(&setup[0], "c1");
        let id_change = created_id(&setup[0], "c2");

        // State 2: update one; state 3: destroy the other; state 4: create.
        submit(
            &engine,
            json!([["Cookie/set", {"update": {id_change.clone(): {"delicious": "now"}}}, "b"]]),
        );
        submit(&engine, json!([["Cookie/set", {"destroy": [id_keep]}, "c"]]));
        let late = submit(
            &engine,
            json!([["Cookie/set", {"create": {"c3": {"type": "new"}}}, "d"]]),
        );
        let id_new = created_id(&late[0], "c3");

        let response = submit(
            &engine,
            json!([["Cookie/changes", {"sinceState": "1"}, "z"]]),
        );
        let args = &response[0][1];
        assert_eq!(args["oldState"], json!("1"));
        assert_eq!(args["newState"], json!("4"));
        assert_eq!(args["created"], json!([id_new]));
        assert_eq!(args["updated"], json!([id_change]));
        assert_eq!(args["destroyed"], json!([id_keep]));
    }

    #[test]
    fn created_then_destroyed_within_the_window_is_omitted() {
        let (engine, _dir) = harness();
        submit(
            &engine,
            json!([["Cookie/set", {"create": {"c0": {"type": "anchor"}}}, "a"]]),
        );
        let brief = submit(
            &engine,
            json!([["Cookie/set", {"create": {"c1": {"type": "brief"}}}, "b"]]),
        );
        let id = created_id(&brief[0], "c1");
        submit(&engine, json!([["Cookie/set", {"destroy": [id]}, "c"]]));

        let response = submit(
            &engine,
            json!([["Cookie/changes", {"sinceState": "1"}, "z"]]),
        );
        let args = &response[0][1];
        assert_eq!(args["created"], json!([]));
        assert_eq!(args["updated"], json!([]));
        assert_eq!(args["destroyed"], json!([]));
        assert_eq!(args["newState"], json!("3"));
    }

    #[test]
    fn max_changes_truncates_with_resumable_state() {
        let (engine, _dir) = harness();
        // Three separate requests, three states.
        for (cid, t) in [("c1", "one"), ("c2", "two"), ("c3", "three")] {
            submit(
                &engine,
                json!([["Cookie/set", {"create": {cid: {"type": t}}}, "a"]]),
            );
        }

        let response = submit(
            &engine,
            json!([["Cookie/changes", {"sinceState": "0", "maxChanges": 2}, "z"]]),
        );
        let args = &response[0][1];
        assert_eq!(args["hasMoreUpdates"], json!(true));
        assert_eq!(args["newState"], json!("2"));
        assert_eq!(args["created"].as_array().unwrap().len(), 2);

        // Resuming from the intermediate state yields the remainder.
        let response = submit(
            &engine,
            json!([["Cookie/changes", {"sinceState": "2"}, "z"]]),
        );
        let args = &response[0][1];
        assert_eq!(args["hasMoreUpdates"], json!(false));
        assert_eq!(args["created"].as_array().unwrap().len(), 1);
        assert_eq!(args["newState"], json!("3"));
    }

    #[test]
    fn max_changes_never_splits_a_modseq_group() {
        let (engine, _dir) = harness();
        // One request, three creates sharing state 1.
        submit(
            &engine,
            json!([["Cookie/set", {"create": {
                "c1": {"type": "a"}, "c2": {"type": "b"}, "c3": {"type": "c"}
            }}, "a"]]),
        );

        let response = submit(
            &engine,
            json!([["Cookie/changes", {"sinceState": "0", "maxChanges": 2}, "z"]]),
        );
        let args = &response[0][1];
        // The whole group is kept even though it exceeds maxChanges.
        assert_eq!(args["created"].as_array().unwrap().len(), 3);
        assert_eq!(args["hasMoreUpdates"], json!(false));
    }

    #[test]
    fn stale_clients_must_resync() {
        let (engine, _dir) = harness();
        let mut ctx = engine.context("acct-resync", false).unwrap();
        ctx.txn_do(|ctx| {
            ctx.conn()
                .execute(
                    "INSERT INTO states (accountId, type, lowestModSeq, highestModSeq)
                     VALUES ('acct-resync', 'Cookie', 100, 200)",
                    [],
                )
                .map_err(ixion_storage::map_db_err)?;
            Ok(())
        })
        .unwrap();

        let calls = ixion_core::parse_call_list(&json!([
            ["Cookie/changes", {"sinceState": "50"}, "a"]
        ]))
        .unwrap();
        let response = engine.execute("acct-resync", calls).unwrap().to_triples();
        assert_eq!(response[0][0], json!("error"));
        assert_eq!(response[0][1]["type"], json!("cannotCalculateChanges"));
    }

    #[test]
    fn bogus_states_are_invalid_arguments() {
        let (engine, _dir) = harness();
        for since in ["banana", "999"] {
            let response = submit(
                &engine,
                json!([["Cookie/changes", {"sinceState": since}, "z"]]),
            );
            assert_eq!(response[0][0], json!("error"));
            assert_eq!(response[0][1]["type"], json!("invalidArguments"));
        }
    }

    #[test]
    fn missing_since_state_is_rejected() {
        let (engine, _dir) = harness();
        let response = submit(&engine, json!([["Cookie/changes", {}, "z"]]));
        assert_eq!(response[0][1]["type"], json!("invalidArguments"));
    }
}
