// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generated `/query` and `/queryChanges` operators.
//!
//! Both are driven by the class's filter map (per-filter condition
//! builder plus optional differ) and sort map (per-sort SQL expression).

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::params_from_iter;
use serde_json::{Map, Value};

use ixion_core::{compare_seq, MethodError, MethodResult, StateComparison};
use ixion_storage::map_db_err;

use crate::context::{CallError, Context};
use crate::ops::get::check_account_argument;
use crate::record::class::RecordClass;
use crate::record::store;

/// Handle `K/query(filter?, sort?, position?, limit?, anchor?,
/// anchorOffset?, calculateTotal?)`.
pub fn ix_query(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    args: &Map<String, Value>,
) -> Result<Vec<MethodResult>, CallError> {
    for name in args.keys() {
        if !matches!(
            name.as_str(),
            "accountId"
                | "filter"
                | "sort"
                | "position"
                | "limit"
                | "anchor"
                | "anchorOffset"
                | "calculateTotal"
        ) {
            return Err(
                MethodError::invalid_arguments(format!("unknown argument `{name}`")).into(),
            );
        }
    }
    check_account_argument(ctx, args)?;

    let ids = matching_ids(ctx, rc, args.get("filter"), args.get("sort"))?;
    let total = ids.len();

    let mut position = match args.get("position") {
        None | Some(Value::Null) => 0i64,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| MethodError::invalid_arguments("position must be an integer"))?,
    };
    if position < 0 {
        position = (total as i64 + position).max(0);
    }

    if let Some(anchor) = args.get("anchor").and_then(Value::as_str) {
        let anchor_offset = match args.get("anchorOffset") {
            None | Some(Value::Null) => 0i64,
            Some(value) => value.as_i64().ok_or_else(|| {
                MethodError::invalid_arguments("anchorOffset must be an integer")
            })?,
        };
        let index = ids
            .iter()
            .position(|id| id == anchor)
            .ok_or_else(MethodError::anchor_not_found)?;
        position = (index as i64 + anchor_offset).max(0);
    }

    let limit = match args.get("limit") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(n) => Some(n as usize),
            None => {
                return Err(MethodError::invalid_arguments(
                    "limit must be a non-negative integer",
                )
                .into())
            }
        },
    };

    let start = (position as usize).min(total);
    let end = match limit {
        Some(limit) => (start + limit).min(total),
        None => total,
    };
    let page: Vec<Value> = ids[start..end]
        .iter()
        .map(|id| Value::String(id.clone()))
        .collect();

    let state = rc.encode_state(ctx.state()?.seq_for(&rc.type_key));
    let mut result = MethodResult::new(format!("{}/query", rc.type_key))
        .arg("accountId", Value::String(ctx.account_id().to_string()))
        .arg("queryState", Value::String(state))
        .arg("canCalculateChanges", Value::Bool(true))
        .arg("position", Value::from(position))
        .arg("ids", Value::Array(page));
    if args.get("calculateTotal").and_then(Value::as_bool) == Some(true) {
        result = result.arg("total", Value::from(total));
    }
    Ok(vec![result])
}

/// Handle `K/queryChanges(sinceQueryState, filter?, sort?, upToId?,
/// maxChanges?)`.
///
/// Without a stored snapshot of the client's list, every row changed
/// since the old state is reported in `removed`, and those currently in
/// the list are re-reported in `added` with their current index.
pub fn ix_query_changes(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    args: &Map<String, Value>,
) -> Result<Vec<MethodResult>, CallError> {
    for name in args.keys() {
        if !matches!(
            name.as_str(),
            "accountId"
                | "sinceQueryState"
                | "filter"
                | "sort"
                | "upToId"
                | "maxChanges"
                | "calculateTotal"
        ) {
            return Err(
                MethodError::invalid_arguments(format!("unknown argument `{name}`")).into(),
            );
        }
    }
    check_account_argument(ctx, args)?;

    let Some(since) = args.get("sinceQueryState").and_then(Value::as_str) else {
        return Err(MethodError::invalid_arguments("sinceQueryState is required").into());
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
    let comparison = compare_seq(since_seq, lowest, highest);
    match comparison {
        StateComparison::Bogus => {
            return Err(MethodError::invalid_arguments("invalid sinceQueryState").into())
        }
        StateComparison::Resync => {
            return Err(MethodError::cannot_calculate_changes().into())
        }
        StateComparison::InSync | StateComparison::Okay => {}
    }

    let mut current = matching_ids(ctx, rc, args.get("filter"), args.get("sort"))?;
    let total = current.len();

    let mut removed = Vec::new();
    let mut added = Vec::new();

    if comparison == StateComparison::Okay {
        // Ignore changes past upToId when the anchor is present.
        if let Some(up_to) = args.get("upToId").and_then(Value::as_str) {
            if let Some(index) = current.iter().position(|id| id == up_to) {
                current.truncate(index + 1);
            }
        }

        let since_seq = since_seq
            .ok_or_else(|| MethodError::invalid_arguments("invalid sinceQueryState"))?;
        let changed = store::changed_since(ctx.conn(), rc, ctx.account_id(), since_seq)?;

        for row in &changed {
            let created_in_window = row.mod_seq_created > since_seq;
            match current.iter().position(|id| id == &row.id) {
                Some(index) => {
                    if !created_in_window {
                        removed.push(Value::String(row.id.clone()));
                    }
                    let mut entry = Map::new();
                    entry.insert("id".into(), Value::String(row.id.clone()));
                    entry.insert("index".into(), Value::from(index));
                    added.push(Value::Object(entry));
                }
                None => {
                    if !created_in_window {
                        removed.push(Value::String(row.id.clone()));
                    }
                }
            }
        }

        if let Some(max) = max_changes {
            if removed.len() + added.len() > max {
                return Err(MethodError::too_many_changes().into());
            }
        }
    }

    let new_state = rc.encode_state(ctx.state()?.seq_for(&rc.type_key));
    let mut result = MethodResult::new(format!("{}/queryChanges", rc.type_key))
        .arg("accountId", Value::String(ctx.account_id().to_string()))
        .arg("oldQueryState", Value::String(since.to_string()))
        .arg("newQueryState", Value::String(new_state))
        .arg("removed", Value::Array(removed))
        .arg("added", Value::Array(added));
    if args.get("calculateTotal").and_then(Value::as_bool) == Some(true) {
        result = result.arg("total", Value::from(total));
    }
    Ok(vec![result])
}

/// Run the filtered, sorted id query for the account's live rows.
fn matching_ids(
    ctx: &Context<'_>,
    rc: &RecordClass,
    filter: Option<&Value>,
    sort: Option<&Value>,
) -> Result<Vec<String>, CallError> {
    let mut sql = format!("SELECT id FROM \"{}\"", rc.table);
    if let Some(joins) = &rc.query.joins {
        sql.push(' ');
        sql.push_str(joins);
    }
    sql.push_str(" WHERE accountId = ? AND isActive = 1");

    let mut params: Vec<SqlValue> = vec![SqlValue::Text(ctx.account_id().to_string())];

    match filter {
        None | Some(Value::Null) => {}
        Some(Value::Object(conditions)) => {
            for (name, value) in conditions {
                let Some(declared) = rc.query.filters.get(name) else {
                    return Err(MethodError::invalid_arguments(format!(
                        "unsupported filter `{name}`"
                    ))
                    .into());
                };
                let cond = (declared.cond)(value)?;
                sql.push_str(" AND (");
                sql.push_str(&cond.sql);
                sql.push(')');
                params.extend(cond.params);
            }
        }
        Some(_) => {
            return Err(MethodError::invalid_arguments("filter must be an object").into())
        }
    }

    sql.push_str(" ORDER BY ");
    match sort {
        None | Some(Value::Null) => sql.push_str("created, id"),
        Some(Value::Array(comparators)) => {
            for comparator in comparators {
                let Some(comparator) = comparator.as_object() else {
                    return Err(
                        MethodError::invalid_arguments("sort entries must be objects").into()
                    );
                };
                let Some(property) = comparator.get("property").and_then(Value::as_str)
                else {
                    return Err(MethodError::invalid_arguments(
                        "sort entries need a property name",
                    )
                    .into());
                };
                let Some(expression) = rc.query.sorts.get(property) else {
                    return Err(MethodError::invalid_arguments(format!(
                        "unsupported sort `{property}`"
                    ))
                    .into());
                };
                let ascending = comparator
                    .get("isAscending")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                sql.push_str(expression);
                sql.push_str(if ascending { " ASC, " } else { " DESC, " });
            }
            sql.push_str("id");
        }
        Some(_) => {
            return Err(MethodError::invalid_arguments("sort must be an array").into())
        }
    }

    let mut stmt = ctx.conn().prepare(&sql).map_err(map_db_err)?;
    let loaded = stmt
        .query_map(params_from_iter(params), |row| row.get::<_, String>(0))
        .map_err(map_db_err)?;
    let mut ids = Vec::new();
    for id in loaded {
        ids.push(id.map_err(map_db_err)?);
    }
    Ok(ids)
}
