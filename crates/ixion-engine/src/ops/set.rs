// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generated `/set` operator.
//!
//! One `/set` call runs create, update, and destroy phases inside the
//! request's top-level transaction, with a savepoint per record: a
//! failing record rolls back only itself and lands in the matching
//! `not*` map. The hook chain runs in phase order; postprocess hooks are
//! deferred until after the top-level commit.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use ixion_core::{new_guid, MethodError, MethodResult};

use crate::context::{CallError, Context};
use crate::ops::get::check_account_argument;
use crate::record::class::RecordClass;
use crate::record::hooks::CreateErrorOutcome;
use crate::record::property::Property;
use crate::record::row::{Row, RowDiff};
use crate::record::store::{self, RowError};

/// Parsed `/set` arguments.
#[derive(Debug, Clone, Default)]
pub struct SetRequest {
    /// Optional state precondition.
    pub if_in_state: Option<String>,
    /// Creations by creation id, in key order.
    pub create: Vec<(String, Map<String, Value>)>,
    /// Updates by id (possibly `#creationId` references), in key order.
    pub update: Vec<(String, Map<String, Value>)>,
    /// Ids to destroy (possibly `#creationId` references).
    pub destroy: Vec<String>,
}

impl SetRequest {
    /// Parse and shape-check the argument object.
    pub fn parse(args: &Map<String, Value>) -> Result<Self, MethodError> {
        for name in args.keys() {
            if !matches!(
                name.as_str(),
                "accountId" | "ifInState" | "create" | "update" | "destroy"
            ) {
                return Err(MethodError::invalid_arguments(format!(
                    "unknown argument `{name}`"
                )));
            }
        }

        let if_in_state = match args.get("ifInState") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(MethodError::invalid_arguments("ifInState must be a string"))
            }
        };

        let create = record_map(args.get("create"), "create")?;
        let update = record_map(args.get("update"), "update")?;

        let destroy = match args.get("destroy") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(ids)) => {
                let mut destroy = Vec::new();
                for id in ids {
                    match id.as_str() {
                        Some(id) => destroy.push(id.to_string()),
                        None => {
                            return Err(MethodError::invalid_arguments(
                                "destroy ids must be strings",
                            ))
                        }
                    }
                }
                destroy
            }
            Some(_) => {
                return Err(MethodError::invalid_arguments("destroy must be an array"))
            }
        };

        Ok(Self {
            if_in_state,
            create,
            update,
            destroy,
        })
    }
}

fn record_map(
    value: Option<&Value>,
    name: &str,
) -> Result<Vec<(String, Map<String, Value>)>, MethodError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(entries)) => {
            let mut records = Vec::new();
            for (key, record) in entries {
                match record.as_object() {
                    Some(record) => records.push((key.clone(), record.clone())),
                    None => {
                        return Err(MethodError::invalid_arguments(format!(
                            "{name} records must be objects"
                        )))
                    }
                }
            }
            Ok(records)
        }
        Some(_) => Err(MethodError::invalid_arguments(format!(
            "{name} must be an object"
        ))),
    }
}

/// Handle `K/set(create?, update?, destroy?, ifInState?)`.
pub fn ix_set(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    args: &Map<String, Value>,
) -> Result<Vec<MethodResult>, CallError> {
    check_account_argument(ctx, args)?;
    let request = SetRequest::parse(args)?;

    let type_key = rc.type_key.clone();
    let old_state = rc.encode_state(ctx.state()?.seq_for(&type_key));
    if let Some(expected) = &request.if_in_state {
        if *expected != old_state {
            return Err(MethodError::state_mismatch().into());
        }
    }

    if let Some(check) = rc.hooks.set_check {
        check(ctx, &request)?;
    }

    let mut created = Map::new();
    let mut not_created = Map::new();
    let mut updated = Map::new();
    let mut not_updated = Map::new();
    let mut destroyed = Vec::new();
    let mut not_destroyed = Map::new();

    // --- create ---
    for (creation_id, record) in &request.create {
        let outcome = ctx.txn_do(|ctx| create_one(ctx, rc, record));
        match outcome {
            Ok(row) => {
                ctx.log_creation_id(&type_key, creation_id, &row.id);
                created.insert(
                    creation_id.clone(),
                    server_set_fields(rc, &row, record),
                );
                if let Some(hook) = rc.hooks.postprocess_create {
                    ctx.defer_postprocess(hook, row);
                }
            }
            Err(CallError::Method(err)) => {
                let outcome = match rc.hooks.create_error {
                    Some(hook) => hook(ctx, err),
                    None => CreateErrorOutcome::Keep(err),
                };
                match outcome {
                    CreateErrorOutcome::Keep(err) => {
                        debug!(creation_id = %creation_id, error = %err, "create rejected");
                        not_created
                            .insert(creation_id.clone(), Value::Object(err.arguments()));
                    }
                    CreateErrorOutcome::Replace(row) => {
                        ctx.log_creation_id(&type_key, creation_id, &row.id);
                        created.insert(
                            creation_id.clone(),
                            server_set_fields(rc, &row, record),
                        );
                    }
                }
            }
            Err(internal) => return Err(internal),
        }
    }

    // --- update ---
    for (raw_id, changes) in &request.update {
        let id = match ctx.resolve_id_ref(&type_key, raw_id) {
            Ok(id) => id,
            Err(err) if err.kind == "duplicateCreationId" => return Err(err.into()),
            Err(err) => {
                not_updated.insert(raw_id.clone(), Value::Object(err.arguments()));
                continue;
            }
        };
        let outcome = ctx.txn_do(|ctx| update_one(ctx, rc, &id, changes));
        match outcome {
            Ok(row) => {
                updated.insert(id, Value::Null);
                if let Some(hook) = rc.hooks.postprocess_update {
                    ctx.defer_postprocess(hook, row);
                }
            }
            Err(CallError::Method(err)) => {
                not_updated.insert(raw_id.clone(), Value::Object(err.arguments()));
            }
            Err(internal) => return Err(internal),
        }
    }

    // --- destroy ---
    for raw_id in &request.destroy {
        let id = match ctx.resolve_id_ref(&type_key, raw_id) {
            Ok(id) => id,
            Err(err) if err.kind == "duplicateCreationId" => return Err(err.into()),
            Err(err) => {
                not_destroyed.insert(raw_id.clone(), Value::Object(err.arguments()));
                continue;
            }
        };
        let outcome = ctx.txn_do(|ctx| destroy_one(ctx, rc, &id));
        match outcome {
            Ok(row) => {
                destroyed.push(Value::String(id));
                if let Some(hook) = rc.hooks.postprocess_destroy {
                    ctx.defer_postprocess(hook, row);
                }
            }
            Err(CallError::Method(err)) => {
                not_destroyed.insert(raw_id.clone(), Value::Object(err.arguments()));
            }
            Err(internal) => return Err(internal),
        }
    }

    let new_state = rc.encode_state(ctx.state()?.seq_for(&type_key));

    let result = MethodResult::new(format!("{type_key}/set"))
        .arg("accountId", Value::String(ctx.account_id().to_string()))
        .arg("oldState", Value::String(old_state))
        .arg("newState", Value::String(new_state))
        .arg("created", Value::Object(created))
        .arg("updated", Value::Object(updated))
        .arg("destroyed", Value::Array(destroyed))
        .arg("notCreated", Value::Object(not_created))
        .arg("notUpdated", Value::Object(not_updated))
        .arg("notDestroyed", Value::Object(not_destroyed));
    Ok(vec![result])
}

fn create_one(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    record: &Map<String, Value>,
) -> Result<Row, CallError> {
    let mut prepared = prepare_create(ctx.is_system(), rc, record)?;
    if let Some(check) = rc.hooks.create_check {
        check(ctx, &mut prepared)?;
    }

    ctx.state()?.ensure_state_bumped(&rc.type_key);
    let modseq = ctx.state()?.next_state_for(&rc.type_key);

    let id = new_guid();
    // An account-base record founds its own account.
    let account_id = if rc.is_account_base {
        id.clone()
    } else {
        ctx.account_id().to_string()
    };

    let row = store::insert_row(ctx.conn(), rc, &account_id, &id, modseq, &prepared)
        .map_err(row_error)?;

    if rc.is_account_base {
        let types = ctx.engine().registry().types_in_family(&rc.account_type);
        ixion_storage::seed_account_states(ctx.conn(), &row.id, &types)?;
    }

    if let Some(hook) = rc.hooks.created {
        hook(ctx, &row)?;
    }
    Ok(row)
}

fn update_one(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    id: &str,
    changes: &Map<String, Value>,
) -> Result<Row, CallError> {
    let row = store::load_by_id(ctx.conn(), rc, ctx.account_id(), id)?
        .filter(|r| r.is_active)
        .ok_or(MethodError::not_found())?;

    let prepared = prepare_update(ctx.is_system(), rc, changes)?;
    if let Some(check) = rc.hooks.update_check {
        check(ctx, &row, &prepared)?;
    }

    ctx.state()?.ensure_state_bumped(&rc.type_key);
    let modseq = ctx.state()?.next_state_for(&rc.type_key);

    let new_row =
        store::update_row(ctx.conn(), rc, &row, &prepared, modseq).map_err(row_error)?;

    if let Some(hook) = rc.hooks.updated {
        let diff = RowDiff {
            old: row.properties.clone(),
            new: new_row.properties.clone(),
        };
        hook(ctx, &new_row, &diff)?;
    }
    Ok(new_row)
}

fn destroy_one(
    ctx: &mut Context<'_>,
    rc: &Arc<RecordClass>,
    id: &str,
) -> Result<Row, CallError> {
    let row = store::load_by_id(ctx.conn(), rc, ctx.account_id(), id)?
        .filter(|r| r.is_active)
        .ok_or(MethodError::not_found())?;

    if let Some(check) = rc.hooks.destroy_check {
        check(ctx, &row)?;
    }

    ctx.state()?.ensure_state_bumped(&rc.type_key);
    let modseq = ctx.state()?.next_state_for(&rc.type_key);

    let destroyed = store::soft_delete(ctx.conn(), rc, &row, modseq).map_err(row_error)?;

    if let Some(hook) = rc.hooks.destroyed {
        hook(ctx, &destroyed)?;
    }
    Ok(destroyed)
}

fn row_error(err: RowError) -> CallError {
    match err {
        RowError::UniqueViolation => CallError::Method(
            MethodError::new("alreadyExists")
                .describe("a live record with the same unique values exists"),
        ),
        RowError::Other(err) => CallError::Internal(err),
    }
}

/// The property set a creation may supply.
fn may_init(property: &Property, is_system: bool) -> bool {
    if property.is_virtual {
        return false;
    }
    property.client_may_init || (is_system && !property.is_immutable)
}

/// The property set an update may supply.
fn may_update(property: &Property, is_system: bool) -> bool {
    if property.is_virtual || property.is_immutable {
        return false;
    }
    property.client_may_update || is_system
}

/// Validate one creation: structural checks (unknown keys, permissions,
/// required fields) before value validators; the first error per
/// property wins; all errors collect into one `invalidProperties`.
/// Returns the prepared column map with defaults applied.
fn prepare_create(
    is_system: bool,
    rc: &RecordClass,
    record: &Map<String, Value>,
) -> Result<Map<String, Value>, MethodError> {
    let mut invalid = Map::new();

    for name in record.keys() {
        match rc.property_named(name) {
            None => {
                invalid.insert(name.clone(), Value::String("unknown property".into()));
            }
            Some(property) if !may_init(property, is_system) => {
                invalid.insert(
                    name.clone(),
                    Value::String("property may not be set by the client".into()),
                );
            }
            Some(_) => {}
        }
    }

    let mut prepared = Map::new();
    for property in rc.concrete_properties() {
        if invalid.contains_key(&property.name) {
            continue;
        }
        match record.get(&property.name) {
            None => {
                if let Some(default) = &property.default {
                    prepared.insert(property.name.clone(), default.clone());
                } else if property.is_optional {
                    prepared.insert(property.name.clone(), Value::Null);
                } else {
                    invalid.insert(
                        property.name.clone(),
                        Value::String("no value given for required field".into()),
                    );
                }
            }
            Some(Value::Null) => {
                if property.is_optional {
                    prepared.insert(property.name.clone(), Value::Null);
                } else {
                    invalid.insert(
                        property.name.clone(),
                        Value::String("null supplied for required field".into()),
                    );
                }
            }
            Some(value) => match check_value(property, value) {
                Some(description) => {
                    invalid.insert(property.name.clone(), Value::String(description));
                }
                None => {
                    prepared.insert(property.name.clone(), value.clone());
                }
            },
        }
    }

    if invalid.is_empty() {
        Ok(prepared)
    } else {
        Err(MethodError::invalid_properties(invalid))
    }
}

/// Validate one update. Same error collection as creations, without the
/// required/default pass.
fn prepare_update(
    is_system: bool,
    rc: &RecordClass,
    changes: &Map<String, Value>,
) -> Result<Map<String, Value>, MethodError> {
    let mut invalid = Map::new();
    let mut prepared = Map::new();

    for (name, value) in changes {
        let Some(property) = rc.property_named(name) else {
            invalid.insert(name.clone(), Value::String("unknown property".into()));
            continue;
        };
        if !may_update(property, is_system) {
            invalid.insert(
                name.clone(),
                Value::String("property may not be updated by the client".into()),
            );
            continue;
        }
        match value {
            Value::Null => {
                if property.is_optional {
                    prepared.insert(name.clone(), Value::Null);
                } else {
                    invalid.insert(
                        name.clone(),
                        Value::String("null supplied for required field".into()),
                    );
                }
            }
            value => match check_value(property, value) {
                Some(description) => {
                    invalid.insert(name.clone(), Value::String(description));
                }
                None => {
                    prepared.insert(name.clone(), value.clone());
                }
            },
        }
    }

    if invalid.is_empty() {
        Ok(prepared)
    } else {
        Err(MethodError::invalid_properties(invalid))
    }
}

/// Type-shape check, then the declared validator. First error wins.
fn check_value(property: &Property, value: &Value) -> Option<String> {
    if let Err(err) = store::sql_param(property, value) {
        return Some(
            err.properties
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("wrong type")
                .to_string(),
        );
    }
    match &property.validator {
        Some(validator) => validator(value),
        None => None,
    }
}

/// The created-entry object: the server-assigned id plus every
/// server-set value the client did not supply.
fn server_set_fields(
    rc: &RecordClass,
    row: &Row,
    client_record: &Map<String, Value>,
) -> Value {
    let mut object = Map::new();
    object.insert("id".into(), Value::String(row.id.clone()));
    for property in rc.concrete_properties() {
        if !client_record.contains_key(&property.name) {
            let value = row.property(&property.name);
            if !value.is_null() {
                object.insert(property.name.clone(), value.clone());
            }
        }
    }
    Value::Object(object)
}
