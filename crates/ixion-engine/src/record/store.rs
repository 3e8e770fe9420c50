// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-level SQL for record classes.
//!
//! All entity tables share the same shape: the mandatory columns followed
//! by the class's concrete properties. Deletion is logical — `isActive`
//! flips from 1 to NULL and `dateDestroyed` is stamped — so every query
//! here is explicit about whether it sees destroyed rows.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};

use ixion_core::{IxionError, MethodError};

use ixion_storage::{is_unique_violation, map_db_err};

use crate::record::class::RecordClass;
use crate::record::property::{DataType, Property};
use crate::record::row::Row;

/// Failure modes of a row mutation.
#[derive(Debug)]
pub enum RowError {
    /// A unique constraint rejected the row (live duplicate).
    UniqueViolation,
    /// Any other storage failure.
    Other(IxionError),
}

impl From<rusqlite::Error> for RowError {
    fn from(err: rusqlite::Error) -> Self {
        if is_unique_violation(&err) {
            RowError::UniqueViolation
        } else {
            RowError::Other(map_db_err(err))
        }
    }
}

/// Server-stamped timestamp, millisecond precision, UTC.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Convert a JSON property value into its SQL parameter form.
///
/// The value has already passed structural validation; a type mismatch
/// here still reports cleanly rather than panicking.
pub fn sql_param(property: &Property, value: &Value) -> Result<SqlValue, MethodError> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    let mismatch = || {
        MethodError::invalid_arguments(format!(
            "property `{}` expects {}",
            property.name, property.data_type
        ))
    };
    match property.data_type {
        DataType::String | DataType::IString | DataType::Timestamp | DataType::Id => value
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .ok_or_else(mismatch),
        DataType::Boolean => value
            .as_bool()
            .map(|b| SqlValue::Integer(b as i64))
            .ok_or_else(mismatch),
        DataType::Integer => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(mismatch),
        DataType::StringArray => {
            if value.is_array() {
                Ok(SqlValue::Text(value.to_string()))
            } else {
                Err(mismatch())
            }
        }
    }
}

/// Convert a SQL column value back into its JSON form.
fn value_from_sql(property: &Property, value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => match property.data_type {
            DataType::Boolean => Value::Bool(n != 0),
            _ => Value::from(n),
        },
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).to_string();
            match property.data_type {
                DataType::StringArray => {
                    serde_json::from_str(&text).unwrap_or(Value::Null)
                }
                _ => Value::String(text),
            }
        }
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Blob(_) => Value::Null,
    }
}

/// The SELECT column list: mandatory columns, then concrete properties
/// in declaration order.
fn select_columns(rc: &RecordClass) -> String {
    let mut columns = vec![
        "id".to_string(),
        "accountId".to_string(),
        "modSeqCreated".to_string(),
        "modSeqChanged".to_string(),
        "dateDestroyed".to_string(),
        "isActive".to_string(),
        "created".to_string(),
    ];
    for property in rc.concrete_properties() {
        columns.push(format!("\"{}\"", property.name));
    }
    columns.join(", ")
}

/// Build a [`Row`] from a SELECT over [`select_columns`].
fn row_from_sql(rc: &RecordClass, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let is_active: Option<i64> = row.get(5)?;
    let mut properties = Map::new();
    for (offset, property) in rc.concrete_properties().enumerate() {
        let value = value_from_sql(property, row.get_ref(7 + offset)?);
        properties.insert(property.name.clone(), value);
    }
    Ok(Row {
        id: row.get(0)?,
        account_id: row.get(1)?,
        mod_seq_created: row.get::<_, i64>(2)? as u64,
        mod_seq_changed: row.get::<_, i64>(3)? as u64,
        date_destroyed: row.get(4)?,
        is_active: is_active.is_some(),
        created: row.get(6)?,
        properties,
    })
}

/// Insert a new live row with the given id and modseq.
///
/// `props` holds the prepared concrete property values (defaults already
/// applied). Returns the inserted row.
pub fn insert_row(
    conn: &Connection,
    rc: &RecordClass,
    account_id: &str,
    id: &str,
    modseq: u64,
    props: &Map<String, Value>,
) -> Result<Row, RowError> {
    let created = now_timestamp();
    let mut columns = vec![
        "id".to_string(),
        "accountId".to_string(),
        "modSeqCreated".to_string(),
        "modSeqChanged".to_string(),
        "dateDestroyed".to_string(),
        "isActive".to_string(),
        "created".to_string(),
    ];
    let mut values: Vec<SqlValue> = vec![
        SqlValue::Text(id.to_string()),
        SqlValue::Text(account_id.to_string()),
        SqlValue::Integer(modseq as i64),
        SqlValue::Integer(modseq as i64),
        SqlValue::Null,
        SqlValue::Integer(1),
        SqlValue::Text(created.clone()),
    ];
    let mut properties = Map::new();
    for property in rc.concrete_properties() {
        let value = props.get(&property.name).cloned().unwrap_or(Value::Null);
        let param = sql_param(property, &value)
            .map_err(|e| RowError::Other(IxionError::Internal(e.to_string())))?;
        columns.push(format!("\"{}\"", property.name));
        values.push(param);
        properties.insert(property.name.clone(), value);
    }

    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({placeholders})",
        rc.table,
        columns.join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;

    Ok(Row {
        id: id.to_string(),
        account_id: account_id.to_string(),
        mod_seq_created: modseq,
        mod_seq_changed: modseq,
        date_destroyed: None,
        is_active: true,
        created,
        properties,
    })
}

/// Apply prepared changes to a live row, stamping the new modseq.
/// Returns the updated row.
pub fn update_row(
    conn: &Connection,
    rc: &RecordClass,
    row: &Row,
    changes: &Map<String, Value>,
    modseq: u64,
) -> Result<Row, RowError> {
    let mut assignments = vec!["modSeqChanged = ?".to_string()];
    let mut values: Vec<SqlValue> = vec![SqlValue::Integer(modseq as i64)];
    for property in rc.concrete_properties() {
        if let Some(value) = changes.get(&property.name) {
            let param = sql_param(property, value)
                .map_err(|e| RowError::Other(IxionError::Internal(e.to_string())))?;
            assignments.push(format!("\"{}\" = ?", property.name));
            values.push(param);
        }
    }
    values.push(SqlValue::Text(row.id.clone()));
    values.push(SqlValue::Text(row.account_id.clone()));

    let sql = format!(
        "UPDATE \"{}\" SET {} WHERE id = ? AND accountId = ?",
        rc.table,
        assignments.join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;

    let mut updated = row.clone();
    updated.mod_seq_changed = modseq;
    for (name, value) in changes {
        updated.properties.insert(name.clone(), value.clone());
    }
    Ok(updated)
}

/// Logically destroy a row: `isActive` to NULL, `dateDestroyed` stamped,
/// modseq bumped. Returns the destroyed row.
pub fn soft_delete(
    conn: &Connection,
    rc: &RecordClass,
    row: &Row,
    modseq: u64,
) -> Result<Row, RowError> {
    let destroyed_at = now_timestamp();
    let sql = format!(
        "UPDATE \"{}\" SET isActive = NULL, dateDestroyed = ?1, modSeqChanged = ?2
         WHERE id = ?3 AND accountId = ?4",
        rc.table
    );
    conn.execute(
        &sql,
        rusqlite::params![destroyed_at, modseq as i64, row.id, row.account_id],
    )?;

    let mut destroyed = row.clone();
    destroyed.is_active = false;
    destroyed.date_destroyed = Some(destroyed_at);
    destroyed.mod_seq_changed = modseq;
    Ok(destroyed)
}

/// Load one row by id, destroyed or not.
pub fn load_by_id(
    conn: &Connection,
    rc: &RecordClass,
    account_id: &str,
    id: &str,
) -> Result<Option<Row>, IxionError> {
    let sql = format!(
        "SELECT {} FROM \"{}\" WHERE accountId = ?1 AND id = ?2",
        select_columns(rc),
        rc.table
    );
    let mut stmt = conn.prepare(&sql).map_err(map_db_err)?;
    let mut rows = stmt
        .query_map(rusqlite::params![account_id, id], |r| row_from_sql(rc, r))
        .map_err(map_db_err)?;
    match rows.next() {
        Some(row) => Ok(Some(row.map_err(map_db_err)?)),
        None => Ok(None),
    }
}

/// Load all live rows of the account, oldest first.
pub fn load_active(
    conn: &Connection,
    rc: &RecordClass,
    account_id: &str,
) -> Result<Vec<Row>, IxionError> {
    let sql = format!(
        "SELECT {} FROM \"{}\" WHERE accountId = ?1 AND isActive = 1 ORDER BY created, id",
        select_columns(rc),
        rc.table
    );
    collect_rows(conn, rc, &sql, rusqlite::params![account_id])
}

/// Load live rows matching the given ids. Missing or destroyed ids are
/// simply absent from the result.
pub fn load_by_ids(
    conn: &Connection,
    rc: &RecordClass,
    account_id: &str,
    ids: &[String],
) -> Result<Vec<Row>, IxionError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM \"{}\" WHERE accountId = ? AND isActive = 1 AND id IN ({placeholders})",
        select_columns(rc),
        rc.table
    );
    let mut params: Vec<SqlValue> = vec![SqlValue::Text(account_id.to_string())];
    params.extend(ids.iter().map(|id| SqlValue::Text(id.clone())));

    let mut stmt = conn.prepare(&sql).map_err(map_db_err)?;
    let loaded = stmt
        .query_map(params_from_iter(params), |r| row_from_sql(rc, r))
        .map_err(map_db_err)?;
    let mut rows = Vec::new();
    for row in loaded {
        rows.push(row.map_err(map_db_err)?);
    }
    Ok(rows)
}

/// All rows (live and destroyed) with `modSeqChanged > since`, ordered
/// by modseq then id so truncation keeps whole modseq groups.
pub fn changed_since(
    conn: &Connection,
    rc: &RecordClass,
    account_id: &str,
    since: u64,
) -> Result<Vec<Row>, IxionError> {
    let sql = format!(
        "SELECT {} FROM \"{}\" WHERE accountId = ?1 AND modSeqChanged > ?2
         ORDER BY modSeqChanged, id",
        select_columns(rc),
        rc.table
    );
    collect_rows(
        conn,
        rc,
        &sql,
        rusqlite::params![account_id, since as i64],
    )
}

fn collect_rows(
    conn: &Connection,
    rc: &RecordClass,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Row>, IxionError> {
    let mut stmt = conn.prepare(sql).map_err(map_db_err)?;
    let loaded = stmt
        .query_map(params, |r| row_from_sql(rc, r))
        .map_err(map_db_err)?;
    let mut rows = Vec::new();
    for row in loaded {
        rows.push(row.map_err(map_db_err)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::property::Property;
    use crate::registry::ddl_statements;
    use ixion_storage::Database;
    use serde_json::json;
    use tempfile::tempdir;

    fn cookie_class() -> RecordClass {
        RecordClass::new("Cookie", "generic")
            .property(Property::string("type"))
            .property(Property::string("delicious").optional())
            .property(Property::boolean("crunchy").optional())
            .property(Property::string_array("tags").optional())
            .unique(&["accountId", "type"])
            .validate()
            .unwrap()
    }

    fn setup() -> (rusqlite::Connection, RecordClass, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("store.db"), true).unwrap();
        let conn = db.connect().unwrap();
        let rc = cookie_class();
        for stmt in ddl_statements(&rc) {
            conn.execute_batch(&stmt).unwrap();
        }
        (conn, rc, dir)
    }

    fn props(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn insert_then_load_round_trips_typed_values() {
        let (conn, rc, _dir) = setup();
        let inserted = insert_row(
            &conn,
            &rc,
            "acct",
            "id-1",
            1,
            &props(&[
                ("type", json!("chocolate")),
                ("crunchy", json!(true)),
                ("tags", json!(["dark", "sweet"])),
            ]),
        )
        .unwrap();
        assert_eq!(inserted.mod_seq_created, 1);
        assert!(inserted.is_active);

        let loaded = load_by_id(&conn, &rc, "acct", "id-1").unwrap().unwrap();
        assert_eq!(loaded.property("type"), &json!("chocolate"));
        assert_eq!(loaded.property("crunchy"), &json!(true));
        assert_eq!(loaded.property("tags"), &json!(["dark", "sweet"]));
        assert_eq!(loaded.property("delicious"), &Value::Null);
        assert_eq!(loaded.created, inserted.created);
    }

    #[test]
    fn unique_constraint_rejects_live_duplicates() {
        let (conn, rc, _dir) = setup();
        insert_row(&conn, &rc, "acct", "id-1", 1, &props(&[("type", json!("x"))])).unwrap();
        let err = insert_row(&conn, &rc, "acct", "id-2", 1, &props(&[("type", json!("x"))]))
            .unwrap_err();
        assert!(matches!(err, RowError::UniqueViolation));
    }

    #[test]
    fn destroyed_rows_free_their_unique_tuple() {
        let (conn, rc, _dir) = setup();
        let row =
            insert_row(&conn, &rc, "acct", "id-1", 1, &props(&[("type", json!("x"))])).unwrap();
        soft_delete(&conn, &rc, &row, 2).unwrap();

        // Same tuple inserts cleanly now.
        insert_row(&conn, &rc, "acct", "id-2", 3, &props(&[("type", json!("x"))])).unwrap();

        // And both destroyed rows may coexist.
        let row2 = load_by_id(&conn, &rc, "acct", "id-2").unwrap().unwrap();
        soft_delete(&conn, &rc, &row2, 4).unwrap();
        insert_row(&conn, &rc, "acct", "id-3", 5, &props(&[("type", json!("x"))])).unwrap();
    }

    #[test]
    fn update_stamps_modseq_and_applies_changes() {
        let (conn, rc, _dir) = setup();
        let row = insert_row(
            &conn,
            &rc,
            "acct",
            "id-1",
            1,
            &props(&[("type", json!("x")), ("delicious", json!("yes"))]),
        )
        .unwrap();

        let updated =
            update_row(&conn, &rc, &row, &props(&[("delicious", json!("very"))]), 2).unwrap();
        assert_eq!(updated.mod_seq_changed, 2);
        assert_eq!(updated.mod_seq_created, 1);

        let loaded = load_by_id(&conn, &rc, "acct", "id-1").unwrap().unwrap();
        assert_eq!(loaded.property("delicious"), &json!("very"));
        assert_eq!(loaded.mod_seq_changed, 2);
        assert_eq!(loaded.mod_seq_created, 1);
    }

    #[test]
    fn soft_delete_keeps_the_row_but_marks_it() {
        let (conn, rc, _dir) = setup();
        let row =
            insert_row(&conn, &rc, "acct", "id-1", 1, &props(&[("type", json!("x"))])).unwrap();
        soft_delete(&conn, &rc, &row, 2).unwrap();

        let loaded = load_by_id(&conn, &rc, "acct", "id-1").unwrap().unwrap();
        assert!(!loaded.is_active);
        assert!(loaded.date_destroyed.is_some());
        assert_eq!(loaded.mod_seq_changed, 2);

        // Destroyed rows drop out of the live views.
        assert!(load_active(&conn, &rc, "acct").unwrap().is_empty());
        assert!(load_by_ids(&conn, &rc, "acct", &["id-1".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn changed_since_orders_by_modseq_and_includes_destroyed() {
        let (conn, rc, _dir) = setup();
        let a = insert_row(&conn, &rc, "acct", "id-a", 1, &props(&[("type", json!("a"))])).unwrap();
        insert_row(&conn, &rc, "acct", "id-b", 2, &props(&[("type", json!("b"))])).unwrap();
        soft_delete(&conn, &rc, &a, 3).unwrap();

        let changed = changed_since(&conn, &rc, "acct", 1).unwrap();
        let ids: Vec<&str> = changed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["id-b", "id-a"]);
        assert!(!changed[1].is_active);

        assert!(changed_since(&conn, &rc, "acct", 3).unwrap().is_empty());
    }

    #[test]
    fn rows_are_scoped_to_their_account() {
        let (conn, rc, _dir) = setup();
        insert_row(&conn, &rc, "acct-1", "id-1", 1, &props(&[("type", json!("x"))])).unwrap();
        assert!(load_by_id(&conn, &rc, "acct-2", "id-1").unwrap().is_none());
        assert!(load_active(&conn, &rc, "acct-2").unwrap().is_empty());
    }
}
