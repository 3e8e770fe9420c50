// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The record-class registry.
//!
//! Classes register at startup; the registry validates each declaration,
//! deploys the entity tables, and builds the immutable method → handler
//! map the dispatcher consults. Nothing here mutates after startup.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::debug;

use ixion_core::IxionError;
use ixion_storage::map_db_err;

use crate::context::Context;
use crate::dispatcher::Handler;
use crate::ops;
use crate::record::class::RecordClass;

/// Registry of record classes keyed by type.
#[derive(Debug, Default)]
pub struct Registry {
    classes: HashMap<String, Arc<RecordClass>>,
    order: Vec<String>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register one record class.
    pub fn register(&mut self, class: RecordClass) -> Result<(), IxionError> {
        let class = class.validate()?;
        let type_key = class.type_key.clone();
        if self.classes.contains_key(&type_key) {
            return Err(IxionError::Schema {
                type_key: type_key.clone(),
                message: "type key registered twice".into(),
            });
        }
        self.order.push(type_key.clone());
        self.classes.insert(type_key, Arc::new(class));
        Ok(())
    }

    /// Look up a class by type key.
    pub fn class(&self, type_key: &str) -> Option<&Arc<RecordClass>> {
        self.classes.get(type_key)
    }

    /// All classes in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<RecordClass>> {
        self.order.iter().filter_map(|k| self.classes.get(k))
    }

    /// Type keys sharing an account family, in registration order.
    pub fn types_in_family(&self, account_type: &str) -> Vec<String> {
        self.classes()
            .filter(|c| c.account_type == account_type)
            .map(|c| c.type_key.clone())
            .collect()
    }

    /// Create every entity table and index that does not exist yet.
    pub fn deploy_schema(&self, conn: &Connection) -> Result<(), IxionError> {
        for class in self.classes() {
            for statement in ddl_statements(class) {
                conn.execute_batch(&statement).map_err(map_db_err)?;
            }
            debug!(type_key = %class.type_key, table = %class.table, "entity table deployed");
        }
        Ok(())
    }

    /// Build the method → handler map: generated verbs for every class,
    /// then published methods registered verbatim (they win on collision).
    pub fn build_handlers(&self) -> HashMap<String, Handler> {
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        for class in self.classes() {
            let key = &class.type_key;

            let rc = Arc::clone(class);
            handlers.insert(
                format!("{key}/get"),
                Arc::new(move |ctx: &mut Context<'_>, args: Map<String, Value>| {
                    ops::get::ix_get(ctx, &rc, &args)
                }),
            );

            let rc = Arc::clone(class);
            handlers.insert(
                format!("{key}/changes"),
                Arc::new(move |ctx: &mut Context<'_>, args: Map<String, Value>| {
                    ops::changes::ix_changes(ctx, &rc, &args)
                }),
            );

            let rc = Arc::clone(class);
            handlers.insert(
                format!("{key}/set"),
                Arc::new(move |ctx: &mut Context<'_>, args: Map<String, Value>| {
                    ops::set::ix_set(ctx, &rc, &args)
                }),
            );

            if class.query_enabled {
                let rc = Arc::clone(class);
                handlers.insert(
                    format!("{key}/query"),
                    Arc::new(move |ctx: &mut Context<'_>, args: Map<String, Value>| {
                        ops::query::ix_query(ctx, &rc, &args)
                    }),
                );

                let rc = Arc::clone(class);
                handlers.insert(
                    format!("{key}/queryChanges"),
                    Arc::new(move |ctx: &mut Context<'_>, args: Map<String, Value>| {
                        ops::query::ix_query_changes(ctx, &rc, &args)
                    }),
                );
            }

            for (method, handler) in &class.published_methods {
                handlers.insert(method.clone(), Arc::clone(handler));
            }
        }
        handlers
    }
}

/// DDL for one record class: the entity table, the change-tracking
/// index, and the declared unique constraints rewritten to lead with
/// `isActive` (so destroyed rows, which hold NULL, never collide).
pub fn ddl_statements(rc: &RecordClass) -> Vec<String> {
    let mut columns = vec![
        "    id TEXT NOT NULL PRIMARY KEY".to_string(),
        "    accountId TEXT NOT NULL".to_string(),
        "    modSeqCreated INTEGER NOT NULL".to_string(),
        "    modSeqChanged INTEGER NOT NULL".to_string(),
        "    dateDestroyed TEXT".to_string(),
        "    isActive INTEGER".to_string(),
        "    created TEXT NOT NULL".to_string(),
    ];
    for property in rc.concrete_properties() {
        let null = if property.is_optional { "" } else { " NOT NULL" };
        columns.push(format!(
            "    \"{}\" {}{null}",
            property.name,
            property.sql_type()
        ));
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n{}\n);",
        rc.table,
        columns.join(",\n")
    )];

    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS \"idx_{0}_account_modseq\"
         ON \"{0}\" (accountId, modSeqChanged);",
        rc.table
    ));

    for constraint in &rc.unique_constraints {
        let suffix = constraint.join("_");
        let quoted: Vec<String> = constraint.iter().map(|c| format!("\"{c}\"")).collect();
        statements.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"uniq_{0}_{suffix}\"
             ON \"{0}\" (isActive, {1});",
            rc.table,
            quoted.join(", ")
        ));
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::property::Property;

    fn cookie() -> RecordClass {
        RecordClass::new("Cookie", "generic")
            .property(Property::string("type"))
            .property(Property::string("delicious").optional())
            .unique(&["accountId", "type"])
    }

    #[test]
    fn register_validates_and_rejects_duplicates() {
        let mut registry = Registry::new();
        registry.register(cookie()).unwrap();

        let err = registry.register(cookie()).unwrap_err();
        assert!(err.to_string().contains("registered twice"));

        let err = registry
            .register(RecordClass::new("Bad", "generic").property(Property::string("id")))
            .unwrap_err();
        assert!(err.to_string().contains("mandatory column"));
    }

    #[test]
    fn family_index_follows_registration_order() {
        let mut registry = Registry::new();
        registry.register(cookie()).unwrap();
        registry
            .register(RecordClass::new("Casserole", "generic").property(Property::string("dish")))
            .unwrap();
        registry
            .register(RecordClass::new("Other", "special").property(Property::string("x")))
            .unwrap();

        assert_eq!(registry.types_in_family("generic"), vec!["Cookie", "Casserole"]);
        assert_eq!(registry.types_in_family("special"), vec!["Other"]);
        assert!(registry.types_in_family("none").is_empty());
    }

    #[test]
    fn ddl_prefixes_unique_indexes_with_is_active() {
        let rc = cookie().validate().unwrap();
        let ddl = ddl_statements(&rc);
        assert_eq!(ddl.len(), 3);
        assert!(ddl[0].contains("CREATE TABLE IF NOT EXISTS \"cookie\""));
        assert!(ddl[0].contains("\"type\" TEXT NOT NULL"));
        assert!(ddl[0].contains("\"delicious\" TEXT"));
        assert!(!ddl[0].contains("\"delicious\" TEXT NOT NULL"));
        assert!(ddl[2].contains("(isActive, \"accountId\", \"type\")"));
    }

    #[test]
    fn ddl_excludes_virtual_properties() {
        let rc = RecordClass::new("Cookie", "generic")
            .property(Property::string("type"))
            .property(Property::string("shout").computed(|_| serde_json::json!("X")))
            .validate()
            .unwrap();
        let ddl = ddl_statements(&rc);
        assert!(!ddl[0].contains("shout"));
    }

    #[test]
    fn handler_map_covers_generated_verbs() {
        let mut registry = Registry::new();
        registry.register(cookie()).unwrap();
        registry
            .register(
                RecordClass::new("Casserole", "generic")
                    .property(Property::string("dish"))
                    .enable_query(),
            )
            .unwrap();

        let handlers = registry.build_handlers();
        assert!(handlers.contains_key("Cookie/get"));
        assert!(handlers.contains_key("Cookie/set"));
        assert!(handlers.contains_key("Cookie/changes"));
        assert!(!handlers.contains_key("Cookie/query"), "query not enabled");
        assert!(handlers.contains_key("Casserole/query"));
        assert!(handlers.contains_key("Casserole/queryChanges"));
    }
}
