// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record class declarations.
//!
//! A record class describes one entity table: its type key, account
//! family, properties, unique constraints, query maps, hook chain, and
//! any hand-written published methods. The registry turns each class
//! into generated `/get` `/set` `/changes` (and optionally `/query`,
//! `/queryChanges`) handlers at startup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use ixion_core::{IxionError, MethodError};

use crate::dispatcher::Handler;
use crate::record::hooks::Hooks;
use crate::record::property::{Property, MANDATORY_COLUMNS};
use crate::record::row::Row;
use crate::record::store;

/// A SQL condition fragment plus its bound parameters.
#[derive(Debug, Clone)]
pub struct FilterCond {
    /// Condition text with `?` placeholders.
    pub sql: String,
    /// Parameters bound in order.
    pub params: Vec<rusqlite::types::Value>,
}

/// Builds a SQL condition from one filter argument value.
pub type CondBuilder =
    Arc<dyn Fn(&Value) -> Result<FilterCond, MethodError> + Send + Sync>;

/// Decides whether a row matches one filter argument value; used by
/// `/queryChanges` to classify changed rows.
pub type DifferFn = Arc<dyn Fn(&Row, &Value) -> bool + Send + Sync>;

/// One declared query filter.
#[derive(Clone)]
pub struct QueryFilter {
    /// SQL condition builder.
    pub cond: CondBuilder,
    /// Row-level matcher, when the filter supports diffing.
    pub differ: Option<DifferFn>,
}

/// Query support declared by a record class.
#[derive(Clone, Default)]
pub struct QueryConfig {
    /// Filter name to condition builder.
    pub filters: HashMap<String, QueryFilter>,
    /// Sort property name to SQL expression.
    pub sorts: HashMap<String, String>,
    /// Extra JOIN clause appended after the table name.
    pub joins: Option<String>,
}

/// Custom state-string encoding. The default is the decimal modseq.
#[derive(Debug, Clone, Copy)]
pub struct StateCodec {
    /// Render a modseq as the client-visible state string.
    pub encode: fn(u64) -> String,
    /// Parse a client state string back to a modseq; `None` is bogus.
    pub decode: fn(&str) -> Option<u64>,
}

/// Declarative description of one entity table plus its hooks.
pub struct RecordClass {
    /// JMAP type name, e.g. `Cookie`.
    pub type_key: String,
    /// Entity table name (defaults to the lowercased type key).
    pub table: String,
    /// Logical account family sharing state rows.
    pub account_type: String,
    /// Creating a record of this class provisions an account.
    pub is_account_base: bool,
    /// Declared properties.
    pub properties: Vec<Property>,
    /// Unique constraints over declared columns; the engine rewrites
    /// each to lead with `isActive` when generating indexes.
    pub unique_constraints: Vec<Vec<String>>,
    /// Extra argument names `/get` accepts for hook use.
    pub extra_get_args: Vec<String>,
    /// Properties returned when a `/get` names none.
    pub default_properties: Option<Vec<String>>,
    /// Whether `/query` and `/queryChanges` are generated.
    pub query_enabled: bool,
    /// Filter/sort maps; defaults are derived from the properties when
    /// queries are enabled and no map is declared.
    pub query: QueryConfig,
    /// Custom state-string encoding, when the class overrides the
    /// default decimal form.
    pub state_codec: Option<StateCodec>,
    /// The `/set` hook chain.
    pub hooks: Hooks,
    /// Hand-written methods registered verbatim.
    pub published_methods: Vec<(String, Handler)>,
}

impl std::fmt::Debug for RecordClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordClass")
            .field("type_key", &self.type_key)
            .field("table", &self.table)
            .field("account_type", &self.account_type)
            .field("is_account_base", &self.is_account_base)
            .field("properties", &self.properties.len())
            .field("query_enabled", &self.query_enabled)
            .finish()
    }
}

impl RecordClass {
    /// Start a declaration for the given type key and account family.
    pub fn new(type_key: impl Into<String>, account_type: impl Into<String>) -> Self {
        let type_key = type_key.into();
        let table = type_key.to_lowercase();
        Self {
            type_key,
            table,
            account_type: account_type.into(),
            is_account_base: false,
            properties: Vec::new(),
            unique_constraints: Vec::new(),
            extra_get_args: Vec::new(),
            default_properties: None,
            query_enabled: false,
            query: QueryConfig::default(),
            state_codec: None,
            hooks: Hooks::default(),
            published_methods: Vec::new(),
        }
    }

    /// Override the entity table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Mark this class as account-creating.
    pub fn account_base(mut self) -> Self {
        self.is_account_base = true;
        self
    }

    /// Declare one property.
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare a unique constraint over declared column names.
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique_constraints
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Whitelist an extra `/get` argument name.
    pub fn extra_get_arg(mut self, name: impl Into<String>) -> Self {
        self.extra_get_args.push(name.into());
        self
    }

    /// Restrict the default `/get` property set.
    pub fn default_properties(mut self, names: &[&str]) -> Self {
        self.default_properties = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Enable `/query` and `/queryChanges` generation.
    pub fn enable_query(mut self) -> Self {
        self.query_enabled = true;
        self
    }

    /// Declare (or override) one query filter.
    pub fn filter(
        mut self,
        name: impl Into<String>,
        cond: CondBuilder,
        differ: Option<DifferFn>,
    ) -> Self {
        self.query
            .filters
            .insert(name.into(), QueryFilter { cond, differ });
        self
    }

    /// Declare (or override) one sort expression.
    pub fn sort(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.query.sorts.insert(name.into(), expression.into());
        self
    }

    /// Append a JOIN clause to generated queries.
    pub fn joins(mut self, joins: impl Into<String>) -> Self {
        self.query.joins = Some(joins.into());
        self
    }

    /// Override the state-string encoding.
    pub fn state_codec(mut self, codec: StateCodec) -> Self {
        self.state_codec = Some(codec);
        self
    }

    /// Install the hook chain.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register a hand-written method verbatim.
    pub fn publish(mut self, method: impl Into<String>, handler: Handler) -> Self {
        self.published_methods.push((method.into(), handler));
        self
    }

    /// Declared properties that are persisted as columns.
    pub fn concrete_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !p.is_virtual)
    }

    /// Look up a declared property by name.
    pub fn property_named(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Render a modseq as this class's state string.
    pub fn encode_state(&self, seq: u64) -> String {
        match &self.state_codec {
            Some(codec) => (codec.encode)(seq),
            None => seq.to_string(),
        }
    }

    /// Parse a client state string back to a modseq.
    pub fn decode_state(&self, state: &str) -> Option<u64> {
        match &self.state_codec {
            Some(codec) => (codec.decode)(state),
            None => state.parse().ok(),
        }
    }

    /// The property names `/get` returns when the client names none.
    pub fn get_default_property_names(&self) -> Vec<String> {
        match &self.default_properties {
            Some(names) => names.clone(),
            None => self.properties.iter().map(|p| p.name.clone()).collect(),
        }
    }

    /// Validate the declaration and derive default filter/sort maps.
    ///
    /// Called by the registry on registration; an invalid class never
    /// reaches the handler map.
    pub fn validate(mut self) -> Result<Self, IxionError> {
        let invalid = |message: String| IxionError::Schema {
            type_key: self.type_key.clone(),
            message,
        };

        let mut seen = std::collections::HashSet::new();
        for property in &self.properties {
            if MANDATORY_COLUMNS.contains(&property.name.as_str()) {
                return Err(invalid(format!(
                    "property `{}` shadows a mandatory column",
                    property.name
                )));
            }
            if !seen.insert(property.name.clone()) {
                return Err(invalid(format!("duplicate property `{}`", property.name)));
            }
            if property.is_virtual && property.compute.is_none() {
                return Err(invalid(format!(
                    "virtual property `{}` has no compute function",
                    property.name
                )));
            }
        }

        for constraint in &self.unique_constraints {
            if constraint.is_empty() {
                return Err(invalid("empty unique constraint".into()));
            }
            for column in constraint {
                if column == "isActive" {
                    return Err(invalid(
                        "unique constraints must not name isActive; it is prefixed automatically"
                            .into(),
                    ));
                }
                let is_mandatory = MANDATORY_COLUMNS.contains(&column.as_str());
                let is_concrete = self
                    .property_named(column)
                    .map(|p| !p.is_virtual)
                    .unwrap_or(false);
                if !is_mandatory && !is_concrete {
                    return Err(invalid(format!(
                        "unique constraint names unknown column `{column}`"
                    )));
                }
            }
        }

        if let Some(defaults) = &self.default_properties {
            for name in defaults {
                if self.property_named(name).is_none() {
                    return Err(invalid(format!(
                        "default_properties names unknown property `{name}`"
                    )));
                }
            }
        }

        if self.query_enabled {
            self.derive_default_query_maps();
        }

        Ok(self)
    }

    /// Equality filters and plain-column sorts for every concrete
    /// property that has no declared entry.
    fn derive_default_query_maps(&mut self) {
        let concrete: Vec<Property> = self.concrete_properties().cloned().collect();
        for property in concrete {
            let name = property.name.clone();
            if !self.query.filters.contains_key(&name) {
                let cond_property = property.clone();
                let cond: CondBuilder = Arc::new(move |value: &Value| {
                    let param = store::sql_param(&cond_property, value)?;
                    Ok(FilterCond {
                        sql: format!("\"{}\" = ?", cond_property.name),
                        params: vec![param],
                    })
                });
                let differ_name = name.clone();
                let differ: DifferFn =
                    Arc::new(move |row: &Row, value: &Value| row.property(&differ_name) == value);
                self.query
                    .filters
                    .insert(name.clone(), QueryFilter { cond, differ: Some(differ) });
            }
            if !self.query.sorts.contains_key(&name) {
                self.query.sorts.insert(name.clone(), format!("\"{name}\""));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixion_core::validators;

    fn cookie() -> RecordClass {
        RecordClass::new("Cookie", "generic")
            .property(Property::string("type").validator(validators::nonempty_string()))
            .property(Property::string("delicious").optional())
    }

    #[test]
    fn table_name_defaults_to_lowercased_type_key() {
        assert_eq!(cookie().table, "cookie");
        assert_eq!(
            RecordClass::new("Cookie", "generic").table("cookie_jar").table,
            "cookie_jar"
        );
    }

    #[test]
    fn validate_accepts_a_sane_class() {
        let rc = cookie().unique(&["accountId", "type"]).validate().unwrap();
        assert_eq!(rc.type_key, "Cookie");
        assert_eq!(rc.unique_constraints, vec![vec!["accountId", "type"]]);
    }

    #[test]
    fn validate_rejects_mandatory_column_shadowing() {
        let err = cookie()
            .property(Property::string("modSeqCreated"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("shadows a mandatory column"));
    }

    #[test]
    fn validate_rejects_duplicate_properties() {
        let err = cookie()
            .property(Property::string("type"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate property"));
    }

    #[test]
    fn validate_rejects_unknown_unique_columns() {
        let err = cookie().unique(&["nope"]).validate().unwrap_err();
        assert!(err.to_string().contains("unknown column `nope`"));
    }

    #[test]
    fn validate_rejects_explicit_is_active_in_constraints() {
        let err = cookie().unique(&["isActive", "type"]).validate().unwrap_err();
        assert!(err.to_string().contains("prefixed automatically"));
    }

    #[test]
    fn query_defaults_cover_every_concrete_property() {
        let rc = cookie().enable_query().validate().unwrap();
        assert!(rc.query.filters.contains_key("type"));
        assert!(rc.query.filters.contains_key("delicious"));
        assert!(rc.query.sorts.contains_key("type"));

        // Declared entries are kept over defaults.
        let custom: CondBuilder = Arc::new(|_| {
            Ok(FilterCond {
                sql: "1 = 1".into(),
                params: vec![],
            })
        });
        let rc = cookie()
            .enable_query()
            .filter("type", custom, None)
            .validate()
            .unwrap();
        let filter = &rc.query.filters["type"];
        assert!(filter.differ.is_none(), "declared filter must win over default");
    }

    #[test]
    fn state_codec_overrides_the_decimal_encoding() {
        let rc = cookie().validate().unwrap();
        assert_eq!(rc.encode_state(7), "7");
        assert_eq!(rc.decode_state("7"), Some(7));
        assert_eq!(rc.decode_state("x7"), None);

        let rc = cookie()
            .state_codec(StateCodec {
                encode: |seq| format!("v{seq}"),
                decode: |s| s.strip_prefix('v').and_then(|rest| rest.parse().ok()),
            })
            .validate()
            .unwrap();
        assert_eq!(rc.encode_state(7), "v7");
        assert_eq!(rc.decode_state("v7"), Some(7));
        assert_eq!(rc.decode_state("7"), None);
    }

    #[test]
    fn default_property_names_fall_back_to_all_declared() {
        let rc = cookie().validate().unwrap();
        assert_eq!(rc.get_default_property_names(), vec!["type", "delicious"]);

        let rc = cookie().default_properties(&["type"]).validate().unwrap();
        assert_eq!(rc.get_default_property_names(), vec!["type"]);
    }
}
