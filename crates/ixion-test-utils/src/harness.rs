// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete engine over a temp SQLite database
//! with a ready-made `Cookie` record class (hooks, defaults, a unique
//! constraint) and a query-enabled `Casserole` class. `submit()` drives
//! the full dispatcher pipeline with raw call triples.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use ixion_core::{parse_call_list, validators, MethodError};
use ixion_engine::{Context, Engine, Hooks, Property, RecordClass, Row};
use ixion_storage::Database;

fn shout(row: &Row) -> Value {
    json!(row.property("type").as_str().unwrap_or("").to_uppercase())
}

fn reject_forbidden_flavor(
    _ctx: &mut Context<'_>,
    record: &mut Map<String, Value>,
) -> Result<(), MethodError> {
    if record.get("type").and_then(Value::as_str) == Some("forbidden") {
        return Err(
            MethodError::new("forbiddenFlavor").describe("that flavor is not allowed")
        );
    }
    Ok(())
}

/// The harness's standard `Cookie` record class.
pub fn cookie_class() -> RecordClass {
    RecordClass::new("Cookie", "generic")
        .property(
            Property::string("type")
                .immutable()
                .validator(validators::nonempty_string()),
        )
        .property(Property::string("delicious").optional())
        .property(
            Property::string("batch")
                .optional()
                .default_value(json!("unbatched")),
        )
        .property(Property::string("shoutedType").computed(shout))
        .unique(&["accountId", "type"])
        .hooks(Hooks {
            create_check: Some(reject_forbidden_flavor),
            ..Default::default()
        })
}

/// The harness's query-enabled `Casserole` record class.
pub fn casserole_class() -> RecordClass {
    RecordClass::new("Casserole", "generic")
        .property(Property::string("dish"))
        .property(Property::integer("servings").optional())
        .enable_query()
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    account_id: String,
    is_system: bool,
    extra_classes: Vec<RecordClass>,
    synthesize_client_ids: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            account_id: "acct-test".to_string(),
            is_system: false,
            extra_classes: Vec::new(),
            synthesize_client_ids: false,
        }
    }

    /// Use a specific account id instead of the default.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Run requests with system privileges.
    pub fn as_system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// Register an additional record class.
    pub fn with_record_class(mut self, class: RecordClass) -> Self {
        self.extra_classes.push(class);
        self
    }

    /// Enable client-id synthesis on the engine.
    pub fn with_synthesized_client_ids(mut self) -> Self {
        self.synthesize_client_ids = true;
        self
    }

    /// Build the harness, creating the temp database and engine.
    pub fn build(self) -> Result<TestHarness, ixion_core::IxionError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| {
            ixion_core::IxionError::Storage { source: e.into() }
        })?;
        let db = Database::open(temp_dir.path().join("harness.db"), true)?;

        let mut builder = Engine::builder(db)
            .record_class(cookie_class())
            .record_class(casserole_class())
            .synthesize_client_ids(self.synthesize_client_ids);
        for class in self.extra_classes {
            builder = builder.record_class(class);
        }
        let engine = builder.build()?;

        Ok(TestHarness {
            engine: Arc::new(engine),
            account_id: self.account_id,
            is_system: self.is_system,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment: engine plus temp storage.
pub struct TestHarness {
    /// The engine under test.
    pub engine: Arc<Engine>,
    /// Account requests run under.
    pub account_id: String,
    /// Whether requests run with system privileges.
    pub is_system: bool,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run one request of raw call triples; returns the response triples.
    ///
    /// Panics on malformed input or request-level failure — tests should
    /// construct valid batches and assert on sentences.
    pub fn submit(&self, calls: Value) -> Value {
        let calls = parse_call_list(&calls).expect("test call list must parse");
        self.engine
            .execute_as(&self.account_id, self.is_system, calls)
            .expect("request-level failure")
            .to_triples()
    }

    /// Pull a created record's id out of a `/set` response triple.
    pub fn created_id(triple: &Value, creation_id: &str) -> String {
        triple[1]["created"][creation_id]["id"]
            .as_str()
            .unwrap_or_else(|| panic!("no created id for {creation_id} in {triple}"))
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_a_working_environment() {
        let harness = TestHarness::builder().build().unwrap();
        let response = harness.submit(json!([["Cookie/get", {}, "a"]]));
        assert_eq!(response[0][0], json!("Cookie/get"));
        assert_eq!(response[0][1]["list"], json!([]));
    }

    #[test]
    fn harnesses_are_isolated() {
        let h1 = TestHarness::builder().build().unwrap();
        let h2 = TestHarness::builder().build().unwrap();

        h1.submit(json!([["Cookie/set", {"create": {"c1": {"type": "only-h1"}}}, "a"]]));

        let r1 = h1.submit(json!([["Cookie/get", {}, "g"]]));
        let r2 = h2.submit(json!([["Cookie/get", {}, "g"]]));
        assert_eq!(r1[0][1]["list"].as_array().unwrap().len(), 1);
        assert_eq!(r2[0][1]["list"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn extra_record_classes_register() {
        let harness = TestHarness::builder()
            .with_record_class(
                RecordClass::new("Widget", "generic").property(Property::string("name")),
            )
            .build()
            .unwrap();

        let response = harness.submit(json!([
            ["Widget/set", {"create": {"w1": {"name": "gear"}}}, "a"]
        ]));
        assert!(response[0][1]["created"].as_object().unwrap().contains_key("w1"));
    }
}
