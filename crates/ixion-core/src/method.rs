// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Method result and method error envelopes.
//!
//! A handler produces one or more [`MethodResult`]s; failures it wants the
//! client to see are [`MethodError`]s. Both end up as sentences in the
//! response — a `MethodError` is serialized under the reserved name
//! `error` with its kind in the `type` field, per RFC 8620 §3.6.2.

use serde_json::{Map, Value};

/// Reserved sentence name for error responses.
pub const ERROR_NAME: &str = "error";

/// A successful method response: a response name plus an arguments object.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
    /// Response name, normally the invoked method name.
    pub name: String,
    /// Response arguments.
    pub arguments: Map<String, Value>,
}

impl MethodResult {
    /// Create a result with an empty arguments object.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
        }
    }

    /// Create a result from a prebuilt arguments object.
    pub fn with_arguments(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Set one argument, consuming and returning self for chaining.
    pub fn arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }
}

/// A client-visible method-level error.
///
/// Carries a JMAP error `type` plus any extra properties (description,
/// `invalidProperties` map, correlation guid). Check hooks and resultset
/// operators return these; the dispatcher turns them into `error`
/// sentences.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodError {
    /// The JMAP error type identifier, e.g. `unknownMethod`.
    pub kind: String,
    /// Additional error properties merged into the error arguments.
    pub properties: Map<String, Value>,
}

impl MethodError {
    /// Create an error of the given kind with no extra properties.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: Map::new(),
        }
    }

    /// Attach an extra property, consuming and returning self.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Attach a human-readable `description` property.
    pub fn describe(self, description: impl Into<String>) -> Self {
        self.with("description", Value::String(description.into()))
    }

    /// The full error arguments object: `type` plus extra properties.
    pub fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("type".into(), Value::String(self.kind.clone()));
        for (k, v) in &self.properties {
            args.insert(k.clone(), v.clone());
        }
        args
    }

    // --- Dispatcher errors ---

    /// The requested method is not registered.
    pub fn unknown_method() -> Self {
        Self::new("unknownMethod")
    }

    /// The context's access predicate rejected the call.
    pub fn forbidden() -> Self {
        Self::new("forbidden")
    }

    /// A back-reference could not be resolved.
    pub fn result_reference(description: impl Into<String>) -> Self {
        Self::new("resultReference").describe(description)
    }

    /// A creation id was logged more than once in this request.
    pub fn duplicate_creation_id(creation_id: &str) -> Self {
        Self::new("duplicateCreationId")
            .describe(format!("creation id #{creation_id} used more than once"))
    }

    // --- State errors ---

    /// The client's `sinceState` predates retained history.
    pub fn cannot_calculate_changes() -> Self {
        Self::new("cannotCalculateChanges")
    }

    /// An `ifInState` precondition did not match the current state.
    pub fn state_mismatch() -> Self {
        Self::new("stateMismatch")
    }

    /// Another client holds the state row; the request may be retried.
    pub fn try_again() -> Self {
        Self::new("tryAgain").describe("blocked by another client")
    }

    // --- Per-record errors ---

    /// One or more supplied properties are invalid.
    ///
    /// `invalid` maps property name to a description of what is wrong.
    pub fn invalid_properties(invalid: Map<String, Value>) -> Self {
        Self::new("invalidProperties").with("invalidProperties", Value::Object(invalid))
    }

    /// One or more call arguments are invalid.
    pub fn invalid_arguments(description: impl Into<String>) -> Self {
        Self::new("invalidArguments").describe(description)
    }

    /// A record referenced by id does not exist (or is destroyed).
    pub fn not_found() -> Self {
        Self::new("notFound")
    }

    /// A `/query` anchor id was not present in the result list.
    pub fn anchor_not_found() -> Self {
        Self::new("anchorNotFound")
    }

    /// A `/queryChanges` diff exceeds the client's `maxChanges`.
    pub fn too_many_changes() -> Self {
        Self::new("tooManyChanges")
    }

    // --- Internal ---

    /// An internal failure; the guid correlates to an exception report.
    /// No other details are exposed to the client.
    pub fn internal(guid: impl Into<String>) -> Self {
        Self::new("internalError").with("guid", Value::String(guid.into()))
    }
}

impl std::fmt::Display for MethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.properties.get("description").and_then(Value::as_str) {
            Some(desc) => write!(f, "{}: {desc}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}
