// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine: startup-built, immutable once serving.
//!
//! An `Engine` owns the record-class registry, the handler map, the
//! database handle, and the exception sink. All per-request state lives
//! on [`Context`]; an engine may serve any number of requests
//! concurrently, each on its own connection.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use ixion_core::{Call, IxionError, MethodError, Sentence, SentenceCollection};
use ixion_storage::Database;

use crate::context::{CallError, Context};
use crate::dispatcher::{self, CallItem, Handler};
use crate::exception::{LogSink, SharedSink};
use crate::record::class::RecordClass;
use crate::registry::Registry;

/// Per-call access predicate: may this context invoke `method` with
/// these arguments?
pub type AccessCheck = fn(&Context<'_>, &str, &Map<String, Value>) -> bool;

/// Batch rewrite hook: may coalesce calls into multicalls. The default
/// is the identity.
pub type OptimizeCalls = fn(&Context<'_>, Vec<CallItem>) -> Vec<CallItem>;

/// The process-wide engine value.
pub struct Engine {
    registry: Registry,
    database: Database,
    handlers: HashMap<String, Handler>,
    extra_handlers: HashMap<String, Handler>,
    exceptions: SharedSink,
    max_calls_in_request: usize,
    synthesize_client_ids: bool,
    access_check: Option<AccessCheck>,
    optimize_calls: Option<OptimizeCalls>,
}

impl Engine {
    /// Start building an engine over the given database.
    pub fn builder(database: Database) -> EngineBuilder {
        EngineBuilder {
            database,
            classes: Vec::new(),
            extra_handlers: HashMap::new(),
            exceptions: Arc::new(LogSink),
            max_calls_in_request: 5000,
            synthesize_client_ids: false,
            access_check: None,
            optimize_calls: None,
        }
    }

    /// The record-class registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The exception sink.
    pub fn exceptions(&self) -> &dyn crate::exception::ExceptionSink {
        self.exceptions.as_ref()
    }

    /// Whether calls without a client id get a synthesised one.
    pub fn synthesize_client_ids(&self) -> bool {
        self.synthesize_client_ids
    }

    pub(crate) fn access_check(&self) -> Option<AccessCheck> {
        self.access_check
    }

    /// Handler lookup: processor-level overrides first, then the
    /// record-class-generated map.
    pub fn handler(&self, method: &str) -> Option<Handler> {
        self.extra_handlers
            .get(method)
            .or_else(|| self.handlers.get(method))
            .cloned()
    }

    /// Build a fresh request context on its own connection.
    pub fn context(&self, account_id: &str, is_system: bool) -> Result<Context<'_>, IxionError> {
        let conn = self.database.connect()?;
        Ok(Context::new(self, conn, account_id, is_system))
    }

    /// Process one request for `account_id` without system privileges.
    pub fn execute(
        &self,
        account_id: &str,
        calls: Vec<Call>,
    ) -> Result<SentenceCollection, IxionError> {
        self.execute_as(account_id, false, calls)
    }

    /// Process one request: pre-flight checks, the dispatch loop inside
    /// the top-level transaction, then deferred postprocess hooks.
    pub fn execute_as(
        &self,
        account_id: &str,
        is_system: bool,
        calls: Vec<Call>,
    ) -> Result<SentenceCollection, IxionError> {
        let mut ctx = self.context(account_id, is_system)?;

        if calls.len() > self.max_calls_in_request {
            let err = MethodError::new("tooManyMethods").describe(format!(
                "batch of {} calls exceeds the limit of {}",
                calls.len(),
                self.max_calls_in_request
            ));
            ctx.push_sentence(Sentence::error(&err, ""));
            return Ok(ctx.into_sentences());
        }

        let mut items: Vec<CallItem> = calls.into_iter().map(CallItem::from).collect();
        if let Some(optimize) = self.optimize_calls {
            items = optimize(&ctx, items);
        }

        let outcome = ctx.txn_do(|ctx| dispatcher::dispatch(ctx, items));
        match outcome {
            Ok(()) => {
                for (hook, row) in ctx.take_postprocess() {
                    hook(&row);
                }
                debug!(
                    account_id,
                    sentences = ctx.sentences().len(),
                    "request complete"
                );
                Ok(ctx.into_sentences())
            }
            Err(CallError::Internal(err)) => Err(err),
            // The dispatcher converts method errors to sentences; one
            // reaching here is a bug worth failing loudly over.
            Err(CallError::Method(err)) => Err(IxionError::Internal(format!(
                "method error escaped the dispatcher: {err}"
            ))),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("handlers", &self.handlers.len())
            .field("max_calls_in_request", &self.max_calls_in_request)
            .field("synthesize_client_ids", &self.synthesize_client_ids)
            .finish()
    }
}

/// Builder for [`Engine`]. Registration and schema deployment happen in
/// [`EngineBuilder::build`], so declaration errors surface at startup.
pub struct EngineBuilder {
    database: Database,
    classes: Vec<RecordClass>,
    extra_handlers: HashMap<String, Handler>,
    exceptions: SharedSink,
    max_calls_in_request: usize,
    synthesize_client_ids: bool,
    access_check: Option<AccessCheck>,
    optimize_calls: Option<OptimizeCalls>,
}

impl EngineBuilder {
    /// Register a record class.
    pub fn record_class(mut self, class: RecordClass) -> Self {
        self.classes.push(class);
        self
    }

    /// Register a processor-level handler, consulted before the
    /// generated map.
    pub fn handler(mut self, method: impl Into<String>, handler: Handler) -> Self {
        self.extra_handlers.insert(method.into(), handler);
        self
    }

    /// Replace the exception sink.
    pub fn exception_sink(mut self, sink: SharedSink) -> Self {
        self.exceptions = sink;
        self
    }

    /// Cap the number of calls accepted per request.
    pub fn max_calls_in_request(mut self, max: usize) -> Self {
        self.max_calls_in_request = max;
        self
    }

    /// Synthesise client ids for triples that omit one.
    pub fn synthesize_client_ids(mut self, enabled: bool) -> Self {
        self.synthesize_client_ids = enabled;
        self
    }

    /// Install the per-call access predicate.
    pub fn access_check(mut self, check: AccessCheck) -> Self {
        self.access_check = Some(check);
        self
    }

    /// Install the batch rewrite hook.
    pub fn optimize_calls(mut self, optimize: OptimizeCalls) -> Self {
        self.optimize_calls = Some(optimize);
        self
    }

    /// Validate every class, deploy the schema, and build the handler
    /// map.
    pub fn build(self) -> Result<Engine, IxionError> {
        let mut registry = Registry::new();
        for class in self.classes {
            registry.register(class)?;
        }

        let conn = self.database.connect()?;
        registry.deploy_schema(&conn)?;
        drop(conn);

        let handlers = registry.build_handlers();
        debug!(handlers = handlers.len(), "engine handler map built");

        Ok(Engine {
            registry,
            database: self.database,
            handlers,
            extra_handlers: self.extra_handlers,
            exceptions: self.exceptions,
            max_calls_in_request: self.max_calls_in_request,
            synthesize_client_ids: self.synthesize_client_ids,
            access_check: self.access_check,
            optimize_calls: self.optimize_calls,
        })
    }
}
