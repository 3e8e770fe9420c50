// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-request context.
//!
//! One `Context` lives for one request: it owns the request's database
//! connection, the sentence collection, the creation-id table, the
//! exception-guid list, the call-info timing log, the deferred
//! postprocess queue, and the account-state session. Transactional
//! scoping happens through [`Context::txn_do`]: depth 0 opens the
//! top-level transaction, deeper levels are named savepoints.

use std::collections::HashMap;
use std::time::Duration;

use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::debug;

use ixion_core::{IxionError, MethodError, Sentence, SentenceCollection};
use ixion_storage::{map_db_err, AccountState};

use crate::engine::Engine;
use crate::record::hooks::PostprocessHook;
use crate::record::row::Row;

/// Failure of one method call.
///
/// `Method` becomes an `error` sentence; `Internal` is reported through
/// the exception sink and surfaces as `internalError` (or `tryAgain` for
/// write contention). The dispatcher's per-call loop is the single place
/// these are caught.
#[derive(Debug)]
pub enum CallError {
    /// A client-visible method error.
    Method(MethodError),
    /// A server-side failure.
    Internal(IxionError),
}

impl From<MethodError> for CallError {
    fn from(err: MethodError) -> Self {
        CallError::Method(err)
    }
}

impl From<IxionError> for CallError {
    fn from(err: IxionError) -> Self {
        CallError::Internal(err)
    }
}

/// One creation-id table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationEntry {
    /// The server-assigned id of the created record.
    Id(String),
    /// The creation id was logged more than once this request.
    Duplicate,
}

/// Accumulated timing for one method name.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallInfo {
    /// Number of calls dispatched under this name.
    pub count: u64,
    /// Total handler time.
    pub elapsed: Duration,
}

/// Per-request mutable state. See the module docs.
pub struct Context<'e> {
    engine: &'e Engine,
    conn: Connection,
    account_id: String,
    is_system: bool,
    results: SentenceCollection,
    creation_ids: HashMap<(String, String), CreationEntry>,
    exception_guids: Vec<String>,
    call_info: HashMap<String, CallInfo>,
    postprocess: Vec<(PostprocessHook, Row)>,
    txn_depth: usize,
    account_state: Option<AccountState>,
}

impl<'e> Context<'e> {
    /// Build a context for one request.
    pub fn new(engine: &'e Engine, conn: Connection, account_id: &str, is_system: bool) -> Self {
        Self {
            engine,
            conn,
            account_id: account_id.to_string(),
            is_system,
            results: SentenceCollection::new(),
            creation_ids: HashMap::new(),
            exception_guids: Vec::new(),
            call_info: HashMap::new(),
            postprocess: Vec::new(),
            txn_depth: 0,
            account_state: None,
        }
    }

    /// The engine serving this request.
    pub fn engine(&self) -> &Engine {
        self.engine
    }

    /// The request's exclusive connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// The account this request operates on.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Whether the caller holds system privileges.
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Whether the caller may invoke `method` with `args`.
    pub fn may_call(&self, method: &str, args: &Map<String, Value>) -> bool {
        match self.engine.access_check() {
            Some(check) => check(self, method, args),
            None => true,
        }
    }

    // --- Sentence collection ---

    /// The sentences accumulated so far.
    pub fn sentences(&self) -> &SentenceCollection {
        &self.results
    }

    /// Append one sentence.
    pub fn push_sentence(&mut self, sentence: Sentence) {
        self.results.push(sentence);
    }

    /// Consume the context, yielding the response.
    pub fn into_sentences(self) -> SentenceCollection {
        self.results
    }

    // --- Creation-id table ---

    /// Log a successful creation. A second log of the same creation id
    /// flips the entry to the duplicate sentinel.
    pub fn log_creation_id(&mut self, type_key: &str, creation_id: &str, id: &str) {
        let key = (type_key.to_string(), creation_id.to_string());
        match self.creation_ids.get(&key) {
            Some(_) => {
                debug!(type_key, creation_id, "creation id logged twice; marking duplicate");
                self.creation_ids.insert(key, CreationEntry::Duplicate);
            }
            None => {
                self.creation_ids
                    .insert(key, CreationEntry::Id(id.to_string()));
            }
        }
    }

    /// Resolve an id that may be a `#creationId` reference.
    ///
    /// Plain ids pass through. References resolve via the creation-id
    /// table; a duplicate entry fails with `duplicateCreationId`, an
    /// unknown one with `invalidArguments`.
    pub fn resolve_id_ref(&self, type_key: &str, raw: &str) -> Result<String, MethodError> {
        let Some(creation_id) = raw.strip_prefix('#') else {
            return Ok(raw.to_string());
        };
        let key = (type_key.to_string(), creation_id.to_string());
        match self.creation_ids.get(&key) {
            Some(CreationEntry::Id(id)) => Ok(id.clone()),
            Some(CreationEntry::Duplicate) => {
                Err(MethodError::duplicate_creation_id(creation_id))
            }
            None => Err(MethodError::invalid_arguments(format!(
                "unknown creation id #{creation_id}"
            ))),
        }
    }

    // --- Exception guids ---

    /// Record the guid of a filed exception report.
    pub fn note_exception(&mut self, guid: String) {
        self.exception_guids.push(guid);
    }

    /// Guids of every report filed during this request.
    pub fn exception_guids(&self) -> &[String] {
        &self.exception_guids
    }

    // --- Call-info log ---

    /// Record one dispatched call under its method name or call ident.
    pub fn record_call(&mut self, ident: &str, elapsed: Duration) {
        let info = self.call_info.entry(ident.to_string()).or_default();
        info.count += 1;
        info.elapsed += elapsed;
    }

    /// The accumulated timing log.
    pub fn call_info(&self) -> &HashMap<String, CallInfo> {
        &self.call_info
    }

    // --- Postprocess queue ---

    /// Defer an after-commit hook.
    pub fn defer_postprocess(&mut self, hook: PostprocessHook, row: Row) {
        self.postprocess.push((hook, row));
    }

    /// Drain the deferred hooks; called by the engine after commit.
    pub(crate) fn take_postprocess(&mut self) -> Vec<(PostprocessHook, Row)> {
        std::mem::take(&mut self.postprocess)
    }

    // --- Account state ---

    /// The account-state session, loaded lazily on first access. Only
    /// valid inside a transaction.
    pub fn state(&mut self) -> Result<&mut AccountState, CallError> {
        if self.txn_depth == 0 {
            return Err(CallError::Internal(IxionError::Transaction(
                "account state accessed outside a transaction".into(),
            )));
        }
        let conn = &self.conn;
        let account_id = &self.account_id;
        match &mut self.account_state {
            Some(state) => Ok(state),
            slot @ None => {
                let loaded = AccountState::load(conn, account_id)?;
                Ok(slot.insert(loaded))
            }
        }
    }

    /// Current transaction depth (0 = none open).
    pub fn txn_depth(&self) -> usize {
        self.txn_depth
    }

    /// Run `work` inside a transaction scope.
    ///
    /// Depth 0 opens the top-level transaction (`BEGIN IMMEDIATE`) and,
    /// on success, flushes staged state bumps and commits. Deeper levels
    /// run inside a named savepoint; the account-state pending map is
    /// localised across the scope — folded into the outer map on
    /// success, discarded with the savepoint on failure.
    pub fn txn_do<T>(
        &mut self,
        work: impl FnOnce(&mut Self) -> Result<T, CallError>,
    ) -> Result<T, CallError> {
        let depth = self.txn_depth;
        if depth == 0 {
            if self.account_state.is_some() {
                return Err(CallError::Internal(IxionError::Transaction(
                    "state session already open before top-level transaction".into(),
                )));
            }
            self.conn
                .execute_batch("BEGIN IMMEDIATE")
                .map_err(map_db_err)?;
        } else {
            self.conn
                .execute_batch(&format!("SAVEPOINT ixn_{depth}"))
                .map_err(map_db_err)?;
        }

        let had_session = self.account_state.is_some();
        let snapshot = self.account_state.as_ref().map(AccountState::pending_snapshot);

        self.txn_depth += 1;
        let outcome = work(self);
        self.txn_depth -= 1;

        match outcome {
            Ok(value) => {
                if depth == 0 {
                    let conn = &self.conn;
                    if let Some(state) = self.account_state.as_mut() {
                        if let Err(err) = state.commit(conn) {
                            let _ = self.conn.execute_batch("ROLLBACK");
                            self.account_state = None;
                            return Err(CallError::Internal(err));
                        }
                    }
                    self.conn.execute_batch("COMMIT").map_err(map_db_err)?;
                } else {
                    self.conn
                        .execute_batch(&format!("RELEASE SAVEPOINT ixn_{depth}"))
                        .map_err(map_db_err)?;
                }
                Ok(value)
            }
            Err(err) => {
                if depth == 0 {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    self.account_state = None;
                } else {
                    let _ = self.conn.execute_batch(&format!(
                        "ROLLBACK TO SAVEPOINT ixn_{depth}; RELEASE SAVEPOINT ixn_{depth}"
                    ));
                    if had_session {
                        if let (Some(state), Some(snapshot)) =
                            (self.account_state.as_mut(), snapshot)
                        {
                            state.restore_pending(snapshot);
                        }
                    } else {
                        // The session was created inside the failed scope.
                        self.account_state = None;
                    }
                }
                Err(err)
            }
        }
    }
}
