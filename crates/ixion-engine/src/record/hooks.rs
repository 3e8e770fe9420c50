// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `/set` hook chain.
//!
//! Hooks are a fixed-shape record of optional function pointers; record
//! classes fill in the phases they care about. Check hooks run inside the
//! record's savepoint and abort it by returning a [`MethodError`];
//! postprocess hooks run after the top-level transaction commits and must
//! only perform external side effects.

use serde_json::{Map, Value};

use ixion_core::MethodError;

use crate::context::Context;
use crate::ops::set::SetRequest;
use crate::record::row::{Row, RowDiff};

/// Whole-batch validation before any record is touched. An error
/// short-circuits the entire `/set` call.
pub type SetCheckHook = fn(&mut Context<'_>, &SetRequest) -> Result<(), MethodError>;

/// Authorise/validate one creation. Receives the prepared property map
/// (defaults applied, validators already passed) and may mutate it.
pub type CreateCheckHook =
    fn(&mut Context<'_>, &mut Map<String, Value>) -> Result<(), MethodError>;

/// Outcome of the on-create-error hook.
pub enum CreateErrorOutcome {
    /// Keep the (possibly rewritten) error; the record lands in `notCreated`.
    Keep(MethodError),
    /// Suppress the error and report this row as created.
    Replace(Row),
}

/// Inspect a failed creation; may suppress or rewrite the error.
pub type CreateErrorHook = fn(&mut Context<'_>, MethodError) -> CreateErrorOutcome;

/// In-transaction side effects after a row is persisted or destroyed.
pub type RowHook = fn(&mut Context<'_>, &Row) -> Result<(), MethodError>;

/// Authorise/validate one update against the loaded row and the prepared
/// changes.
pub type UpdateCheckHook =
    fn(&mut Context<'_>, &Row, &Map<String, Value>) -> Result<(), MethodError>;

/// In-transaction side effects after an update, with old and new values.
/// Only invoked when defined.
pub type UpdatedHook = fn(&mut Context<'_>, &Row, &RowDiff) -> Result<(), MethodError>;

/// External side effects after the top-level transaction commits.
pub type PostprocessHook = fn(&Row);

/// The full hook chain of a record class. Every phase is optional.
#[derive(Default, Clone, Copy)]
pub struct Hooks {
    /// Whole-batch validation (may short-circuit the entire `/set`).
    pub set_check: Option<SetCheckHook>,
    /// Per-create authorisation/validation.
    pub create_check: Option<CreateCheckHook>,
    /// May suppress or rewrite a per-create error.
    pub create_error: Option<CreateErrorHook>,
    /// Post-persist (create) in-transaction side effects.
    pub created: Option<RowHook>,
    /// Per-update authorisation/validation.
    pub update_check: Option<UpdateCheckHook>,
    /// Post-persist (update) in-transaction side effects.
    pub updated: Option<UpdatedHook>,
    /// Per-destroy authorisation/validation.
    pub destroy_check: Option<RowHook>,
    /// Post-persist (destroy) in-transaction side effects.
    pub destroyed: Option<RowHook>,
    /// After-commit external side effects per phase.
    pub postprocess_create: Option<PostprocessHook>,
    /// After-commit external side effects per phase.
    pub postprocess_update: Option<PostprocessHook>,
    /// After-commit external side effects per phase.
    pub postprocess_destroy: Option<PostprocessHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("set_check", &self.set_check.is_some())
            .field("create_check", &self.create_check.is_some())
            .field("create_error", &self.create_error.is_some())
            .field("created", &self.created.is_some())
            .field("update_check", &self.update_check.is_some())
            .field("updated", &self.updated.is_some())
            .field("destroy_check", &self.destroy_check.is_some())
            .field("destroyed", &self.destroyed.is_some())
            .field("postprocess_create", &self.postprocess_create.is_some())
            .field("postprocess_update", &self.postprocess_update.is_some())
            .field("postprocess_destroy", &self.postprocess_destroy.is_some())
            .finish()
    }
}
