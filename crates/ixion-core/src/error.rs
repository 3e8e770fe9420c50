// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ixion request engine.

use thiserror::Error;

/// The primary infrastructure error type used across all Ixion crates.
///
/// These are server-side failures. Client-visible per-call errors are a
/// separate value type ([`crate::MethodError`]) carried inside `error`
/// sentences; they never travel through this enum.
#[derive(Debug, Error)]
pub enum IxionError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Another writer holds the state row for the same (account, type).
    ///
    /// Surfaces to the client as a `tryAgain` method error.
    #[error("state row contention: {0}")]
    StateConflict(String),

    /// Transaction API misuse (unbalanced depth, state session already open).
    #[error("transaction misuse: {0}")]
    Transaction(String),

    /// A record class declaration is inconsistent (duplicate property,
    /// unknown column in a unique constraint, reserved name).
    #[error("record class `{type_key}` is invalid: {message}")]
    Schema { type_key: String, message: String },

    /// Transport errors (bind failure, serve failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IxionError {
    /// Wrap a storage-layer error.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        IxionError::Storage {
            source: Box::new(source),
        }
    }

    /// True when the error is write contention that the client may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, IxionError::StateConflict(_))
    }
}
