// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ixion request engine.
//!
//! This crate provides the wire-level value types shared across the Ixion
//! workspace: call triples, sentences, method results and errors, the
//! modified JSON-Pointer resolver, the state comparator, and the value
//! validator library. It is storage- and transport-agnostic.

pub mod call;
pub mod error;
pub mod ids;
pub mod method;
pub mod pointer;
pub mod sentence;
pub mod state;
pub mod validators;

// Re-export key items at crate root for ergonomic imports.
pub use call::{parse_call_list, Call};
pub use error::IxionError;
pub use ids::{new_guid, synth_client_id};
pub use method::{MethodError, MethodResult, ERROR_NAME};
pub use pointer::{resolve as resolve_pointer, PointerError};
pub use sentence::{Sentence, SentenceCollection};
pub use state::{compare_seq, compare_state, StateComparison};
