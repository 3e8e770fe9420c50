// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Ixion request engine.
//!
//! Wires the core subsystems together: a record-class registry generates
//! `/get` `/set` `/changes` `/query` `/queryChanges` handlers over the
//! storage layer; a per-request [`Context`](context::Context) carries the
//! sentence collection, creation-id table, and account-state session
//! through nested transactions; the dispatcher runs the batched call
//! loop with back-reference expansion.

pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod exception;
pub mod multicall;
pub mod ops;
pub mod record;
pub mod registry;

pub use context::{CallError, CallInfo, Context, CreationEntry};
pub use dispatcher::{CallItem, Handler};
pub use engine::{AccessCheck, Engine, EngineBuilder, OptimizeCalls};
pub use exception::{ExceptionSink, LogSink, SharedSink};
pub use multicall::{Done, Multicall};
pub use ops::SetRequest;
pub use record::{
    CondBuilder, CreateErrorOutcome, DataType, DifferFn, FilterCond, Hooks, Property,
    QueryConfig, QueryFilter, RecordClass, Row, RowDiff, StateCodec,
};
pub use registry::{ddl_statements, Registry};
