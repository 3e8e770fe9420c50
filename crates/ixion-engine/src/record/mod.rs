// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record classes: declarative entity descriptions and their storage.

pub mod class;
pub mod hooks;
pub mod property;
pub mod row;
pub mod store;

pub use class::{
    CondBuilder, DifferFn, FilterCond, QueryConfig, QueryFilter, RecordClass, StateCodec,
};
pub use hooks::{CreateErrorOutcome, Hooks};
pub use property::{DataType, Property, MANDATORY_COLUMNS};
pub use row::{Row, RowDiff};
