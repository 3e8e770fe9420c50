// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generated resultset operators.

pub mod changes;
pub mod get;
pub mod query;
pub mod set;

pub use set::SetRequest;
