// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Ixion request engine.
//!
//! Provides a WAL-mode database handle with embedded migrations, a
//! connection-per-request model matching the engine's synchronous
//! scheduling, and the per-account state bookkeeper. Entity tables are
//! not defined here; the record-class registry deploys them at startup.

pub mod database;
pub mod migrations;
pub mod states;

pub use database::{is_unique_violation, map_db_err, Database};
pub use states::{read_state_row, seed_account_states, AccountState, StateRow};
