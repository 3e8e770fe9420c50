// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Ixion workspace.
//!
//! Provides the [`TestHarness`] used by integration tests: a complete
//! engine over temp storage with ready-made record classes.

pub mod harness;

pub use harness::{casserole_class, cookie_class, TestHarness, TestHarnessBuilder};
