// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Ixion server.
//!
//! TOML files merged over compiled defaults, with `IXION_*` environment
//! variable overrides. See [`loader`] for the merge order.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::IxionConfig;
