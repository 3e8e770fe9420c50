// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ixion.toml` > `~/.config/ixion/ixion.toml` >
//! `/etc/ixion/ixion.toml` with environment variable overrides via the
//! `IXION_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::IxionConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ixion/ixion.toml` (system-wide)
/// 3. `~/.config/ixion/ixion.toml` (user XDG config)
/// 4. `./ixion.toml` (local directory)
/// 5. `IXION_*` environment variables
pub fn load_config() -> Result<IxionConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IxionConfig::default()))
        .merge(Toml::file("/etc/ixion/ixion.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("ixion/ixion.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("ixion.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from inline TOML only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<IxionConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IxionConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<IxionConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IxionConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `IXION_ENGINE_MAX_CALLS_IN_REQUEST`
/// must map to `engine.max_calls_in_request`, not `engine.max.calls...`.
fn env_provider() -> Env {
    Env::prefixed("IXION_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("engine_", "engine.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}
