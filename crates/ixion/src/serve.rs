// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ixion serve` command implementation.
//!
//! Opens storage, builds the engine with the built-in notes schema, and
//! serves the gateway until shutdown.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ixion_config::IxionConfig;
use ixion_core::IxionError;
use ixion_engine::Engine;
use ixion_gateway::ServerConfig;
use ixion_storage::Database;

use crate::schema;

/// Initialise the tracing subscriber from the configured log level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build an engine from the configuration and the built-in schema.
pub fn build_engine(config: &IxionConfig) -> Result<Engine, IxionError> {
    let database = Database::open(&config.storage.database_path, config.storage.wal_mode)?;
    let mut builder = Engine::builder(database)
        .max_calls_in_request(config.engine.max_calls_in_request)
        .synthesize_client_ids(config.engine.synthesize_client_ids);
    for class in schema::all_classes() {
        builder = builder.record_class(class);
    }
    builder.build()
}

/// Runs the `ixion serve` command.
pub async fn run_serve(config: IxionConfig) -> Result<(), IxionError> {
    init_tracing(&config.log.level);
    info!("starting ixion serve");

    let engine = Arc::new(build_engine(&config)?);
    info!(
        database = %config.storage.database_path,
        "engine ready"
    );

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        bearer_token: config.server.bearer_token.clone(),
        default_account: config.engine.default_account.clone(),
    };
    ixion_gateway::start_server(&server_config, engine).await
}
