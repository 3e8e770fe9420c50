// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. The JMAP endpoint is
//! authenticated (when a bearer token is configured); the health probe
//! is public.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use ixion_core::IxionError;
use ixion_engine::Engine;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The request engine.
    pub engine: Arc<Engine>,
    /// Account used when the request names none.
    pub default_account: Option<String>,
}

/// Gateway server configuration (mirrors `ServerConfig` from ixion-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Bearer token for auth (None = auth disabled).
    pub bearer_token: Option<String>,
    /// Account used when the request names none.
    pub default_account: Option<String>,
}

/// Build the gateway router over the given engine.
pub fn build_router(config: &ServerConfig, engine: Arc<Engine>) -> Router {
    let state = GatewayState {
        engine,
        default_account: config.default_account.clone(),
    };
    let auth = AuthConfig {
        bearer_token: config.bearer_token.clone(),
    };

    let public_routes = Router::new().route("/health", get(handlers::get_health));

    let api_routes = Router::new()
        .route("/jmap", post(handlers::post_jmap))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP server and serve until shutdown.
pub async fn start_server(config: &ServerConfig, engine: Arc<Engine>) -> Result<(), IxionError> {
    let app = build_router(config, engine);

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| IxionError::Transport {
                message: format!("failed to bind gateway to {addr}: {e}"),
                source: Some(Box::new(e)),
            })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| IxionError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
