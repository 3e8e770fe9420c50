// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport adapter for the Ixion engine.
//!
//! Thin by design: decode the JSON body into a call list, run it through
//! the engine's dispatcher on a blocking worker, and encode the sentence
//! collection back in the shape the client used.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use handlers::{decode_request, encode_response, ACCOUNT_HEADER, TRANSACTION_HEADER};
pub use server::{build_router, start_server, GatewayState, ServerConfig};
