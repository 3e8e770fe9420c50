// SPDX-FileCopyrightText: 2026 Ixion Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the JMAP endpoint.
//!
//! The transport is deliberately thin: decode the JSON body into a call
//! list, hand it to the engine on a blocking worker, and encode the
//! sentence collection back in the shape the client used.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use ixion_core::{new_guid, parse_call_list, Call, SentenceCollection};

use crate::server::GatewayState;

/// Header naming the account a request operates on.
pub const ACCOUNT_HEADER: &str = "x-ixion-account";

/// Per-request transaction correlation header.
pub const TRANSACTION_HEADER: &str = "Ix-Transaction-ID";

/// A decoded request body: the calls plus whether the client used the
/// `{methodCalls: […]}` envelope.
#[derive(Debug)]
pub struct DecodedRequest {
    /// Parsed call triples.
    pub calls: Vec<Call>,
    /// True when the body was the wrapped object form.
    pub wrapped: bool,
}

/// Decode a JSON body: either a bare array of call triples or
/// `{"methodCalls": [...]}`.
pub fn decode_request(body: &[u8]) -> Result<DecodedRequest, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let (calls_value, wrapped) = match &value {
        Value::Array(_) => (&value, false),
        Value::Object(map) => match map.get("methodCalls") {
            Some(calls) => (calls, true),
            None => return Err("object body lacks methodCalls".into()),
        },
        _ => return Err("body must be an array or object".into()),
    };
    let calls = parse_call_list(calls_value)?;
    Ok(DecodedRequest { calls, wrapped })
}

/// Encode the response mirroring the request shape.
pub fn encode_response(sentences: &SentenceCollection, wrapped: bool) -> Value {
    let triples = sentences.to_triples();
    if wrapped {
        json!({ "methodResponses": triples })
    } else {
        triples
    }
}

/// POST /jmap
///
/// Runs one batched request. Responses always carry `Vary: Origin` and a
/// fresh `Ix-Transaction-ID`.
pub async fn post_jmap(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let transaction_id = new_guid();

    let decoded = match decode_request(&body) {
        Ok(decoded) => decoded,
        Err(reason) => {
            debug!(%transaction_id, reason = %reason, "request body rejected");
            return json_response(
                StatusCode::BAD_REQUEST,
                &transaction_id,
                json!({"error": "could not decode request"}),
            );
        }
    };

    let Some(account_id) = headers
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| state.default_account.clone())
    else {
        return json_response(
            StatusCode::BAD_REQUEST,
            &transaction_id,
            json!({"error": "no account specified"}),
        );
    };

    let engine = state.engine.clone();
    let wrapped = decoded.wrapped;
    let calls = decoded.calls;
    let outcome = tokio::task::spawn_blocking(move || {
        engine.execute(&account_id, calls)
    })
    .await;

    match outcome {
        Ok(Ok(sentences)) => json_response(
            StatusCode::OK,
            &transaction_id,
            encode_response(&sentences, wrapped),
        ),
        Ok(Err(err)) => {
            let guid = state
                .engine
                .exceptions()
                .file_report("transport", &err.to_string());
            warn!(%transaction_id, guid = %guid, "request failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &transaction_id,
                json!({"error": "internal", "guid": guid}),
            )
        }
        Err(join_err) => {
            let guid = state
                .engine
                .exceptions()
                .file_report("transport", &join_err.to_string());
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &transaction_id,
                json!({"error": "internal", "guid": guid}),
            )
        }
    }
}

/// GET /health
///
/// Unauthenticated liveness probe.
pub async fn get_health() -> Response {
    json_response(
        StatusCode::OK,
        &new_guid(),
        json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}),
    )
}

/// Build a JSON response with the transport's fixed headers.
fn json_response(status: StatusCode, transaction_id: &str, body: Value) -> Response {
    let mut response = Response::new(axum::body::Body::from(body.to_string()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json; charset=utf-8"),
    );
    headers.insert(header::VARY, header::HeaderValue::from_static("Origin"));
    if let Ok(value) = header::HeaderValue::from_str(transaction_id) {
        headers.insert(TRANSACTION_HEADER, value);
    }
    response
}
