//! Axum HTTP handlers for the web server
//!
//! Provides the primary Model Context Protocol endpoint, and general metadata endpoints.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::mcp::rpc::{is_json_rpc_error, json_rpc_error};
use crate::mcp::server::handle_json_rpc_value;
use crate::mcp::SESSION_ID_HEADER;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
    })
}

pub async fn mcp_endpoint(body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, -32700, "Parse error")),
            )
                .into_response()
        }
    };

    if let Some(batch) = payload.as_array() {
        if batch.is_empty() {
            return (
                StatusCode::OK,
                Json(vec![json_rpc_error(None, -32600, "Invalid Request")]),
            )
                .into_response();
        }

        let responses = batch
            .iter()
            .filter_map(|item| handle_json_rpc_value(item.clone()))
            .collect::<Vec<_>>();

        if responses.is_empty() {
            return StatusCode::NO_CONTENT.into_response();
        }

        return (StatusCode::OK, Json(Value::Array(responses))).into_response();
    }

    let is_initialize = payload.get("method").and_then(Value::as_str) == Some("initialize");
    match handle_json_rpc_value(payload) {
        Some(response) => {
            if is_initialize && !is_json_rpc_error(&response) {
                let session_id = format!("{:032x}", rand::random::<u128>());
                return (
                    StatusCode::OK,
                    [(SESSION_ID_HEADER, session_id)],
                    Json(response),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(response)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Sessions hold no server-side state, so termination just acknowledges.
pub async fn mcp_session_delete() -> StatusCode {
    StatusCode::NO_CONTENT
}
