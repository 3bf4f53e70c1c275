//! MCP client session over HTTP.
//!
//! A [`McpSession`] owns a bearer token and speaks JSON-RPC against a
//! single endpoint: `connect` performs the `initialize` handshake, the
//! typed methods wrap the protocol operations, and `close` terminates the
//! session. Every request first checks the token against the local clock,
//! so an expired token fails fast instead of burning a round trip on a
//! guaranteed 401.

use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use chrono::Utc;
use reqwest::{StatusCode, Url};
use rust_mcp_sdk::schema::{
    CallToolResult, ContentBlock, InitializeResult, ListPromptsResult, ListResourcesResult,
    ListToolsResult, Prompt, Resource, Tool,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::mcp::server::SUPPORTED_PROTOCOL_VERSION;
use crate::mcp::SESSION_ID_HEADER;
use crate::token::BearerToken;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("server returned HTTP {status}")]
    Http { status: StatusCode },
    #[error("server rejected the token ({code}): {message}")]
    Auth { code: String, message: String },
    #[error("bearer token expired at {expires_at} (epoch seconds)")]
    TokenExpired { expires_at: i64 },
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("server offered unsupported protocol version {0}")]
    UnsupportedProtocolVersion(String),
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
    #[error("session is already closed")]
    SessionClosed,
}

/// An initialized MCP session bound to one endpoint and one token.
#[derive(Debug)]
pub struct McpSession {
    http: reqwest::Client,
    endpoint: Url,
    bearer: BearerToken,
    session_id: Option<String>,
    next_request_id: AtomicU64,
    closed: AtomicBool,
}

impl McpSession {
    /// Performs the `initialize` handshake and the `notifications/initialized`
    /// follow-up, returning a session ready for requests.
    pub async fn connect(endpoint: &str, bearer: BearerToken) -> Result<Self, ClientError> {
        let endpoint =
            Url::parse(endpoint).map_err(|err| ClientError::InvalidEndpoint(err.to_string()))?;

        let mut session = Self {
            http: reqwest::Client::new(),
            endpoint,
            bearer,
            session_id: None,
            next_request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        };

        if let Err(err) = session.handshake().await {
            // A session that never completed its handshake has nothing to
            // tear down.
            session.closed.store(true, Ordering::SeqCst);
            return Err(err);
        }
        Ok(session)
    }

    async fn handshake(&mut self) -> Result<(), ClientError> {
        let id = self.next_id();
        let response = self
            .post_rpc(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "initialize",
                "params": {
                    "protocolVersion": SUPPORTED_PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {},
                },
            }))
            .await?;
        self.session_id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body: Value = response.json().await?;
        let initialize: InitializeResult = serde_json::from_value(unwrap_rpc_result(body)?)
            .map_err(|err| ClientError::UnexpectedResponse(err.to_string()))?;
        if initialize.protocol_version != SUPPORTED_PROTOCOL_VERSION {
            return Err(ClientError::UnsupportedProtocolVersion(
                initialize.protocol_version,
            ));
        }
        debug!(
            server = %initialize.server_info.name,
            version = %initialize.server_info.version,
            "MCP session established"
        );

        self.notify("notifications/initialized").await
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.request("ping", None).await.map(|_| ())
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, ClientError> {
        let result: ListToolsResult = self.request_as("tools/list", Some(json!({}))).await?;
        Ok(result.tools)
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, ClientError> {
        let result: ListResourcesResult =
            self.request_as("resources/list", Some(json!({}))).await?;
        Ok(result.resources)
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, ClientError> {
        let result: ListPromptsResult = self.request_as("prompts/list", Some(json!({}))).await?;
        Ok(result.prompts)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, ClientError> {
        self.request_as(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    /// Terminates the session. Safe to call more than once; only transport
    /// failures surface as errors.
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let Some(session_id) = &self.session_id else {
            return Ok(());
        };

        if self.bearer.is_expired(Utc::now()) {
            debug!("token expired before session teardown; skipping DELETE");
            return Ok(());
        }

        let response = self
            .http
            .delete(self.endpoint.clone())
            .bearer_auth(self.bearer.secret())
            .header(SESSION_ID_HEADER, session_id.as_str())
            .send()
            .await?;
        debug!(status = response.status().as_u16(), "MCP session terminated");
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let id = self.next_id();
        let mut payload = json!({ "jsonrpc": "2.0", "id": id, "method": method });
        if let Some(params) = params {
            payload["params"] = params;
        }

        let response = self.post_rpc(payload).await?;
        let body: Value = response.json().await?;
        unwrap_rpc_result(body)
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let result = self.request(method, params).await?;
        serde_json::from_value(result).map_err(|err| ClientError::UnexpectedResponse(err.to_string()))
    }

    async fn notify(&self, method: &str) -> Result<(), ClientError> {
        self.post_rpc(json!({ "jsonrpc": "2.0", "method": method }))
            .await?;
        Ok(())
    }

    async fn post_rpc(&self, payload: Value) -> Result<reqwest::Response, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::SessionClosed);
        }
        self.ensure_token_fresh()?;

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(self.bearer.secret())
            .json(&payload);
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_ID_HEADER, session_id.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let body: Value = response.json().await.unwrap_or_default();
            return Err(ClientError::Auth {
                code: body["code"].as_str().unwrap_or("unauthorized").to_string(),
                message: body["message"]
                    .as_str()
                    .unwrap_or("request was rejected")
                    .to_string(),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Http { status });
        }
        Ok(response)
    }

    fn ensure_token_fresh(&self) -> Result<(), ClientError> {
        if self.bearer.is_expired(Utc::now()) {
            return Err(ClientError::TokenExpired {
                expires_at: self.bearer.expires_at(),
            });
        }
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Relaxed) {
            warn!("MCP session dropped without close");
        }
    }
}

/// Runs `body` inside a connected session, closing it on every path. An
/// error from the body wins over an error from the close.
pub async fn with_session<T, F, Fut>(
    endpoint: &str,
    bearer: BearerToken,
    body: F,
) -> Result<T, ClientError>
where
    F: FnOnce(Arc<McpSession>) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let session = Arc::new(McpSession::connect(endpoint, bearer).await?);
    let outcome = body(Arc::clone(&session)).await;
    let close_outcome = session.close().await;

    match outcome {
        Ok(value) => {
            close_outcome?;
            Ok(value)
        }
        Err(err) => {
            if let Err(close_err) = close_outcome {
                warn!(error = %close_err, "session close failed after request error");
            }
            Err(err)
        }
    }
}

pub fn first_text_content(result: &CallToolResult) -> Option<&str> {
    result.content.iter().find_map(|block| match block {
        ContentBlock::TextContent(text) => Some(text.text.as_str()),
        _ => None,
    })
}

fn unwrap_rpc_result(body: Value) -> Result<Value, ClientError> {
    if let Some(error) = body.get("error") {
        return Err(ClientError::Rpc {
            code: error["code"].as_i64().unwrap_or(-32603),
            message: error["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    body.get("result")
        .cloned()
        .ok_or_else(|| ClientError::UnexpectedResponse("missing result member".to_string()))
}
