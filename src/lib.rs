use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod keys;
pub mod logging;
pub mod mcp;
pub mod token;
pub mod tools;

use token::VerifierConfig;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<VerifierConfig>,
}

impl AppState {
    pub fn new(verifier: VerifierConfig) -> Self {
        Self {
            verifier: Arc::new(verifier),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/mcp",
            post(http::handlers::mcp_endpoint).delete(http::handlers::mcp_session_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
