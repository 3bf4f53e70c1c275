use greeter_mcp::{
    build_app, config::ServerConfig, logging, token::VerifierConfig, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = ServerConfig::from_env()?;
    let public_pem = config.keys.verifying_key()?;
    let verifier = VerifierConfig::from_public_pem(&public_pem)?;

    let bind_socket = config.bind_socket()?;
    let state = AppState::new(verifier);
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
