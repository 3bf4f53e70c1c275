use chrono::Utc;
use greeter_mcp::{
    client::{first_text_content, with_session},
    config::ClientConfig,
    logging,
    token::TokenIssuer,
};
use serde_json::{Map, Value};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = ClientConfig::from_env()?;
    let private_pem = config.keys.signing_key()?;
    let token = TokenIssuer::from_private_pem(&private_pem)?.issue(Utc::now())?;

    info!(
        endpoint = %config.endpoint,
        expires_at = token.expires_at(),
        "starting MCP demo run"
    );

    let greeting = with_session(&config.endpoint, token, |session| async move {
        session.ping().await?;
        println!("Server is reachable");

        let tools = session.list_tools().await?;
        println!(
            "Available tools: {:?}",
            tools.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>()
        );

        let resources = session.list_resources().await?;
        println!(
            "Available resources: {:?}",
            resources
                .iter()
                .map(|resource| resource.uri.as_str())
                .collect::<Vec<_>>()
        );

        let prompts = session.list_prompts().await?;
        println!(
            "Available prompts: {:?}",
            prompts
                .iter()
                .map(|prompt| prompt.name.as_str())
                .collect::<Vec<_>>()
        );

        let mut arguments = Map::new();
        arguments.insert("name".to_string(), Value::String("World".to_string()));
        let result = session.call_tool("greet", arguments).await?;
        Ok(first_text_content(&result).unwrap_or_default().to_string())
    })
    .await?;

    println!("{greeting}");
    Ok(())
}
