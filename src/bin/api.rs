use back_office_assistant::{
    api::{start_server, ApiState},
    config::AgentConfig,
    context::build_context_store,
    provider::{anthropic::DEFAULT_BASE_URL, AnthropicProvider, Provider},
    tools::Books,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::from_env()?;

    if config.api_key.is_none() {
        eprintln!("⚠️  ANTHROPIC_API_KEY not set in .env");
        eprintln!("📌 Assistant requests will fail until a key is configured");
    }

    info!("🚀 Back-Office Assistant - API Server");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {}", config.model);

    // An empty key still builds; each run then fails fast with a fatal provider error
    let provider: Arc<dyn Provider> = Arc::new(AnthropicProvider::with_base_url(
        config.api_key.clone().unwrap_or_default(),
        config.model.clone(),
        config.max_tokens,
        config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
    )?);

    let store = build_context_store(config.database_url.as_deref());
    let state = ApiState::new(
        provider,
        Arc::new(Books::brokerage_sample()),
        store,
        config.loop_settings(),
        config.run_deadline,
    )?;

    info!("✅ Assistants initialized");
    info!("📡 Starting API server...");

    start_server(state, config.port).await?;

    Ok(())
}
