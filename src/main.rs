use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bus_helper::config::AppConfig;
use bus_helper::routes;
use bus_helper::services::llm_provider::chat_service_from_config;
use bus_helper::services::pdf::PdfExtractor;
use bus_helper::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded (env: {})", std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into()));
    tracing::info!(
        "Chat provider {}/{}, {} schedule locations",
        config.llm.provider,
        config.llm.model,
        config.documents.locations.len()
    );

    let chat = chat_service_from_config(&config.llm);
    let state = AppState::new(config.clone(), chat, Arc::new(PdfExtractor));

    if state.turn_settings.configured_credential.is_none() {
        tracing::warn!("No API key configured; visitors will be asked to supply one");
    }

    state.sessions.spawn_idle_sweeper(
        config.session.idle_ttl(),
        config.session.sweep_interval(),
    );

    let app = routes::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
