//! room-relay server entry point.
//!
//! Starts the Axum HTTP server with the token and WebSocket endpoints.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use room_relay::app_state::AppState;
use room_relay::build_app;
use room_relay::config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    tracing::info!(addr = %config.listen_addr, "starting room-relay");
    if config.uses_default_secret() {
        tracing::warn!(
            "WS_JWT_SECRET is not set; using the insecure development secret. Do not run this in production."
        );
    }

    let state = AppState::from_config(&config).context("building application state")?;
    let app = build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
