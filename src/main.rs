use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portfolio_analytics::api::{self, ANALYTICS_PATH};
use portfolio_analytics::config::Config;
use portfolio_analytics::storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("Loaded configuration");

    info!("Initializing database...");
    let storage = storage::connect(&config.database)
        .await
        .context("failed to open analytics storage")?;
    info!("Database initialized successfully");

    if config.auth.dashboard_api_keys.is_empty() {
        info!("🔓 Dashboard API keys not configured - reports are open");
    } else {
        info!(
            "🔐 Dashboard reports require an API key ({} configured)",
            config.auth.dashboard_api_keys.len()
        );
    }
    if config.analytics.ip_anonymization {
        info!("🕶️  Client IP anonymization enabled");
    }

    let router = api::create_api_router(storage, Arc::clone(&config));

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Analytics server listening on http://{}", addr);
    info!("   - Tracking and reports at http://{}{}", addr, ANALYTICS_PATH);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
