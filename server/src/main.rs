//! Ratewatch Binary
//!
//! Serves fiat and crypto exchange rates over HTTP.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratewatch_server::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Ratewatch");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let state = AppState::from_config(&config.upstream);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;

    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        fiat_ttl_secs = config.upstream.fiat_ttl.as_secs(),
        crypto_ttl_secs = config.upstream.crypto_ttl.as_secs(),
        "Ratewatch running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Ratewatch shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
