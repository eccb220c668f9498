//! snapfx gateway binary entry point.
//!
//! Loads TOML configuration, binds the task and result endpoints, starts
//! the dispatcher and any embedded workers, and runs the axum server with
//! graceful shutdown on ctrl-c.

use anyhow::Result;
use snapfx_gateway::{GatewayConfig, serve};
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing from RUST_LOG (default: info).
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration.
    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "gateway.toml".to_string()),
    );
    let config = GatewayConfig::load(&config_path)?;
    tracing::info!("loaded configuration from {}", config_path.display());

    let handle = serve(&config).await?;
    tracing::info!(
        "workers pull tasks from {} and push results to {}",
        handle.task_addr,
        handle.result_addr
    );

    shutdown_signal().await;
    handle.shutdown().await?;

    tracing::info!("gateway shut down");
    Ok(())
}

/// Wait for ctrl-c signal for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
    }
}
