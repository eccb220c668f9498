//! snapfx worker binary entry point.
//!
//! Loads TOML configuration, connects to the gateway's task and result
//! endpoints and processes tasks until ctrl-c.

use anyhow::Result;
use queue::tcp::{PullClient, PushClient};
use snapfx_worker::{Worker, WorkerConfig};
use std::path::PathBuf;
use tokio::{signal, sync::watch};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing from RUST_LOG (default: info).
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "worker.toml".to_string()),
    );
    let config = WorkerConfig::load(&config_path)?;
    tracing::info!("loaded configuration from {}", config_path.display());

    let tasks = PullClient::connect(config.task_endpoint.clone(), config.retry_backoff());
    let results = PushClient::new(config.result_endpoint.clone());
    let name = format!("pid-{}", std::process::id());
    let worker = Worker::new(name, tasks, results)
        .poll_interval(config.poll_interval())
        .retry_backoff(config.retry_backoff());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(worker.run(shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    run.await?;

    tracing::info!("worker shut down");
    Ok(())
}

/// Wait for ctrl-c signal for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
    }
    tracing::info!("received shutdown signal");
}
