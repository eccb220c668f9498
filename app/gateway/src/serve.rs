//! Shared gateway serve entrypoint, used by the binary and the tests.

use crate::{
    GatewayConfig, dispatch,
    lobby::Lobby,
    ws::{self, AppState},
};
use anyhow::{Context, Result};
use protocol::{PROTOCOL_VERSION, Task, TaskResult};
use queue::tcp::{self, Listening, PullClient, PushClient};
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use worker::{Worker, WorkerConfig};

/// Handle returned by [`serve`]: bound addresses and the shutdown trigger.
pub struct ServeHandle {
    /// The port the WebSocket server is listening on.
    pub port: u16,
    /// Where workers pull tasks from.
    pub task_addr: SocketAddr,
    /// Where workers push results to.
    pub result_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<Result<(), std::io::Error>>>,
    workers_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    dispatcher: JoinHandle<()>,
    _endpoints: (Listening, Listening),
}

impl ServeHandle {
    /// Trigger graceful shutdown and wait for the server to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await??;
        }
        let _ = self.workers_tx.send(true);
        for worker in self.workers.drain(..) {
            worker.await?;
        }
        self.dispatcher.abort();
        Ok(())
    }
}

/// Bind the task and result endpoints, start the dispatcher and any
/// embedded workers, then bind the axum server and start serving.
///
/// The server runs in a spawned task; call [`ServeHandle::shutdown`] to
/// stop it.
pub async fn serve(config: &GatewayConfig) -> Result<ServeHandle> {
    let (tasks, task_listening) =
        tcp::bind_push::<Task>(&config.queue.task_bind, config.queue.capacity)
            .await
            .with_context(|| format!("failed to bind task endpoint {}", config.queue.task_bind))?;
    let (results, result_listening) =
        tcp::bind_pull::<TaskResult>(&config.queue.result_bind, config.queue.capacity)
            .await
            .with_context(|| {
                format!("failed to bind result endpoint {}", config.queue.result_bind)
            })?;
    let task_addr = task_listening.local_addr();
    let result_addr = result_listening.local_addr();

    let lobby = Arc::new(Lobby::new());
    let (gateway, dispatcher) =
        dispatch::spawn(Arc::clone(&lobby), tasks, results, config.dispatch.retired_window);

    let (workers_tx, workers_rx) = watch::channel(false);
    let defaults = WorkerConfig::default();
    let workers = (0..config.workers.embedded)
        .map(|i| {
            let tasks =
                PullClient::connect(reachable(task_addr).to_string(), defaults.retry_backoff());
            let results = PushClient::new(reachable(result_addr).to_string());
            let worker = Worker::new(format!("embedded-{i}"), tasks, results)
                .poll_interval(defaults.poll_interval())
                .retry_backoff(defaults.retry_backoff());
            tokio::spawn(worker.run(workers_rx.clone()))
        })
        .collect::<Vec<_>>();
    if !workers.is_empty() {
        tracing::info!("started {} embedded worker(s)", workers.len());
    }

    let app = ws::router(AppState { gateway, lobby });
    let bind = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let port = listener.local_addr()?.port();
    tracing::info!("gateway listening on {bind} (port {port}, protocol {PROTOCOL_VERSION})");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("received shutdown signal");
            })
            .await
    });

    Ok(ServeHandle {
        port,
        task_addr,
        result_addr,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
        workers_tx,
        workers,
        dispatcher,
        _endpoints: (task_listening, result_listening),
    })
}

/// An address a local client can connect to: wildcard binds become
/// loopback.
fn reachable(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()))
    } else {
        addr
    }
}
