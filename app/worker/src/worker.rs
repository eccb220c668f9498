//! The worker loop.

use crate::process::{RESULT_TOO_LARGE, process};
use protocol::{Task, TaskResult};
use queue::{Pull, Push};
use std::time::Duration;
use tokio::sync::watch;

/// Pulls tasks, processes them one at a time and pushes one result per task.
///
/// Transient push failures are retried until shutdown. A completed result
/// the link refuses outright is replaced by an error result.
pub struct Worker<P, S> {
    name: String,
    tasks: P,
    results: S,
    poll_interval: Duration,
    retry_backoff: Duration,
}

impl<P, S> Worker<P, S>
where
    P: Pull<Task>,
    S: Push<TaskResult>,
{
    pub fn new(name: impl Into<String>, tasks: P, results: S) -> Self {
        Self {
            name: name.into(),
            tasks,
            results,
            poll_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Bound on a single wait for the next task.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Delay before retrying a failed pull or push.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("worker {} started", self.name);

        while !is_shutdown(&shutdown) {
            let task = match tokio::time::timeout(self.poll_interval, self.tasks.pull()).await {
                Err(_) => continue,
                Ok(Ok(task)) => task,
                Ok(Err(e)) => {
                    tracing::warn!("worker {}: pull failed: {e}", self.name);
                    backoff(self.retry_backoff, &mut shutdown).await;
                    continue;
                }
            };

            tracing::debug!("worker {} received task {}", self.name, task.task_id);
            let mut result = process(task).await;

            loop {
                match self.results.push(result.clone()).await {
                    Ok(()) => break,
                    Err(e) if e.is_permanent() => {
                        if !result.is_completed() {
                            tracing::error!(
                                "worker {}: dropping result for {}: {e}",
                                self.name,
                                result.task_id()
                            );
                            break;
                        }
                        // The submitter still gets an answer.
                        tracing::warn!(
                            "worker {}: result for {} cannot be sent: {e}",
                            self.name,
                            result.task_id()
                        );
                        result = TaskResult::error(result.task_id().clone(), RESULT_TOO_LARGE);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "worker {}: failed to send result for {}: {e}",
                            self.name,
                            result.task_id()
                        );
                        if !backoff(self.retry_backoff, &mut shutdown).await {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("worker {} stopped", self.name);
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleep for `delay` unless shutdown comes first. Returns whether the
/// worker should keep going.
async fn backoff(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => !is_shutdown(shutdown),
        _ = shutdown.changed() => false,
    }
}
