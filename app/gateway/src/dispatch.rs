//! Task submission and result broadcast.
//!
//! A single dispatcher task owns the [`CorrelationMap`] and the producing
//! end of the task queue. Sessions talk to it through a cloneable
//! [`Gateway`] handle; results are pulled from the result queue in the same
//! `select!` loop, so nothing else ever touches the map.

use crate::{
    correlation::{Claim, CorrelationMap},
    rooms::{ClientId, Notice, Rooms},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use compact_str::CompactString;
use protocol::{Task, TaskResult, codec};
use queue::{Pull, Pusher, QueueError};
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// Why a submission was refused. Reported to the submitter only.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("No effect specified.")]
    MissingEffect,
    #[error("No image data provided.")]
    MissingImage,
    #[error("Invalid image data: {0}")]
    InvalidImage(#[from] base64::DecodeError),
    #[error("Image data is empty.")]
    EmptyImage,
    #[error("Image is too large.")]
    TooLarge,
    #[error("Too many pending tasks, try again later.")]
    QueueFull,
    #[error("No workers are reachable.")]
    Unavailable,
    #[error("The gateway is shutting down.")]
    Closed,
}

enum Command {
    Submit {
        client_id: ClientId,
        effect: CompactString,
        image_data: String,
        reply: oneshot::Sender<Result<CompactString, SubmitError>>,
    },
    Disconnect {
        client_id: ClientId,
    },
}

/// Handle to the dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    commands: mpsc::Sender<Command>,
}

impl Gateway {
    /// Submit an effect request on behalf of `client_id`.
    ///
    /// `group_id` is only logged: the room a result is broadcast to is looked
    /// up again when it arrives, so it follows the submitter if they move.
    ///
    /// `image` is base64, optionally as a data URL. Malformed requests are
    /// rejected here without reaching the dispatcher, and requests too large
    /// to hand to a worker are rejected by the dispatcher without being
    /// queued. On acceptance the submitter is sent [`Notice::Processing`]
    /// and the new task id is returned.
    pub async fn submit(
        &self,
        client_id: &str,
        group_id: &str,
        effect: Option<&str>,
        image: Option<&str>,
    ) -> Result<CompactString, SubmitError> {
        let effect = effect
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(SubmitError::MissingEffect)?;
        let image_data = strip_data_url(image.ok_or(SubmitError::MissingImage)?);
        if STANDARD.decode(image_data)?.is_empty() {
            return Err(SubmitError::EmptyImage);
        }

        tracing::debug!("client {client_id} in {group_id} requests '{effect}'");
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                client_id: client_id.into(),
                effect: effect.into(),
                image_data: image_data.to_owned(),
                reply,
            })
            .await
            .map_err(|_| SubmitError::Closed)?;
        rx.await.map_err(|_| SubmitError::Closed)?
    }

    /// Forget every pending task of `client_id`. Their results, if they
    /// ever arrive, are dropped.
    pub async fn disconnect(&self, client_id: &str) {
        let command = Command::Disconnect {
            client_id: client_id.into(),
        };
        if self.commands.send(command).await.is_err() {
            tracing::debug!("dispatcher gone, skipping disconnect of {client_id}");
        }
    }
}

/// Return the base64 payload of a `data:` URL, or `image` unchanged.
pub fn strip_data_url(image: &str) -> &str {
    match image.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => image,
    }
}

/// Start the dispatcher.
///
/// Tasks go into `tasks`; results are pulled from `results` and broadcast
/// through `rooms`. The dispatcher stops once every [`Gateway`] handle is
/// dropped.
pub fn spawn<R, P>(
    rooms: Arc<R>,
    tasks: Pusher<Task>,
    results: P,
    retired_window: usize,
) -> (Gateway, JoinHandle<()>)
where
    R: Rooms,
    P: Pull<TaskResult> + 'static,
{
    let (commands, rx) = mpsc::channel(256);
    let dispatcher = Dispatcher {
        correlation: CorrelationMap::new(retired_window),
        rooms,
        tasks,
        results,
        commands: rx,
    };
    (Gateway { commands }, tokio::spawn(dispatcher.run()))
}

struct Dispatcher<R, P> {
    correlation: CorrelationMap,
    rooms: Arc<R>,
    tasks: Pusher<Task>,
    results: P,
    commands: mpsc::Receiver<Command>,
}

impl<R, P> Dispatcher<R, P>
where
    R: Rooms,
    P: Pull<TaskResult>,
{
    async fn run(mut self) {
        tracing::info!("dispatcher started");
        let mut results_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                result = self.results.pull(), if results_open => match result {
                    Ok(result) => self.broadcast(result),
                    Err(QueueError::Closed) => {
                        tracing::error!("result queue closed, no more results will arrive");
                        results_open = false;
                    }
                    Err(e) => tracing::warn!("failed to receive result: {e}"),
                },
            }
            tokio::task::yield_now().await;
        }

        tracing::info!(
            "dispatcher stopped with {} task(s) pending",
            self.correlation.len()
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit {
                client_id,
                effect,
                image_data,
                reply,
            } => {
                let result = self.submit(client_id, effect, image_data);
                let _ = reply.send(result);
            }
            Command::Disconnect { client_id } => {
                let dropped = self.correlation.purge_client(&client_id);
                if dropped > 0 {
                    tracing::info!("client {client_id} left with {dropped} pending task(s)");
                }
            }
        }
    }

    fn submit(
        &mut self,
        client_id: ClientId,
        effect: CompactString,
        image_data: String,
    ) -> Result<CompactString, SubmitError> {
        let task_id = CompactString::new(uuid::Uuid::new_v4().to_string());
        let task = Task {
            task_id: task_id.clone(),
            effect: effect.clone(),
            image_data,
        };
        // A task that cannot be framed would never reach a worker.
        if let Err(e) = codec::check_fits(&task) {
            tracing::warn!("refusing task from client {client_id}: {e}");
            return Err(SubmitError::TooLarge);
        }
        if !self.correlation.insert(task_id.clone(), client_id.clone()) {
            tracing::error!("task id {task_id} already in flight");
            return Err(SubmitError::Unavailable);
        }

        if let Err(e) = self.tasks.try_push(task) {
            self.correlation.remove(&task_id);
            tracing::warn!("failed to enqueue task {task_id}: {e}");
            return Err(match e {
                QueueError::Full => SubmitError::QueueFull,
                _ => SubmitError::Unavailable,
            });
        }

        tracing::info!("queued task {task_id} ('{effect}') for client {client_id}");
        self.rooms.deliver(
            &client_id,
            Notice::Processing {
                task_id: task_id.clone(),
            },
        );
        Ok(task_id)
    }

    fn broadcast(&mut self, result: TaskResult) {
        let task_id = result.task_id().clone();
        let client = match self.correlation.claim(&task_id) {
            Claim::Owner(client) => client,
            Claim::Duplicate => {
                tracing::warn!("duplicate result for task {task_id}, dropping");
                return;
            }
            Claim::Stale => {
                tracing::info!("result for task {task_id} arrived after its client left");
                return;
            }
            Claim::Unknown => {
                tracing::warn!("result for unknown task {task_id}, dropping");
                return;
            }
        };

        let Some(group) = self.rooms.group_of(&client) else {
            tracing::info!("client {client} is in no room, dropping result for {task_id}");
            return;
        };

        let notice = Notice::from(result);
        let members = self.rooms.members(&group);
        tracing::info!(
            "broadcasting result for task {task_id} to {} member(s) of {group}",
            members.len()
        );
        for member in &members {
            self.rooms.deliver(member, notice.clone());
        }
    }
}
