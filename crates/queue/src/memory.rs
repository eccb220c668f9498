//! In-process queue with competing consumers.

use crate::{Pull, Push, QueueError};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, mpsc::error::TrySendError};

/// Create a bounded queue holding at most `capacity` items.
pub fn queue<T>(capacity: usize) -> (Pusher<T>, Puller<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Pusher { tx },
        Puller {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half. Cheap to clone.
pub struct Pusher<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Pusher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Pusher<T> {
    /// Enqueue without waiting. Fails with [`QueueError::Full`] when at
    /// capacity and [`QueueError::Closed`] when every puller is gone.
    pub fn try_push(&self, item: T) -> Result<(), QueueError> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Whether every puller has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T: Send> Push<T> for Pusher<T> {
    async fn push(&mut self, item: T) -> Result<(), QueueError> {
        self.tx.send(item).await.map_err(|_| QueueError::Closed)
    }
}

/// Consumer half. Clones share the queue: each item goes to exactly one
/// of them.
pub struct Puller<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Puller<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> Puller<T> {
    /// Take the next item if one is ready and no other puller is waiting.
    pub fn try_pull(&self) -> Option<T> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl<T: Send> Pull<T> for Puller<T> {
    async fn pull(&mut self) -> Result<T, QueueError> {
        self.rx.lock().await.recv().await.ok_or(QueueError::Closed)
    }
}
