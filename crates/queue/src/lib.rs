//! Push/pull queues.
//!
//! A push/pull link is unidirectional and queue-like: every item pushed is
//! delivered to exactly one of the pullers attached to it. The gateway and
//! the workers only see the [`Push`] and [`Pull`] traits; the link itself is
//! either an in-process [`memory`] queue or a [`tcp`] endpoint.

use protocol::codec::FrameError;
use std::future::Future;
use thiserror::Error;

pub mod memory;
pub mod tcp;

pub use memory::{Puller, Pusher, queue};

/// Errors raised by a push/pull link.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The other end of the link is gone for good.
    #[error("queue closed")]
    Closed,
    /// The queue is at capacity.
    #[error("queue full")]
    Full,
    /// The transport failed; the link may recover.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be written or read.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl QueueError {
    /// Whether retrying the same item can never succeed, e.g. because it
    /// does not fit in a frame.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Frame(FrameError::TooLarge { .. } | FrameError::Json(_))
        )
    }
}

/// The producing end of a link.
pub trait Push<T>: Send {
    /// Enqueue one item, waiting for capacity.
    fn push(&mut self, item: T) -> impl Future<Output = Result<(), QueueError>> + Send;
}

/// The consuming end of a link.
///
/// `pull` is cancel safe: dropping the future before it resolves never
/// loses an item, so callers may bound it with a timeout.
pub trait Pull<T>: Send {
    /// Wait for the next item.
    fn pull(&mut self) -> impl Future<Output = Result<T, QueueError>> + Send;
}
