//! Worker-side clients. Both reconnect on their own after the gateway
//! restarts or the network drops.

use crate::{Pull, Push, QueueError};
use protocol::Credit;
use protocol::codec;
use serde::{Serialize, de::DeserializeOwned};
use std::{marker::PhantomData, time::Duration};
use tokio::{io::AsyncWriteExt, net::TcpStream, sync::mpsc, task::JoinHandle};

/// Pulls items from a [`bind_push`](super::bind_push) endpoint.
///
/// A background task owns the connection and asks for a new item only when
/// [`Pull::pull`] is waiting for one, so an idle worker never hoards work.
pub struct PullClient<T> {
    demand: mpsc::Sender<()>,
    items: mpsc::Receiver<T>,
    awaiting: bool,
    task: JoinHandle<()>,
}

impl<T> PullClient<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Start pulling from `addr`, retrying the connection every `backoff`.
    pub fn connect(addr: impl Into<String>, backoff: Duration) -> Self {
        let (demand, demand_rx) = mpsc::channel(1);
        let (items_tx, items) = mpsc::channel(1);
        let task = tokio::spawn(pull_loop(addr.into(), backoff, demand_rx, items_tx));
        Self {
            demand,
            items,
            awaiting: false,
            task,
        }
    }
}

impl<T: Send> Pull<T> for PullClient<T> {
    async fn pull(&mut self) -> Result<T, QueueError> {
        if !self.awaiting {
            self.demand.send(()).await.map_err(|_| QueueError::Closed)?;
            self.awaiting = true;
        }
        let item = self.items.recv().await.ok_or(QueueError::Closed)?;
        self.awaiting = false;
        Ok(item)
    }
}

impl<T> Drop for PullClient<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pull_loop<T>(
    addr: String,
    backoff: Duration,
    mut demand: mpsc::Receiver<()>,
    items: mpsc::Sender<T>,
) where
    T: DeserializeOwned + Send + 'static,
{
    // Whether a credit is owed to the local puller across reconnects.
    let mut owed = false;

    'connect: loop {
        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("failed to connect to {addr}: {e}");
                tokio::time::sleep(backoff).await;
                continue;
            }
        };
        tracing::info!("pulling from {addr}");
        let (mut reader, mut writer) = stream.into_split();

        loop {
            if !owed {
                if demand.recv().await.is_none() {
                    break 'connect;
                }
                owed = true;
            }

            if let Err(e) = codec::write_message(&mut writer, &Credit::Ready).await {
                tracing::warn!("lost connection to {addr}: {e}");
                break;
            }

            match codec::read_message::<_, T>(&mut reader).await {
                Ok(item) => {
                    owed = false;
                    if items.send(item).await.is_err() {
                        break 'connect;
                    }
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("skipping malformed frame from {addr}: {e}");
                }
                Err(e) => {
                    tracing::warn!("lost connection to {addr}: {e}");
                    break;
                }
            }
        }

        tokio::time::sleep(backoff).await;
    }
}

/// Pushes items to a [`bind_pull`](super::bind_pull) endpoint.
///
/// Connects lazily. A failed write drops the connection and returns the
/// error; the next push reconnects. An item that cannot be framed is
/// refused with a permanent error and the connection is kept.
pub struct PushClient<T> {
    addr: String,
    stream: Option<TcpStream>,
    _item: PhantomData<fn(T)>,
}

impl<T> PushClient<T> {
    /// Create a client for `addr`. No connection is made until the first push.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            _item: PhantomData,
        }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl<T> Push<T> for PushClient<T>
where
    T: Serialize + Send + Sync,
{
    async fn push(&mut self, item: T) -> Result<(), QueueError> {
        // Encoding failures are the item's fault, not the connection's.
        let frame = codec::encode_frame(&item)?;
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.addr).await?;
            stream.set_nodelay(true)?;
            tracing::info!("pushing to {}", self.addr);
            self.stream = Some(stream);
        }
        let stream = self.stream.as_mut().ok_or(QueueError::Closed)?;
        let written = async {
            stream.write_all(&frame).await?;
            stream.flush().await
        };
        if let Err(e) = written.await {
            self.stream = None;
            return Err(e.into());
        }
        Ok(())
    }
}
