//! Gateway-side endpoints.

use super::{Listening, accept_loop};
use crate::memory::{self, Puller, Pusher};
use crate::{Pull, Push};
use protocol::Credit;
use protocol::codec::{self, FrameError};
use serde::{Serialize, de::DeserializeOwned};
use std::net::SocketAddr;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
};

/// Bind the distributing end of a link.
///
/// Items pushed into the returned [`Pusher`] are buffered (up to
/// `capacity`) until a connected puller asks for one with a
/// [`Credit::Ready`] frame. Each item is written to exactly one connection;
/// an item whose write fails goes back into the queue.
pub async fn bind_push<T>(addr: &str, capacity: usize) -> std::io::Result<(Pusher<T>, Listening)>
where
    T: Serialize + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (pusher, puller) = memory::queue(capacity);
    let requeue = pusher.clone();
    tracing::info!("push endpoint listening on {local_addr}");

    let accept = tokio::spawn(accept_loop(listener, move |stream, peer| {
        serve_puller(stream, peer, puller.clone(), requeue.clone())
    }));
    Ok((pusher, Listening { local_addr, accept }))
}

/// Bind the collecting end of a link.
///
/// Every item read from any connection lands in the returned [`Puller`].
pub async fn bind_pull<T>(addr: &str, capacity: usize) -> std::io::Result<(Puller<T>, Listening)>
where
    T: DeserializeOwned + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (pusher, puller) = memory::queue(capacity);
    tracing::info!("pull endpoint listening on {local_addr}");

    let accept = tokio::spawn(accept_loop(listener, move |stream, peer| {
        serve_pusher(stream, peer, pusher.clone())
    }));
    Ok((puller, Listening { local_addr, accept }))
}

/// Hand out one queued item per credit received from the peer.
async fn serve_puller<T>(stream: TcpStream, peer: SocketAddr, mut source: Puller<T>, requeue: Pusher<T>)
where
    T: Serialize + Send + Sync + 'static,
{
    let (mut reader, mut writer) = stream.into_split();
    let mut credits = 0usize;

    loop {
        if credits == 0 {
            match codec::read_message::<_, Credit>(&mut reader).await {
                Ok(Credit::Ready) => credits += 1,
                Err(e) if e.is_recoverable() => tracing::warn!("bad credit frame from {peer}: {e}"),
                Err(FrameError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::debug!("read error from {peer}: {e}");
                    break;
                }
            }
            continue;
        }

        // A well-behaved peer is silent while it holds a credit, so the
        // read below only ever completes on disconnect or a spare credit.
        tokio::select! {
            item = source.pull() => {
                let Ok(item) = item else { break };
                let frame = match codec::encode_frame(&item) {
                    Ok(frame) => frame,
                    Err(e) => {
                        // Requeueing would hand the same frame out forever.
                        tracing::error!("dropping item that cannot be framed: {e}");
                        continue;
                    }
                };
                if let Err(e) = send_frame(&mut writer, &frame).await {
                    tracing::warn!("failed to hand item to {peer}, requeueing: {e}");
                    if let Err(e) = requeue.try_push(item) {
                        tracing::error!("dropped item after failed handoff to {peer}: {e}");
                    }
                    break;
                }
                credits -= 1;
            }
            frame = codec::read_message::<_, Credit>(&mut reader) => {
                match frame {
                    Ok(Credit::Ready) => credits += 1,
                    Err(e) if e.is_recoverable() => tracing::warn!("bad credit frame from {peer}: {e}"),
                    Err(FrameError::ConnectionClosed) => break,
                    Err(e) => {
                        tracing::debug!("read error from {peer}: {e}");
                        break;
                    }
                }
            }
        }
    }
    tracing::debug!("puller {peer} disconnected");
}

async fn send_frame(writer: &mut OwnedWriteHalf, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Forward every item the peer sends into the shared queue.
async fn serve_pusher<T>(stream: TcpStream, peer: SocketAddr, mut sink: Pusher<T>)
where
    T: DeserializeOwned + Send + 'static,
{
    let (mut reader, _writer) = stream.into_split();
    loop {
        let item: T = match codec::read_message(&mut reader).await {
            Ok(item) => item,
            Err(e) if e.is_recoverable() => {
                tracing::warn!("skipping malformed frame from {peer}: {e}");
                continue;
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(e) => {
                tracing::debug!("read error from {peer}: {e}");
                break;
            }
        };
        if sink.push(item).await.is_err() {
            break;
        }
    }
    tracing::debug!("pusher {peer} disconnected");
}
