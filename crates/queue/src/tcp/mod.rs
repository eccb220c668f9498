//! TCP push/pull endpoints.
//!
//! The gateway binds both ends of the pipeline and workers connect to
//! them, so workers can come and go without reconfiguring the gateway:
//!
//! ```text
//!  gateway                                   worker (xN)
//!  bind_push(task_bind)  ── Task ──────────▶  PullClient
//!                        ◀── Credit::Ready ──
//!  bind_pull(result_bind) ◀── TaskResult ───  PushClient
//! ```
//!
//! Every frame uses the length-prefixed JSON codec from `protocol::codec`.

use std::{future::Future, net::SocketAddr};
use tokio::{
    net::{TcpListener, TcpStream},
    task::{JoinHandle, JoinSet},
};

mod client;
mod server;

pub use client::{PullClient, PushClient};
pub use server::{bind_pull, bind_push};

/// A bound endpoint. Dropping it stops accepting and closes every open
/// connection.
pub struct Listening {
    local_addr: SocketAddr,
    accept: JoinHandle<()>,
}

impl Listening {
    /// The address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for Listening {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

/// Accept connections forever, handing each one to `handle` in its own task.
///
/// Connection tasks live in a [`JoinSet`] owned by the loop, so aborting
/// the loop tears them all down.
async fn accept_loop<F, Fut>(listener: TcpListener, mut handle: F)
where
    F: FnMut(TcpStream, SocketAddr) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!("failed to set TCP_NODELAY for {addr}: {e}");
                        }
                        tracing::debug!("accepted connection from {addr}");
                        connections.spawn(handle(stream, addr));
                    }
                    Err(e) => {
                        tracing::error!("failed to accept connection: {e}");
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}
