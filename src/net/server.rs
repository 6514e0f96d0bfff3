//! Peer TCP listener.
//!
//! Accepts connections from peer registry nodes, decodes framed requests,
//! applies pushed events through the lease store, and answers snapshot
//! pulls. One task per connection; the whole listener stops when the
//! shutdown channel flips.

use crate::net::wire::{read_message, write_message, PeerRequest, PeerResponse, WireError};
use crate::registry::store::{ApplyOutcome, LeaseStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Peer-facing TCP server.
pub struct PeerServer {
    store: Arc<LeaseStore>,
}

impl PeerServer {
    /// Create a server over the given store.
    pub fn new(store: Arc<LeaseStore>) -> Self {
        Self { store }
    }

    /// Bind and start accepting. Returns the bound address (useful when
    /// binding port 0 in tests) and the accept-loop handle.
    pub async fn start(
        self,
        bind: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(bind).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "peer listener accepting");

        let store = self.store;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, remote)) => {
                                let store = store.clone();
                                let conn_shutdown = shutdown.clone();
                                tokio::spawn(async move {
                                    if let Err(error) =
                                        serve_connection(stream, remote, store, conn_shutdown).await
                                    {
                                        tracing::debug!(%remote, %error, "peer connection closed with error");
                                    }
                                });
                            }
                            Err(error) => {
                                tracing::warn!(%error, "accept failed");
                            }
                        }
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            tracing::debug!("peer listener stopping");
                            break;
                        }
                    }
                }
            }
        });
        Ok((local_addr, handle))
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    remote: SocketAddr,
    store: Arc<LeaseStore>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), WireError> {
    loop {
        let request = tokio::select! {
            request = read_message::<_, PeerRequest>(&mut stream) => request?,
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
                continue;
            }
        };
        let Some(request) = request else {
            return Ok(()); // clean end of stream
        };

        let response = handle_request(request, &store, remote);
        write_message(&mut stream, &response).await?;
    }
}

fn handle_request(request: PeerRequest, store: &LeaseStore, remote: SocketAddr) -> PeerResponse {
    match request {
        PeerRequest::Push { origin, events } => {
            let mut applied = 0;
            for event in &events {
                if store.apply_replicated(event) == ApplyOutcome::Applied {
                    applied += 1;
                }
            }
            tracing::debug!(
                %remote,
                origin = %origin,
                received = events.len(),
                applied,
                "peer push applied"
            );
            PeerResponse::Ack { applied }
        }
        PeerRequest::PullSnapshot => {
            let instances = store.snapshot();
            tracing::debug!(%remote, count = instances.len(), "peer snapshot served");
            PeerResponse::Snapshot { instances }
        }
    }
}
