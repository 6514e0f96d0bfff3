//! TCP implementation of the peer transport.
//!
//! Opens a fresh connection per request. Connections are short-lived and
//! requests are small; the replicator already batches events, so
//! connection reuse buys little and a stuck socket can never wedge more
//! than one exchange.

use crate::net::wire::{read_message, write_message, PeerRequest, PeerResponse};
use crate::registry::instance::InstanceInfo;
use crate::replication::event::ReplicationEvent;
use crate::replication::transport::{PeerTransport, TransportError, TransportResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Peer transport over plain TCP with bounded connect and exchange times.
pub struct TcpPeerTransport {
    node_id: String,
    connect_timeout: Duration,
}

impl TcpPeerTransport {
    /// Create a transport; `node_id` is stamped as push origin.
    pub fn new(node_id: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            connect_timeout,
        }
    }

    async fn exchange(&self, peer: &str, request: &PeerRequest) -> TransportResult<PeerResponse> {
        let connect = tokio::time::timeout(self.connect_timeout, TcpStream::connect(peer))
            .await
            .map_err(|_| TransportError::Timeout {
                peer: peer.to_string(),
            })?
            .map_err(|error| TransportError::Io {
                peer: peer.to_string(),
                message: error.to_string(),
            })?;

        let mut stream = connect;
        write_message(&mut stream, request)
            .await
            .map_err(|error| TransportError::Io {
                peer: peer.to_string(),
                message: error.to_string(),
            })?;

        match read_message::<_, PeerResponse>(&mut stream).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(TransportError::Protocol {
                peer: peer.to_string(),
                message: "connection closed before response".to_string(),
            }),
            Err(error) => Err(TransportError::Io {
                peer: peer.to_string(),
                message: error.to_string(),
            }),
        }
    }
}

#[async_trait]
impl PeerTransport for TcpPeerTransport {
    async fn push_events(&self, peer: &str, events: &[ReplicationEvent]) -> TransportResult<()> {
        let request = PeerRequest::Push {
            origin: self.node_id.clone(),
            events: events.to_vec(),
        };
        match self.exchange(peer, &request).await? {
            PeerResponse::Ack { .. } => Ok(()),
            PeerResponse::Error { message } => Err(TransportError::Protocol {
                peer: peer.to_string(),
                message,
            }),
            PeerResponse::Snapshot { .. } => Err(TransportError::Protocol {
                peer: peer.to_string(),
                message: "unexpected snapshot response to push".to_string(),
            }),
        }
    }

    async fn pull_snapshot(&self, peer: &str) -> TransportResult<Vec<InstanceInfo>> {
        match self.exchange(peer, &PeerRequest::PullSnapshot).await? {
            PeerResponse::Snapshot { instances } => Ok(instances),
            PeerResponse::Error { message } => Err(TransportError::Protocol {
                peer: peer.to_string(),
                message,
            }),
            PeerResponse::Ack { .. } => Err(TransportError::Protocol {
                peer: peer.to_string(),
                message: "unexpected ack response to snapshot pull".to_string(),
            }),
        }
    }
}
