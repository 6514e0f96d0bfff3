//! Transport seam between the replication layer and the wire.
//!
//! The replicator only knows [`PeerTransport`]. Production uses the TCP
//! implementation in `net::client`; tests and embedded multi-node setups
//! use [`LoopbackTransport`], which applies events directly to in-process
//! stores.

use crate::registry::instance::InstanceInfo;
use crate::registry::store::LeaseStore;
use crate::replication::event::ReplicationEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failure talking to a peer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer did not answer within the configured timeout.
    #[error("timed out talking to {peer}")]
    Timeout { peer: String },

    /// Connection or I/O failure.
    #[error("i/o error talking to {peer}: {message}")]
    Io { peer: String, message: String },

    /// The peer answered with something the protocol does not allow.
    #[error("protocol error from {peer}: {message}")]
    Protocol { peer: String, message: String },

    /// The peer address is not known to this transport.
    #[error("unknown peer {peer}")]
    UnknownPeer { peer: String },
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// How the replication layer reaches peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Push a batch of events to one peer.
    async fn push_events(&self, peer: &str, events: &[ReplicationEvent]) -> TransportResult<()>;

    /// Pull a full registry snapshot from one peer.
    async fn pull_snapshot(&self, peer: &str) -> TransportResult<Vec<InstanceInfo>>;
}

/// In-process transport wiring peer addresses to local stores.
///
/// Pushes apply synchronously through `apply_replicated`; pulls return the
/// target store's snapshot. Used by tests and by embedded multi-registry
/// setups.
#[derive(Default)]
pub struct LoopbackTransport {
    stores: RwLock<HashMap<String, Arc<LeaseStore>>>,
}

impl LoopbackTransport {
    /// Create an empty loopback transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a store at a peer address.
    pub fn attach(&self, address: impl Into<String>, store: Arc<LeaseStore>) {
        self.stores.write().insert(address.into(), store);
    }

    /// Detach a peer, simulating it going down.
    pub fn detach(&self, address: &str) {
        self.stores.write().remove(address);
    }

    fn store_for(&self, peer: &str) -> TransportResult<Arc<LeaseStore>> {
        self.stores
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPeer {
                peer: peer.to_string(),
            })
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn push_events(&self, peer: &str, events: &[ReplicationEvent]) -> TransportResult<()> {
        let store = self.store_for(peer)?;
        for event in events {
            store.apply_replicated(event);
        }
        Ok(())
    }

    async fn pull_snapshot(&self, peer: &str) -> TransportResult<Vec<InstanceInfo>> {
        Ok(self.store_for(peer)?.snapshot())
    }
}
