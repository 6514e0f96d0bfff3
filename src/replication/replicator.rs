//! Fan-out of local registry events to peer nodes.
//!
//! One bounded channel and one sender task per peer. Local operations
//! enqueue and return; nothing about a peer can block or fail a client
//! call. If a peer's channel fills while it is down, events are dropped
//! and counted; the stamp rules and snapshot pulls heal the divergence.
//!
//! Sender tasks batch pending events, push with a bounded timeout, and on
//! failure mark the peer unreachable and retry the held batch on an
//! exponential backoff schedule.

use crate::ops::observability::RegistryMetrics;
use crate::registry::store::LeaseStore;
use crate::replication::event::ReplicationEvent;
use crate::replication::peer::{BackoffPolicy, PeerNode};
use crate::replication::transport::PeerTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Replication layer configuration.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Per-peer channel capacity; events queued past this while a peer is
    /// down are dropped.
    pub channel_capacity: usize,
    /// Maximum events per push batch.
    pub batch_max: usize,
    /// Timeout for one push or snapshot pull in milliseconds.
    pub request_timeout_ms: u64,
    /// Backoff schedule for unreachable peers.
    pub backoff: BackoffPolicy,
    /// Pull a full snapshot from a peer before serving.
    pub sync_on_start: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            batch_max: 64,
            request_timeout_ms: 2_000,
            backoff: BackoffPolicy::default(),
            sync_on_start: true,
        }
    }
}

/// Replication gossip layer: fans local events out to all peers.
pub struct Replicator {
    config: ReplicationConfig,
    peers: Vec<String>,
    transport: Arc<dyn PeerTransport>,
    metrics: Arc<RegistryMetrics>,
    handles: Vec<JoinHandle<()>>,
}

impl Replicator {
    /// Create a replicator for the given peer set.
    pub fn new(
        config: ReplicationConfig,
        peers: Vec<String>,
        transport: Arc<dyn PeerTransport>,
        metrics: Arc<RegistryMetrics>,
    ) -> Self {
        Self {
            config,
            peers,
            transport,
            metrics,
            handles: Vec::new(),
        }
    }

    /// Configured peer addresses.
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Start the fan-out and per-peer sender tasks.
    ///
    /// `events` is the store's replication sink; the fan-out task ends
    /// when the sink closes or the shutdown channel flips.
    pub fn start(
        &mut self,
        mut events: mpsc::UnboundedReceiver<ReplicationEvent>,
        shutdown: watch::Receiver<bool>,
    ) {
        let mut senders = Vec::with_capacity(self.peers.len());
        for peer in &self.peers {
            let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
            senders.push(tx);
            self.handles.push(self.spawn_sender(
                PeerNode::new(peer.clone(), self.config.backoff.clone()),
                rx,
                shutdown.clone(),
            ));
        }

        let metrics = self.metrics.clone();
        let mut shutdown = shutdown;
        self.handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        for sender in &senders {
                            // Fire-and-forget: a full channel means the
                            // peer is far behind, drop rather than block.
                            if sender.try_send(event.clone()).is_err() {
                                RegistryMetrics::incr(&metrics.events_dropped);
                            }
                        }
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            // Dropping the senders lets the per-peer tasks drain and exit.
        }));
    }

    fn spawn_sender(
        &self,
        mut peer: PeerNode,
        mut rx: mpsc::Receiver<ReplicationEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let metrics = self.metrics.clone();
        let batch_max = self.config.batch_max.max(1);
        let timeout = Duration::from_millis(self.config.request_timeout_ms.max(1));

        tokio::spawn(async move {
            loop {
                let first = tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                };

                let mut batch = vec![first];
                while batch.len() < batch_max {
                    match rx.try_recv() {
                        Ok(event) => batch.push(event),
                        Err(_) => break,
                    }
                }

                // Hold the batch until the peer takes it or we shut down.
                loop {
                    let attempt = tokio::time::timeout(
                        timeout,
                        transport.push_events(&peer.address, &batch),
                    )
                    .await;
                    match attempt {
                        Ok(Ok(())) => {
                            peer.record_success();
                            RegistryMetrics::incr(&metrics.peer_batches_sent);
                            break;
                        }
                        Ok(Err(error)) => {
                            RegistryMetrics::incr(&metrics.peer_failures);
                            tracing::debug!(peer = %peer.address, %error, "push failed");
                        }
                        Err(_) => {
                            RegistryMetrics::incr(&metrics.peer_failures);
                            tracing::debug!(peer = %peer.address, "push timed out");
                        }
                    }
                    let delay = peer.record_failure();
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        result = shutdown.changed() => {
                            if result.is_err() || *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Pull a full snapshot from the first peer that answers and merge it
    /// into the store. Returns the peer and how many records applied, or
    /// None when every peer is down (the node then starts empty).
    pub async fn sync_from_peers(&self, store: &LeaseStore) -> Option<(String, usize)> {
        let timeout = Duration::from_millis(self.config.request_timeout_ms.max(1));
        for peer in &self.peers {
            match tokio::time::timeout(timeout, self.transport.pull_snapshot(peer)).await {
                Ok(Ok(instances)) => {
                    let applied = store.load_snapshot(instances, peer);
                    tracing::info!(peer = %peer, applied, "startup snapshot pulled");
                    return Some((peer.clone(), applied));
                }
                Ok(Err(error)) => {
                    tracing::warn!(peer = %peer, %error, "startup snapshot pull failed");
                }
                Err(_) => {
                    tracing::warn!(peer = %peer, "startup snapshot pull timed out");
                }
            }
        }
        if !self.peers.is_empty() {
            tracing::warn!("no peer answered the startup snapshot pull, starting empty");
        }
        None
    }

    /// Wait for all replication tasks to finish.
    pub async fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}
