//! Peer replication.
//!
//! This module fans registry mutations out to peer nodes:
//! - [`event`] - Replication events and conflict ordering
//! - [`peer`] - Peer reachability state and backoff policy
//! - [`transport`] - Transport seam between replicator and wire
//! - [`replicator`] - Per-peer queues, batching, and startup sync

pub mod event;
pub mod peer;
pub mod replicator;
pub mod transport;
