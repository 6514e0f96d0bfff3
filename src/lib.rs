//! Beacon - Lease-based service registry with peer replication.
//!
//! Beacon is a single-binary service discovery registry. Service instances
//! register themselves under a service name, keep their registration alive
//! with periodic heartbeats, and are evicted when heartbeats stop. Clients
//! fetch the full registry or an incremental delta of recent changes. A
//! small cluster of Beacon nodes gossips every mutation to its peers so
//! reads can be served from any node.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Client API                              │
//! │   register │ renew │ cancel │ set_status │ fetch_all │ delta    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Lease Store                             │
//! │   Sharded instance map │ Change log │ Tombstones │ Stamps       │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │                              │
//! ┌────────────────────────────┐  ┌───────────────────────────────┐
//! │       Expiry Sweeper       │  │      Replication Layer        │
//! │  Lease eviction │ Guard    │  │  Per-peer queues │ TCP wire   │
//! └────────────────────────────┘  └───────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Main runtime orchestration
//! - [`core::time`] - Clocks and logical stamps
//! - [`core::error`] - Error types and status mapping
//!
//! ## Registry
//! - [`registry::instance`] - Instance identity, status, and leases
//! - [`registry::store`] - Sharded lease store and apply path
//! - [`registry::delta`] - Recent-change log for incremental fetch
//! - [`registry::sweeper`] - Expiry sweep with self-preservation
//!
//! ## Replication
//! - [`replication::event`] - Replication events and conflict ordering
//! - [`replication::peer`] - Peer state and backoff
//! - [`replication::transport`] - Transport seam
//! - [`replication::replicator`] - Fan-out, batching, startup sync
//!
//! ## Networking
//! - [`net::wire`] - Length-prefixed JSON peer protocol
//! - [`net::server`] - Peer listener
//! - [`net::client`] - TCP peer transport
//!
//! ## API and Ops
//! - [`api`] - Validated client-facing operations
//! - [`ops::observability`] - Counters, health, readiness
//! - [`cli`] - Command-line interface

pub mod api;
pub mod cli;
pub mod core;
pub mod net;
pub mod ops;
pub mod registry;
pub mod replication;
