//! Lease registry.
//!
//! This module holds the registry state and its lifecycle machinery:
//! - [`instance`] - Instance identity, status, and lease records
//! - [`store`] - Sharded lease store and replication apply path
//! - [`delta`] - Recent-change log backing incremental fetches
//! - [`sweeper`] - Periodic expiry with self-preservation guard

pub mod delta;
pub mod instance;
pub mod store;
pub mod sweeper;
