//! Replication events exchanged between registry nodes.
//!
//! Events are immutable records of local state changes, ordered per
//! instance key by logical stamp. There is no global ordering; nodes
//! converge by applying the same per-key last-writer-wins rules in any
//! arrival order, with removal events winning ties.

use crate::registry::instance::{InstanceInfo, InstanceKey, InstanceStatus};
use serde::{Deserialize, Serialize};

/// Kind of replicated state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Instance registered (payload carries the full record).
    Register,
    /// Lease renewed.
    Renew,
    /// Instance cancelled by its client.
    Cancel,
    /// Instance evicted by the expiry sweep.
    Expire,
    /// Status overridden.
    StatusChange,
}

impl EventKind {
    /// Whether this event removes the instance.
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Cancel | Self::Expire)
    }

    /// Stable name for logging and conflict reporting.
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "Register",
            Self::Renew => "Renew",
            Self::Cancel => "Cancel",
            Self::Expire => "Expire",
            Self::StatusChange => "StatusChange",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A replicated registry state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationEvent {
    /// What changed.
    pub kind: EventKind,
    /// Which instance.
    pub key: InstanceKey,
    /// Full instance record, carried by Register events.
    pub instance: Option<InstanceInfo>,
    /// New status, carried by StatusChange events.
    pub status: Option<InstanceStatus>,
    /// Node where the change originated.
    pub origin: String,
    /// Logical stamp assigned at the origin.
    pub stamp: u64,
}

impl ReplicationEvent {
    /// Build a Register event carrying the full record.
    pub fn register(instance: InstanceInfo, origin: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Register,
            key: instance.key(),
            stamp: instance.stamp,
            instance: Some(instance),
            status: None,
            origin: origin.into(),
        }
    }

    /// Build a Renew event.
    pub fn renew(key: InstanceKey, stamp: u64, origin: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Renew,
            key,
            instance: None,
            status: None,
            origin: origin.into(),
            stamp,
        }
    }

    /// Build a Cancel event.
    pub fn cancel(key: InstanceKey, stamp: u64, origin: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Cancel,
            key,
            instance: None,
            status: None,
            origin: origin.into(),
            stamp,
        }
    }

    /// Build an Expire event.
    pub fn expire(key: InstanceKey, stamp: u64, origin: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Expire,
            key,
            instance: None,
            status: None,
            origin: origin.into(),
            stamp,
        }
    }

    /// Build a StatusChange event.
    pub fn status_change(
        key: InstanceKey,
        status: InstanceStatus,
        stamp: u64,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            kind: EventKind::StatusChange,
            key,
            instance: None,
            status: Some(status),
            origin: origin.into(),
            stamp,
        }
    }

    /// Whether this event supersedes state currently carrying `current_stamp`.
    ///
    /// Strictly newer stamps always win. At equal stamps only removal
    /// events win, which is what makes Cancel/Expire dominate a Renew or
    /// StatusChange issued at the same logical instant.
    pub fn supersedes(&self, current_stamp: u64) -> bool {
        if self.stamp > current_stamp {
            true
        } else {
            self.stamp == current_stamp && self.kind.is_removal()
        }
    }
}
