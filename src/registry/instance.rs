//! Instance identity, status, and lease records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compound key identifying one registered instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    /// Logical service name.
    pub service: String,
    /// Instance identifier, unique within the service.
    pub instance_id: String,
}

impl InstanceKey {
    /// Create a new key.
    pub fn new(service: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.instance_id)
    }
}

/// Reported status of a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Serving traffic.
    Up,
    /// Known to be down.
    Down,
    /// Registered but still warming up.
    Starting,
    /// Administratively removed from rotation.
    OutOfService,
    /// Status not reported.
    Unknown,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Starting => "STARTING",
            Self::OutOfService => "OUT_OF_SERVICE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Lease terms and renewal history for an instance.
///
/// `registered_at_ms` and `last_renewal_ms` are wall-clock values for
/// display and replication payloads. Expiry never compares them; the
/// store keeps its own monotonic renewal time per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    /// Expected renewal cadence in seconds.
    pub renewal_interval_secs: u64,
    /// Lease duration: no renewal for this long means eviction.
    pub duration_secs: u64,
    /// Wall-clock registration time (ms since epoch).
    pub registered_at_ms: u64,
    /// Wall-clock time of the last renewal (ms since epoch).
    pub last_renewal_ms: u64,
}

impl LeaseInfo {
    /// Lease duration in milliseconds, saturating for huge durations.
    pub fn duration_ms(&self) -> u64 {
        self.duration_secs.saturating_mul(1000)
    }
}

/// One registered service endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Logical service name.
    pub service: String,
    /// Instance identifier, unique within the service.
    pub instance_id: String,
    /// Network address (host or IP).
    pub address: String,
    /// Port the instance serves on.
    pub port: u16,
    /// Optional health-check URL.
    pub health_check_url: Option<String>,
    /// Current status.
    pub status: InstanceStatus,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Lease terms and renewal history.
    pub lease: LeaseInfo,
    /// Logical stamp of the last accepted mutation (replication ordering).
    pub stamp: u64,
}

impl InstanceInfo {
    /// The compound key for this instance.
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.service.clone(), self.instance_id.clone())
    }

    /// "address:port" rendering.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
