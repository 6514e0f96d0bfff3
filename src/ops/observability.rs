//! Counters, health, and readiness snapshots.
//!
//! Counters are plain atomics shared across components; snapshots are
//! serializable for the status surface. Replication conflict drops and
//! suppressed sweeps land here rather than in client-facing errors.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared registry counters.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    /// Successful registrations.
    pub registrations: AtomicU64,
    /// Successful renewals.
    pub renewals: AtomicU64,
    /// Client cancellations that removed an instance.
    pub cancellations: AtomicU64,
    /// Status overrides applied.
    pub status_changes: AtomicU64,
    /// Instances evicted by the sweep.
    pub evictions: AtomicU64,
    /// Sweeps suppressed by the self-preservation guard.
    pub sweeps_suppressed: AtomicU64,
    /// Completed sweep passes (suppressed or not).
    pub sweeps: AtomicU64,
    /// Replicated events applied.
    pub events_applied: AtomicU64,
    /// Replicated events dropped as stale (conflict ignored).
    pub conflicts_ignored: AtomicU64,
    /// Events dropped because a peer channel was full.
    pub events_dropped: AtomicU64,
    /// Failed peer push attempts.
    pub peer_failures: AtomicU64,
    /// Successful peer push batches.
    pub peer_batches_sent: AtomicU64,
}

impl RegistryMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to a counter.
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    /// Capture a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            status_changes: self.status_changes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            sweeps_suppressed: self.sweeps_suppressed.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            conflicts_ignored: self.conflicts_ignored.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            peer_failures: self.peer_failures.load(Ordering::Relaxed),
            peer_batches_sent: self.peer_batches_sent.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub registrations: u64,
    pub renewals: u64,
    pub cancellations: u64,
    pub status_changes: u64,
    pub evictions: u64,
    pub sweeps_suppressed: u64,
    pub sweeps: u64,
    pub events_applied: u64,
    pub conflicts_ignored: u64,
    pub events_dropped: u64,
    pub peer_failures: u64,
    pub peer_batches_sent: u64,
}

/// Liveness check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall healthy state.
    pub healthy: bool,
    /// Status message.
    pub message: String,
}

impl HealthStatus {
    /// Create a healthy status.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: "OK".to_string(),
        }
    }

    /// Create an unhealthy status.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// Readiness snapshot for the status surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadinessStatus {
    /// Overall ready state.
    pub ready: bool,
    /// Registered instance count.
    pub instances: usize,
    /// Registered service count.
    pub services: usize,
    /// Whether the startup peer sync completed (or was skipped).
    pub synced: bool,
    /// Whether the expiry sweep task is running.
    pub sweeper_running: bool,
    /// Whether the peer listener is accepting.
    pub listener_running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = RegistryMetrics::new();
        RegistryMetrics::incr(&metrics.registrations);
        RegistryMetrics::add(&metrics.evictions, 3);

        let snap = metrics.snapshot();
        assert_eq!(snap.registrations, 1);
        assert_eq!(snap.evictions, 3);
        assert_eq!(snap.renewals, 0);
    }
}
