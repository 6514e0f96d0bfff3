//! Periodic lease expiry sweep with self-preservation.
//!
//! The sweep scans all shards for lapsed leases using monotonic local
//! time and evicts them. Each eviction re-checks expiry under the shard
//! write lock, so a renewal racing the sweep always wins.
//!
//! Self-preservation: when one sweep would evict more than the configured
//! fraction of the registry, the likely cause is a network partition
//! between clients and this node, not mass instance death. The whole
//! sweep is suppressed and reported; availability is favored over strict
//! staleness during partitions.

use crate::ops::observability::RegistryMetrics;
use crate::registry::store::LeaseStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Interval between sweeps in seconds.
    pub interval_secs: u64,
    /// Maximum fraction of the registry one sweep may evict before the
    /// sweep is suppressed.
    pub guard_fraction: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            guard_fraction: 0.15,
        }
    }
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Instances registered when the sweep started.
    pub total: usize,
    /// Lapsed leases found by the scan.
    pub candidates: usize,
    /// Instances actually evicted.
    pub evicted: usize,
    /// Whether the self-preservation guard suppressed this sweep.
    pub suppressed: bool,
}

/// Expiry sweeper over a lease store.
pub struct EvictionSweeper {
    store: Arc<LeaseStore>,
    config: SweepConfig,
    metrics: Arc<RegistryMetrics>,
}

impl EvictionSweeper {
    /// Create a sweeper.
    pub fn new(store: Arc<LeaseStore>, config: SweepConfig, metrics: Arc<RegistryMetrics>) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Run one sweep pass synchronously.
    pub fn sweep(&self) -> SweepOutcome {
        let total = self.store.instance_count();
        let candidates = self.store.expired_candidates();
        let mut outcome = SweepOutcome {
            total,
            candidates: candidates.len(),
            evicted: 0,
            suppressed: false,
        };

        if !candidates.is_empty() && self.guard_triggered(candidates.len(), total) {
            outcome.suppressed = true;
            RegistryMetrics::incr(&self.metrics.sweeps_suppressed);
            tracing::warn!(
                candidates = candidates.len(),
                total,
                guard_fraction = self.config.guard_fraction,
                "self-preservation engaged, sweep suppressed"
            );
        } else {
            for key in &candidates {
                if let Some(info) = self.store.evict_if_still_expired(key) {
                    outcome.evicted += 1;
                    tracing::info!(key = %key, endpoint = %info.endpoint(), "lease expired, instance evicted");
                }
            }
        }

        self.store.maintain();
        RegistryMetrics::incr(&self.metrics.sweeps);
        outcome
    }

    /// Whether evicting `candidates` out of `total` trips the guard.
    fn guard_triggered(&self, candidates: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        let limit = (total as f64 * self.config.guard_fraction).ceil() as usize;
        candidates > limit
    }

    /// Spawn the periodic sweep task. Stops when the shutdown channel
    /// flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = self.sweep();
                        if outcome.evicted > 0 || outcome.suppressed {
                            tracing::debug!(?outcome, "sweep pass finished");
                        }
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            tracing::debug!("expiry sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use crate::registry::store::{Registration, StoreConfig};
    use std::collections::HashMap;

    fn setup() -> (Arc<ManualClock>, Arc<LeaseStore>, EvictionSweeper) {
        let clock = Arc::new(ManualClock::new());
        let metrics = Arc::new(RegistryMetrics::new());
        let store = Arc::new(LeaseStore::new(
            StoreConfig::default(),
            "node-test",
            clock.clone(),
            metrics.clone(),
        ));
        let sweeper = EvictionSweeper::new(store.clone(), SweepConfig::default(), metrics);
        (clock, store, sweeper)
    }

    fn registration(service: &str, instance_id: &str) -> Registration {
        Registration {
            service: service.to_string(),
            instance_id: instance_id.to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            health_check_url: None,
            status: None,
            metadata: HashMap::new(),
            renewal_interval_secs: None,
            duration_secs: None,
        }
    }

    #[test]
    fn sweep_evicts_lapsed_lease() {
        let (clock, store, sweeper) = setup();
        store.register(registration("orders", "i-1"));

        clock.advance_ms(91_000);
        let outcome = sweeper.sweep();
        assert_eq!(outcome.evicted, 1);
        assert!(!outcome.suppressed);
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_keeps_renewed_lease() {
        let (clock, store, sweeper) = setup();
        store.register(registration("orders", "i-1"));

        clock.advance_ms(60_000);
        assert!(store.renew("orders", "i-1"));
        clock.advance_ms(60_000);

        let outcome = sweeper.sweep();
        assert_eq!(outcome.evicted, 0);
        assert_eq!(store.instance_count(), 1);
    }

    #[test]
    fn guard_suppresses_mass_eviction() {
        let (clock, store, sweeper) = setup();
        for n in 0..10 {
            store.register(registration("orders", &format!("i-{n}")));
        }

        // Every lease lapses at once: partition, not mass death.
        clock.advance_ms(120_000);
        let outcome = sweeper.sweep();
        assert!(outcome.suppressed);
        assert_eq!(outcome.evicted, 0);
        assert_eq!(store.instance_count(), 10);
    }

    #[test]
    fn guard_allows_small_eviction() {
        let (clock, store, sweeper) = setup();
        for n in 0..10 {
            store.register(registration("orders", &format!("i-{n}")));
        }

        clock.advance_ms(60_000);
        for n in 1..10 {
            assert!(store.renew("orders", &format!("i-{n}")));
        }
        clock.advance_ms(60_000);

        // Only i-0 lapsed: 1 of 10 is within the guard.
        let outcome = sweeper.sweep();
        assert!(!outcome.suppressed);
        assert_eq!(outcome.evicted, 1);
        assert_eq!(store.instance_count(), 9);
    }
}
