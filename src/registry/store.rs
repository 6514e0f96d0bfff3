//! In-memory lease store.
//!
//! The store owns all registered instances, sharded by instance key so
//! mutations on unrelated keys never contend. Reads copy out; internal
//! records never escape by reference.
//!
//! Every local mutation is assigned a logical stamp and emitted to the
//! replication sink. Peer-originated events enter through
//! [`LeaseStore::apply_replicated`], which merges by stamp comparison and
//! never re-emits, so events cannot loop between nodes.
//!
//! Removal keeps a bounded tombstone (key → removal stamp) so a Register
//! or Renew that arrives after the Cancel it causally precedes is still
//! dropped, which is what makes event application order-independent.

use crate::core::time::{wall_clock_ms, Clock, StampGenerator};
use crate::ops::observability::RegistryMetrics;
use crate::registry::delta::{ChangeKind, ChangeLog, ChangeLogConfig, Delta};
use crate::registry::instance::{InstanceInfo, InstanceKey, InstanceStatus, LeaseInfo};
use crate::replication::event::{EventKind, ReplicationEvent};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default lease terms applied when a registration does not specify its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseDefaults {
    /// Expected renewal cadence in seconds.
    pub renewal_interval_secs: u64,
    /// Lease duration: no renewal for this long means eviction.
    pub duration_secs: u64,
}

impl Default for LeaseDefaults {
    fn default() -> Self {
        Self {
            renewal_interval_secs: 30,
            duration_secs: 90,
        }
    }
}

/// Lease store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of shards. Mutations on different shards never contend.
    pub shard_count: usize,
    /// Default lease terms.
    pub lease: LeaseDefaults,
    /// Change log retention bounds.
    pub changelog: ChangeLogConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_count: 16,
            lease: LeaseDefaults::default(),
            changelog: ChangeLogConfig::default(),
        }
    }
}

/// Registration input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Logical service name.
    pub service: String,
    /// Instance identifier, unique within the service.
    pub instance_id: String,
    /// Network address (host or IP).
    pub address: String,
    /// Port the instance serves on.
    pub port: u16,
    /// Optional health-check URL.
    #[serde(default)]
    pub health_check_url: Option<String>,
    /// Initial status; defaults to Starting.
    #[serde(default)]
    pub status: Option<InstanceStatus>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Renewal cadence override in seconds.
    #[serde(default)]
    pub renewal_interval_secs: Option<u64>,
    /// Lease duration override in seconds.
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// Outcome of applying a replicated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event changed local state.
    Applied,
    /// The event was stale or duplicate and was dropped.
    Ignored,
}

/// Internal record: the public instance plus the monotonic renewal time
/// the sweep compares against. The monotonic time never leaves the store
/// and never crosses the wire.
#[derive(Debug, Clone)]
struct InstanceRecord {
    info: InstanceInfo,
    renewed_local_ms: u64,
}

type Shard = RwLock<HashMap<InstanceKey, InstanceRecord>>;

/// Sharded in-memory registry of instance leases.
pub struct LeaseStore {
    config: StoreConfig,
    node_id: String,
    clock: Arc<dyn Clock>,
    stamps: StampGenerator,
    shards: Vec<Shard>,
    /// Removal stamps for cancel-wins reconciliation, pruned on sweep.
    tombstones: Mutex<HashMap<InstanceKey, u64>>,
    changes: Mutex<ChangeLog>,
    sink: Mutex<Option<mpsc::UnboundedSender<ReplicationEvent>>>,
    metrics: Arc<RegistryMetrics>,
}

impl LeaseStore {
    /// Create an empty store.
    pub fn new(
        config: StoreConfig,
        node_id: impl Into<String>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RegistryMetrics>,
    ) -> Self {
        let shard_count = config.shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        let changes = Mutex::new(ChangeLog::new(config.changelog.clone()));
        Self {
            config,
            node_id: node_id.into(),
            clock,
            stamps: StampGenerator::new(),
            shards,
            tombstones: Mutex::new(HashMap::new()),
            changes,
            sink: Mutex::new(None),
            metrics,
        }
    }

    /// Attach the replication sink. Events for local mutations are sent
    /// here; replicated applies are not.
    pub fn set_event_sink(&self, sink: mpsc::UnboundedSender<ReplicationEvent>) {
        *self.sink.lock() = Some(sink);
    }

    /// Node identity used as event origin.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    // ------------------------------------------------------------------
    // Client-facing operations
    // ------------------------------------------------------------------

    /// Insert or replace an instance.
    ///
    /// Sets registration and renewal times to now and defaults the status
    /// to Starting. Re-registration with the same key overwrites: a fresh
    /// lifecycle, never a duplicate.
    pub fn register(&self, registration: Registration) -> InstanceInfo {
        let key = InstanceKey::new(
            registration.service.clone(),
            registration.instance_id.clone(),
        );
        let wall_now = wall_clock_ms();
        // The stamp is drawn under the shard write lock so commit order
        // and stamp order agree per key; otherwise a racing same-key
        // mutation could leave the resident record carrying an older
        // stamp than the one peers keep.
        let (info, replaced) = {
            let mut shard = self.shard(&key).write();
            let stamp = self.stamps.next();
            let info = InstanceInfo {
                service: registration.service,
                instance_id: registration.instance_id,
                address: registration.address,
                port: registration.port,
                health_check_url: registration.health_check_url,
                status: registration.status.unwrap_or_default(),
                metadata: registration.metadata,
                lease: LeaseInfo {
                    renewal_interval_secs: registration
                        .renewal_interval_secs
                        .unwrap_or(self.config.lease.renewal_interval_secs),
                    duration_secs: registration
                        .duration_secs
                        .unwrap_or(self.config.lease.duration_secs),
                    registered_at_ms: wall_now,
                    last_renewal_ms: wall_now,
                },
                stamp,
            };
            let record = InstanceRecord {
                info: info.clone(),
                renewed_local_ms: self.clock.now_ms(),
            };
            let replaced = shard.insert(key.clone(), record);
            (info, replaced)
        };
        // A local registration starts a fresh lifecycle; any tombstone
        // from an earlier cancellation no longer applies.
        self.tombstones.lock().remove(&key);

        if replaced.is_some() {
            tracing::debug!(key = %key, "re-registration overwrote existing instance");
        }
        self.record_change(ChangeKind::Registered, key, Some(info.clone()));
        self.emit(ReplicationEvent::register(info.clone(), &self.node_id));
        RegistryMetrics::incr(&self.metrics.registrations);
        info
    }

    /// Renew an instance's lease.
    ///
    /// Returns false when the instance is absent, which tells the caller
    /// to answer NotFound so the client re-registers.
    pub fn renew(&self, service: &str, instance_id: &str) -> bool {
        let key = InstanceKey::new(service, instance_id);
        let renewed = {
            let mut shard = self.shard(&key).write();
            match shard.get_mut(&key) {
                Some(record) => {
                    let stamp = self.stamps.next();
                    record.renewed_local_ms = self.clock.now_ms();
                    // Wall renewal time is monotonically non-decreasing
                    // while the instance exists.
                    record.info.lease.last_renewal_ms =
                        record.info.lease.last_renewal_ms.max(wall_clock_ms());
                    record.info.stamp = stamp;
                    Some(stamp)
                }
                None => None,
            }
        };
        match renewed {
            Some(stamp) => {
                self.emit(ReplicationEvent::renew(key, stamp, &self.node_id));
                RegistryMetrics::incr(&self.metrics.renewals);
                true
            }
            None => false,
        }
    }

    /// Remove an instance.
    ///
    /// Safe to retry: cancelling an absent instance is a no-op, not an
    /// error. Returns whether anything was removed.
    pub fn cancel(&self, service: &str, instance_id: &str) -> bool {
        let key = InstanceKey::new(service, instance_id);
        let removed = {
            let mut shard = self.shard(&key).write();
            match shard.remove(&key) {
                Some(_) => Some(self.stamps.next()),
                None => None,
            }
        };
        match removed {
            Some(stamp) => {
                self.remember_removal(&key, stamp);
                self.record_change(ChangeKind::Cancelled, key.clone(), None);
                self.emit(ReplicationEvent::cancel(key, stamp, &self.node_id));
                RegistryMetrics::incr(&self.metrics.cancellations);
                true
            }
            None => false,
        }
    }

    /// Override an instance's status.
    pub fn set_status(&self, service: &str, instance_id: &str, status: InstanceStatus) -> bool {
        let key = InstanceKey::new(service, instance_id);
        let updated = {
            let mut shard = self.shard(&key).write();
            match shard.get_mut(&key) {
                Some(record) => {
                    let stamp = self.stamps.next();
                    record.info.status = status;
                    record.info.stamp = stamp;
                    Some((record.info.clone(), stamp))
                }
                None => None,
            }
        };
        match updated {
            Some((info, stamp)) => {
                self.record_change(ChangeKind::StatusChanged, key.clone(), Some(info));
                self.emit(ReplicationEvent::status_change(
                    key,
                    status,
                    stamp,
                    &self.node_id,
                ));
                RegistryMetrics::incr(&self.metrics.status_changes);
                true
            }
            None => false,
        }
    }

    /// Deep-copied snapshot of all instances, grouped by service.
    ///
    /// Instances within a service are ordered by instance id so the view
    /// is deterministic.
    pub fn fetch_all(&self) -> BTreeMap<String, Vec<InstanceInfo>> {
        let mut grouped: BTreeMap<String, Vec<InstanceInfo>> = BTreeMap::new();
        for shard in &self.shards {
            for record in shard.read().values() {
                grouped
                    .entry(record.info.service.clone())
                    .or_default()
                    .push(record.info.clone());
            }
        }
        for instances in grouped.values_mut() {
            instances.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        }
        grouped
    }

    /// Instances of a single service, ordered by instance id.
    pub fn fetch_service(&self, service: &str) -> Vec<InstanceInfo> {
        let mut instances: Vec<InstanceInfo> = Vec::new();
        for shard in &self.shards {
            for record in shard.read().values() {
                if record.info.service == service {
                    instances.push(record.info.clone());
                }
            }
        }
        instances.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        instances
    }

    /// Look up a single instance.
    pub fn get(&self, service: &str, instance_id: &str) -> Option<InstanceInfo> {
        let key = InstanceKey::new(service, instance_id);
        self.shard(&key)
            .read()
            .get(&key)
            .map(|record| record.info.clone())
    }

    /// Changes since the caller's cursor.
    pub fn fetch_delta(&self, cursor: u64) -> Delta {
        self.changes.lock().since(cursor)
    }

    // ------------------------------------------------------------------
    // Replication
    // ------------------------------------------------------------------

    /// Apply a peer-originated event idempotently.
    ///
    /// Stale or duplicate events (stamp not newer than current state) are
    /// dropped and counted. Removal events win stamp ties. Never re-emits.
    pub fn apply_replicated(&self, event: &ReplicationEvent) -> ApplyOutcome {
        // Subsequent local stamps must order after everything we've seen.
        self.stamps.observe(event.stamp);

        let outcome = match event.kind {
            EventKind::Register => self.apply_register(event),
            EventKind::Renew => self.apply_renew(event),
            EventKind::StatusChange => self.apply_status_change(event),
            EventKind::Cancel | EventKind::Expire => self.apply_removal(event),
        };

        match outcome {
            ApplyOutcome::Applied => RegistryMetrics::incr(&self.metrics.events_applied),
            ApplyOutcome::Ignored => {
                RegistryMetrics::incr(&self.metrics.conflicts_ignored);
                tracing::debug!(
                    kind = %event.kind,
                    key = %event.key,
                    stamp = event.stamp,
                    origin = %event.origin,
                    "replicated event ignored as stale"
                );
            }
        }
        outcome
    }

    fn apply_register(&self, event: &ReplicationEvent) -> ApplyOutcome {
        let Some(instance) = event.instance.as_ref() else {
            tracing::warn!(key = %event.key, "Register event without payload dropped");
            return ApplyOutcome::Ignored;
        };
        if self.removal_stamp(&event.key) >= event.stamp {
            return ApplyOutcome::Ignored;
        }
        let mut shard = self.shard(&event.key).write();
        if let Some(existing) = shard.get(&event.key) {
            if !event.supersedes(existing.info.stamp) {
                return ApplyOutcome::Ignored;
            }
        }
        shard.insert(
            event.key.clone(),
            InstanceRecord {
                info: instance.clone(),
                // Hearing about the instance counts as liveness evidence;
                // the origin's wall clock is not trusted for expiry.
                renewed_local_ms: self.clock.now_ms(),
            },
        );
        drop(shard);
        self.tombstones.lock().remove(&event.key);
        self.record_change(
            ChangeKind::Registered,
            event.key.clone(),
            Some(instance.clone()),
        );
        ApplyOutcome::Applied
    }

    fn apply_renew(&self, event: &ReplicationEvent) -> ApplyOutcome {
        let mut shard = self.shard(&event.key).write();
        match shard.get_mut(&event.key) {
            Some(record) if event.supersedes(record.info.stamp) => {
                record.info.stamp = event.stamp;
                record.info.lease.last_renewal_ms =
                    record.info.lease.last_renewal_ms.max(wall_clock_ms());
                record.renewed_local_ms = self.clock.now_ms();
                ApplyOutcome::Applied
            }
            // Unknown instance: the origin will see NotFound from its own
            // client eventually; a Register will follow.
            _ => ApplyOutcome::Ignored,
        }
    }

    fn apply_status_change(&self, event: &ReplicationEvent) -> ApplyOutcome {
        let Some(status) = event.status else {
            tracing::warn!(key = %event.key, "StatusChange event without status dropped");
            return ApplyOutcome::Ignored;
        };
        let updated = {
            let mut shard = self.shard(&event.key).write();
            match shard.get_mut(&event.key) {
                Some(record) if event.supersedes(record.info.stamp) => {
                    record.info.status = status;
                    record.info.stamp = event.stamp;
                    Some(record.info.clone())
                }
                _ => None,
            }
        };
        match updated {
            Some(info) => {
                self.record_change(ChangeKind::StatusChanged, event.key.clone(), Some(info));
                ApplyOutcome::Applied
            }
            None => ApplyOutcome::Ignored,
        }
    }

    fn apply_removal(&self, event: &ReplicationEvent) -> ApplyOutcome {
        let removed = {
            let mut shard = self.shard(&event.key).write();
            match shard.get(&event.key) {
                Some(existing) if event.supersedes(existing.info.stamp) => {
                    shard.remove(&event.key);
                    true
                }
                Some(_) => return ApplyOutcome::Ignored,
                None => false,
            }
        };
        // Record the removal stamp either way so an out-of-order Register
        // predating this removal stays dead.
        let advanced = self.advance_removal_stamp(&event.key, event.stamp);
        if removed {
            let kind = if event.kind == EventKind::Expire {
                ChangeKind::Evicted
            } else {
                ChangeKind::Cancelled
            };
            self.record_change(kind, event.key.clone(), None);
            ApplyOutcome::Applied
        } else if advanced {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Ignored
        }
    }

    /// Deep copy of every instance, for peer snapshot transfer.
    pub fn snapshot(&self) -> Vec<InstanceInfo> {
        let mut instances: Vec<InstanceInfo> = Vec::new();
        for shard in &self.shards {
            instances.extend(shard.read().values().map(|record| record.info.clone()));
        }
        instances.sort_by(|a, b| a.key().cmp(&b.key()));
        instances
    }

    /// Merge a full peer snapshot, record by record, using the same
    /// stamp rules as replicated Register events. Returns how many
    /// records were applied.
    pub fn load_snapshot(&self, instances: Vec<InstanceInfo>, origin: &str) -> usize {
        let mut applied = 0;
        for instance in instances {
            let event = ReplicationEvent::register(instance, origin);
            if self.apply_replicated(&event) == ApplyOutcome::Applied {
                applied += 1;
            }
        }
        applied
    }

    // ------------------------------------------------------------------
    // Expiry support
    // ------------------------------------------------------------------

    /// Keys whose lease has lapsed at the current monotonic time.
    pub fn expired_candidates(&self) -> Vec<InstanceKey> {
        let now = self.clock.now_ms();
        let mut candidates = Vec::new();
        for shard in &self.shards {
            for (key, record) in shard.read().iter() {
                if now.saturating_sub(record.renewed_local_ms) > record.info.lease.duration_ms() {
                    candidates.push(key.clone());
                }
            }
        }
        candidates
    }

    /// Evict a candidate, re-checking expiry under the shard write lock.
    ///
    /// A renewal that lands between the sweep's scan and this commit wins:
    /// the removal only commits if the lease is still lapsed.
    pub fn evict_if_still_expired(&self, key: &InstanceKey) -> Option<InstanceInfo> {
        let evicted = {
            let mut shard = self.shard(key).write();
            let now = self.clock.now_ms();
            match shard.get(key) {
                Some(record)
                    if now.saturating_sub(record.renewed_local_ms)
                        > record.info.lease.duration_ms() =>
                {
                    shard
                        .remove(key)
                        .map(|record| (record.info, self.stamps.next()))
                }
                _ => None,
            }
        };
        if let Some((info, stamp)) = evicted {
            self.remember_removal(key, stamp);
            self.record_change(ChangeKind::Evicted, key.clone(), None);
            self.emit(ReplicationEvent::expire(key.clone(), stamp, &self.node_id));
            RegistryMetrics::incr(&self.metrics.evictions);
            Some(info)
        } else {
            None
        }
    }

    /// Periodic housekeeping: prune the change log by age and drop
    /// tombstones older than the retention window. Called by the sweep.
    pub fn maintain(&self) {
        let now = self.clock.now_ms();
        self.changes.lock().prune(now);

        let horizon_ms = self.config.changelog.retention_secs * 1000;
        let wall_now = wall_clock_ms();
        self.tombstones
            .lock()
            .retain(|_, stamp| wall_now.saturating_sub(*stamp) <= horizon_ms);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Total registered instances.
    pub fn instance_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Number of distinct services.
    pub fn service_count(&self) -> usize {
        self.fetch_all().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.instance_count() == 0
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn shard(&self, key: &InstanceKey) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    fn emit(&self, event: ReplicationEvent) {
        if let Some(sink) = self.sink.lock().as_ref() {
            // A closed sink means replication is shutting down; local
            // state is already updated and stays valid.
            let _ = sink.send(event);
        }
    }

    fn record_change(&self, kind: ChangeKind, key: InstanceKey, instance: Option<InstanceInfo>) {
        let now = self.clock.now_ms();
        self.changes.lock().record(kind, key, instance, now);
    }

    fn remember_removal(&self, key: &InstanceKey, stamp: u64) {
        self.advance_removal_stamp(key, stamp);
    }

    fn advance_removal_stamp(&self, key: &InstanceKey, stamp: u64) -> bool {
        let mut tombstones = self.tombstones.lock();
        let current = tombstones.get(key).copied().unwrap_or(0);
        if stamp > current {
            tombstones.insert(key.clone(), stamp);
            true
        } else {
            false
        }
    }

    fn removal_stamp(&self, key: &InstanceKey) -> u64 {
        self.tombstones.lock().get(key).copied().unwrap_or(0)
    }
}
