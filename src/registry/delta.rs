//! Bounded recent-changes log backing incremental client sync.
//!
//! Every visible change (registration, status change, cancellation,
//! eviction) is appended with a monotonically increasing sequence number.
//! `fetch_delta` callers hold a cursor and receive everything after it.
//! Renewals refresh leases but are not visible changes and are not
//! recorded here.
//!
//! The log is bounded both by entry count and by age. When a caller's
//! cursor has fallen below the retained floor, the delta response sets
//! `reset` and the caller must do a full fetch.

use crate::registry::instance::{InstanceInfo, InstanceKey};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kind of visible registry change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Instance registered (new or replaced).
    Registered,
    /// Instance status overridden.
    StatusChanged,
    /// Instance cancelled by its client.
    Cancelled,
    /// Instance evicted by the expiry sweep.
    Evicted,
}

/// One entry in the change log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Monotonic sequence number.
    pub seq: u64,
    /// What happened.
    pub kind: ChangeKind,
    /// Which instance.
    pub key: InstanceKey,
    /// Instance state after the change (None for removals).
    pub instance: Option<InstanceInfo>,
    /// Monotonic local time the change was recorded, for age-based pruning.
    #[serde(skip)]
    pub recorded_at_ms: u64,
}

/// Result of a delta query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    /// Changes with `seq` greater than the caller's cursor, oldest first.
    pub changes: Vec<ChangeRecord>,
    /// New cursor: highest sequence number assigned so far.
    pub cursor: u64,
    /// Set when the caller's cursor predates the retained window and the
    /// changes list is incomplete; the caller must fall back to a full fetch.
    pub reset: bool,
}

/// Retention bounds for the change log.
#[derive(Debug, Clone)]
pub struct ChangeLogConfig {
    /// Maximum retained entries.
    pub retention: usize,
    /// Maximum entry age in seconds.
    pub retention_secs: u64,
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            retention: 1024,
            retention_secs: 180,
        }
    }
}

/// Append-only bounded log of visible changes.
#[derive(Debug)]
pub struct ChangeLog {
    config: ChangeLogConfig,
    entries: VecDeque<ChangeRecord>,
    next_seq: u64,
    /// Lowest sequence number still retained, or `next_seq` when empty.
    floor: u64,
}

impl ChangeLog {
    /// Create an empty log.
    pub fn new(config: ChangeLogConfig) -> Self {
        Self {
            config,
            entries: VecDeque::new(),
            next_seq: 1,
            floor: 1,
        }
    }

    /// Append a change, assigning it the next sequence number.
    pub fn record(
        &mut self,
        kind: ChangeKind,
        key: InstanceKey,
        instance: Option<InstanceInfo>,
        now_ms: u64,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(ChangeRecord {
            seq,
            kind,
            key,
            instance,
            recorded_at_ms: now_ms,
        });
        self.enforce_count_bound();
        seq
    }

    /// Changes after the given cursor.
    pub fn since(&self, cursor: u64) -> Delta {
        // Cursor 0 means "from the beginning": complete only if nothing
        // has been pruned yet. The cursor is client-supplied and may be
        // arbitrarily large.
        let reset = cursor.saturating_add(1) < self.floor;
        let changes = self
            .entries
            .iter()
            .filter(|record| record.seq > cursor)
            .cloned()
            .collect();
        Delta {
            changes,
            cursor: self.next_seq - 1,
            reset,
        }
    }

    /// Drop entries older than the age bound. Called from the sweep.
    pub fn prune(&mut self, now_ms: u64) {
        let horizon_ms = self.config.retention_secs * 1000;
        while let Some(front) = self.entries.front() {
            if now_ms.saturating_sub(front.recorded_at_ms) > horizon_ms {
                self.floor = front.seq + 1;
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Highest sequence number assigned so far.
    pub fn cursor(&self) -> u64 {
        self.next_seq - 1
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn enforce_count_bound(&mut self) {
        while self.entries.len() > self.config.retention {
            if let Some(front) = self.entries.pop_front() {
                self.floor = front.seq + 1;
            }
        }
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new(ChangeLogConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> InstanceKey {
        InstanceKey::new("svc", format!("i-{n}"))
    }

    #[test]
    fn sequences_are_monotonic() {
        let mut log = ChangeLog::default();
        let a = log.record(ChangeKind::Registered, key(1), None, 0);
        let b = log.record(ChangeKind::Cancelled, key(1), None, 0);
        assert!(b > a);
        assert_eq!(log.cursor(), b);
    }

    #[test]
    fn since_returns_only_newer() {
        let mut log = ChangeLog::default();
        log.record(ChangeKind::Registered, key(1), None, 0);
        let cursor = log.cursor();
        log.record(ChangeKind::Registered, key(2), None, 0);

        let delta = log.since(cursor);
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].key, key(2));
        assert!(!delta.reset);
    }

    #[test]
    fn count_bound_sets_reset() {
        let mut log = ChangeLog::new(ChangeLogConfig {
            retention: 2,
            retention_secs: 600,
        });
        for n in 0..5 {
            log.record(ChangeKind::Registered, key(n), None, 0);
        }
        assert_eq!(log.len(), 2);

        let delta = log.since(0);
        assert!(delta.reset);
        assert_eq!(delta.changes.len(), 2);

        // A cursor inside the retained window is still complete.
        let delta = log.since(3);
        assert!(!delta.reset);
        assert_eq!(delta.changes.len(), 1);
    }

    #[test]
    fn cursor_far_past_the_log_is_empty_not_reset() {
        let mut log = ChangeLog::default();
        log.record(ChangeKind::Registered, key(1), None, 0);

        let delta = log.since(u64::MAX);
        assert!(delta.changes.is_empty());
        assert!(!delta.reset);
        assert_eq!(delta.cursor, log.cursor());
    }

    #[test]
    fn age_prune_drops_old_entries() {
        let mut log = ChangeLog::new(ChangeLogConfig {
            retention: 100,
            retention_secs: 1,
        });
        log.record(ChangeKind::Registered, key(1), None, 0);
        log.record(ChangeKind::Registered, key(2), None, 5_000);
        log.prune(6_000);
        assert_eq!(log.len(), 1);
        assert!(log.since(0).reset);
    }
}
