//! Time sources for lease evaluation and replication stamps.
//!
//! Expiry decisions use monotonic local time only. Timestamps carried in
//! client payloads or replicated instance records are never consulted when
//! deciding whether a lease has lapsed, so clock skew between nodes cannot
//! evict a healthy instance.
//!
//! Replication events carry a separate logical stamp produced by
//! [`StampGenerator`]: wall-aligned across nodes, strictly monotonic on
//! the local node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic local time in milliseconds.
///
/// Implementations must never go backwards. The zero point is
/// implementation-defined; only differences are meaningful.
pub trait Clock: Send + Sync {
    /// Current monotonic time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Monotonic clock backed by [`Instant`], measured from clock creation.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Create a new clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for tests.
///
/// Starts at zero; tests call [`ManualClock::advance_ms`] to move time
/// forward. Never moves backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute value, saturating so time never regresses.
    pub fn set_ms(&self, ms: u64) {
        self.now_ms.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Generator of per-node logical stamps for replication events.
///
/// Each stamp is `max(wall_clock_ms, previous + 1)`: strictly increasing
/// locally, and close enough to wall time that last-writer-wins
/// comparison across nodes resolves conflicts sensibly.
#[derive(Debug, Default)]
pub struct StampGenerator {
    last: AtomicU64,
}

impl StampGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next stamp.
    pub fn next(&self) -> u64 {
        let wall = wall_clock_ms();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = wall.max(prev + 1);
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(observed) => prev = observed,
            }
        }
    }

    /// Fold an observed remote stamp into the generator so subsequent
    /// local stamps order after it.
    pub fn observe(&self, stamp: u64) {
        self.last.fetch_max(stamp, Ordering::SeqCst);
    }

    /// The most recently issued or observed stamp.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance_ms(1500);
        assert_eq!(clock.now_ms(), 1500);
        clock.set_ms(1000); // saturating, never regresses
        assert_eq!(clock.now_ms(), 1500);
    }

    #[test]
    fn stamps_strictly_increase() {
        let stamps = StampGenerator::new();
        let a = stamps.next();
        let b = stamps.next();
        let c = stamps.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn observed_stamp_orders_before_next_local() {
        let stamps = StampGenerator::new();
        let remote = wall_clock_ms() + 60_000;
        stamps.observe(remote);
        assert!(stamps.next() > remote);
    }
}
