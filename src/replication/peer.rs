//! Peer reachability tracking and backoff schedule.

use rand::Rng;
use std::time::Duration;

/// Reachability state of a peer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Last push succeeded.
    Reachable,
    /// Pushes are failing; retried on the backoff schedule.
    Unreachable,
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// First retry delay in milliseconds.
    pub base_ms: u64,
    /// Delay cap in milliseconds.
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_ms: 30_000,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given retry attempt (0-based), with up to 25%
    /// jitter so peers recovering together do not retry in lockstep.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base_ms.saturating_mul(1u64 << attempt.min(16));
        let capped = exp.min(self.max_ms);
        let jitter = rand::thread_rng().gen_range(0..=capped / 4);
        Duration::from_millis(capped + jitter)
    }
}

/// A known peer registry node.
///
/// Peers are configured by address; the address string is the identity.
#[derive(Debug)]
pub struct PeerNode {
    /// Peer address, e.g. "10.0.0.2:7700".
    pub address: String,
    state: PeerState,
    consecutive_failures: u32,
    backoff: BackoffPolicy,
}

impl PeerNode {
    /// Create a peer assumed reachable until proven otherwise.
    pub fn new(address: impl Into<String>, backoff: BackoffPolicy) -> Self {
        Self {
            address: address.into(),
            state: PeerState::Reachable,
            consecutive_failures: 0,
            backoff,
        }
    }

    /// Current reachability state.
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Check if the peer is currently considered reachable.
    pub fn is_reachable(&self) -> bool {
        self.state == PeerState::Reachable
    }

    /// Consecutive failed push attempts.
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a successful push.
    pub fn record_success(&mut self) {
        if self.state == PeerState::Unreachable {
            tracing::info!(peer = %self.address, "peer reachable again");
        }
        self.state = PeerState::Reachable;
        self.consecutive_failures = 0;
    }

    /// Record a failed push and return how long to back off before the
    /// next attempt.
    pub fn record_failure(&mut self) -> Duration {
        if self.state == PeerState::Reachable {
            tracing::warn!(peer = %self.address, "peer marked unreachable");
        }
        self.state = PeerState::Unreachable;
        let delay = self.backoff.delay(self.consecutive_failures);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = BackoffPolicy {
            base_ms: 100,
            max_ms: 1_000,
        };
        let first = policy.delay(0).as_millis() as u64;
        assert!((100..=125).contains(&first));
        // attempt 10 is far past the cap
        let capped = policy.delay(10).as_millis() as u64;
        assert!((1_000..=1_250).contains(&capped));
    }

    #[test]
    fn failure_then_success_resets() {
        let mut peer = PeerNode::new("10.0.0.2:7700", BackoffPolicy::default());
        assert!(peer.is_reachable());

        peer.record_failure();
        peer.record_failure();
        assert!(!peer.is_reachable());
        assert_eq!(peer.failures(), 2);

        peer.record_success();
        assert!(peer.is_reachable());
        assert_eq!(peer.failures(), 0);
    }
}
