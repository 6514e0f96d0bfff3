//! Registry error taxonomy and transport status mapping.
//!
//! The taxonomy is deliberately small:
//! - `Validation` rejects malformed registrations outright.
//! - `NotFound` tells a renewing client to re-register.
//! - `PeerUnreachable` is transient and never surfaces to registering
//!   clients; the replication layer retries with backoff.
//! - `ConflictIgnored` marks a replicated event older than current state.
//!   It is dropped silently from the caller's perspective and exists only
//!   so the drop can be counted and logged.
//!
//! Local lease-store operations never fail because of peer trouble.

use thiserror::Error;

/// Registry error conditions.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration input is malformed.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The addressed instance is not registered.
    #[error("instance {service}/{instance_id} not found")]
    NotFound {
        service: String,
        instance_id: String,
    },

    /// A peer could not be reached within the configured timeout.
    #[error("peer {peer} unreachable: {message}")]
    PeerUnreachable { peer: String, message: String },

    /// A replicated event was older than current state and was dropped.
    #[error("replicated {kind} for {service}/{instance_id} ignored (stamp {stamp} not newer)")]
    ConflictIgnored {
        kind: &'static str,
        service: String,
        instance_id: String,
        stamp: u64,
    },
}

impl RegistryError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(service: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self::NotFound {
            service: service.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Create a peer-unreachable error.
    pub fn peer_unreachable(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PeerUnreachable {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// Check if the error is transient and worth retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::PeerUnreachable { .. })
    }

    /// Check if the error is observability-only and must not surface to clients.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::ConflictIgnored { .. })
    }

    /// HTTP status a transport adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::PeerUnreachable { .. } => 503,
            // Conflicting replicated events are dropped, not failed.
            Self::ConflictIgnored { .. } => 200,
        }
    }
}

/// Result type using RegistryError.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(RegistryError::validation("no address").http_status(), 400);
        assert_eq!(RegistryError::not_found("svc", "i-1").http_status(), 404);
        assert_eq!(
            RegistryError::peer_unreachable("10.0.0.2:7700", "timed out").http_status(),
            503
        );
    }

    #[test]
    fn retriability() {
        assert!(RegistryError::peer_unreachable("p", "io").is_retriable());
        assert!(!RegistryError::validation("bad").is_retriable());
        assert!(RegistryError::ConflictIgnored {
            kind: "Renew",
            service: "svc".into(),
            instance_id: "i-1".into(),
            stamp: 7,
        }
        .is_silent());
    }
}
