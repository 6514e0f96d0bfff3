//! Operational surfaces.
//!
//! - [`observability`] - Counters, health, and readiness reporting

pub mod observability;
