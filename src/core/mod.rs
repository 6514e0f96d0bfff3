//! Core runtime infrastructure.
//!
//! This module contains the essential components for running Beacon:
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Main runtime orchestration
//! - [`time`] - Clocks and logical stamps
//! - [`error`] - Error types and status mapping

pub mod config;
pub mod error;
pub mod runtime;
pub mod time;
