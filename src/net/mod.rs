//! Networking layer.
//!
//! This module handles the peer wire protocol:
//! - [`wire`] - Length-prefixed JSON framing and message types
//! - [`server`] - Peer listener serving push and snapshot requests
//! - [`client`] - TCP peer transport

pub mod client;
pub mod server;
pub mod wire;
