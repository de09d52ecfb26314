//! Integration test utilities for the gateway
//!
//! Spawns real servers on ephemeral ports and talks to them over
//! WebSocket and signed REST requests.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
