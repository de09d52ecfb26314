//! # beacon-gateway
//!
//! Pusher-compatible WebSocket gateway: connection registry, channel
//! authorization, client events, gossip between nodes, and the REST
//! publishing endpoint.

pub mod channels;
pub mod connection;
pub mod gossip;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use connection::{Connection, ConnectionRegistry, RegistrySettings};
pub use server::{create_app, create_gateway_state, run, run_server, GatewayState};
