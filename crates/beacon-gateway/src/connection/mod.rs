//! Connection management
//!
//! Connections, the per-namespace registry that owns their membership, and
//! the timers attached to them.

mod connection;
mod error;
mod namespace;
mod registry;
mod timer;

pub use connection::{Connection, Frame};
pub use error::RegistryError;
pub use namespace::Membership;
pub(crate) use namespace::NamespaceState;
pub use registry::{ConnectionRegistry, RegistryBuilder, RegistrySettings};
pub use timer::TimerHandle;
