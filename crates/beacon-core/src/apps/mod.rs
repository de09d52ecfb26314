//! In-memory application registry

mod static_registry;

pub use static_registry::StaticAppRegistry;
