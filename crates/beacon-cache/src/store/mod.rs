//! Cache store implementations.

mod local;
mod redis;

pub use local::{LocalCacheStore, DEFAULT_SWEEP_INTERVAL};
pub use self::redis::RedisCacheStore;
