//! # beacon-cache
//!
//! Cache stores and the Redis pub/sub plumbing used by the gossip layer.
//!
//! ## Features
//!
//! - **Local Store**: In-memory key/value store with per-key TTL and a background sweep
//! - **Redis Store**: The same contract backed by Redis, shared between nodes
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Pub/Sub**: Topic publisher and a reconnecting subscriber
//!
//! ## Example
//!
//! ```ignore
//! use beacon_cache::{LocalCacheStore, RedisPool, Publisher};
//! use beacon_core::CacheStore;
//!
//! let store = LocalCacheStore::new();
//! store.set("app_1_channel_cache-news_cache_miss", json!({"event": "x"}), Some(60)).await?;
//!
//! let pool = RedisPool::connect(&config.redis)?;
//! let publisher = Publisher::new(pool);
//! publisher.publish("beacon:gossip:app-1", "{}").await?;
//! ```

pub mod pool;
pub mod pubsub;
pub mod store;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolError, RedisResult};

// Re-export store types
pub use store::{LocalCacheStore, RedisCacheStore, DEFAULT_SWEEP_INTERVAL};

// Re-export pubsub types
pub use pubsub::{
    Publisher, ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult, TopicNamer, DEFAULT_TOPIC_PREFIX,
};
