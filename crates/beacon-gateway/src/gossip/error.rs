//! Gossip transport errors

use beacon_cache::{RedisPoolError, SubscriberError};

/// Failure to deliver or receive announcements
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    #[error("Publish failed: {0}")]
    Publish(#[from] RedisPoolError),

    #[error("Subscription failed: {0}")]
    Subscribe(#[from] SubscriberError),

    #[error("Invalid announcement: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GossipResult<T> = Result<T, GossipError>;
