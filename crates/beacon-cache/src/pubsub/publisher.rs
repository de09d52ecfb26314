//! Redis Pub/Sub publisher.
//!
//! Publishes serialized announcements to namespace topics.

use crate::pool::{RedisPool, RedisResult};
use serde::Serialize;

/// Redis Pub/Sub publisher
#[derive(Debug, Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish a raw message to a topic, returning the number of receivers
    pub async fn publish(&self, topic: &str, message: &str) -> RedisResult<u32> {
        let receivers = self.pool.publish(topic, message).await?;

        tracing::trace!(topic = %topic, receivers, "Published message");

        Ok(receivers)
    }

    /// Serialize `payload` to JSON and publish it
    pub async fn publish_json<T: Serialize>(&self, topic: &str, payload: &T) -> RedisResult<u32> {
        let message = serde_json::to_string(payload)?;
        self.publish(topic, &message).await
    }
}
