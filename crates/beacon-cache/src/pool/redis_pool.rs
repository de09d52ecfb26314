//! Pooled Redis connections shared by the gossip publisher and the cache store.
//!
//! Subscriptions need a dedicated connection and do not go through the pool;
//! see [`crate::pubsub::Subscriber`].

use beacon_common::RedisConfig;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Failures talking to Redis through the pool
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Invalid Redis pool settings: {0}")]
    Build(String),

    #[error("No Redis connection available: {0}")]
    Checkout(#[from] deadpool_redis::PoolError),

    #[error("Redis command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("Stored value is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Cheaply cloneable handle to the pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisPool")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

/// The part of a Redis URL that is safe to log
fn log_safe_host(url: &str) -> &str {
    url.rsplit_once('@').map_or(url, |(_, host)| host)
}

impl RedisPool {
    /// Build the pool. Connections are opened lazily on first use.
    pub fn connect(config: &RedisConfig) -> RedisResult<Self> {
        let max_size = usize::try_from(config.max_connections.max(1))
            .map_err(|e| RedisPoolError::Build(e.to_string()))?;
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::Build(e.to_string()))?
            .max_size(max_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::Build(e.to_string()))?;

        tracing::info!(host = %log_safe_host(&config.url), max_size, "Redis pool ready");
        Ok(Self { pool })
    }

    async fn connection(&self) -> RedisResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    // === Gossip ===

    /// `PUBLISH` to a topic, returning how many subscribers received it
    pub async fn publish(&self, topic: &str, message: &str) -> RedisResult<u32> {
        let mut conn = self.connection().await?;
        Ok(conn.publish(topic, message).await?)
    }

    // === Cache store ===

    /// Store `value` as JSON; `ttl_seconds` of `None` keeps it until deleted
    pub async fn write_json<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl_seconds: Option<u64>,
    ) -> RedisResult<()> {
        let encoded = serde_json::to_string(value)?;
        let mut conn = self.connection().await?;
        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, encoded, ttl).await?,
            None => conn.set::<_, _, ()>(key, encoded).await?,
        }
        Ok(())
    }

    pub async fn read_json<V: DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(RedisPoolError::from)
    }

    pub async fn contains(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.connection().await?;
        Ok(conn.exists(key).await?)
    }

    /// Delete a key, returning whether it existed
    pub async fn remove(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.connection().await?;
        let removed: u32 = conn.del(key).await?;
        Ok(removed > 0)
    }
}
