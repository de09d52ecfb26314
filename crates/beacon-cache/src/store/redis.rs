//! Redis-backed cache store.
//!
//! Entries are stored as JSON `CacheEntry` records under a key prefix, with
//! Redis' own expiry taking the place of the local sweep.

use async_trait::async_trait;
use beacon_core::{CacheEntry, CacheStore, DomainError, RepoResult};
use chrono::Utc;
use serde_json::Value;

use crate::pool::{RedisPool, RedisPoolError};

const KEY_PREFIX: &str = "beacon:cache:";

impl From<RedisPoolError> for DomainError {
    fn from(err: RedisPoolError) -> Self {
        DomainError::CacheError(err.to_string())
    }
}

/// Cache store shared between nodes through Redis
#[derive(Debug, Clone)]
pub struct RedisCacheStore {
    pool: RedisPool,
}

impl RedisCacheStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> RepoResult<Option<Value>> {
        Ok(self.get_with_metadata(key).await?.map(|entry| entry.value))
    }

    async fn get_with_metadata(&self, key: &str) -> RepoResult<Option<CacheEntry>> {
        Ok(self.pool.read_json::<CacheEntry>(&Self::key(key)).await?)
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> RepoResult<()> {
        let ttl_seconds = ttl_seconds.filter(|ttl| *ttl > 0);
        let entry = CacheEntry {
            value,
            ttl_seconds: ttl_seconds
                .and_then(|ttl| i64::try_from(ttl).ok())
                .unwrap_or(-1),
            set_time: Utc::now().timestamp(),
        };
        self.pool.write_json(&Self::key(key), &entry, ttl_seconds).await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> RepoResult<bool> {
        Ok(self.pool.contains(&Self::key(key)).await?)
    }

    async fn delete(&self, key: &str) -> RepoResult<bool> {
        Ok(self.pool.remove(&Self::key(key)).await?)
    }
}
