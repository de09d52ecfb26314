//! Key/value store with per-key TTL for ephemeral shared state

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::repositories::RepoResult;

/// A stored value with its expiry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    /// Lifetime in seconds; `-1` means the entry never expires
    pub ttl_seconds: i64,
    /// Unix timestamp (seconds) of the last `set`
    pub set_time: i64,
}

impl CacheEntry {
    /// Whether the entry has expired at unix time `now`
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.ttl_seconds > 0 && self.set_time + self.ttl_seconds <= now
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> RepoResult<Option<Value>>;

    async fn get_with_metadata(&self, key: &str) -> RepoResult<Option<CacheEntry>>;

    /// Store `value`; `None` or `Some(0)` keeps it until deleted
    async fn set(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> RepoResult<()>;

    async fn has(&self, key: &str) -> RepoResult<bool>;

    /// Remove `key`, returning whether it existed
    async fn delete(&self, key: &str) -> RepoResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry {
            value: json!(1),
            ttl_seconds: 10,
            set_time: 100,
        };
        assert!(!entry.is_expired(109));
        assert!(entry.is_expired(110));

        let forever = CacheEntry {
            ttl_seconds: -1,
            ..entry
        };
        assert!(!forever.is_expired(i64::MAX));
    }
}
