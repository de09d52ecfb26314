//! In-memory cache store with per-key TTL.
//!
//! Expired entries are hidden from reads immediately and physically removed
//! by a sweep task that lives exactly as long as the store.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::{CacheEntry, CacheStore, RepoResult};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;

/// How often expired entries are swept
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

type Entries = Mutex<HashMap<String, CacheEntry>>;

/// Aborts the sweep task when the store is dropped
struct SweepGuard(JoinHandle<()>);

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Local key/value store
///
/// Must be created inside a Tokio runtime.
pub struct LocalCacheStore {
    entries: Arc<Entries>,
    _sweeper: SweepGuard,
}

impl std::fmt::Debug for LocalCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCacheStore")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

impl LocalCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    #[must_use]
    pub fn with_sweep_interval(interval: Duration) -> Self {
        let entries: Arc<Entries> = Arc::new(Mutex::new(HashMap::new()));
        let sweeper = tokio::spawn(Self::sweep_loop(Arc::downgrade(&entries), interval));
        Self {
            entries,
            _sweeper: SweepGuard(sweeper),
        }
    }

    async fn sweep_loop(entries: Weak<Entries>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(live) = entries.upgrade() else {
                break;
            };
            let removed = Self::sweep(&live, now());
            if removed > 0 {
                tracing::trace!(removed, "Swept expired cache entries");
            }
        }
    }

    fn sweep(entries: &Entries, now: i64) -> usize {
        let mut entries = entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .lock()
            .get(key)
            .filter(|entry| !entry.is_expired(now()))
            .cloned()
    }
}

impl Default for LocalCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, key: &str) -> RepoResult<Option<Value>> {
        Ok(self.live_entry(key).map(|entry| entry.value))
    }

    async fn get_with_metadata(&self, key: &str) -> RepoResult<Option<CacheEntry>> {
        Ok(self.live_entry(key))
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> RepoResult<()> {
        let entry = CacheEntry {
            value,
            ttl_seconds: ttl_seconds
                .filter(|ttl| *ttl > 0)
                .and_then(|ttl| i64::try_from(ttl).ok())
                .unwrap_or(-1),
            set_time: now(),
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn has(&self, key: &str) -> RepoResult<bool> {
        Ok(self.live_entry(key).is_some())
    }

    async fn delete(&self, key: &str) -> RepoResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = LocalCacheStore::new();
        store.set("a", json!({"x": 1}), None).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!({"x": 1})));
        assert!(store.has("a").await.unwrap());

        let entry = store.get_with_metadata("a").await.unwrap().unwrap();
        assert_eq!(entry.ttl_seconds, -1);
        assert!(entry.set_time > 0);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = LocalCacheStore::new();
        store.set("a", json!(1), Some(0)).await.unwrap();

        let entry = store.get_with_metadata("a").await.unwrap().unwrap();
        assert_eq!(entry.ttl_seconds, -1);
        assert!(!entry.is_expired(now() + 3600));
        assert!(store.has("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entries_are_hidden() {
        let store = LocalCacheStore::new();
        store.entries.lock().insert(
            "old".to_string(),
            CacheEntry {
                value: json!(1),
                ttl_seconds: 1,
                set_time: now() - 10,
            },
        );

        assert!(!store.has("old").await.unwrap());
        assert!(store.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired() {
        let store = LocalCacheStore::with_sweep_interval(Duration::from_millis(10));
        store.set("keep", json!(1), Some(3600)).await.unwrap();
        store.entries.lock().insert(
            "old".to_string(),
            CacheEntry {
                value: json!(1),
                ttl_seconds: 1,
                set_time: now() - 10,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len(), 1);
        assert!(store.has("keep").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweeper_stops_with_store() {
        let store = LocalCacheStore::with_sweep_interval(Duration::from_millis(10));
        let weak = Arc::downgrade(&store.entries);
        drop(store);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(weak.upgrade().is_none());
    }
}
