//! In-process cache backend.
//!
//! Responsibility:
//! - Default `CacheStore` for single-node deployments and tests.
//! - Entries expire lazily on read; writes opportunistically sweep expired
//!   entries once the map grows past a soft bound, so the store does not
//!   grow without limit under many distinct keys.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::services::cache::client::{CacheResult, CacheStore};

/// Soft entry bound before a write triggers an expired-entry sweep.
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Memory-backed cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, Entry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn sweep_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();

        // Drop the shard guard before removing, DashMap deadlocks otherwise.
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        };

        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set_string_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let now = Instant::now();

        if self.entries.len() >= SWEEP_THRESHOLD {
            self.sweep_expired(now);
        }

        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(self.entries.remove(key).map(|_| 1).unwrap_or(0))
    }

    async fn flush(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_stored_value_until_expiry() {
        let store = MemoryCacheStore::new();
        store
            .set_string_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get_string("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let store = MemoryCacheStore::new();
        store
            .set_string_with_ttl("k", "v", Duration::from_millis(0))
            .await
            .unwrap();

        assert_eq!(store.get_string("k").await.unwrap(), None);
        // The expired entry is removed on read.
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn set_replaces_existing_entry() {
        let store = MemoryCacheStore::new();
        store
            .set_string_with_ttl("k", "old", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_string_with_ttl("k", "new", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get_string("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn flush_clears_everything() {
        let store = MemoryCacheStore::new();
        store
            .set_string_with_ttl("a", "1", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_string_with_ttl("b", "2", Duration::from_secs(60))
            .await
            .unwrap();

        store.flush().await.unwrap();

        assert_eq!(store.get_string("a").await.unwrap(), None);
        assert_eq!(store.get_string("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_reports_removed_count() {
        let store = MemoryCacheStore::new();
        store
            .set_string_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.del("k").await.unwrap(), 1);
        assert_eq!(store.del("k").await.unwrap(), 0);
    }
}
