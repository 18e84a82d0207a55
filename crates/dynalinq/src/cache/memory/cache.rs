//! In-memory cache implementation with LRU eviction.
//!
//! Keys of each table are tracked so `delete_pattern` on a table pattern
//! touches only that table's keys instead of scanning the whole store.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use dynalinq_core::cache::{is_tracked_key, pattern_matches, table_of_key, Cache, Result};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Expired values are treated as absent on read and dropped when found.
/// The tracking map only holds keys still present in the LRU.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, StoredValue>>>,
    /// Table segment -> cache keys written for that table.
    tracking: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache holding at most `max_entries` values.
    ///
    /// # Panics
    ///
    /// Panics if `max_entries` is 0.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).expect("max_entries must be > 0");
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            tracking: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live (unexpired) values.
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.iter().filter(|(_, v)| !v.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn untrack(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut tracking = self.tracking.write().await;
        for key in keys {
            let Some(table) = table_of_key(key) else {
                continue;
            };
            if let Some(tracked) = tracking.get_mut(table) {
                tracked.remove(key);
                if tracked.is_empty() {
                    tracking.remove(table);
                }
            }
        }
    }

    #[cfg(test)]
    async fn tracked_len(&self) -> usize {
        self.tracking.read().await.values().map(HashSet::len).sum()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let mut store = self.store.write().await;
            match store.get(key) {
                Some(entry) if entry.is_expired() => {
                    store.pop(key);
                }
                Some(entry) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
            }
        }

        self.untrack(&[key.to_string()]).await;
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let evicted = {
            let mut store = self.store.write().await;
            store
                .push(key.to_string(), StoredValue::new(value.to_vec(), ttl))
                .map(|(old, _)| old)
                .filter(|old| old != key)
        };
        if let Some(old) = evicted {
            self.untrack(&[old]).await;
        }

        if is_tracked_key(key) {
            if let Some(table) = table_of_key(key) {
                let mut tracking = self.tracking.write().await;
                tracking
                    .entry(table.to_string())
                    .or_default()
                    .insert(key.to_string());
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.untrack(&[key.to_string()]).await;

        let mut store = self.store.write().await;
        store.pop(key);

        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let Some(table) = table_of_key(pattern) else {
            // No table in the pattern: full iteration.
            let mut store = self.store.write().await;
            let keys_to_delete: Vec<String> = store
                .iter()
                .filter(|(key, _)| pattern_matches(pattern, key))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys_to_delete {
                store.pop(&key);
            }
            return Ok(());
        };

        let keys_to_delete: Vec<String> = {
            let tracking = self.tracking.read().await;
            tracking
                .get(table)
                .map(|keys| {
                    keys.iter()
                        .filter(|k| pattern_matches(pattern, k))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if keys_to_delete.is_empty() {
            return Ok(());
        }

        {
            let mut store = self.store.write().await;
            for key in &keys_to_delete {
                store.pop(key);
            }
        }

        self.untrack(&keys_to_delete).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynalinq_core::cache::{entity_key, generation_key, index_key, table_pattern};
    use dynalinq_core::EntityKey;

    const TEST_MAX_ENTRIES: usize = 1000;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:key";
        let value = b"test value";

        cache.set(key, value, None).await.unwrap();
        let result = cache.get(key).await.unwrap();

        assert_eq!(result, Some(value.to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        assert_eq!(cache.get("nonexistent:key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = generation_key("Movies");

        cache.set(&key, b"g1", None).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:ttl";

        cache
            .set(key, b"short-lived", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.get(key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get(key).await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_pattern_is_scoped_to_one_table() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        let movie = entity_key("Movies", &EntityKey::with_range("Alien", 1979));
        let movie_index = index_key("Movies", None, "Year>n:1990");
        let score = entity_key("GameScores", &EntityKey::with_range("u1", "Starship X"));

        cache.set(&movie, b"1", None).await.unwrap();
        cache.set(&movie_index, b"2", None).await.unwrap();
        cache.set(&score, b"3", None).await.unwrap();
        cache.set("other:key", b"4", None).await.unwrap();

        cache.delete_pattern(&table_pattern("Movies")).await.unwrap();

        assert!(cache.get(&movie).await.unwrap().is_none());
        assert!(cache.get(&movie_index).await.unwrap().is_none());
        assert!(cache.get(&score).await.unwrap().is_some());
        assert!(cache.get("other:key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern_without_table_scans_everything() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("dynalinq:Movies:indexes", b"1", None).await.unwrap();
        cache.set("dynalinq:GameScores:indexes", b"2", None).await.unwrap();
        cache.set("dynalinq:GameScores:generation", b"3", None).await.unwrap();

        cache.delete_pattern("dynalinq:*:indexes").await.unwrap();

        assert!(cache.get("dynalinq:Movies:indexes").await.unwrap().is_none());
        assert!(cache.get("dynalinq:GameScores:indexes").await.unwrap().is_none());
        assert!(cache.get("dynalinq:GameScores:generation").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();
        // Touch "a" so "b" is the least recently used.
        cache.get("a").await.unwrap();
        cache.set("c", b"3", None).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_some());
        assert!(cache.get("b").await.unwrap().is_none());
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tracking_follows_lru_eviction() {
        let cache = MemoryCache::new(2);
        for user in 0..100 {
            let key = entity_key("GameScores", &EntityKey::with_range(user, "Starship X"));
            cache.set(&key, b"1", None).await.unwrap();
        }

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.tracked_len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_keys_leave_tracking_on_read() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = generation_key("Movies");
        cache
            .set(&key, b"g1", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(cache.tracked_len().await, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.tracked_len().await, 0);
    }

    #[tokio::test]
    async fn test_overwriting_a_key_keeps_it_tracked() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = generation_key("Movies");
        cache.set(&key, b"g1", None).await.unwrap();
        cache.set(&key, b"g2", None).await.unwrap();

        assert_eq!(cache.tracked_len().await, 1);
        cache.delete_pattern(&table_pattern("Movies")).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.tracked_len().await, 0);
    }
}
