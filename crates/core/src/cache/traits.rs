use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{CacheEntry, CacheEvent, CacheQuery, CacheScope, Result};
use crate::entity::EntityKey;
use crate::tracking::CommittedChanges;
use crate::value::Document;

/// Byte-level key/value cache backend.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes all values matching a pattern (e.g., "dynalinq:Movies:*").
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// The cache of one table handle.
///
/// Every read returns `Ok(None)` on a miss, including when the backend
/// failed. Only misuse (calling before [`initialize`](Self::initialize))
/// is an error.
#[async_trait]
pub trait TableCache: Send + Sync {
    /// Binds the cache to a table, entity type and optional partition.
    async fn initialize(&mut self, scope: CacheScope) -> Result<()>;

    async fn get_single_entity(&self, key: &EntityKey) -> Result<Option<CacheEntry>>;

    /// Returns the cached rows of a query, in index order.
    async fn get_entities(&self, query: &CacheQuery) -> Result<Option<Vec<CacheEntry>>>;

    async fn get_count(&self, query: &CacheQuery) -> Result<Option<usize>>;

    async fn put_single_loaded_entity(&self, key: &EntityKey, document: &Document) -> Result<()>;

    /// Starts building the index of a query. The builder is fed the complete
    /// store result and becomes visible only on commit.
    async fn start_creating_index(&self, query: &CacheQuery) -> Result<Box<dyn IndexBuilder>>;

    /// Writes committed entities, deletes removed ones, and patches or
    /// discards every index of the table.
    async fn update_cache_and_indexes(&self, changes: &CommittedChanges) -> Result<()>;

    async fn remove_entities(&self, keys: &[EntityKey]) -> Result<()>;
}

#[async_trait]
pub trait IndexBuilder: Send {
    fn add_entity(&mut self, key: &EntityKey, document: &Document);

    /// Publishes the index atomically. Dropped without effect when the table
    /// was written since the builder started.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Creates one [`TableCache`] per table handle.
#[async_trait]
pub trait TableCacheFactory: Send + Sync {
    fn create(&self) -> Box<dyn TableCache>;

    /// Subscribes to hit, miss and log events of every cache this factory
    /// created.
    fn subscribe(&self) -> broadcast::Receiver<CacheEvent>;

    /// Drops everything cached for a table.
    async fn invalidate_table(&self, table: &str) -> Result<()>;
}
