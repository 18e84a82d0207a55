//! [`TableCache`] over any byte-level [`Cache`].
//!
//! Entities, query indexes, the index registry and the write generation of a
//! table live under the keys described in `dynalinq_core::cache::keys`.
//!
//! Backend failures never fail a read or a commit: they are logged, reported
//! as a miss, and the affected indexes are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use uuid::Uuid;

use dynalinq_core::cache::{
    entity_key, generation_key, index_key, index_registry_key, patch_index,
    serialization::{
        deserialize_entry, deserialize_generation, deserialize_index, deserialize_registry,
        serialize_entry, serialize_index, serialize_registry,
    },
    table_pattern, Cache, CacheEntry, CacheError, CacheEvent, CacheQuery, CacheScope,
    CachedIndex, IndexBuilder, IndexRecord, IndexRegistry, PatchOutcome, Result, TableCache,
    TableCacheFactory,
};
use dynalinq_core::tracking::CommittedChanges;
use dynalinq_core::{Document, EntityKey};

/// Generation of a table nobody has written through the cache yet.
const INITIAL_GENERATION: &str = "";

/// Shared plumbing of a table cache and its index builders.
#[derive(Clone)]
struct Backend {
    cache: Arc<dyn Cache>,
    events: broadcast::Sender<CacheEvent>,
}

impl Backend {
    fn emit(&self, event: CacheEvent) {
        match &event {
            CacheEvent::Hit { table, detail } => tracing::trace!(%table, %detail, "Cache hit"),
            CacheEvent::Miss { table, detail } => tracing::trace!(%table, %detail, "Cache miss"),
            CacheEvent::Log { table, message } => tracing::debug!(%table, %message, "Cache"),
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn log(&self, scope: &CacheScope, message: impl Into<String>) {
        self.emit(CacheEvent::Log {
            table: scope.table.clone(),
            message: message.into(),
        });
    }

    fn degraded(&self, scope: &CacheScope, operation: &str, error: &CacheError) {
        tracing::warn!(table = %scope.table, operation, error = %error, "Cache operation degraded");
        self.log(scope, format!("{operation} failed: {error}"));
    }

    async fn generation(&self, table: &str) -> Result<String> {
        match self.cache.get(&generation_key(table)).await? {
            Some(bytes) => Ok(deserialize_generation(&bytes)?),
            None => Ok(INITIAL_GENERATION.to_string()),
        }
    }

    async fn entry(&self, table: &str, key: &EntityKey) -> Result<Option<CacheEntry>> {
        match self.cache.get(&entity_key(table, key)).await? {
            Some(bytes) => Ok(Some(deserialize_entry(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_entry(&self, scope: &CacheScope, entry: &CacheEntry) -> Result<()> {
        let bytes = serialize_entry(entry)?;
        self.cache
            .set(&entity_key(&scope.table, &entry.key), &bytes, Some(scope.ttl))
            .await
    }

    async fn index(&self, cache_key: &str) -> Result<Option<CachedIndex>> {
        match self.cache.get(cache_key).await? {
            Some(bytes) => Ok(Some(deserialize_index(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_index(&self, scope: &CacheScope, cache_key: &str, index: &CachedIndex) -> Result<()> {
        let bytes = serialize_index(index)?;
        self.cache.set(cache_key, &bytes, Some(scope.ttl)).await
    }

    async fn registry(&self, table: &str) -> Result<IndexRegistry> {
        match self.cache.get(&index_registry_key(table)).await? {
            Some(bytes) => Ok(deserialize_registry(&bytes)?),
            None => Ok(IndexRegistry::default()),
        }
    }

    async fn put_registry(&self, scope: &CacheScope, registry: &IndexRegistry) -> Result<()> {
        let key = index_registry_key(&scope.table);
        if registry.is_empty() {
            return self.cache.delete(&key).await;
        }
        let bytes = serialize_registry(registry)?;
        self.cache.set(&key, &bytes, Some(scope.ttl)).await
    }

    /// Loads an index that is still valid for the current generation.
    async fn live_index(&self, scope: &CacheScope, query: &CacheQuery) -> Result<Option<CachedIndex>> {
        let cache_key = index_key(&scope.table, scope.partition.as_ref(), &query.signature());
        let Some(index) = self.index(&cache_key).await? else {
            return Ok(None);
        };
        if index.generation != self.generation(&scope.table).await? {
            return Ok(None);
        }
        Ok(Some(index))
    }

    async fn indexed_entries(
        &self,
        scope: &CacheScope,
        query: &CacheQuery,
    ) -> Result<Option<Vec<CacheEntry>>> {
        let Some(index) = self.live_index(scope, query).await? else {
            return Ok(None);
        };
        self.entries(&scope.table, &index.keys).await
    }

    /// Fetches the entries of `keys`, `None` if any of them is gone.
    async fn entries(&self, table: &str, keys: &[EntityKey]) -> Result<Option<Vec<CacheEntry>>> {
        let fetched = join_all(keys.iter().map(|key| self.entry(table, key))).await;
        let mut entries = Vec::with_capacity(keys.len());
        for entry in fetched {
            match entry? {
                Some(entry) => entries.push(entry),
                None => return Ok(None),
            }
        }
        Ok(Some(entries))
    }

    async fn apply_changes(&self, scope: &CacheScope, changes: &CommittedChanges) -> Result<()> {
        // A new generation first: builders started before this commit must
        // not publish what they read.
        let generation = Uuid::new_v4().to_string();
        self.cache
            .set(&generation_key(&scope.table), generation.as_bytes(), Some(scope.ttl))
            .await?;

        let version_field = scope.version_field.as_deref();
        for changed in changes.added.iter().chain(changes.modified.iter()) {
            let entry = CacheEntry::new(changed.key.clone(), changed.document.clone(), version_field);
            self.put_entry(scope, &entry).await?;
        }
        for key in &changes.removed {
            self.cache.delete(&entity_key(&scope.table, key)).await?;
        }

        let mut registry = self.registry(&scope.table).await?;
        let mut kept = Vec::with_capacity(registry.indexes.len());

        for record in registry.indexes.drain(..) {
            let Some(index) = self.index(&record.cache_key).await? else {
                continue;
            };
            match self.patch(scope, &record, &index, changes).await? {
                PatchOutcome::Discard => {
                    self.cache.delete(&record.cache_key).await?;
                    self.log(scope, format!("discarded index {}", index.signature));
                }
                PatchOutcome::Unchanged => {
                    let index = CachedIndex {
                        generation: generation.clone(),
                        ..index
                    };
                    self.put_index(scope, &record.cache_key, &index).await?;
                    kept.push(record);
                }
                PatchOutcome::Patched(keys) => {
                    let index = CachedIndex {
                        keys,
                        generation: generation.clone(),
                        ..index
                    };
                    self.put_index(scope, &record.cache_key, &index).await?;
                    self.log(scope, format!("patched index {}", index.signature));
                    kept.push(record);
                }
            }
        }

        registry.indexes = kept;
        self.put_registry(scope, &registry).await
    }

    async fn patch(
        &self,
        scope: &CacheScope,
        record: &IndexRecord,
        index: &CachedIndex,
        changes: &CommittedChanges,
    ) -> Result<PatchOutcome> {
        let mut documents: HashMap<EntityKey, Document> = HashMap::new();
        if record.query.order_by.is_some() && record.query.is_patchable() {
            let untouched: Vec<EntityKey> = index
                .keys
                .iter()
                .filter(|key| !changes.removed.contains(key))
                .filter(|key| {
                    !changes
                        .added
                        .iter()
                        .chain(changes.modified.iter())
                        .any(|c| c.key == **key)
                })
                .cloned()
                .collect();
            let Some(entries) = self.entries(&scope.table, &untouched).await? else {
                return Ok(PatchOutcome::Discard);
            };
            documents.extend(entries.into_iter().map(|e| (e.key, e.document)));
        }
        Ok(patch_index(&record.query, &index.keys, changes, &documents))
    }
}

/// A [`TableCache`] storing everything as JSON values in a [`Cache`].
pub struct KeyValueTableCache {
    backend: Backend,
    scope: Option<CacheScope>,
}

impl KeyValueTableCache {
    pub fn new(cache: Arc<dyn Cache>, events: broadcast::Sender<CacheEvent>) -> Self {
        Self {
            backend: Backend { cache, events },
            scope: None,
        }
    }

    fn scope(&self) -> Result<&CacheScope> {
        self.scope.as_ref().ok_or(CacheError::NotInitialized)
    }

    fn hit(&self, scope: &CacheScope, detail: String) {
        self.backend.emit(CacheEvent::Hit {
            table: scope.table.clone(),
            detail,
        });
    }

    fn miss(&self, scope: &CacheScope, detail: String) {
        self.backend.emit(CacheEvent::Miss {
            table: scope.table.clone(),
            detail,
        });
    }
}

#[async_trait]
impl TableCache for KeyValueTableCache {
    async fn initialize(&mut self, scope: CacheScope) -> Result<()> {
        tracing::debug!(
            table = %scope.table,
            entity_type = scope.entity_type,
            partition = ?scope.partition,
            "Table cache initialized"
        );
        self.scope = Some(scope);
        Ok(())
    }

    async fn get_single_entity(&self, key: &EntityKey) -> Result<Option<CacheEntry>> {
        let scope = self.scope()?;
        match self.backend.entry(&scope.table, key).await {
            Ok(Some(entry)) => {
                self.hit(scope, format!("entity {key}"));
                Ok(Some(entry))
            }
            Ok(None) => {
                self.miss(scope, format!("entity {key}"));
                Ok(None)
            }
            Err(error) => {
                self.backend.degraded(scope, "get_single_entity", &error);
                self.miss(scope, format!("entity {key}"));
                Ok(None)
            }
        }
    }

    async fn get_entities(&self, query: &CacheQuery) -> Result<Option<Vec<CacheEntry>>> {
        let scope = self.scope()?;
        let detail = format!("index {}", query.signature());

        match self.backend.indexed_entries(scope, query).await {
            Ok(Some(entries)) => {
                self.hit(scope, detail);
                Ok(Some(entries))
            }
            Ok(None) => {
                self.miss(scope, detail);
                Ok(None)
            }
            Err(error) => {
                self.backend.degraded(scope, "get_entities", &error);
                self.miss(scope, detail);
                Ok(None)
            }
        }
    }

    async fn get_count(&self, query: &CacheQuery) -> Result<Option<usize>> {
        let scope = self.scope()?;
        let detail = format!("count {}", query.signature());

        match self.backend.live_index(scope, query).await {
            Ok(Some(index)) => {
                self.hit(scope, detail);
                Ok(Some(index.keys.len()))
            }
            Ok(None) => {
                self.miss(scope, detail);
                Ok(None)
            }
            Err(error) => {
                self.backend.degraded(scope, "get_count", &error);
                self.miss(scope, detail);
                Ok(None)
            }
        }
    }

    async fn put_single_loaded_entity(&self, key: &EntityKey, document: &Document) -> Result<()> {
        let scope = self.scope()?;
        let entry = CacheEntry::new(key.clone(), document.clone(), scope.version_field.as_deref());
        if let Err(error) = self.backend.put_entry(scope, &entry).await {
            self.backend.degraded(scope, "put_single_loaded_entity", &error);
        }
        Ok(())
    }

    async fn start_creating_index(&self, query: &CacheQuery) -> Result<Box<dyn IndexBuilder>> {
        let scope = self.scope()?;
        // An unreadable generation makes the build unpublishable.
        let generation = match self.backend.generation(&scope.table).await {
            Ok(generation) => Some(generation),
            Err(error) => {
                self.backend.degraded(scope, "start_creating_index", &error);
                None
            }
        };
        Ok(Box::new(KeyValueIndexBuilder {
            backend: self.backend.clone(),
            scope: scope.clone(),
            query: query.clone(),
            generation,
            rows: Vec::new(),
        }))
    }

    async fn update_cache_and_indexes(&self, changes: &CommittedChanges) -> Result<()> {
        let scope = self.scope()?;
        if changes.is_empty() {
            return Ok(());
        }
        if let Err(error) = self.backend.apply_changes(scope, changes).await {
            self.backend.degraded(scope, "update_cache_and_indexes", &error);
            // The table's cached state is unknown now: drop all of it.
            if let Err(error) = self.backend.cache.delete_pattern(&table_pattern(&scope.table)).await {
                self.backend.degraded(scope, "invalidate_table", &error);
            }
        }
        Ok(())
    }

    async fn remove_entities(&self, keys: &[EntityKey]) -> Result<()> {
        let scope = self.scope()?;
        for key in keys {
            if let Err(error) = self.backend.cache.delete(&entity_key(&scope.table, key)).await {
                self.backend.degraded(scope, "remove_entities", &error);
            }
        }
        Ok(())
    }
}

/// Collects a full store result and publishes it as one index.
struct KeyValueIndexBuilder {
    backend: Backend,
    scope: CacheScope,
    query: CacheQuery,
    /// Generation when the build started, `None` if it could not be read.
    generation: Option<String>,
    rows: Vec<(EntityKey, Document)>,
}

impl KeyValueIndexBuilder {
    async fn publish(self: Box<Self>, started_at: String) -> Result<()> {
        let backend = &self.backend;
        let scope = &self.scope;

        if backend.generation(&scope.table).await? != started_at {
            backend.log(scope, format!("dropped stale index build {}", self.query.signature()));
            return Ok(());
        }

        let version_field = scope.version_field.as_deref();
        for (key, document) in &self.rows {
            let entry = CacheEntry::new(key.clone(), document.clone(), version_field);
            backend.put_entry(scope, &entry).await?;
        }

        let signature = self.query.signature();
        let cache_key = index_key(&scope.table, scope.partition.as_ref(), &signature);
        let index = CachedIndex {
            signature: signature.clone(),
            keys: self.rows.iter().map(|(key, _)| key.clone()).collect(),
            generation: started_at,
            created_at: Utc::now(),
        };
        backend.put_index(scope, &cache_key, &index).await?;

        let mut registry = backend.registry(&scope.table).await?;
        registry.upsert(IndexRecord {
            cache_key,
            query: self.query.clone(),
        });
        backend.put_registry(scope, &registry).await?;

        backend.log(scope, format!("built index {signature} with {} row(s)", index.keys.len()));
        Ok(())
    }
}

#[async_trait]
impl IndexBuilder for KeyValueIndexBuilder {
    fn add_entity(&mut self, key: &EntityKey, document: &Document) {
        self.rows.push((key.clone(), document.clone()));
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Some(started_at) = self.generation.clone() else {
            return Ok(());
        };
        let backend = self.backend.clone();
        let scope = self.scope.clone();
        if let Err(error) = self.publish(started_at).await {
            backend.degraded(&scope, "commit_index", &error);
        }
        Ok(())
    }
}

/// Creates [`KeyValueTableCache`]s that share one backend and one event
/// channel.
#[derive(Clone)]
pub struct KeyValueTableCacheFactory {
    cache: Arc<dyn Cache>,
    events: broadcast::Sender<CacheEvent>,
}

impl KeyValueTableCacheFactory {
    pub fn new(cache: Arc<dyn Cache>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self { cache, events }
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }
}

#[async_trait]
impl TableCacheFactory for KeyValueTableCacheFactory {
    fn create(&self) -> Box<dyn TableCache> {
        Box::new(KeyValueTableCache::new(self.cache.clone(), self.events.clone()))
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    async fn invalidate_table(&self, table: &str) -> Result<()> {
        tracing::debug!(%table, "Invalidating table cache");
        self.cache.delete_pattern(&table_pattern(table)).await
    }
}
