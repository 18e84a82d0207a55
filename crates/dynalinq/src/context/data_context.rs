use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dynalinq_core::cache::{CacheEvent, CacheScope, TableCacheFactory};
use dynalinq_core::schema::{
    calculate_deploy_plan, format_deploy_plan, DeployPlan, SchemaError, TableDefinition,
};
use dynalinq_core::store::{DocumentStore, StoreError};
use dynalinq_core::tracking::{SubmitError, TableTracker};
use dynalinq_core::{Entity, Error, Result, Value};

use super::Table;

/// A tracker plus the cache scope its commits are written through.
struct TrackedTable {
    tracker: TableTracker,
    scope: CacheScope,
}

/// One unit of work against the store.
///
/// Contexts are cheap: [`session`](Self::session) creates another one that
/// shares the backends and table declarations but tracks its own changes.
pub struct DataContext {
    id: Uuid,
    store: Arc<dyn DocumentStore>,
    caches: Arc<dyn TableCacheFactory>,
    declared: Arc<RwLock<HashMap<String, TableDefinition>>>,
    trackers: Mutex<BTreeMap<String, TrackedTable>>,
}

impl DataContext {
    pub fn new(store: Arc<dyn DocumentStore>, caches: Arc<dyn TableCacheFactory>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            caches,
            declared: Arc::new(RwLock::new(HashMap::new())),
            trackers: Mutex::new(BTreeMap::new()),
        }
    }

    /// A fresh context over the same backends and declarations.
    pub fn session(&self) -> DataContext {
        Self {
            id: Uuid::new_v4(),
            store: Arc::clone(&self.store),
            caches: Arc::clone(&self.caches),
            declared: Arc::clone(&self.declared),
            trackers: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn caches(&self) -> &Arc<dyn TableCacheFactory> {
        &self.caches
    }

    /// Hit, miss and log events of every table cache.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.caches.subscribe()
    }

    /// Declares a table, creating it (or its missing global indexes) when
    /// needed. `seed` runs only when the table is created.
    pub async fn declare_table<E: Entity>(
        &self,
        definition: TableDefinition,
        seed: impl FnOnce() -> Vec<E>,
    ) -> Result<DeployPlan> {
        let descriptor = E::descriptor();
        definition.validate_for(descriptor)?;

        let current = self.store.describe_table(&definition.name).await?;
        let plan = calculate_deploy_plan(current.as_ref(), &definition);
        for line in format_deploy_plan(&plan) {
            debug!(table = %definition.name, "{line}");
        }

        match &plan {
            DeployPlan::CreateTable { definition } => {
                self.store.create_table(definition).await?;
                if let Err(error) = self.caches.invalidate_table(&definition.name).await {
                    warn!(table = %definition.name, error = %error, "Failed to clear stale cache");
                }
                self.seed(definition, descriptor.version_field(), seed())
                    .await?;
                info!(table = %definition.name, "Table created");
            }
            DeployPlan::AddGlobalIndexes {
                table_name,
                indexes,
            } => {
                for index in indexes {
                    self.store.add_global_index(table_name, index).await?;
                }
                info!(table = %table_name, added = indexes.len(), "Global indexes added");
            }
            DeployPlan::NoChanges { table_name } => {
                debug!(table = %table_name, "Table is up to date");
            }
        }

        self.declared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.name.clone(), definition);
        Ok(plan)
    }

    async fn seed<E: Entity>(
        &self,
        definition: &TableDefinition,
        version_field: Option<&str>,
        entities: Vec<E>,
    ) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let descriptor = E::descriptor();
        let mut tracker = TableTracker::new(
            definition.name.clone(),
            definition.key_schema.clone(),
            version_field,
        );
        for entity in &entities {
            let document = descriptor.to_document(entity);
            let key = definition.key_schema.key_of(&definition.name, &document)?;
            tracker.stage_insert(key, document)?;
        }
        let prepared = tracker.begin_commit()?;
        self.store
            .write_batch(&definition.name, &prepared.requests)
            .await?;
        debug!(table = %definition.name, rows = entities.len(), "Seed data written");
        Ok(())
    }

    pub(crate) fn definition(&self, name: &str) -> Result<TableDefinition> {
        self.declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TableNotDeclared(name.to_string()))
    }

    /// A handle over a declared table.
    pub async fn table<E: Entity>(&self, name: &str) -> Result<Table<'_, E>> {
        let definition = self.definition(name)?;
        definition.validate_for(E::descriptor())?;
        Table::open(self, definition, None).await
    }

    /// A handle restricted to one hash-key partition. Queries, lookups and
    /// cached indexes only see rows of that partition.
    pub async fn table_in_partition<E: Entity>(
        &self,
        name: &str,
        hash: impl Into<Value>,
    ) -> Result<Table<'_, E>> {
        let definition = self.definition(name)?;
        definition.validate_for(E::descriptor())?;

        let hash = hash.into();
        let hash_key = &definition.key_schema.hash_key;
        if !hash_key.attribute_type.accepts(&hash) {
            return Err(SchemaError::KeySchemaMismatch {
                table: definition.name.clone(),
                reason: format!(
                    "partition value for '{}' expects {}, got {}",
                    hash_key.name,
                    hash_key.attribute_type.code(),
                    hash.type_name()
                ),
            }
            .into());
        }
        Table::open(self, definition, Some(hash)).await
    }

    /// Runs `f` on the tracker of a table, creating it on first use.
    pub(crate) fn with_tracker<E: Entity, R>(
        &self,
        definition: &TableDefinition,
        f: impl FnOnce(&mut TableTracker) -> R,
    ) -> R {
        let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
        let tracked = trackers
            .entry(definition.name.clone())
            .or_insert_with(|| {
                let descriptor = E::descriptor();
                TrackedTable {
                    tracker: TableTracker::new(
                        definition.name.clone(),
                        definition.key_schema.clone(),
                        descriptor.version_field(),
                    ),
                    scope: CacheScope::new(definition.name.clone(), descriptor.type_name())
                        .with_version_field(descriptor.version_field())
                        .with_ttl(definition.cache_ttl),
                }
            });
        f(&mut tracked.tracker)
    }

    /// Whether any table has staged changes.
    pub fn has_changes(&self) -> bool {
        self.trackers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|t| t.tracker.has_changes())
    }

    /// Commits every table's staged changes, one conditional batch per table
    /// in table-name order. Stops at the first table that fails; its changes
    /// are returned inside the error and tables after it stay staged.
    pub async fn submit_changes(&self) -> Result<()> {
        let tables: Vec<String> = self
            .trackers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();

        for table in tables {
            self.submit_table(&table).await?;
        }
        Ok(())
    }

    async fn submit_table(&self, table: &str) -> Result<()> {
        let prepared = {
            let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(tracked) = trackers.get_mut(table) else {
                return Ok(());
            };
            if !tracked.tracker.has_changes() {
                return Ok(());
            }
            let prepared = tracked.tracker.begin_commit()?;
            (prepared, tracked.scope.clone())
        };
        let (prepared, scope) = prepared;

        if prepared.requests.is_empty() {
            self.with_tracked(table, |t| t.tracker.reset_clean());
            return Ok(());
        }

        if let Err(error) = self.store.write_batch(table, &prepared.requests).await {
            let rejected = self
                .with_tracked(table, |t| t.tracker.fail_commit())
                .unwrap_or_default();
            let (failures, cause) = match error {
                StoreError::ItemsRejected(failures) => (failures, None),
                other => (Vec::new(), Some(other)),
            };
            warn!(
                table,
                context = %self.id,
                failed = failures.len(),
                "Submit rejected"
            );
            return Err(SubmitError {
                table: table.to_string(),
                failures,
                cause,
                rejected,
            }
            .into());
        }

        self.with_tracked(table, |t| t.tracker.complete_commit(&prepared.changes));

        let mut cache = self.caches.create();
        cache.initialize(scope).await?;
        cache.update_cache_and_indexes(&prepared.changes).await?;

        debug!(
            table,
            context = %self.id,
            added = prepared.changes.added.len(),
            modified = prepared.changes.modified.len(),
            removed = prepared.changes.removed.len(),
            "Changes submitted"
        );
        Ok(())
    }

    fn with_tracked<R>(&self, table: &str, f: impl FnOnce(&mut TrackedTable) -> R) -> Option<R> {
        let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
        trackers.get_mut(table).map(f)
    }

    /// [`submit_changes`](Self::submit_changes) for synchronous callers.
    ///
    /// Runs on a private current-thread runtime, so it must not be called
    /// from inside an async task.
    pub fn submit_changes_blocking(&self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                StoreError::OperationFailed(format!("failed to start submit runtime: {e}"))
            })?;
        runtime.block_on(self.submit_changes())
    }
}
