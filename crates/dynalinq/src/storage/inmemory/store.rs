//! In-memory document store implementation.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dynalinq_core::query::{ConditionSet, FilterExpr};
use dynalinq_core::schema::{
    GlobalIndex, GlobalIndexState, IndexStatus, TableDefinition, TableState, TableStatus,
};
use dynalinq_core::store::{
    DocumentStore, FailureReason, GetRequest, ItemFailure, QueryRequest, Result, ScanRequest,
    StoreError, WriteCondition, WriteRequest,
};
use dynalinq_core::{Document, EntityKey};

use super::stats::{Operation, OperationStats};
use super::OperationCounts;

#[derive(Debug, Clone)]
struct TableData {
    definition: TableDefinition,
    /// Canonical key -> item, so scans come back in a stable order.
    items: BTreeMap<String, Document>,
}

/// In-memory store for tests and development.
///
/// Data lives in an `Arc<RwLock<_>>` and is lost when the last clone is
/// dropped. Operation counters let tests assert which access path a read
/// took.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, TableData>>>,
    stats: Arc<OperationStats>,
    throttled: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of every operation performed so far.
    pub fn operation_counts(&self) -> OperationCounts {
        self.stats.snapshot()
    }

    /// Makes the next `n` operations fail with `ThroughputExceeded`.
    pub fn throttle_next(&self, n: usize) {
        self.throttled.store(n, Ordering::SeqCst);
    }

    /// Number of items currently stored in a table.
    pub async fn item_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.items.len()).unwrap_or(0)
    }

    /// Looks up an item without touching the operation counters.
    pub async fn peek(&self, table: &str, key: &EntityKey) -> Option<Document> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .and_then(|data| data.items.get(&key.canonical()).cloned())
    }

    fn check_throttle(&self, table: &str) -> Result<()> {
        let throttled = self
            .throttled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if throttled.is_ok() {
            tracing::debug!(%table, "Simulated throughput exceeded");
            return Err(StoreError::ThroughputExceeded(table.to_string()));
        }
        Ok(())
    }
}

fn table_not_found(table: &str) -> StoreError {
    StoreError::TableNotFound(table.to_string())
}

/// Applies the store-side filters to a row.
fn passes_filters(document: &Document, filter: &ConditionSet, custom: Option<&FilterExpr>) -> bool {
    if !filter.matches(document) {
        return false;
    }
    match custom {
        Some(expr) => expr.eval(document).unwrap_or(false),
        None => true,
    }
}

fn check_condition(current: Option<&Document>, condition: &WriteCondition) -> bool {
    match condition {
        WriteCondition::None => true,
        WriteCondition::NotExists => current.is_none(),
        WriteCondition::VersionEquals { field, version } => current
            .and_then(|doc| doc.get(field))
            .and_then(|v| v.as_i64())
            == Some(*version),
        WriteCondition::VersionAbsent { field } => {
            current.is_none_or(|doc| doc.get(field).is_none_or(|v| v.is_null()))
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableState>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).map(|data| TableState {
            status: TableStatus::Active,
            global_indexes: data
                .definition
                .key_schema
                .global_indexes
                .iter()
                .map(|gsi| GlobalIndexState {
                    name: gsi.name.clone(),
                    status: IndexStatus::Active,
                })
                .collect(),
        }))
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(&definition.name) {
            return Err(StoreError::TableAlreadyExists(definition.name.clone()));
        }
        tracing::debug!(table = %definition.name, "Creating in-memory table");
        tables.insert(
            definition.name.clone(),
            TableData {
                definition: definition.clone(),
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn add_global_index(&self, table: &str, index: &GlobalIndex) -> Result<()> {
        let mut tables = self.tables.write().await;
        let data = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let indexes = &mut data.definition.key_schema.global_indexes;
        if !indexes.iter().any(|g| g.name == index.name) {
            indexes.push(index.clone());
        }
        Ok(())
    }

    async fn get_item(&self, request: &GetRequest) -> Result<Option<Document>> {
        self.check_throttle(&request.table)?;
        self.stats.record(Operation::Get);

        let tables = self.tables.read().await;
        let data = tables
            .get(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;
        Ok(data.items.get(&request.key.canonical()).cloned())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Document>> {
        self.check_throttle(&request.table)?;

        let tables = self.tables.read().await;
        let data = tables
            .get(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;
        let schema = &data.definition.key_schema;

        // Key attributes of the queried table or index.
        let (range_key, is_global) = match &request.index_name {
            None => (schema.range_key_name().map(str::to_string), false),
            Some(name) => {
                if let Some(lsi) = schema.local_index(name) {
                    (Some(lsi.range_key.name.clone()), false)
                } else if let Some(gsi) = schema.global_index(name) {
                    (gsi.range_key.as_ref().map(|r| r.name.clone()), true)
                } else {
                    return Err(StoreError::OperationFailed(format!(
                        "Index '{name}' not found on table '{}'",
                        request.table
                    )));
                }
            }
        };
        let sparse = request.index_name.is_some();

        self.stats.record(if is_global {
            Operation::IndexQuery
        } else {
            Operation::Query
        });

        let mut rows: Vec<&Document> = data
            .items
            .values()
            .filter(|doc| request.hash_condition.evaluate(doc) == Some(true))
            .filter(|doc| match &range_key {
                // Index entries exist only for items carrying the range attribute.
                Some(range) if sparse => doc.get(range).is_some_and(|v| !v.is_null()),
                _ => true,
            })
            .filter(|doc| {
                request
                    .range_condition
                    .as_ref()
                    .is_none_or(|c| c.evaluate(doc) == Some(true))
            })
            .collect();

        if let Some(range) = &range_key {
            rows.sort_by(|a, b| match (a.get(range), b.get(range)) {
                (Some(x), Some(y)) => x.compare(y).unwrap_or(CmpOrdering::Equal),
                _ => CmpOrdering::Equal,
            });
        }
        if !request.scan_forward {
            rows.reverse();
        }
        if let Some(limit) = request.options.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .into_iter()
            .filter(|doc| passes_filters(doc, &request.filter, request.custom_filter.as_ref()))
            .cloned()
            .collect())
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Vec<Document>> {
        self.check_throttle(&request.table)?;
        self.stats.record(Operation::Scan);

        let tables = self.tables.read().await;
        let data = tables
            .get(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;

        let limit = request.options.limit.unwrap_or(usize::MAX);
        Ok(data
            .items
            .values()
            .take(limit)
            .filter(|doc| passes_filters(doc, &request.filter, request.custom_filter.as_ref()))
            .cloned()
            .collect())
    }

    async fn write_batch(&self, table: &str, requests: &[WriteRequest]) -> Result<()> {
        self.check_throttle(table)?;
        self.stats.record(Operation::Write);

        let mut tables = self.tables.write().await;
        let data = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        // Every condition is checked before anything is applied.
        let failures: Vec<ItemFailure> = requests
            .iter()
            .filter(|request| {
                let current = data.items.get(&request.key().canonical());
                !check_condition(current, request.condition())
            })
            .map(|request| ItemFailure {
                key: request.key().clone(),
                reason: FailureReason::ConditionFailed,
            })
            .collect();

        if !failures.is_empty() {
            tracing::debug!(%table, failed = failures.len(), "Write batch rejected");
            return Err(StoreError::ItemsRejected(failures));
        }

        for request in requests {
            match request {
                WriteRequest::Put { key, item, .. } => {
                    data.items.insert(key.canonical(), item.clone());
                }
                WriteRequest::Delete { key, .. } => {
                    data.items.remove(&key.canonical());
                }
            }
        }

        tracing::trace!(%table, items = requests.len(), "Write batch applied");
        Ok(())
    }
}
