//! Throughput retry around any document store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use dynalinq_core::schema::{GlobalIndex, TableDefinition, TableState};
use dynalinq_core::store::{
    DocumentStore, GetRequest, QueryRequest, Result, ScanRequest, WriteRequest,
};
use dynalinq_core::Document;

/// Retries operations that fail with `ThroughputExceeded`, sleeping
/// `backoff` between attempts. After `retries` retries the error surfaces.
#[derive(Clone)]
pub struct RetryingStore {
    inner: Arc<dyn DocumentStore>,
    retries: u32,
    backoff: Duration,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn DocumentStore>, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, table: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_throttling() && retries < self.retries => {
                    retries += 1;
                    warn!(
                        operation,
                        table,
                        attempt = retries,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Throughput exceeded, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                outcome => return outcome,
            }
        }
    }
}

#[async_trait]
impl DocumentStore for RetryingStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableState>> {
        self.with_retry("describe_table", table, || self.inner.describe_table(table))
            .await
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<()> {
        self.with_retry("create_table", &definition.name, || {
            self.inner.create_table(definition)
        })
        .await
    }

    async fn add_global_index(&self, table: &str, index: &GlobalIndex) -> Result<()> {
        self.with_retry("add_global_index", table, || {
            self.inner.add_global_index(table, index)
        })
        .await
    }

    async fn get_item(&self, request: &GetRequest) -> Result<Option<Document>> {
        self.with_retry("get_item", &request.table, || self.inner.get_item(request))
            .await
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Document>> {
        self.with_retry("query", &request.table, || self.inner.query(request))
            .await
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Vec<Document>> {
        self.with_retry("scan", &request.table, || self.inner.scan(request))
            .await
    }

    async fn write_batch(&self, table: &str, requests: &[WriteRequest]) -> Result<()> {
        self.with_retry("write_batch", table, || {
            self.inner.write_batch(table, requests)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use dynalinq_core::schema::{KeyAttribute, KeySchema};
    use dynalinq_core::store::{StoreError, WriteCondition};
    use dynalinq_core::{EntityKey, Value};

    async fn movies(inner: &InMemoryStore) {
        let definition =
            TableDefinition::new("Movies", KeySchema::new(KeyAttribute::string("Name")));
        inner.create_table(&definition).await.unwrap();
    }

    fn alien() -> WriteRequest {
        let mut item = Document::new();
        item.insert("Name".to_string(), Value::from("Alien"));
        WriteRequest::Put {
            key: EntityKey::hash_only("Alien"),
            item,
            condition: WriteCondition::NotExists,
        }
    }

    #[tokio::test]
    async fn test_retries_throttled_operation() {
        let inner = InMemoryStore::new();
        movies(&inner).await;
        let store = RetryingStore::new(Arc::new(inner.clone()), 1, Duration::from_millis(5));

        inner.throttle_next(1);
        store.write_batch("Movies", &[alien()]).await.unwrap();

        assert_eq!(inner.item_count("Movies").await, 1);
    }

    #[tokio::test]
    async fn test_surfaces_throttling_after_retries() {
        let inner = InMemoryStore::new();
        movies(&inner).await;
        let store = RetryingStore::new(Arc::new(inner.clone()), 1, Duration::from_millis(5));

        inner.throttle_next(2);
        let err = store.write_batch("Movies", &[alien()]).await.unwrap_err();
        assert_eq!(err, StoreError::ThroughputExceeded("Movies".to_string()));
        assert_eq!(inner.item_count("Movies").await, 0);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let inner = InMemoryStore::new();
        movies(&inner).await;
        let store = RetryingStore::new(Arc::new(inner.clone()), 3, Duration::from_millis(5));

        store.write_batch("Movies", &[alien()]).await.unwrap();
        let before = inner.operation_counts();
        let err = store.write_batch("Movies", &[alien()]).await.unwrap_err();

        assert!(matches!(err, StoreError::ItemsRejected(_)));
        assert_eq!(inner.operation_counts().since(&before).writes, 1);
    }
}
