use async_trait::async_trait;

use super::{GetRequest, QueryRequest, Result, ScanRequest, WriteRequest};
use crate::schema::{GlobalIndex, TableDefinition, TableState};
use crate::value::Document;

/// A DynamoDB-style document store.
///
/// Implementations are long-lived, thread-safe handles shared across
/// contexts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Describes an existing table, or `None` when it does not exist.
    async fn describe_table(&self, table: &str) -> Result<Option<TableState>>;

    /// Creates a table with its key schema and indexes.
    async fn create_table(&self, definition: &TableDefinition) -> Result<()>;

    /// Adds a global secondary index to an existing table.
    async fn add_global_index(&self, table: &str, index: &GlobalIndex) -> Result<()>;

    /// Reads one item by primary key.
    async fn get_item(&self, request: &GetRequest) -> Result<Option<Document>>;

    /// Runs a key-condition query, following pagination to the end (or the
    /// request limit).
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Document>>;

    /// Scans the whole table, following pagination to the end (or the request
    /// limit).
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<Document>>;

    /// Applies a batch of conditional writes to one table. Item failures are
    /// reported together as [`StoreError::ItemsRejected`].
    ///
    /// [`StoreError::ItemsRejected`]: super::StoreError::ItemsRejected
    async fn write_batch(&self, table: &str, requests: &[WriteRequest]) -> Result<()>;
}
