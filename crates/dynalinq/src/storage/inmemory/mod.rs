//! In-memory document store for tests and local development.
//!
//! Behaves like DynamoDB where it matters to callers: key-condition queries
//! return rows in range-key order, secondary indexes are sparse, `limit`
//! applies before filters, and conditional batches are all-or-nothing.

mod stats;
mod store;

pub use stats::OperationCounts;
pub use store::InMemoryStore;
