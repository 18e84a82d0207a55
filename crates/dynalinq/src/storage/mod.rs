//! Document store backends.
//!
//! The in-memory store is always available and backs tests and the demo.
//! The DynamoDB backend is compiled with the `dynamodb` feature:
//!
//! ```bash
//! cargo build -p dynalinq --features dynamodb
//! ```

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod inmemory;
mod retry;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
pub use inmemory::{InMemoryStore, OperationCounts};
pub use retry::RetryingStore;
