use thiserror::Error;

use super::PendingChangeSet;
use crate::entity::EntityKey;
use crate::store::{FailureReason, ItemFailure, StoreError};

/// Errors raised while staging changes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Duplicate key {key} on table '{table}'")]
    DuplicateKey { table: String, key: EntityKey },
    #[error("Entity {key} is not tracked on table '{table}'")]
    NotTracked { table: String, key: EntityKey },
    #[error("Key attributes of {key} on table '{table}' cannot change")]
    KeyChanged { table: String, key: EntityKey },
}

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;

/// A failed submit against one table.
///
/// The changes that were being committed are drained into `rejected`, so the
/// caller can inspect or re-stage them.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Submit to table '{table}' failed: {}", describe(.failures, .cause))]
pub struct SubmitError {
    pub table: String,
    pub failures: Vec<ItemFailure>,
    /// Set when the whole batch failed rather than individual items.
    pub cause: Option<StoreError>,
    pub rejected: PendingChangeSet,
}

impl SubmitError {
    pub fn is_concurrency_conflict(&self) -> bool {
        self.failures
            .iter()
            .any(|f| f.reason == FailureReason::ConditionFailed)
    }

    pub fn is_throughput_exceeded(&self) -> bool {
        matches!(self.cause, Some(StoreError::ThroughputExceeded(_)))
    }
}

fn describe(failures: &[ItemFailure], cause: &Option<StoreError>) -> String {
    match cause {
        Some(cause) => cause.to_string(),
        None => {
            let items: Vec<String> = failures.iter().map(ToString::to_string).collect();
            format!("{} item(s) rejected: {}", failures.len(), items.join("; "))
        }
    }
}
