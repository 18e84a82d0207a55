use thiserror::Error;

use super::ItemFailure;

/// Errors that can occur during document store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),
    #[error("Throughput exceeded: {0}")]
    ThroughputExceeded(String),
    #[error("Write rejected for {} item(s)", .0.len())]
    ItemsRejected(Vec<ItemFailure>),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Returns true for errors worth retrying after a backoff.
    pub fn is_throttling(&self) -> bool {
        matches!(self, StoreError::ThroughputExceeded(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;
    use crate::store::FailureReason;

    #[test]
    fn test_table_not_found_display() {
        let error = StoreError::TableNotFound("Movies".to_string());
        assert_eq!(error.to_string(), "Table not found: Movies");
    }

    #[test]
    fn test_throughput_exceeded_display() {
        let error = StoreError::ThroughputExceeded("GameScores".to_string());
        assert_eq!(error.to_string(), "Throughput exceeded: GameScores");
        assert!(error.is_throttling());
    }

    #[test]
    fn test_items_rejected_display() {
        let error = StoreError::ItemsRejected(vec![
            ItemFailure {
                key: EntityKey::hash_only("a"),
                reason: FailureReason::ConditionFailed,
            },
            ItemFailure {
                key: EntityKey::hash_only("b"),
                reason: FailureReason::Other("boom".to_string()),
            },
        ]);
        assert_eq!(error.to_string(), "Write rejected for 2 item(s)");
        assert!(!error.is_throttling());
    }

    #[test]
    fn test_connection_failed_display() {
        let error = StoreError::ConnectionFailed("timeout after 30s".to_string());
        assert_eq!(error.to_string(), "Connection failed: timeout after 30s");
    }
}
