use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Table cache used before initialize")]
    NotInitialized,
}

impl CacheError {
    /// Errors caused by misuse of the cache rather than by the backend.
    /// These surface to the caller instead of degrading to a miss.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, CacheError::NotInitialized)
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let error = CacheError::ConnectionFailed("timeout".to_string());
        assert_eq!(error.to_string(), "Cache connection failed: timeout");
    }

    #[test]
    fn test_operation_failed_display() {
        let error = CacheError::OperationFailed("key not found".to_string());
        assert_eq!(error.to_string(), "Cache operation failed: key not found");
    }

    #[test]
    fn test_serialization_display() {
        let error = CacheError::Serialization("invalid JSON".to_string());
        assert_eq!(error.to_string(), "Serialization error: invalid JSON");
    }

    #[test]
    fn test_not_initialized_is_a_programming_error() {
        assert!(CacheError::NotInitialized.is_programming_error());
        assert!(!CacheError::OperationFailed("x".to_string()).is_programming_error());
    }
}
