use thiserror::Error;

/// Errors raised by raw filter expressions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid filter expression: {0}")]
    InvalidExpression(String),
}

/// Errors raised while translating a query description.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unsupported query shape: {0}")]
    UnsupportedQueryShape(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl QueryError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        QueryError::UnsupportedQueryShape(reason.into())
    }
}

/// Result type for query translation.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display() {
        let error = QueryError::unsupported("OR is not supported");
        assert_eq!(error.to_string(), "Unsupported query shape: OR is not supported");
    }

    #[test]
    fn test_filter_error_is_transparent() {
        let error = QueryError::from(FilterError::InvalidExpression("too deep".to_string()));
        assert_eq!(error.to_string(), "Invalid filter expression: too deep");
    }
}
