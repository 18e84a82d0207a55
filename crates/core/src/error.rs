use thiserror::Error;

use crate::cache::CacheError;
use crate::entity::FieldError;
use crate::query::QueryError;
use crate::schema::SchemaError;
use crate::store::StoreError;
use crate::tracking::{SubmitError, TrackingError};

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedQueryShape,
    KeySchemaMismatch,
    DuplicateKey,
    ConcurrencyConflict,
    ThroughputExceeded,
    NotFound,
    MultipleResults,
    TableNotDeclared,
    Backend,
}

/// Every error the data-access API can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Submit(#[from] Box<SubmitError>),
    #[error("No {entity_type} found for {key}")]
    NotFound { entity_type: &'static str, key: String },
    #[error("Expected a single {entity_type}, found {count}")]
    MultipleResults { entity_type: &'static str, count: usize },
    #[error("Table '{0}' has not been declared")]
    TableNotDeclared(String),
}

impl From<SubmitError> for Error {
    fn from(error: SubmitError) -> Self {
        Error::Submit(Box::new(error))
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Query(_) => ErrorKind::UnsupportedQueryShape,
            Error::Schema(_) => ErrorKind::KeySchemaMismatch,
            Error::Field(_) | Error::Cache(_) => ErrorKind::Backend,
            Error::Store(error) => store_kind(error),
            Error::Tracking(TrackingError::DuplicateKey { .. }) => ErrorKind::DuplicateKey,
            Error::Tracking(TrackingError::NotTracked { .. }) => ErrorKind::NotFound,
            Error::Tracking(TrackingError::KeyChanged { .. }) => ErrorKind::KeySchemaMismatch,
            Error::Submit(error) => {
                if error.is_concurrency_conflict() {
                    ErrorKind::ConcurrencyConflict
                } else if let Some(cause) = &error.cause {
                    store_kind(cause)
                } else {
                    ErrorKind::Backend
                }
            }
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::MultipleResults { .. } => ErrorKind::MultipleResults,
            Error::TableNotDeclared(_) => ErrorKind::TableNotDeclared,
        }
    }
}

fn store_kind(error: &StoreError) -> ErrorKind {
    match error {
        StoreError::ThroughputExceeded(_) => ErrorKind::ThroughputExceeded,
        StoreError::ItemsRejected(_) => ErrorKind::ConcurrencyConflict,
        _ => ErrorKind::Backend,
    }
}

pub type Result<T> = std::result::Result<T, Error>;
