mod error;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use traits::DocumentStore;
pub use types::{
    FailureReason, GetRequest, ItemFailure, QueryRequest, ReadOptions, ScanRequest,
    WriteCondition, WriteRequest,
};
