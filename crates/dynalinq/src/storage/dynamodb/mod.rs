//! DynamoDB storage backend.
//!
//! Implements [`DocumentStore`](dynalinq_core::store::DocumentStore) using
//! `aws-sdk-dynamodb`. Works against AWS or DynamoDB Local.

mod conversions;
mod error;
mod expressions;
mod store;

pub use store::{DynamoDbStore, MAX_TRANSACTION_ITEMS};
