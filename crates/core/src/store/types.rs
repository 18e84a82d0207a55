use std::fmt;

use crate::entity::EntityKey;
use crate::query::{Condition, ConditionSet, FilterExpr};
use crate::value::Document;

/// Read options a query customization hook may adjust.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub consistent_read: bool,
    /// Maximum number of items the store evaluates, applied before filters.
    pub limit: Option<usize>,
}

impl ReadOptions {
    /// Returns true when the options differ from a plain read.
    pub fn is_customized(&self) -> bool {
        self != &ReadOptions::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub table: String,
    pub key: EntityKey,
    pub consistent_read: bool,
}

/// A key-condition query against the table or one of its indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    /// Local or global index name; `None` queries the table itself.
    pub index_name: Option<String>,
    pub hash_condition: Condition,
    pub range_condition: Option<Condition>,
    pub filter: ConditionSet,
    pub custom_filter: Option<FilterExpr>,
    pub scan_forward: bool,
    pub options: ReadOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table: String,
    pub filter: ConditionSet,
    pub custom_filter: Option<FilterExpr>,
    pub options: ReadOptions,
}

/// Condition attached to a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    None,
    /// The row must not exist yet.
    NotExists,
    /// The stored version attribute must equal `version`.
    VersionEquals { field: String, version: i64 },
    /// The stored row must not carry the version attribute.
    VersionAbsent { field: String },
}

/// One item of a write batch: a full-record replacement or a delete.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put {
        key: EntityKey,
        item: Document,
        condition: WriteCondition,
    },
    Delete {
        key: EntityKey,
        condition: WriteCondition,
    },
}

impl WriteRequest {
    pub fn key(&self) -> &EntityKey {
        match self {
            WriteRequest::Put { key, .. } | WriteRequest::Delete { key, .. } => key,
        }
    }

    pub fn condition(&self) -> &WriteCondition {
        match self {
            WriteRequest::Put { condition, .. } | WriteRequest::Delete { condition, .. } => {
                condition
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The write condition did not hold: a concurrent writer got there first.
    ConditionFailed,
    Other(String),
}

/// Why one item of a batch was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub key: EntityKey,
    pub reason: FailureReason,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::ConditionFailed => write!(f, "{}: condition check failed", self.key),
            FailureReason::Other(reason) => write!(f, "{}: {}", self.key, reason),
        }
    }
}
