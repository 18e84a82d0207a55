use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;
use crate::query::{ConditionSet, FilterExpr};
use crate::schema::DEFAULT_CACHE_TTL;
use crate::value::{Document, Value};

/// What one [`TableCache`](super::TableCache) mirrors: a table, optionally
/// narrowed to one hash-key partition.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheScope {
    pub table: String,
    pub entity_type: &'static str,
    pub partition: Option<Value>,
    pub version_field: Option<String>,
    pub ttl: Duration,
}

impl CacheScope {
    pub fn new(table: impl Into<String>, entity_type: &'static str) -> Self {
        Self {
            table: table.into(),
            entity_type,
            partition: None,
            version_field: None,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_partition(mut self, partition: Value) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_version_field(mut self, field: Option<&str>) -> Self {
        self.version_field = field.map(str::to_string);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A cached entity: the attribute snapshot as last read or written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: EntityKey,
    pub document: Document,
    pub version_seen: Option<i64>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: EntityKey, document: Document, version_field: Option<&str>) -> Self {
        let version_seen = version_field
            .and_then(|field| document.get(field))
            .and_then(Value::as_i64);
        Self {
            key,
            document,
            version_seen,
            cached_at: Utc::now(),
        }
    }
}

/// The ordered result keys of one query shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedIndex {
    pub signature: String,
    pub keys: Vec<EntityKey>,
    /// Table generation the index was built or last patched at.
    pub generation: String,
    pub created_at: DateTime<Utc>,
}

/// The shape of a cacheable read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheQuery {
    pub conditions: ConditionSet,
    pub order_by: Option<String>,
    pub order_desc: bool,
    pub custom_filter: Option<FilterExpr>,
    /// Set when the read was customized with a limit; such results are a
    /// prefix of the full result and cannot be patched.
    pub limit: Option<usize>,
}

impl CacheQuery {
    pub fn new(conditions: ConditionSet) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }

    pub fn ordered_by(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.order_by = Some(field.into());
        self.order_desc = desc;
        self
    }

    pub fn with_custom_filter(mut self, filter: Option<FilterExpr>) -> Self {
        self.custom_filter = filter;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Canonical signature: equal for queries that select the same rows in
    /// the same order, regardless of condition order.
    pub fn signature(&self) -> String {
        let mut signature = self.conditions.signature();
        if let Some(field) = &self.order_by {
            let direction = if self.order_desc { "desc" } else { "asc" };
            signature.push_str(&format!("|order={field:?}:{direction}"));
        }
        if let Some(filter) = &self.custom_filter {
            signature.push_str(&format!("|filter={}", filter.canonical()));
        }
        if let Some(limit) = self.limit {
            signature.push_str(&format!("|limit={limit}"));
        }
        signature
    }

    pub fn is_patchable(&self) -> bool {
        self.limit.is_none()
    }

    /// Whether a document belongs to the result. `None` when membership
    /// cannot be decided.
    pub fn evaluate(&self, document: &Document) -> Option<bool> {
        let by_conditions = self.conditions.evaluate(document)?;
        if !by_conditions {
            return Some(false);
        }
        match &self.custom_filter {
            Some(filter) => filter.eval(document).ok(),
            None => Some(true),
        }
    }

    /// Compares two documents by the order field in the query's direction.
    /// `None` when unordered or when the values are incomparable.
    pub fn compare(&self, a: &Document, b: &Document) -> Option<Ordering> {
        let field = self.order_by.as_ref()?;
        let ordering = a.get(field)?.compare(b.get(field)?)?;
        Some(if self.order_desc {
            ordering.reverse()
        } else {
            ordering
        })
    }
}

/// One live index of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub cache_key: String,
    pub query: CacheQuery,
}

/// Every live index of a table, so a commit can find the ones it affects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRegistry {
    pub indexes: Vec<IndexRecord>,
}

impl IndexRegistry {
    /// Adds a record, replacing one with the same cache key.
    pub fn upsert(&mut self, record: IndexRecord) {
        self.remove(&record.cache_key);
        self.indexes.push(record);
    }

    pub fn remove(&mut self, cache_key: &str) -> bool {
        let before = self.indexes.len();
        self.indexes.retain(|r| r.cache_key != cache_key);
        before != self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Observability events published by table caches.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Hit { table: String, detail: String },
    Miss { table: String, detail: String },
    Log { table: String, message: String },
}

impl CacheEvent {
    pub fn table(&self) -> &str {
        match self {
            CacheEvent::Hit { table, .. }
            | CacheEvent::Miss { table, .. }
            | CacheEvent::Log { table, .. } => table,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheEvent::Hit { .. })
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheEvent::Miss { .. })
    }
}
