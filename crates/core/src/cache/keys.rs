//! Cache key layout.
//!
//! ```text
//! dynalinq:{table}:entity:{key}                 one cached entity
//! dynalinq:{table}:{partition}:index:{sig}      one cached query result
//! dynalinq:{table}:indexes                      registry of live indexes
//! dynalinq:{table}:generation                   write generation token
//! dynalinq:{table}:_keys                        tracking set (Redis)
//! ```
//!
//! Dynamic segments are escaped so they never contain `:` or `*`.

use crate::entity::EntityKey;
use crate::value::Value;

const PREFIX: &str = "dynalinq:";

/// Partition segment used by handles that are not scoped to a hash key.
pub const ALL_PARTITIONS: &str = "_all";

/// Escapes a key segment: `%`, `:` and `*` become percent sequences.
pub fn escape(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            '*' => escaped.push_str("%2A"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Returns the cache key of a single entity.
pub fn entity_key(table: &str, key: &EntityKey) -> String {
    format!("{PREFIX}{}:entity:{}", escape(table), escape(&key.canonical()))
}

/// Returns the cache key of a cached query result.
pub fn index_key(table: &str, partition: Option<&Value>, signature: &str) -> String {
    format!(
        "{PREFIX}{}:{}:index:{}",
        escape(table),
        partition_segment(partition),
        escape(signature)
    )
}

/// Returns the key of the table's index registry.
pub fn index_registry_key(table: &str) -> String {
    format!("{PREFIX}{}:indexes", escape(table))
}

/// Returns the key of the table's write generation token.
pub fn generation_key(table: &str) -> String {
    format!("{PREFIX}{}:generation", escape(table))
}

/// Returns the pattern matching every key of a table.
pub fn table_pattern(table: &str) -> String {
    format!("{PREFIX}{}:*", escape(table))
}

/// Returns the Redis Set key tracking every cache key of a table.
///
/// The set enables pattern deletion without using Redis SCAN.
pub fn table_tracking_key(table: &str) -> String {
    format!("{PREFIX}{}:_keys", escape(table))
}

pub fn partition_segment(partition: Option<&Value>) -> String {
    match partition {
        Some(value) => escape(&value.canonical()),
        None => ALL_PARTITIONS.to_string(),
    }
}

/// Extracts the (escaped) table segment from a cache key or pattern.
///
/// Returns `None` for foreign keys and for a wildcard in the table position.
///
/// # Examples
///
/// ```
/// use dynalinq_core::cache::table_of_key;
///
/// assert_eq!(table_of_key("dynalinq:Movies:generation"), Some("Movies"));
/// assert_eq!(table_of_key("dynalinq:*:generation"), None);
/// assert_eq!(table_of_key("user:123"), None);
/// ```
pub fn table_of_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(PREFIX)?;
    let table = rest.split(':').next()?;
    if table.is_empty() || table.contains('*') {
        return None;
    }
    Some(table)
}

/// Returns true for keys that belong in a table's tracking set: everything
/// except the tracking set itself.
pub fn is_tracked_key(key: &str) -> bool {
    table_of_key(key).is_some() && !key.ends_with(":_keys")
}
