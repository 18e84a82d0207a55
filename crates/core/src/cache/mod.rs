mod error;
mod keys;
mod patch;
mod patterns;
pub mod serialization;
mod traits;
mod types;

pub use error::{CacheError, Result};
pub use keys::{
    entity_key, escape, generation_key, index_key, index_registry_key, is_tracked_key,
    partition_segment, table_of_key, table_pattern, table_tracking_key, ALL_PARTITIONS,
};
pub use patch::{patch_index, PatchOutcome};
pub use patterns::pattern_matches;
pub use traits::{Cache, IndexBuilder, TableCache, TableCacheFactory};
pub use types::{
    CacheEntry, CacheEvent, CacheQuery, CacheScope, CachedIndex, IndexRecord, IndexRegistry,
};
