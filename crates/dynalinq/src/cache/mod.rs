//! Cache backends and the key-value table cache built on them.
//!
//! - [`MemoryCache`]: in-process LRU cache (always available)
//! - `RedisCache`: shared Redis cache (feature `redis`)
//!
//! [`KeyValueTableCacheFactory`] turns either into per-table caches.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_impl;
mod table_cache;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
pub use table_cache::{KeyValueTableCache, KeyValueTableCacheFactory};
