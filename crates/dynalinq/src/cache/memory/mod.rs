//! In-memory cache backend with LRU eviction and lazy TTL expiry, for
//! single-process deployments and tests.

mod cache;

pub use cache::MemoryCache;
