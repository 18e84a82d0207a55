//! Redis cache backend for deployments where several processes share one
//! cache.

mod cache;
mod error;

pub use cache::RedisCache;
