//! Redis cache implementation.
//!
//! Every key of a table is recorded in the table's tracking set
//! (`dynalinq:{table}:_keys`) so pattern deletion never needs SCAN.
//!
//! The commands are not atomic. A crash between them leaves either a stale
//! member in a tracking set (deleting a missing key is a no-op) or an
//! untracked key that still expires through its TTL.
//!
//! Members whose keys expired are pruned when a read misses on them and on
//! every `delete_pattern` for their table.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use dynalinq_core::cache::{is_tracked_key, pattern_matches, table_of_key, Cache, Result};

use super::error::map_redis_error;

/// Redis cache backend using a connection manager for pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Connects to Redis (e.g. `redis://localhost:6379`).
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }
}

/// Tracking set of an already escaped table segment.
fn tracking_key_for(table_segment: &str) -> String {
    format!("dynalinq:{table_segment}:_keys")
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;

        if result.is_none() && is_tracked_key(key) {
            if let Some(table) = table_of_key(key) {
                conn.srem::<_, _, ()>(tracking_key_for(table), key)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                let seconds = duration.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(map_redis_error)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        if is_tracked_key(key) {
            if let Some(table) = table_of_key(key) {
                conn.sadd::<_, _, ()>(tracking_key_for(table), key)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();

        if is_tracked_key(key) {
            if let Some(table) = table_of_key(key) {
                conn.srem::<_, _, ()>(tracking_key_for(table), key)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        conn.del::<_, ()>(key).await.map_err(map_redis_error)?;

        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        // Only table-scoped patterns are supported; keys outside a tracked
        // table expire through their TTL.
        let Some(table) = table_of_key(pattern) else {
            tracing::warn!(pattern, "Pattern without a table segment ignored");
            return Ok(());
        };

        let mut conn = self.conn.clone();
        let tracking_key = tracking_key_for(table);

        let tracked_keys: Vec<String> = conn
            .smembers(&tracking_key)
            .await
            .map_err(map_redis_error)?;

        let (keys_to_delete, others): (Vec<&String>, Vec<&String>) = tracked_keys
            .iter()
            .partition(|k| pattern_matches(pattern, k));

        let mut untracked = Vec::new();
        if !keys_to_delete.is_empty() {
            conn.del::<_, ()>(&keys_to_delete)
                .await
                .map_err(map_redis_error)?;
            untracked.extend(keys_to_delete);
        }

        if !others.is_empty() {
            let mut pipe = redis::pipe();
            for key in &others {
                pipe.exists(*key);
            }
            let present: Vec<bool> = pipe.query_async(&mut conn).await.map_err(map_redis_error)?;
            untracked.extend(
                others
                    .into_iter()
                    .zip(present)
                    .filter(|(_, present)| !present)
                    .map(|(key, _)| key),
            );
        }

        if !untracked.is_empty() {
            conn.srem::<_, _, ()>(&tracking_key, &untracked)
                .await
                .map_err(map_redis_error)?;
        }

        Ok(())
    }
}
