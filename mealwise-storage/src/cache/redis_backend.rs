//! Redis cache backend.

use super::traits::{CacheBackend, CacheResult};
use async_trait::async_trait;
use mealwise_core::CacheError;
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;

/// Redis backend over a multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCacheBackend {
    connection: ConnectionManager,
}

impl RedisCacheBackend {
    /// Connect to the server at `url`.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = Client::open(url).map_err(backend_error)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(backend_error)?;
        tracing::info!("Connected to Redis cache");
        Ok(Self { connection })
    }

    /// Wrap an existing connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

fn backend_error(e: redis::RedisError) -> CacheError {
    CacheError::Backend {
        reason: e.to_string(),
    }
}

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// Escape glob metacharacters so `prefix` matches only itself.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Expiry in whole seconds; Redis rejects `EX 0`.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}:*", escape_glob(prefix));
        let mut cursor: u64 = 0;
        let mut deleted = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend_error)?;
            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(backend_error)?;
                deleted += removed;
            }
            if next == 0 {
                return Ok(deleted);
            }
            cursor = next;
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend").finish_non_exhaustive()
    }
}
