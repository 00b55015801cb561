//! Cache backend trait and statistics.

use async_trait::async_trait;
use mealwise_core::CacheError;
use std::time::Duration;

/// Result type for raw backend operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Raw string key-value store with per-entry expiry.
///
/// This trait abstracts over different cache backends (Redis, in-memory).
/// Implementations must be thread-safe. Values are opaque strings; typing and
/// error absorption happen in [`crate::CacheStore`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every key matching `<prefix>:*`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of successful writes.
    pub writes: u64,
    /// Number of absorbed backend or serialization failures.
    pub errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
