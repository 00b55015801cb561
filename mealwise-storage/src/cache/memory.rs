//! In-process cache backend with per-entry expiry.

use super::traits::{CacheBackend, CacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory backend for tests and local development.
///
/// Expired entries are dropped lazily on read and on [`purge_expired`].
///
/// [`purge_expired`]: InMemoryCacheBackend::purge_expired
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining lifetime of `key`, if it is live.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }

    /// Drop every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop it so the map does not grow with dead entries.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let pattern = format!("{}:", prefix);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(&pattern));
        Ok((before - entries.len()) as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = InMemoryCacheBackend::new();
        backend
            .set_ex("recipe:1", "{}", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("recipe:1").await.unwrap().as_deref(), Some("{}"));
        backend.delete("recipe:1").await.unwrap();
        assert_eq!(backend.get("recipe:1").await.unwrap(), None);
        backend.delete("recipe:1").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let backend = InMemoryCacheBackend::new();
        backend
            .set_ex("recipe-list:recent-recipes", "[]", Duration::from_secs(1800))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(1799)).await;
        assert!(backend.get("recipe-list:recent-recipes").await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(backend.get("recipe-list:recent-recipes").await.unwrap().is_none());
        assert!(backend.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let backend = InMemoryCacheBackend::new();
        backend.set_ex("a", "1", Duration::from_secs(1)).await.unwrap();
        backend.set_ex("b", "2", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(backend.purge_expired().await, 1);
        assert_eq!(backend.keys().await, vec!["b"]);
        assert!(backend.ttl("b").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_prefix_respects_separator() {
        let backend = InMemoryCacheBackend::new();
        let ttl = Duration::from_secs(60);
        backend.set_ex("meal-plans:u1:2024-05-01", "[]", ttl).await.unwrap();
        backend.set_ex("meal-plans:u1:2024-05-02", "[]", ttl).await.unwrap();
        backend.set_ex("meal-plans:u10:2024-05-01", "[]", ttl).await.unwrap();
        backend.set_ex("meal-plans:u1", "bare", ttl).await.unwrap();

        assert_eq!(backend.delete_prefix("meal-plans:u1").await.unwrap(), 2);
        assert_eq!(
            backend.keys().await,
            vec!["meal-plans:u1", "meal-plans:u10:2024-05-01"]
        );
    }
}
