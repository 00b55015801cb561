//! Typed cache store that never fails its callers.
//!
//! Values are stored as JSON. Any backend or (de)serialization failure is
//! logged and counted, then turned into a miss or a no-op.

use super::key::{user_meal_plans_prefix, CacheKey};
use super::traits::{CacheBackend, CacheStats};
use mealwise_core::{CacheError, MealPlan, StoredRecipe};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default entry lifetime when the caller does not choose one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Typed adapter over a [`CacheBackend`].
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    // ========================================================================
    // GENERIC OPERATIONS
    // ========================================================================

    /// Read and decode `key`. Failures read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.backend.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.absorb("get", key, &e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                let err = CacheError::Serialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                self.absorb("decode", key, &err);
                None
            }
        }
    }

    /// Encode and store `value` under `key` for `ttl`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                let err = CacheError::Serialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                self.absorb("encode", key, &err);
                return;
            }
        };
        match self.backend.set_ex(key.as_str(), &raw, ttl).await {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, ttl_secs = ttl.as_secs(), "Cache write");
            }
            Err(e) => self.absorb("set", key, &e),
        }
    }

    pub async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.backend.delete(key.as_str()).await {
            self.absorb("delete", key, &e);
        }
    }

    /// Remove every `<prefix>:*` entry. Returns 0 on failure.
    pub async fn clear_by_prefix(&self, prefix: &str) -> u64 {
        match self.backend.delete_prefix(prefix).await {
            Ok(removed) => {
                tracing::debug!(prefix, removed, "Cleared cache prefix");
                removed
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    backend = self.backend.backend_name(),
                    prefix,
                    error = %e,
                    "Cache prefix clear failed"
                );
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    fn absorb(&self, operation: &'static str, key: &CacheKey, error: &CacheError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            backend = self.backend.backend_name(),
            operation,
            key = %key,
            error = %error,
            "Cache operation failed"
        );
    }

    // ========================================================================
    // RECIPES
    // ========================================================================

    pub async fn get_recipe(&self, id: uuid::Uuid) -> Option<StoredRecipe> {
        self.get(&CacheKey::recipe(id)).await
    }

    pub async fn set_recipe(&self, recipe: &StoredRecipe, ttl: Duration) {
        self.set(&CacheKey::recipe(recipe.id), recipe, ttl).await
    }

    pub async fn invalidate_recipe(&self, id: uuid::Uuid) {
        self.delete(&CacheKey::recipe(id)).await
    }

    pub async fn get_recipe_list(&self, key: &CacheKey) -> Option<Vec<StoredRecipe>> {
        self.get(key).await
    }

    pub async fn set_recipe_list(&self, key: &CacheKey, recipes: &[StoredRecipe], ttl: Duration) {
        self.set(key, recipes, ttl).await
    }

    // ========================================================================
    // MEAL PLANS
    // ========================================================================

    pub async fn get_meal_plan(&self, id: uuid::Uuid) -> Option<MealPlan> {
        self.get(&CacheKey::meal_plan(id)).await
    }

    pub async fn set_meal_plan(&self, plan: &MealPlan) {
        self.set(&CacheKey::meal_plan(plan.id), plan, DEFAULT_TTL).await
    }

    pub async fn invalidate_meal_plan(&self, id: uuid::Uuid) {
        self.delete(&CacheKey::meal_plan(id)).await
    }

    pub async fn get_user_meal_plans(&self, user_id: &str, date_key: &str) -> Option<Vec<MealPlan>> {
        self.get(&CacheKey::user_meal_plans(user_id, date_key)).await
    }

    pub async fn set_user_meal_plans(&self, user_id: &str, date_key: &str, plans: &[MealPlan]) {
        self.set(&CacheKey::user_meal_plans(user_id, date_key), plans, DEFAULT_TTL)
            .await
    }

    /// Drop every cached meal-plan list of `user_id`.
    pub async fn invalidate_user_meal_plans(&self, user_id: &str) -> u64 {
        self.clear_by_prefix(&user_meal_plans_prefix(user_id)).await
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.backend_name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheBackend;
    use crate::cache::traits::CacheResult;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use mealwise_core::MealSlot;
    use uuid::Uuid;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Backend {
                reason: "connection refused".to_string(),
            })
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Backend {
                reason: "connection refused".to_string(),
            })
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Err(CacheError::Backend {
                reason: "connection refused".to_string(),
            })
        }
        async fn delete_prefix(&self, _prefix: &str) -> CacheResult<u64> {
            Err(CacheError::Backend {
                reason: "connection refused".to_string(),
            })
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn recipe(name: &str) -> StoredRecipe {
        StoredRecipe {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: None,
            ingredients: serde_json::json!([]),
            steps: serde_json::json!([]),
            calories: Some(300),
            cooking_time: Some(20),
            nutrition_facts: serde_json::json!({}),
            cuisine_type: Some("chinese".to_string()),
            diet_type: vec![],
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            views: 0,
            img: None,
            favorite_count: 0,
        }
    }

    fn plan(user_id: &str) -> MealPlan {
        MealPlan {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            meal_type: MealSlot::Lunch,
            recipe_id: Uuid::now_v7(),
            recipe: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn memory_store() -> CacheStore {
        CacheStore::new(Arc::new(InMemoryCacheBackend::new()))
    }

    #[tokio::test]
    async fn test_recipe_round_trip_and_invalidate() {
        let store = memory_store();
        let r = recipe("番茄炒蛋");
        store.set_recipe(&r, DEFAULT_TTL).await;
        assert_eq!(store.get_recipe(r.id).await, Some(r.clone()));
        store.invalidate_recipe(r.id).await;
        assert_eq!(store.get_recipe(r.id).await, None);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_recipe_list() {
        let store = memory_store();
        let list = vec![recipe("a"), recipe("b")];
        store
            .set_recipe_list(&CacheKey::popular_recipes(), &list, DEFAULT_TTL)
            .await;
        assert_eq!(
            store.get_recipe_list(&CacheKey::popular_recipes()).await,
            Some(list)
        );
        assert_eq!(store.get_recipe_list(&CacheKey::recent_recipes()).await, None);
    }

    #[tokio::test]
    async fn test_meal_plans_and_user_lists() {
        let store = memory_store();
        let p = plan("u1");
        store.set_meal_plan(&p).await;
        assert_eq!(store.get_meal_plan(p.id).await, Some(p.clone()));
        store.invalidate_meal_plan(p.id).await;
        assert_eq!(store.get_meal_plan(p.id).await, None);

        store.set_user_meal_plans("u1", "2024-05-01", &[p.clone()]).await;
        store.set_user_meal_plans("u1", "2024-05-02", &[]).await;
        assert_eq!(
            store.get_user_meal_plans("u1", "2024-05-01").await,
            Some(vec![p])
        );
        assert_eq!(store.invalidate_user_meal_plans("u1").await, 2);
        assert_eq!(store.get_user_meal_plans("u1", "2024-05-01").await, None);
    }

    #[tokio::test]
    async fn test_wrong_shape_reads_as_miss() {
        let store = memory_store();
        store.set(&CacheKey::recipe_stats(), "not stats", DEFAULT_TTL).await;
        let stats: Option<mealwise_core::RecipeStats> = store.get(&CacheKey::recipe_stats()).await;
        assert!(stats.is_none());
        assert_eq!(store.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_backend_failures_are_absorbed() {
        let store = CacheStore::new(Arc::new(BrokenBackend));
        let r = recipe("x");
        store.set_recipe(&r, DEFAULT_TTL).await;
        assert_eq!(store.get_recipe(r.id).await, None);
        store.invalidate_recipe(r.id).await;
        assert_eq!(store.clear_by_prefix("recipe").await, 0);
        assert_eq!(store.stats().errors, 4);
        assert_eq!(store.stats().misses, 0);
    }
}
