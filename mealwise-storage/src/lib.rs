//! Mealwise Storage - Cache Adapter and Recipe Store
//!
//! The cache side is a typed, failure-absorbing [`CacheStore`] over a raw
//! [`CacheBackend`] (in-memory or Redis). The relational side is the
//! read-only [`RecipeStore`] trait with an in-memory mock and a PostgreSQL
//! implementation.

pub mod cache;
pub mod postgres;
pub mod recipe_store;

pub use cache::{
    user_meal_plans_prefix, CacheBackend, CacheKey, CacheNamespace, CacheResult, CacheStats,
    CacheStore, InMemoryCacheBackend, RedisCacheBackend, DEFAULT_TTL, POPULAR_RECIPES,
    RECENT_RECIPES,
};
pub use postgres::{DbConfig, PgRecipeStore};
pub use recipe_store::{MockRecipeStore, RecipeQuery, RecipeStore, StoreResult};
