//! Cache layer.
//!
//! [`CacheBackend`] is a raw string store with per-entry expiry, implemented
//! in memory and over Redis. [`CacheStore`] layers typed JSON access on top
//! and absorbs every failure, so a broken cache only ever costs a miss.
//!
//! Keys are always built through [`CacheKey`]:
//!
//! ```ignore
//! let store = CacheStore::new(Arc::new(InMemoryCacheBackend::new()));
//! store.set(&CacheKey::recipe_stats(), &stats, Duration::from_secs(7200)).await;
//! let cached: Option<RecipeStats> = store.get(&CacheKey::recipe_stats()).await;
//! ```

pub mod key;
pub mod memory;
pub mod redis_backend;
pub mod store;
pub mod traits;

pub use key::{user_meal_plans_prefix, CacheKey, CacheNamespace, POPULAR_RECIPES, RECENT_RECIPES};
pub use memory::InMemoryCacheBackend;
pub use redis_backend::RedisCacheBackend;
pub use store::{CacheStore, DEFAULT_TTL};
pub use traits::{CacheBackend, CacheResult, CacheStats};
