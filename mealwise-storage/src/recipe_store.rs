//! Read-only relational store interface.

use async_trait::async_trait;
use mealwise_core::{StoreError, StoredRecipe, UserSettings};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// Result type for relational store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Queries the warmup job and the recommendation service run against the
/// relational store.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Top `limit` recipes by favorite count, most favorited first.
    async fn popular_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>>;

    /// Top `limit` recipes by creation time, newest first.
    async fn recent_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>>;

    /// Newest `limit` recipes with the given cuisine tag.
    async fn recipes_by_cuisine(&self, cuisine: &str, limit: usize)
        -> StoreResult<Vec<StoredRecipe>>;

    async fn recipe_count(&self) -> StoreResult<i64>;

    /// Recipe count per cuisine tag. Recipes without a tag are not counted.
    async fn cuisine_counts(&self) -> StoreResult<BTreeMap<String, i64>>;

    /// Mean cooking time in minutes over recipes that have one, 0 when none do.
    async fn average_cooking_time(&self) -> StoreResult<f64>;

    /// Provider settings of `user_id`, if the user saved any.
    async fn user_settings(&self, user_id: &str) -> StoreResult<Option<UserSettings>>;
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// Query names used to inject failures into [`MockRecipeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeQuery {
    Popular,
    Recent,
    ByCuisine,
    Count,
    CuisineCounts,
    AverageCookingTime,
    UserSettings,
}

/// In-memory mock store for testing.
#[derive(Debug, Default)]
pub struct MockRecipeStore {
    recipes: RwLock<Vec<StoredRecipe>>,
    settings: RwLock<HashMap<String, UserSettings>>,
    failing: RwLock<HashSet<RecipeQuery>>,
    failing_cuisines: RwLock<HashSet<String>>,
    calls: RwLock<HashMap<RecipeQuery, usize>>,
}

impl MockRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_recipes(recipes: Vec<StoredRecipe>) -> Self {
        let store = Self::new();
        *store.recipes.write().await = recipes;
        store
    }

    pub async fn insert_recipe(&self, recipe: StoredRecipe) {
        self.recipes.write().await.push(recipe);
    }

    pub async fn insert_settings(&self, settings: UserSettings) {
        self.settings
            .write()
            .await
            .insert(settings.user_id.clone(), settings);
    }

    /// Make every call of `query` fail.
    pub async fn fail_query(&self, query: RecipeQuery) {
        self.failing.write().await.insert(query);
    }

    /// Make `recipes_by_cuisine` fail for `cuisine` only.
    pub async fn fail_cuisine(&self, cuisine: impl Into<String>) {
        self.failing_cuisines.write().await.insert(cuisine.into());
    }

    /// Number of times `query` was called.
    pub async fn call_count(&self, query: RecipeQuery) -> usize {
        self.calls.read().await.get(&query).copied().unwrap_or(0)
    }

    async fn enter(&self, query: RecipeQuery) -> StoreResult<()> {
        *self.calls.write().await.entry(query).or_insert(0) += 1;
        if self.failing.read().await.contains(&query) {
            return Err(StoreError::Query {
                reason: format!("injected failure for {:?}", query),
            });
        }
        Ok(())
    }

    async fn sorted_by<K: Ord>(
        &self,
        limit: usize,
        filter: impl Fn(&StoredRecipe) -> bool,
        key: impl Fn(&StoredRecipe) -> K,
    ) -> Vec<StoredRecipe> {
        let mut matching: Vec<StoredRecipe> = self
            .recipes
            .read()
            .await
            .iter()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        matching.sort_by_key(|r| std::cmp::Reverse(key(r)));
        matching.truncate(limit);
        matching
    }
}

#[async_trait]
impl RecipeStore for MockRecipeStore {
    async fn popular_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.enter(RecipeQuery::Popular).await?;
        Ok(self
            .sorted_by(limit, |_| true, |r| (r.favorite_count, r.created_at))
            .await)
    }

    async fn recent_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.enter(RecipeQuery::Recent).await?;
        Ok(self.sorted_by(limit, |_| true, |r| r.created_at).await)
    }

    async fn recipes_by_cuisine(
        &self,
        cuisine: &str,
        limit: usize,
    ) -> StoreResult<Vec<StoredRecipe>> {
        self.enter(RecipeQuery::ByCuisine).await?;
        if self.failing_cuisines.read().await.contains(cuisine) {
            return Err(StoreError::Query {
                reason: format!("injected failure for cuisine {}", cuisine),
            });
        }
        Ok(self
            .sorted_by(
                limit,
                |r| r.cuisine_type.as_deref() == Some(cuisine),
                |r| r.created_at,
            )
            .await)
    }

    async fn recipe_count(&self) -> StoreResult<i64> {
        self.enter(RecipeQuery::Count).await?;
        Ok(self.recipes.read().await.len() as i64)
    }

    async fn cuisine_counts(&self) -> StoreResult<BTreeMap<String, i64>> {
        self.enter(RecipeQuery::CuisineCounts).await?;
        let mut counts = BTreeMap::new();
        for cuisine in self
            .recipes
            .read()
            .await
            .iter()
            .filter_map(|r| r.cuisine_type.as_ref())
        {
            *counts.entry(cuisine.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn average_cooking_time(&self) -> StoreResult<f64> {
        self.enter(RecipeQuery::AverageCookingTime).await?;
        let recipes = self.recipes.read().await;
        let times: Vec<f64> = recipes
            .iter()
            .filter_map(|r| r.cooking_time)
            .map(f64::from)
            .collect();
        if times.is_empty() {
            return Ok(0.0);
        }
        Ok(times.iter().sum::<f64>() / times.len() as f64)
    }

    async fn user_settings(&self, user_id: &str) -> StoreResult<Option<UserSettings>> {
        self.enter(RecipeQuery::UserSettings).await?;
        Ok(self.settings.read().await.get(user_id).cloned())
    }
}
