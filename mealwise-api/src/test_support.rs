//! Store doubles shared by the unit tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mealwise_core::{StoreError, StoredRecipe, UserSettings};
use mealwise_storage::{MockRecipeStore, RecipeQuery, RecipeStore, StoreResult};
use tokio::sync::Semaphore;

/// Store where one query waits until a permit is released.
pub(crate) struct GatedStore {
    pub inner: MockRecipeStore,
    pub gate: Semaphore,
    gated: RecipeQuery,
}

impl GatedStore {
    pub fn new(gated: RecipeQuery) -> Self {
        Self {
            inner: MockRecipeStore::new(),
            gate: Semaphore::new(0),
            gated,
        }
    }

    async fn pass(&self, query: RecipeQuery) -> StoreResult<()> {
        if query != self.gated {
            return Ok(());
        }
        let _permit = self.gate.acquire().await.map_err(|e| StoreError::Query {
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for GatedStore {
    async fn popular_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.pass(RecipeQuery::Popular).await?;
        self.inner.popular_recipes(limit).await
    }
    async fn recent_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.pass(RecipeQuery::Recent).await?;
        self.inner.recent_recipes(limit).await
    }
    async fn recipes_by_cuisine(&self, cuisine: &str, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
        self.pass(RecipeQuery::ByCuisine).await?;
        self.inner.recipes_by_cuisine(cuisine, limit).await
    }
    async fn recipe_count(&self) -> StoreResult<i64> {
        self.pass(RecipeQuery::Count).await?;
        self.inner.recipe_count().await
    }
    async fn cuisine_counts(&self) -> StoreResult<BTreeMap<String, i64>> {
        self.pass(RecipeQuery::CuisineCounts).await?;
        self.inner.cuisine_counts().await
    }
    async fn average_cooking_time(&self) -> StoreResult<f64> {
        self.pass(RecipeQuery::AverageCookingTime).await?;
        self.inner.average_cooking_time().await
    }
    async fn user_settings(&self, user_id: &str) -> StoreResult<Option<UserSettings>> {
        self.pass(RecipeQuery::UserSettings).await?;
        self.inner.user_settings(user_id).await
    }
}
