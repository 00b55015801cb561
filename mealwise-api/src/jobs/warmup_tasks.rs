//! Warmup Tasks
//!
//! The four read-and-populate tasks of a warmup run. Each reads from the
//! relational store, writes through the [`CacheStore`] and reports progress
//! through a [`TaskProgress`] handle. Tasks write disjoint keys, so they run
//! concurrently without coordination.
//!
//! A task returns `Err` only when it cannot do any work at all. Partial
//! failures (one cuisine bucket) are recorded on the task and the task
//! carries on.

use std::sync::Arc;

use mealwise_core::{RecipeStats, TaskError, TaskKind, WarmupSession};
use mealwise_storage::{CacheKey, CacheStore, RecipeStore};
use tokio::sync::RwLock;

use crate::config::{CacheTtls, WarmupConfig};

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything a warmup task needs. Cheap to clone.
#[derive(Clone)]
pub struct WarmupContext {
    pub store: Arc<dyn RecipeStore>,
    pub cache: CacheStore,
    pub config: WarmupConfig,
    pub ttls: CacheTtls,
}

impl WarmupContext {
    pub fn new(
        store: Arc<dyn RecipeStore>,
        cache: CacheStore,
        config: WarmupConfig,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            ttls,
        }
    }
}

impl std::fmt::Debug for WarmupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmupContext")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PROGRESS HANDLE
// ============================================================================

/// Write access to one task's record inside a running session.
#[derive(Clone)]
pub struct TaskProgress {
    session: Arc<RwLock<WarmupSession>>,
    kind: TaskKind,
}

impl TaskProgress {
    pub fn new(session: Arc<RwLock<WarmupSession>>, kind: TaskKind) -> Self {
        Self { session, kind }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    async fn update(&self, apply: impl FnOnce(&mut mealwise_core::WarmupTask)) {
        let mut session = self.session.write().await;
        // Finalized sessions are frozen.
        if session.is_finalized() {
            return;
        }
        if let Some(task) = session.task_mut(self.kind) {
            apply(task);
        }
    }

    pub async fn begin(&self, total: u64) {
        self.update(|task| task.begin(total, chrono::Utc::now())).await;
    }

    pub async fn set_total(&self, total: u64) {
        self.update(|task| task.set_total(total)).await;
    }

    pub async fn success(&self, units: u64) {
        self.update(|task| task.record_success(units, chrono::Utc::now()))
            .await;
    }

    pub async fn failure(&self, units: u64, error: &str) {
        self.update(|task| task.record_failure(units, error, chrono::Utc::now()))
            .await;
    }

    pub async fn complete(&self) {
        self.update(|task| task.complete(chrono::Utc::now())).await;
    }

    pub async fn fail(&self, error: &TaskError) {
        let message = error.to_string();
        self.update(|task| task.fail(message, chrono::Utc::now()))
            .await;
    }
}

// ============================================================================
// TASKS
// ============================================================================

/// Run the task of the given kind.
pub async fn run_task(
    kind: TaskKind,
    ctx: &WarmupContext,
    progress: &TaskProgress,
) -> Result<(), TaskError> {
    match kind {
        TaskKind::PopularRecipes => warm_popular_recipes(ctx, progress).await,
        TaskKind::RecentRecipes => warm_recent_recipes(ctx, progress).await,
        TaskKind::CuisineBuckets => warm_cuisine_buckets(ctx, progress).await,
        TaskKind::RecipeStats => warm_recipe_stats(ctx, progress).await,
    }
}

/// Cache the most favorited recipes one by one and as the popular list.
pub async fn warm_popular_recipes(
    ctx: &WarmupContext,
    progress: &TaskProgress,
) -> Result<(), TaskError> {
    progress.begin(0).await;
    let recipes = ctx.store.popular_recipes(ctx.config.popular_count).await?;
    progress.set_total(recipes.len() as u64 + 1).await;

    for recipe in &recipes {
        ctx.cache.set_recipe(recipe, ctx.ttls.recipe).await;
        progress.success(1).await;
    }
    ctx.cache
        .set_recipe_list(&CacheKey::popular_recipes(), &recipes, ctx.ttls.popular_list)
        .await;
    progress.success(1).await;

    tracing::debug!(count = recipes.len(), "Popular recipes cached");
    Ok(())
}

/// Cache the newest recipes one by one and as the recent list.
pub async fn warm_recent_recipes(
    ctx: &WarmupContext,
    progress: &TaskProgress,
) -> Result<(), TaskError> {
    progress.begin(0).await;
    let recipes = ctx.store.recent_recipes(ctx.config.recent_count).await?;
    progress.set_total(recipes.len() as u64 + 1).await;

    for recipe in &recipes {
        ctx.cache.set_recipe(recipe, ctx.ttls.recipe).await;
        progress.success(1).await;
    }
    ctx.cache
        .set_recipe_list(&CacheKey::recent_recipes(), &recipes, ctx.ttls.recent_list)
        .await;
    progress.success(1).await;

    tracing::debug!(count = recipes.len(), "Recent recipes cached");
    Ok(())
}

/// Cache one bucket of recent recipes per configured cuisine.
///
/// A failing bucket is recorded as one failed unit. The task only fails
/// when every bucket failed.
pub async fn warm_cuisine_buckets(
    ctx: &WarmupContext,
    progress: &TaskProgress,
) -> Result<(), TaskError> {
    let cuisines = &ctx.config.cuisines;
    progress.begin(cuisines.len() as u64).await;

    let mut last_error = None;
    let mut failed = 0usize;
    for cuisine in cuisines {
        match ctx
            .store
            .recipes_by_cuisine(cuisine, ctx.config.cuisine_bucket_size)
            .await
        {
            Ok(recipes) => {
                ctx.cache
                    .set_recipe_list(&CacheKey::cuisine(cuisine), &recipes, ctx.ttls.cuisine_list)
                    .await;
                progress.success(1).await;
            }
            Err(e) => {
                tracing::warn!(cuisine = %cuisine, error = %e, "Cuisine bucket warmup failed");
                progress.failure(1, &format!("{}: {}", cuisine, e)).await;
                failed += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failed == cuisines.len() => Err(TaskError::Store(e)),
        _ => Ok(()),
    }
}

/// Compute and cache the aggregate recipe statistics.
pub async fn warm_recipe_stats(
    ctx: &WarmupContext,
    progress: &TaskProgress,
) -> Result<(), TaskError> {
    progress.begin(1).await;
    let (total_count, cuisine_type_counts, avg_cooking_time) = tokio::try_join!(
        ctx.store.recipe_count(),
        ctx.store.cuisine_counts(),
        ctx.store.average_cooking_time(),
    )?;

    let stats = RecipeStats {
        total_count,
        cuisine_type_counts,
        avg_cooking_time,
    };
    ctx.cache
        .set(&CacheKey::recipe_stats(), &stats, ctx.ttls.stats)
        .await;
    progress.success(1).await;

    tracing::debug!(total_count = stats.total_count, "Recipe stats cached");
    Ok(())
}
