//! Property-Based Tests for Cache Warmup
//!
//! **Property 1: Warmed lists mirror the store**
//!
//! For any catalogue, a finished warmup leaves the popular and recent lists
//! in the cache, bounded by their configured counts, with every listed
//! recipe also cached on its own.
//!
//! **Property 2: Task failures never fail the session**
//!
//! Failing store queries mark individual tasks or buckets failed, but the
//! session still completes and every task ends in a terminal state.

use std::sync::Arc;
use std::time::Duration;

use mealwise_api::{CacheTtls, CacheWarmupJob, WarmupConfig, WarmupContext, WarmupOutcome, WarmupTrigger};
use mealwise_core::{RecipeStats, SessionStatus, TaskKind, TaskStatus};
use mealwise_storage::{CacheKey, CacheStore, InMemoryCacheBackend, MockRecipeStore, RecipeQuery};
use mealwise_test_utils::generators::{arb_cuisine, arb_stored_recipe};
use mealwise_test_utils::FailingCacheBackend;
use proptest::prelude::*;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn config(popular_count: usize, recent_count: usize, cuisines: Vec<String>) -> WarmupConfig {
    WarmupConfig {
        popular_count,
        recent_count,
        cuisines,
        interval: Duration::from_secs(3600),
        ..WarmupConfig::development()
    }
}

fn job(store: Arc<MockRecipeStore>, cache: CacheStore, config: WarmupConfig) -> CacheWarmupJob {
    CacheWarmupJob::new(WarmupContext::new(store, cache, config, CacheTtls::default()))
}

fn memory_cache() -> CacheStore {
    CacheStore::new(Arc::new(InMemoryCacheBackend::new()))
}

/// Strategy for a non-empty set of distinct cuisines.
fn cuisines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(arb_cuisine(), 1..5).prop_map(|set| set.into_iter().collect())
}

/// Store queries that can be made to fail.
fn failing_query_strategy() -> impl Strategy<Value = Vec<RecipeQuery>> {
    prop::collection::vec(
        prop_oneof![
            Just(RecipeQuery::Popular),
            Just(RecipeQuery::Recent),
            Just(RecipeQuery::Count),
            Just(RecipeQuery::CuisineCounts),
            Just(RecipeQuery::AverageCookingTime),
        ],
        0..4,
    )
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// **Property 1: Warmed lists mirror the store**
    #[test]
    fn prop_warmed_lists_are_bounded_and_cached(
        catalogue in prop::collection::vec(arb_stored_recipe(), 0..20),
        popular_count in 1usize..15,
        recent_count in 1usize..15,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(MockRecipeStore::with_recipes(catalogue.clone()).await);
            let cache = memory_cache();
            let job = job(store, cache.clone(), config(popular_count, recent_count, vec!["chinese".to_string()]));

            let outcome = job.run(WarmupTrigger::Manual).await;
            let id = outcome.session_id().ok_or_else(|| TestCaseError::fail("warmup did not start"))?;

            let popular = cache
                .get_recipe_list(&CacheKey::popular_recipes())
                .await
                .ok_or_else(|| TestCaseError::fail("popular list missing"))?;
            prop_assert_eq!(popular.len(), popular_count.min(catalogue.len()));

            let recent = cache
                .get_recipe_list(&CacheKey::recent_recipes())
                .await
                .ok_or_else(|| TestCaseError::fail("recent list missing"))?;
            prop_assert_eq!(recent.len(), recent_count.min(catalogue.len()));

            for recipe in popular.iter().chain(recent.iter()) {
                let cached = cache.get_recipe(recipe.id).await;
                prop_assert_eq!(cached.as_ref().map(|r| r.id), Some(recipe.id));
            }

            let stats: RecipeStats = cache
                .get(&CacheKey::recipe_stats())
                .await
                .ok_or_else(|| TestCaseError::fail("stats missing"))?;
            prop_assert_eq!(stats.total_count, catalogue.len() as i64);

            let session = job
                .get_session(id)
                .await
                .ok_or_else(|| TestCaseError::fail("session missing"))?;
            prop_assert_eq!(session.status, SessionStatus::Completed);
            for kind in TaskKind::ALL {
                let task = session.task(kind).ok_or_else(|| TestCaseError::fail("task missing"))?;
                prop_assert_eq!(task.status, TaskStatus::Completed);
                prop_assert_eq!(task.completed, task.total);
            }
            Ok(())
        })?;
    }

    /// **Property 2: Task failures never fail the session**
    #[test]
    fn prop_task_failures_leave_session_completed(
        failing in failing_query_strategy(),
        cuisines in cuisines_strategy(),
        failing_buckets in prop::collection::vec(any::<bool>(), 5),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(MockRecipeStore::with_recipes(mealwise_test_utils::fixtures::sample_catalogue()).await);
            for query in &failing {
                store.fail_query(*query).await;
            }
            let mut failed_buckets = 0u64;
            for (cuisine, fail) in cuisines.iter().zip(failing_buckets.iter()) {
                if *fail {
                    store.fail_cuisine(cuisine.clone()).await;
                    failed_buckets += 1;
                }
            }

            let job = job(store, memory_cache(), config(5, 5, cuisines.clone()));
            let id = job
                .run(WarmupTrigger::Manual)
                .await
                .session_id()
                .ok_or_else(|| TestCaseError::fail("warmup did not start"))?;
            let session = job
                .get_session(id)
                .await
                .ok_or_else(|| TestCaseError::fail("session missing"))?;

            prop_assert_eq!(session.status, SessionStatus::Completed);
            prop_assert!(session.error.is_none());
            prop_assert!(session.ended_at.is_some());

            let expect = |query: RecipeQuery| {
                if failing.contains(&query) { TaskStatus::Failed } else { TaskStatus::Completed }
            };
            let task_status = |kind: TaskKind| session.task(kind).map(|t| t.status);
            prop_assert_eq!(task_status(TaskKind::PopularRecipes), Some(expect(RecipeQuery::Popular)));
            prop_assert_eq!(task_status(TaskKind::RecentRecipes), Some(expect(RecipeQuery::Recent)));

            let stats_fail = [RecipeQuery::Count, RecipeQuery::CuisineCounts, RecipeQuery::AverageCookingTime]
                .iter()
                .any(|q| failing.contains(q));
            let stats_expected = if stats_fail { TaskStatus::Failed } else { TaskStatus::Completed };
            prop_assert_eq!(task_status(TaskKind::RecipeStats), Some(stats_expected));

            let buckets = session
                .task(TaskKind::CuisineBuckets)
                .ok_or_else(|| TestCaseError::fail("cuisine task missing"))?;
            prop_assert_eq!(buckets.failed, failed_buckets);
            prop_assert_eq!(buckets.total, cuisines.len() as u64);
            let all_failed = failed_buckets == cuisines.len() as u64;
            let bucket_expected = if all_failed { TaskStatus::Failed } else { TaskStatus::Completed };
            prop_assert_eq!(buckets.status, bucket_expected);

            let summary = job.summary().await.ok_or_else(|| TestCaseError::fail("summary missing"))?;
            prop_assert_eq!(summary.session_id, id);
            prop_assert_eq!(summary.tasks.len(), TaskKind::ALL.len());
            Ok(())
        })?;
    }

    /// Back-to-back scheduled runs are refused until an interval has passed,
    /// while manual runs go through.
    #[test]
    fn prop_scheduled_runs_respect_interval(extra_manual_runs in 0usize..4) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(MockRecipeStore::new());
            let job = job(store.clone(), memory_cache(), config(5, 5, vec!["korean".to_string()]));

            prop_assert!(matches!(job.warmup().await, WarmupOutcome::Started(_)));
            prop_assert_eq!(job.warmup().await, WarmupOutcome::SkippedTooSoon);

            for _ in 0..extra_manual_runs {
                prop_assert!(matches!(job.run(WarmupTrigger::Manual).await, WarmupOutcome::Started(_)));
            }
            prop_assert_eq!(job.warmup().await, WarmupOutcome::SkippedTooSoon);

            let runs = 1 + extra_manual_runs;
            prop_assert_eq!(store.call_count(RecipeQuery::Popular).await, runs);
            prop_assert_eq!(job.list_sessions(usize::MAX).await.len(), runs);
            let metrics = job.metrics();
            prop_assert_eq!(metrics.runs_started, runs as u64);
            prop_assert_eq!(metrics.skipped_too_soon, 2);
            Ok(())
        })?;
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[tokio::test]
async fn test_cache_outage_does_not_fail_warmup() {
    let store = Arc::new(MockRecipeStore::with_recipes(mealwise_test_utils::fixtures::sample_catalogue()).await);
    let cache = CacheStore::new(Arc::new(FailingCacheBackend));
    let job = job(store, cache, config(5, 5, vec!["chinese".to_string()]));

    let id = job.run(WarmupTrigger::Manual).await.session_id().unwrap();
    let session = job.get_session(id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    for kind in TaskKind::ALL {
        assert_eq!(session.task(kind).unwrap().status, TaskStatus::Completed);
    }
    assert!(!job.is_warming_up());
}
