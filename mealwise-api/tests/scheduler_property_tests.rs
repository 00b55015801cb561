//! Property-Based Tests for the Warmup Scheduler
//!
//! **Property 1: Stopping is final**
//!
//! For any sequence of start and stop calls, once the scheduler is stopped
//! it stays stopped, and no scheduled run happens after the stop.
//!
//! **Property 2: At most one run in flight**
//!
//! However many manual triggers arrive together, exactly one starts a
//! session and the rest are refused as in flight.

use std::sync::Arc;
use std::time::Duration;

use mealwise_api::{
    CacheTtls, CacheWarmupJob, SchedulerState, WarmupConfig, WarmupContext, WarmupOutcome,
    WarmupScheduler,
};
use mealwise_storage::{CacheStore, InMemoryCacheBackend, MockRecipeStore, RecipeQuery};
use proptest::prelude::*;
use tokio::runtime::{Builder, Runtime};

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

/// Current-thread runtime with a paused clock.
fn paused_runtime() -> Result<Runtime, TestCaseError> {
    Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn job(store: Arc<MockRecipeStore>, interval: Duration) -> CacheWarmupJob {
    CacheWarmupJob::new(WarmupContext::new(
        store,
        CacheStore::new(Arc::new(InMemoryCacheBackend::new())),
        WarmupConfig {
            interval,
            ..WarmupConfig::development()
        },
        CacheTtls::default(),
    ))
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Start,
    Stop,
}

fn calls_strategy() -> impl Strategy<Value = Vec<Call>> {
    prop::collection::vec(prop_oneof![Just(Call::Start), Just(Call::Stop)], 1..8)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 1: Stopping is final**
    #[test]
    fn prop_stop_is_terminal(calls in calls_strategy(), delay_secs in 1u64..30) {
        let rt = paused_runtime()?;
        rt.block_on(async {
            let store = Arc::new(MockRecipeStore::new());
            let interval = Duration::from_secs(60);
            let scheduler = WarmupScheduler::new(
                job(store.clone(), interval),
                Duration::from_secs(delay_secs),
                interval,
            );

            let mut stopped = false;
            for call in &calls {
                match call {
                    Call::Start => scheduler.start(),
                    Call::Stop => {
                        scheduler.stop();
                        stopped = true;
                    }
                }
                let expected = match (stopped, call) {
                    (true, _) => SchedulerState::Stopped,
                    (false, Call::Start) => SchedulerState::Armed,
                    (false, Call::Stop) => SchedulerState::Idle,
                };
                prop_assert_eq!(scheduler.state(), expected);
            }
            scheduler.stop();

            // Nothing fires after the stop, however long we wait.
            tokio::time::sleep(interval * 5).await;
            prop_assert_eq!(store.call_count(RecipeQuery::Popular).await, 0);
            prop_assert!(!scheduler.job().is_warming_up());
            Ok(())
        })?;
    }

    /// **Property 2: At most one run in flight**
    #[test]
    fn prop_concurrent_triggers_start_one_session(triggers in 2usize..8) {
        let rt = paused_runtime()?;
        rt.block_on(async {
            let store = Arc::new(MockRecipeStore::new());
            let job = job(store.clone(), Duration::from_secs(60));

            let mut outcomes = Vec::with_capacity(triggers);
            for _ in 0..triggers {
                outcomes.push(job.trigger_warmup().await);
            }
            let started = outcomes
                .iter()
                .filter(|o| matches!(o, WarmupOutcome::Started(_)))
                .count();
            prop_assert_eq!(started, 1);
            prop_assert_eq!(
                outcomes.iter().filter(|o| **o == WarmupOutcome::SkippedInFlight).count(),
                triggers - 1
            );

            while job.is_warming_up() {
                tokio::task::yield_now().await;
            }
            prop_assert_eq!(store.call_count(RecipeQuery::Popular).await, 1);
            prop_assert_eq!(job.metrics().skipped_in_flight, (triggers - 1) as u64);

            // Once finished, a manual trigger is accepted again.
            prop_assert!(matches!(job.trigger_warmup().await, WarmupOutcome::Started(_)));
            Ok(())
        })?;
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_reports_next_run_after_first_warmup() {
    let store = Arc::new(MockRecipeStore::new());
    let interval = Duration::from_secs(120);
    let scheduler = WarmupScheduler::new(job(store, interval), Duration::from_millis(100), interval);

    let status = scheduler.status().await;
    assert!(!status.is_warming_up);
    assert!(status.last_warmup_time.is_none());
    assert!(status.next_warmup_time.is_none());

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    while scheduler.job().is_warming_up() || scheduler.job().list_sessions(1).await.is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let status = scheduler.status().await;
    let last = status.last_warmup_time.unwrap();
    let next = status.next_warmup_time.unwrap();
    assert_eq!((next - last).num_seconds(), 120);
    scheduler.stop();
}
