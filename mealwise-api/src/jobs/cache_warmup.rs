//! Cache Warmup Orchestrator
//!
//! Runs the four warmup tasks concurrently, records a [`WarmupSession`] per
//! run and answers status queries. At most one run is in flight per job: the
//! in-flight flag is claimed with a compare-exchange before anything else
//! happens, so concurrent triggers from the scheduler and from an operator
//! cannot both start a run.
//!
//! Scheduled runs are additionally refused while the previous run finished
//! less than one warmup interval ago. Manual triggers skip that check.
//!
//! ```ignore
//! let job = CacheWarmupJob::new(WarmupContext::new(store, cache, config, ttls));
//! match job.trigger_warmup().await {
//!     WarmupOutcome::Started(id) => tracing::info!(session_id = %id, "Warmup started"),
//!     other => tracing::info!(outcome = ?other, "Warmup not started"),
//! }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use mealwise_core::{
    new_entity_id, EntityId, SessionStatus, TaskError, TaskKind, Timestamp, WarmupSession,
    WarmupStatus, WarmupSummary,
};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::warmup_tasks::{run_task, TaskProgress, WarmupContext};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// OUTCOMES
// ============================================================================

/// What a warmup request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupOutcome {
    /// A new session was started.
    Started(EntityId),
    /// Another run is still in flight.
    SkippedInFlight,
    /// The previous run finished less than one interval ago.
    SkippedTooSoon,
}

impl WarmupOutcome {
    pub fn session_id(&self) -> Option<EntityId> {
        match self {
            WarmupOutcome::Started(id) => Some(*id),
            _ => None,
        }
    }

    /// The started session's id, or the error a caller of the status
    /// surface should see for a refused run.
    pub fn into_api_result(self) -> ApiResult<EntityId> {
        match self {
            WarmupOutcome::Started(id) => Ok(id),
            WarmupOutcome::SkippedInFlight => Err(ApiError::job_in_progress("Cache warmup")),
            WarmupOutcome::SkippedTooSoon => Err(ApiError::invalid_input(
                "Cache warmup finished less than one interval ago",
            )),
        }
    }
}

/// Who asked for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupTrigger {
    Scheduled,
    Manual,
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for warmup activity since startup.
#[derive(Debug, Default)]
pub struct WarmupMetrics {
    /// Runs that were started
    pub runs_started: AtomicU64,

    /// Runs refused because one was in flight
    pub skipped_in_flight: AtomicU64,

    /// Runs refused by the interval guard
    pub skipped_too_soon: AtomicU64,

    /// Tasks that finished in the failed state
    pub tasks_failed: AtomicU64,

    /// Sessions finalized as failed
    pub sessions_failed: AtomicU64,
}

impl WarmupMetrics {
    pub fn snapshot(&self) -> WarmupMetricsSnapshot {
        WarmupMetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            skipped_in_flight: self.skipped_in_flight.load(Ordering::Relaxed),
            skipped_too_soon: self.skipped_too_soon.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of warmup metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupMetricsSnapshot {
    pub runs_started: u64,
    pub skipped_in_flight: u64,
    pub skipped_too_soon: u64,
    pub tasks_failed: u64,
    pub sessions_failed: u64,
}

// ============================================================================
// JOB
// ============================================================================

struct LastFinish {
    at: Instant,
    time: Timestamp,
}

struct Inner {
    ctx: WarmupContext,
    in_flight: AtomicBool,
    last_finish: RwLock<Option<LastFinish>>,
    /// Most recent first.
    sessions: RwLock<VecDeque<Arc<RwLock<WarmupSession>>>>,
    metrics: WarmupMetrics,
}

/// Clears the in-flight flag when the run ends, however it ends.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

/// The warmup orchestrator. Clones share state.
#[derive(Clone)]
pub struct CacheWarmupJob {
    inner: Arc<Inner>,
}

impl CacheWarmupJob {
    pub fn new(ctx: WarmupContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                in_flight: AtomicBool::new(false),
                last_finish: RwLock::new(None),
                sessions: RwLock::new(VecDeque::new()),
                metrics: WarmupMetrics::default(),
            }),
        }
    }

    pub fn metrics(&self) -> WarmupMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn is_warming_up(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Run a scheduled warmup to completion.
    pub async fn warmup(&self) -> WarmupOutcome {
        self.run(WarmupTrigger::Scheduled).await
    }

    /// Run a warmup to completion.
    pub async fn run(&self, trigger: WarmupTrigger) -> WarmupOutcome {
        match self.begin(trigger).await {
            Ok((guard, session)) => {
                let id = session.read().await.id;
                self.execute(session, guard).await;
                WarmupOutcome::Started(id)
            }
            Err(outcome) => outcome,
        }
    }

    /// Start a manual warmup in the background and return immediately.
    ///
    /// The run is registered before this returns, so a second trigger right
    /// after is refused as in flight.
    pub async fn trigger_warmup(&self) -> WarmupOutcome {
        match self.begin(WarmupTrigger::Manual).await {
            Ok((guard, session)) => {
                let id = session.read().await.id;
                let job = self.clone();
                tokio::spawn(async move {
                    job.execute(session, guard).await;
                });
                WarmupOutcome::Started(id)
            }
            Err(outcome) => outcome,
        }
    }

    /// Claim the in-flight flag, apply the interval guard and open a session.
    async fn begin(
        &self,
        trigger: WarmupTrigger,
    ) -> Result<(InFlightGuard, Arc<RwLock<WarmupSession>>), WarmupOutcome> {
        let metrics = &self.inner.metrics;
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics.skipped_in_flight.fetch_add(1, Ordering::Relaxed);
            tracing::info!(trigger = ?trigger, "Cache warmup already in progress, skipping");
            return Err(WarmupOutcome::SkippedInFlight);
        }
        let guard = InFlightGuard {
            inner: self.inner.clone(),
        };

        if trigger == WarmupTrigger::Scheduled {
            if let Some(last) = self.inner.last_finish.read().await.as_ref() {
                let elapsed = last.at.elapsed();
                if elapsed < self.inner.ctx.config.interval {
                    metrics.skipped_too_soon.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        elapsed_secs = elapsed.as_secs(),
                        interval_secs = self.inner.ctx.config.interval.as_secs(),
                        "Last cache warmup too recent, skipping"
                    );
                    return Err(WarmupOutcome::SkippedTooSoon);
                }
            }
        }

        let session = Arc::new(RwLock::new(WarmupSession::start(
            new_entity_id(),
            chrono::Utc::now(),
        )));
        {
            let mut sessions = self.inner.sessions.write().await;
            sessions.push_front(session.clone());
            sessions.truncate(self.inner.ctx.config.session_history.max(1));
        }
        metrics.runs_started.fetch_add(1, Ordering::Relaxed);

        Ok((guard, session))
    }

    /// Fan the tasks out, wait for all of them and finalize the session.
    async fn execute(&self, session: Arc<RwLock<WarmupSession>>, guard: InFlightGuard) {
        let session_id = session.read().await.id;
        let started = Instant::now();
        tracing::info!(session_id = %session_id, "Cache warmup started");

        let handles: Vec<_> = TaskKind::ALL
            .iter()
            .map(|kind| {
                let kind = *kind;
                let ctx = self.inner.ctx.clone();
                let progress = TaskProgress::new(session.clone(), kind);
                let handle = tokio::spawn(async move {
                    let result = run_task(kind, &ctx, &progress).await;
                    match &result {
                        Ok(()) => progress.complete().await,
                        Err(e) => {
                            tracing::warn!(task = %kind, error = %e, "Warmup task failed");
                            progress.fail(e).await;
                        }
                    }
                    result
                });
                (kind, handle)
            })
            .collect();

        let (kinds, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut structural_error = None;
        let mut failed_tasks = 0u64;
        for (kind, joined) in kinds.into_iter().zip(results) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => failed_tasks += 1,
                Err(join_error) => {
                    failed_tasks += 1;
                    let error = if join_error.is_panic() {
                        TaskError::Panicked {
                            reason: join_error.to_string(),
                        }
                    } else {
                        TaskError::Cancelled
                    };
                    tracing::error!(task = %kind, error = %error, "Warmup task aborted");
                    TaskProgress::new(session.clone(), kind).fail(&error).await;
                    if structural_error.is_none() {
                        structural_error = Some(format!("{}: {}", kind, error));
                    }
                }
            }
        }

        let now = chrono::Utc::now();
        let status = if structural_error.is_some() {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };
        session
            .write()
            .await
            .finalize(status, structural_error.clone(), now);

        *self.inner.last_finish.write().await = Some(LastFinish {
            at: Instant::now(),
            time: now,
        });

        let metrics = &self.inner.metrics;
        metrics.tasks_failed.fetch_add(failed_tasks, Ordering::Relaxed);
        if status == SessionStatus::Failed {
            metrics.sessions_failed.fetch_add(1, Ordering::Relaxed);
        }

        tracing::info!(
            session_id = %session_id,
            status = ?status,
            failed_tasks,
            duration_ms = started.elapsed().as_millis() as u64,
            "Cache warmup finished"
        );

        drop(guard);
    }

    // ========================================================================
    // Status surface
    // ========================================================================

    /// Current warmup status. Never fails.
    pub async fn status(&self) -> WarmupStatus {
        let last_warmup_time = self.inner.last_finish.read().await.as_ref().map(|l| l.time);
        let interval = chrono::Duration::from_std(self.inner.ctx.config.interval).ok();
        WarmupStatus {
            is_warming_up: self.is_warming_up(),
            last_warmup_time,
            next_warmup_time: last_warmup_time
                .zip(interval)
                .map(|(last, interval)| last + interval),
        }
    }

    /// Up to `limit` sessions, most recent first.
    pub async fn list_sessions(&self, limit: usize) -> Vec<WarmupSession> {
        let handles: Vec<_> = self
            .inner
            .sessions
            .read()
            .await
            .iter()
            .take(limit)
            .cloned()
            .collect();
        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(handle.read().await.clone());
        }
        sessions
    }

    pub async fn get_session(&self, id: EntityId) -> Option<WarmupSession> {
        let handles: Vec<_> = self.inner.sessions.read().await.iter().cloned().collect();
        for handle in handles {
            let session = handle.read().await;
            if session.id == id {
                return Some(session.clone());
            }
        }
        None
    }

    /// Summary of the most recent session.
    pub async fn summary(&self) -> Option<WarmupSummary> {
        let latest = self.inner.sessions.read().await.front().cloned()?;
        let summary = latest.read().await.summary();
        Some(summary)
    }
}

impl std::fmt::Debug for CacheWarmupJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWarmupJob")
            .field("in_flight", &self.is_warming_up())
            .field("metrics", &self.inner.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheTtls, WarmupConfig};
    use crate::test_support::GatedStore;
    use async_trait::async_trait;
    use mealwise_core::{StoredRecipe, TaskStatus, UserSettings};
    use mealwise_storage::{
        CacheStore, InMemoryCacheBackend, MockRecipeStore, RecipeQuery, RecipeStore, StoreResult,
    };
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn job_with(store: Arc<dyn RecipeStore>, interval: Duration) -> CacheWarmupJob {
        CacheWarmupJob::new(WarmupContext::new(
            store,
            CacheStore::new(Arc::new(InMemoryCacheBackend::new())),
            WarmupConfig {
                interval,
                session_history: 3,
                ..WarmupConfig::development()
            },
            CacheTtls::default(),
        ))
    }

    /// Store whose stats query panics.
    struct PanickingStore(MockRecipeStore);

    #[async_trait]
    impl RecipeStore for PanickingStore {
        async fn popular_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
            self.0.popular_recipes(limit).await
        }
        async fn recent_recipes(&self, limit: usize) -> StoreResult<Vec<StoredRecipe>> {
            self.0.recent_recipes(limit).await
        }
        async fn recipes_by_cuisine(
            &self,
            cuisine: &str,
            limit: usize,
        ) -> StoreResult<Vec<StoredRecipe>> {
            self.0.recipes_by_cuisine(cuisine, limit).await
        }
        async fn recipe_count(&self) -> StoreResult<i64> {
            panic!("row count overflow")
        }
        async fn cuisine_counts(&self) -> StoreResult<BTreeMap<String, i64>> {
            self.0.cuisine_counts().await
        }
        async fn average_cooking_time(&self) -> StoreResult<f64> {
            self.0.average_cooking_time().await
        }
        async fn user_settings(&self, user_id: &str) -> StoreResult<Option<UserSettings>> {
            self.0.user_settings(user_id).await
        }
    }

    #[tokio::test]
    async fn test_run_completes_all_tasks() {
        let job = job_with(Arc::new(MockRecipeStore::new()), Duration::from_secs(60));
        let outcome = job.warmup().await;
        let id = outcome.session_id().unwrap();

        let session = job.get_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.ended_at.is_some());
        for task in session.tasks.values() {
            assert_eq!(task.status, TaskStatus::Completed, "{}", task.kind);
        }
        assert!(!job.is_warming_up());
    }

    #[tokio::test]
    async fn test_failing_task_does_not_abort_session() {
        let store = MockRecipeStore::new();
        store.fail_query(RecipeQuery::Popular).await;
        let job = job_with(Arc::new(store), Duration::from_secs(60));

        let id = job.warmup().await.session_id().unwrap();
        let session = job.get_session(id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.error.is_none());
        assert_eq!(
            session.task(TaskKind::PopularRecipes).unwrap().status,
            TaskStatus::Failed
        );
        for kind in [TaskKind::RecentRecipes, TaskKind::CuisineBuckets, TaskKind::RecipeStats] {
            assert_eq!(session.task(kind).unwrap().status, TaskStatus::Completed);
        }
        assert_eq!(job.metrics().tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_fails_session() {
        let job = job_with(
            Arc::new(PanickingStore(MockRecipeStore::new())),
            Duration::from_secs(60),
        );
        let id = job.warmup().await.session_id().unwrap();
        let session = job.get_session(id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.error.as_deref().unwrap().starts_with("recipe_stats"));
        assert_eq!(
            session.task(TaskKind::RecipeStats).unwrap().status,
            TaskStatus::Failed
        );
        assert_eq!(
            session.task(TaskKind::PopularRecipes).unwrap().status,
            TaskStatus::Completed
        );
        assert!(!job.is_warming_up());
    }

    #[tokio::test]
    async fn test_scheduled_run_respects_interval() {
        let job = job_with(Arc::new(MockRecipeStore::new()), Duration::from_secs(3600));
        assert!(matches!(job.warmup().await, WarmupOutcome::Started(_)));
        assert_eq!(job.warmup().await, WarmupOutcome::SkippedTooSoon);
        assert_eq!(job.list_sessions(10).await.len(), 1);
        assert!(!job.is_warming_up());
    }

    #[tokio::test]
    async fn test_manual_trigger_bypasses_interval() {
        let job = job_with(Arc::new(MockRecipeStore::new()), Duration::from_secs(3600));
        job.warmup().await;
        assert!(matches!(
            job.run(WarmupTrigger::Manual).await,
            WarmupOutcome::Started(_)
        ));
        assert_eq!(job.list_sessions(10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_trigger_while_in_flight_is_noop() {
        let store = Arc::new(GatedStore::new(RecipeQuery::Popular));
        let job = job_with(store.clone(), Duration::from_secs(0));

        let first = job.trigger_warmup().await;
        assert!(matches!(first, WarmupOutcome::Started(_)));
        assert!(job.is_warming_up());

        assert_eq!(job.trigger_warmup().await, WarmupOutcome::SkippedInFlight);
        assert_eq!(job.warmup().await, WarmupOutcome::SkippedInFlight);
        assert_eq!(job.list_sessions(10).await.len(), 1);

        store.gate.add_permits(1);
        while job.is_warming_up() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let session = job.get_session(first.session_id().unwrap()).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(job.metrics().skipped_in_flight, 2);
    }

    #[tokio::test]
    async fn test_session_history_is_bounded_most_recent_first() {
        let job = job_with(Arc::new(MockRecipeStore::new()), Duration::from_secs(0));
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(job.run(WarmupTrigger::Manual).await.session_id().unwrap());
        }

        let listed: Vec<_> = job.list_sessions(10).await.iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![ids[4], ids[3], ids[2]]);
        assert_eq!(job.list_sessions(1).await.len(), 1);
        assert!(job.get_session(ids[0]).await.is_none());
    }

    #[tokio::test]
    async fn test_status_and_summary() {
        let job = job_with(Arc::new(MockRecipeStore::new()), Duration::from_secs(60));
        let before = job.status().await;
        assert!(!before.is_warming_up);
        assert!(before.last_warmup_time.is_none());
        assert!(before.next_warmup_time.is_none());
        assert!(job.summary().await.is_none());

        let id = job.warmup().await.session_id().unwrap();
        let status = job.status().await;
        let last = status.last_warmup_time.unwrap();
        assert_eq!(status.next_warmup_time, Some(last + chrono::Duration::seconds(60)));

        let summary = job.summary().await.unwrap();
        assert_eq!(summary.session_id, id);
        assert_eq!(summary.status, SessionStatus::Completed);
        assert_eq!(summary.tasks.len(), 4);
        assert_eq!(summary.tasks[&TaskKind::RecipeStats].progress, "1/1");
    }
}
