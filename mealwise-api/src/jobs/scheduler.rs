//! Warmup Scheduler
//!
//! Arms one timer task: it sleeps for the initial delay, runs a warmup, then
//! runs one every warmup interval, counted from the end of the previous run.
//! Only the waits race the shutdown watch channel. A run already in progress
//! when `stop()` is called finishes and finalizes its session, then the
//! timer task exits without starting another.
//!
//! A scheduler goes `Idle -> Armed -> Stopped`. Stopped is terminal.

use std::sync::Mutex;
use std::time::Duration;

use mealwise_core::{EntityId, WarmupStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::cache_warmup::{CacheWarmupJob, WarmupOutcome, WarmupTrigger};
use crate::error::ApiResult;

/// Lifecycle state of a [`WarmupScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, timers not armed.
    Idle,
    /// Timer task running.
    Armed,
    /// Stopped for good.
    Stopped,
}

struct Timers {
    state: SchedulerState,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Periodic driver of a [`CacheWarmupJob`].
pub struct WarmupScheduler {
    job: CacheWarmupJob,
    initial_delay: Duration,
    interval: Duration,
    timers: Mutex<Timers>,
}

impl WarmupScheduler {
    pub fn new(job: CacheWarmupJob, initial_delay: Duration, interval: Duration) -> Self {
        Self {
            job,
            initial_delay,
            interval,
            timers: Mutex::new(Timers {
                state: SchedulerState::Idle,
                shutdown_tx: None,
                handle: None,
            }),
        }
    }

    fn timers(&self) -> std::sync::MutexGuard<'_, Timers> {
        // The lock is never held across an await or a panic point.
        self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        self.timers().state
    }

    /// Whether the timer task is still alive. It outlives `stop()` until a
    /// run in progress has finished.
    pub fn timer_running(&self) -> bool {
        self.timers()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn job(&self) -> &CacheWarmupJob {
        &self.job
    }

    /// Arm the timers. Must be called from within a Tokio runtime.
    ///
    /// Calling it on an armed or stopped scheduler does nothing.
    pub fn start(&self) {
        let mut timers = self.timers();
        match timers.state {
            SchedulerState::Armed => {
                tracing::debug!("Warmup scheduler already started");
                return;
            }
            SchedulerState::Stopped => {
                tracing::warn!("Warmup scheduler was stopped and cannot be restarted");
                return;
            }
            SchedulerState::Idle => {}
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(timer_loop(
            self.job.clone(),
            self.initial_delay,
            self.interval,
            shutdown_rx,
        ));

        timers.shutdown_tx = Some(shutdown_tx);
        timers.handle = Some(handle);
        timers.state = SchedulerState::Armed;

        tracing::info!(
            initial_delay_ms = self.initial_delay.as_millis() as u64,
            interval_secs = self.interval.as_secs(),
            "Warmup scheduler started"
        );
    }

    /// Cancel outstanding timers. Idempotent, and safe before `start()`.
    ///
    /// Does not wait for, or cancel, a run in progress.
    pub fn stop(&self) {
        let mut timers = self.timers();
        if timers.state == SchedulerState::Stopped {
            return;
        }
        if let Some(tx) = timers.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        // The timer task sees the signal at its next wait and exits there.
        let was_armed = timers.state == SchedulerState::Armed;
        timers.state = SchedulerState::Stopped;

        if was_armed {
            tracing::info!("Warmup scheduler stopped");
        }
    }

    pub async fn status(&self) -> WarmupStatus {
        self.job.status().await
    }

    /// Start a manual run in the background and return its session id.
    /// Bypasses the interval guard. Refused with `JobInProgress` while
    /// another run is in flight.
    pub async fn manual_warmup(&self) -> ApiResult<EntityId> {
        self.job.trigger_warmup().await.into_api_result()
    }
}

impl Drop for WarmupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WarmupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmupScheduler")
            .field("state", &self.state())
            .field("initial_delay", &self.initial_delay)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

async fn timer_loop(
    job: CacheWarmupJob,
    initial_delay: Duration,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::select! {
        biased;
        _ = shutdown_rx.changed() => {
            tracing::debug!("Warmup scheduler stopped before the initial run");
            return;
        }
        _ = tokio::time::sleep(initial_delay) => {
            // The first run ignores the interval guard.
            log_outcome(job.run(WarmupTrigger::Manual).await);
        }
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!("Warmup scheduler timer loop exiting");
                    break;
                }
            }
            _ = ticker.tick() => {
                log_outcome(job.warmup().await);
                // Count the next period from the end of this run, so the
                // interval guard does not refuse the next tick.
                ticker.reset();
            }
        }
    }
}

fn log_outcome(outcome: WarmupOutcome) {
    match outcome {
        WarmupOutcome::Started(id) => {
            tracing::debug!(session_id = %id, "Scheduled warmup finished");
        }
        WarmupOutcome::SkippedInFlight | WarmupOutcome::SkippedTooSoon => {
            tracing::debug!(outcome = ?outcome, "Scheduled warmup skipped");
        }
    }
}
