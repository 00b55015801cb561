//! Warmup session and task records.
//!
//! A [`WarmupSession`] is created when a warmup run starts, mutated by its
//! tasks while running, and finalized exactly once. Finalized sessions are
//! read-only history.

use crate::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// KINDS AND STATUSES
// ============================================================================

/// The independent result sets a warmup run populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    PopularRecipes,
    RecentRecipes,
    CuisineBuckets,
    RecipeStats,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::PopularRecipes,
        TaskKind::RecentRecipes,
        TaskKind::CuisineBuckets,
        TaskKind::RecipeStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::PopularRecipes => "popular_recipes",
            TaskKind::RecentRecipes => "recent_recipes",
            TaskKind::CuisineBuckets => "cuisine_buckets",
            TaskKind::RecipeStats => "recipe_stats",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    /// The run finished. Individual tasks may still have failed.
    Completed,
    /// The run itself broke down.
    Failed,
}

// ============================================================================
// TASK RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskDetails {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub started_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub finished_at: Option<Timestamp>,
    pub estimated_time_remaining_ms: Option<u64>,
    pub last_error: Option<String>,
}

/// Progress of one warmup task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WarmupTask {
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub completed: u64,
    pub total: u64,
    pub failed: u64,
    pub details: TaskDetails,
}

impl WarmupTask {
    pub fn pending(kind: TaskKind) -> Self {
        Self {
            kind,
            status: TaskStatus::Pending,
            completed: 0,
            total: 0,
            failed: 0,
            details: TaskDetails::default(),
        }
    }

    /// Mark the task running with a known amount of work.
    pub fn begin(&mut self, total: u64, now: Timestamp) {
        self.status = TaskStatus::Running;
        self.total = total;
        self.details.started_at = Some(now);
    }

    /// Raise the total once the amount of work is known.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    pub fn record_success(&mut self, units: u64, now: Timestamp) {
        self.completed += units;
        self.refresh_estimate(now);
    }

    pub fn record_failure(&mut self, units: u64, error: impl Into<String>, now: Timestamp) {
        self.failed += units;
        self.details.last_error = Some(error.into());
        self.refresh_estimate(now);
    }

    pub fn complete(&mut self, now: Timestamp) {
        self.status = TaskStatus::Completed;
        self.details.finished_at = Some(now);
        self.details.estimated_time_remaining_ms = Some(0);
    }

    pub fn fail(&mut self, error: impl Into<String>, now: Timestamp) {
        self.status = TaskStatus::Failed;
        self.details.last_error = Some(error.into());
        self.details.finished_at = Some(now);
        self.details.estimated_time_remaining_ms = None;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// `completed/total` as shown in status summaries.
    pub fn progress(&self) -> String {
        format!("{}/{}", self.completed, self.total)
    }

    fn refresh_estimate(&mut self, now: Timestamp) {
        let processed = self.completed + self.failed;
        let Some(started_at) = self.details.started_at else {
            return;
        };
        if processed == 0 {
            return;
        }
        let elapsed_ms = (now - started_at).num_milliseconds().max(0) as u64;
        let remaining = self.total.saturating_sub(processed);
        self.details.estimated_time_remaining_ms =
            Some(elapsed_ms.saturating_mul(remaining) / processed);
    }
}

// ============================================================================
// SESSION RECORD
// ============================================================================

/// One warmup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WarmupSession {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub started_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub ended_at: Option<Timestamp>,
    pub status: SessionStatus,
    pub tasks: BTreeMap<TaskKind, WarmupTask>,
    /// Set when the run itself failed.
    pub error: Option<String>,
}

impl WarmupSession {
    /// Open a running session with every task pending.
    pub fn start(id: EntityId, now: Timestamp) -> Self {
        Self {
            id,
            started_at: now,
            ended_at: None,
            status: SessionStatus::Running,
            tasks: TaskKind::ALL
                .iter()
                .map(|kind| (*kind, WarmupTask::pending(*kind)))
                .collect(),
            error: None,
        }
    }

    pub fn task(&self, kind: TaskKind) -> Option<&WarmupTask> {
        self.tasks.get(&kind)
    }

    pub fn task_mut(&mut self, kind: TaskKind) -> Option<&mut WarmupTask> {
        self.tasks.get_mut(&kind)
    }

    pub fn is_finalized(&self) -> bool {
        self.status != SessionStatus::Running
    }

    /// Close the session. Has no effect on an already finalized session.
    pub fn finalize(&mut self, status: SessionStatus, error: Option<String>, now: Timestamp) {
        if self.is_finalized() {
            return;
        }
        self.status = status;
        self.error = error;
        self.ended_at = Some(now);
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    pub fn summary(&self) -> WarmupSummary {
        WarmupSummary {
            session_id: self.id,
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_ms: self.duration_ms(),
            tasks: self
                .tasks
                .iter()
                .map(|(kind, task)| {
                    (
                        *kind,
                        TaskSummary {
                            status: task.status,
                            progress: task.progress(),
                            failed: task.failed,
                            estimated_time_remaining_ms: task
                                .details
                                .estimated_time_remaining_ms,
                        },
                    )
                })
                .collect(),
        }
    }
}

// ============================================================================
// STATUS VIEWS
// ============================================================================

/// Scheduler-level warmup status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WarmupStatus {
    pub is_warming_up: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_warmup_time: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub next_warmup_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskSummary {
    pub status: TaskStatus,
    pub progress: String,
    pub failed: u64,
    pub estimated_time_remaining_ms: Option<u64>,
}

/// Compact view of one session for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WarmupSummary {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub session_id: EntityId,
    pub status: SessionStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub started_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub ended_at: Option<Timestamp>,
    pub duration_ms: Option<i64>,
    pub tasks: BTreeMap<TaskKind, TaskSummary>,
}
