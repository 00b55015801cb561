//! Background Jobs for Mealwise API
//!
//! - `warmup_tasks`: the four read-and-populate cache warmup tasks
//! - `cache_warmup`: the warmup orchestrator and its session log
//! - `scheduler`: timers driving the orchestrator
//!
//! # Usage
//!
//! ```ignore
//! use mealwise_api::jobs::{CacheWarmupJob, WarmupContext, WarmupScheduler};
//!
//! let job = CacheWarmupJob::new(WarmupContext::new(store, cache, config.clone(), ttls));
//! let scheduler = WarmupScheduler::new(job, config.initial_delay, config.interval);
//! scheduler.start();
//!
//! // On shutdown
//! scheduler.stop();
//! ```

pub mod cache_warmup;
pub mod scheduler;
pub mod warmup_tasks;

pub use cache_warmup::{
    CacheWarmupJob, WarmupMetrics, WarmupMetricsSnapshot, WarmupOutcome, WarmupTrigger,
};
pub use scheduler::{SchedulerState, WarmupScheduler};
pub use warmup_tasks::{run_task, TaskProgress, WarmupContext};
