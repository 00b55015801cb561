//! Mealwise API - Recommendation and Cache Warmup Services
//!
//! This crate wires the data model, provider clients and storage into the
//! operations the service exposes:
//! - recipe recommendations (single meal, daily and weekly plans), plain or
//!   streamed
//! - the cache warmup job, its scheduler and its status surface
//!
//! Transport is left to the embedding application; every operation returns
//! [`ApiResult`] or the richer [`mealwise_core::MealwiseResult`].

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod services;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{AppConfig, CacheTtls, ProvidersConfig, RedisConfig, WarmupConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{
    CacheWarmupJob, SchedulerState, WarmupContext, WarmupMetricsSnapshot, WarmupOutcome,
    WarmupScheduler, WarmupTrigger,
};
pub use services::{RecommendationService, WEEK_DAYS};
