//! Constants for Mealwise API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// WARMUP SCHEDULING
// ============================================================================

/// Delay before the first warmup after startup (5 seconds)
pub const DEFAULT_WARMUP_INITIAL_DELAY_MS: u64 = 5000;

/// Interval between scheduled warmups (30 minutes)
pub const DEFAULT_WARMUP_INTERVAL_MINS: u64 = 30;

/// Number of finished warmup sessions kept for status queries
pub const DEFAULT_WARMUP_SESSION_HISTORY: usize = 50;

// ============================================================================
// WARMUP TASK SIZES
// ============================================================================

/// Number of popular recipes cached per warmup
pub const DEFAULT_WARMUP_POPULAR_COUNT: usize = 50;

/// Number of recent recipes cached per warmup
pub const DEFAULT_WARMUP_RECENT_COUNT: usize = 30;

/// Number of recipes cached per cuisine bucket
pub const DEFAULT_WARMUP_CUISINE_BUCKET_SIZE: usize = 10;

/// Cuisines that get a cached bucket
pub const DEFAULT_WARMUP_CUISINES: [&str; 4] = ["chinese", "western", "japanese", "korean"];

// ============================================================================
// CACHE TTLS (seconds)
// ============================================================================

pub const DEFAULT_RECIPE_TTL_SECS: u64 = 3600;
pub const DEFAULT_POPULAR_LIST_TTL_SECS: u64 = 3600;
pub const DEFAULT_RECENT_LIST_TTL_SECS: u64 = 1800;
pub const DEFAULT_CUISINE_LIST_TTL_SECS: u64 = 3600;
pub const DEFAULT_STATS_TTL_SECS: u64 = 7200;
pub const DEFAULT_RECOMMENDATION_TTL_SECS: u64 = 900;

// ============================================================================
// PROVIDERS
// ============================================================================

/// Provider used when a request does not name one
pub const DEFAULT_PROVIDER: &str = "coze";

/// Delay between conversation status polls
pub const DEFAULT_COZE_POLL_INTERVAL_MS: u64 = 1000;

/// Conversation status polls before giving up
pub const DEFAULT_COZE_MAX_POLL_ATTEMPTS: u32 = 60;

/// Default endpoints of the built-in providers
pub const DEFAULT_COZE_ENDPOINT: &str = "https://api.coze.cn";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_DEEPSEEK_ENDPOINT: &str = "https://api.deepseek.com";
pub const DEFAULT_SILICONFLOW_ENDPOINT: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_ARK_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3";

// ============================================================================
// REDIS
// ============================================================================

/// Redis URL used when none is configured
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// ============================================================================
// LOGGING
// ============================================================================

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "mealwise_api=debug,mealwise_llm=info,info";
