//! Service Configuration Module
//!
//! Configuration for the warmup job, the recommendation providers, cache
//! lifetimes and the cache backend. Everything is loaded from environment
//! variables with defaults from [`crate::constants`].

use crate::constants::*;
use mealwise_core::{ConfigError, ProviderConfig, ProviderKind};
use mealwise_storage::DbConfig;
use std::fmt;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// WARMUP CONFIGURATION
// ============================================================================

/// Configuration for the cache warmup job and its scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupConfig {
    /// Delay before the first run after the scheduler starts.
    pub initial_delay: Duration,

    /// Interval between runs. Also the minimum gap between two scheduled runs.
    pub interval: Duration,

    /// Number of popular recipes to cache.
    pub popular_count: usize,

    /// Number of recent recipes to cache.
    pub recent_count: usize,

    /// Cuisines that get their own cached bucket.
    pub cuisines: Vec<String>,

    /// Recipes cached per cuisine bucket.
    pub cuisine_bucket_size: usize,

    /// Finished sessions kept for status queries.
    pub session_history: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_WARMUP_INITIAL_DELAY_MS),
            interval: Duration::from_secs(DEFAULT_WARMUP_INTERVAL_MINS * 60),
            popular_count: DEFAULT_WARMUP_POPULAR_COUNT,
            recent_count: DEFAULT_WARMUP_RECENT_COUNT,
            cuisines: DEFAULT_WARMUP_CUISINES.iter().map(|c| c.to_string()).collect(),
            cuisine_bucket_size: DEFAULT_WARMUP_CUISINE_BUCKET_SIZE,
            session_history: DEFAULT_WARMUP_SESSION_HISTORY,
        }
    }
}

impl WarmupConfig {
    /// Create WarmupConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `MEALWISE_WARMUP_INITIAL_DELAY_MS`: Delay before the first run (default: 5000)
    /// - `MEALWISE_WARMUP_INTERVAL_MINS`: Minutes between runs (default: 30)
    /// - `MEALWISE_WARMUP_POPULAR_COUNT`: Popular recipes to cache (default: 50)
    /// - `MEALWISE_WARMUP_RECENT_COUNT`: Recent recipes to cache (default: 30)
    /// - `MEALWISE_WARMUP_CUISINES`: Comma-separated cuisines (default: chinese,western,japanese,korean)
    /// - `MEALWISE_WARMUP_CUISINE_BUCKET_SIZE`: Recipes per cuisine (default: 10)
    /// - `MEALWISE_WARMUP_SESSION_HISTORY`: Sessions kept (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let initial_delay = env_parse("MEALWISE_WARMUP_INITIAL_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_delay);

        let interval = env_parse::<u64>("MEALWISE_WARMUP_INTERVAL_MINS")
            .filter(|mins| *mins > 0)
            .map(|mins| Duration::from_secs(mins * 60))
            .unwrap_or(defaults.interval);

        let cuisines = env_string("MEALWISE_WARMUP_CUISINES")
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cuisines);

        Self {
            initial_delay,
            interval,
            popular_count: env_parse("MEALWISE_WARMUP_POPULAR_COUNT")
                .unwrap_or(defaults.popular_count),
            recent_count: env_parse("MEALWISE_WARMUP_RECENT_COUNT")
                .unwrap_or(defaults.recent_count),
            cuisines,
            cuisine_bucket_size: env_parse("MEALWISE_WARMUP_CUISINE_BUCKET_SIZE")
                .unwrap_or(defaults.cuisine_bucket_size),
            session_history: env_parse::<usize>("MEALWISE_WARMUP_SESSION_HISTORY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.session_history),
        }
    }

    /// Create a configuration for development/testing with short timers.
    pub fn development() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            interval: Duration::from_secs(60),
            popular_count: 10,
            recent_count: 10,
            cuisines: vec!["chinese".to_string(), "western".to_string()],
            cuisine_bucket_size: 5,
            session_history: 10,
        }
    }
}

// ============================================================================
// CACHE TTLS
// ============================================================================

/// Lifetimes of the cached result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub recipe: Duration,
    pub popular_list: Duration,
    pub recent_list: Duration,
    pub cuisine_list: Duration,
    pub stats: Duration,
    pub recommendation: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            recipe: Duration::from_secs(DEFAULT_RECIPE_TTL_SECS),
            popular_list: Duration::from_secs(DEFAULT_POPULAR_LIST_TTL_SECS),
            recent_list: Duration::from_secs(DEFAULT_RECENT_LIST_TTL_SECS),
            cuisine_list: Duration::from_secs(DEFAULT_CUISINE_LIST_TTL_SECS),
            stats: Duration::from_secs(DEFAULT_STATS_TTL_SECS),
            recommendation: Duration::from_secs(DEFAULT_RECOMMENDATION_TTL_SECS),
        }
    }
}

impl CacheTtls {
    /// Create CacheTtls from `MEALWISE_CACHE_<NAME>_TTL_SECS` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ttl = |name: &str, default: Duration| {
            env_parse(&format!("MEALWISE_CACHE_{}_TTL_SECS", name))
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            recipe: ttl("RECIPE", defaults.recipe),
            popular_list: ttl("POPULAR", defaults.popular_list),
            recent_list: ttl("RECENT", defaults.recent_list),
            cuisine_list: ttl("CUISINE", defaults.cuisine_list),
            stats: ttl("STATS", defaults.stats),
            recommendation: ttl("RECOMMENDATION", defaults.recommendation),
        }
    }
}

// ============================================================================
// PROVIDERS CONFIGURATION
// ============================================================================

/// Built-in provider settings and the default provider choice.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvidersConfig {
    /// Provider used when a request names none.
    pub default_provider: ProviderKind,

    /// Built-in providers with credentials present in the environment.
    pub providers: Vec<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Coze,
            providers: Vec::new(),
        }
    }
}

impl ProvidersConfig {
    /// Create ProvidersConfig from environment variables.
    ///
    /// For every built-in provider `<P>` (COZE, OLLAMA, DIFY, DEEPSEEK,
    /// SILICONFLOW, ARK):
    /// - `MEALWISE_<P>_API_KEY`: Credential. Providers without one are left out,
    ///   except ollama which is included once `MEALWISE_OLLAMA_MODEL` is set.
    /// - `MEALWISE_<P>_API_ENDPOINT`: Base URL (built-in default where one exists)
    /// - `MEALWISE_<P>_MODEL`: Model name
    ///
    /// Plus `MEALWISE_COZE_BOT_ID`, `MEALWISE_COZE_POLL_INTERVAL_MS` (default: 1000),
    /// `MEALWISE_COZE_MAX_POLL_ATTEMPTS` (default: 60) and
    /// `MEALWISE_DEFAULT_PROVIDER` (default: coze).
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_provider = match env_string("MEALWISE_DEFAULT_PROVIDER") {
            Some(name) => name.parse::<ProviderKind>().map_err(|reason| {
                ConfigError::InvalidValue {
                    field: "MEALWISE_DEFAULT_PROVIDER".to_string(),
                    value: name.clone(),
                    reason,
                }
            })?,
            None => DEFAULT_PROVIDER
                .parse::<ProviderKind>()
                .unwrap_or(ProviderKind::Coze),
        };
        if default_provider == ProviderKind::Custom {
            return Err(ConfigError::InvalidValue {
                field: "MEALWISE_DEFAULT_PROVIDER".to_string(),
                value: "custom".to_string(),
                reason: "the custom provider is per user and cannot be the default".to_string(),
            });
        }

        let poll_interval = Duration::from_millis(
            env_parse("MEALWISE_COZE_POLL_INTERVAL_MS").unwrap_or(DEFAULT_COZE_POLL_INTERVAL_MS),
        );
        let max_poll_attempts =
            env_parse("MEALWISE_COZE_MAX_POLL_ATTEMPTS").unwrap_or(DEFAULT_COZE_MAX_POLL_ATTEMPTS);

        let providers = ProviderKind::ALL
            .iter()
            .copied()
            .filter(|kind| *kind != ProviderKind::Custom)
            .filter_map(|kind| provider_from_env(kind, poll_interval, max_poll_attempts))
            .collect();

        Ok(Self {
            default_provider,
            providers,
        })
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.kind == kind)
    }
}

fn default_endpoint(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::Coze => Some(DEFAULT_COZE_ENDPOINT),
        ProviderKind::Ollama => Some(DEFAULT_OLLAMA_ENDPOINT),
        ProviderKind::Deepseek => Some(DEFAULT_DEEPSEEK_ENDPOINT),
        ProviderKind::Siliconflow => Some(DEFAULT_SILICONFLOW_ENDPOINT),
        ProviderKind::Ark => Some(DEFAULT_ARK_ENDPOINT),
        ProviderKind::Dify | ProviderKind::Custom => None,
    }
}

fn provider_from_env(
    kind: ProviderKind,
    poll_interval: Duration,
    max_poll_attempts: u32,
) -> Option<ProviderConfig> {
    let prefix = format!("MEALWISE_{}", kind.as_str().to_uppercase());
    let api_key = env_string(&format!("{}_API_KEY", prefix));
    let model = env_string(&format!("{}_MODEL", prefix));

    let present = match kind {
        ProviderKind::Ollama => model.is_some(),
        _ => api_key.is_some(),
    };
    if !present {
        return None;
    }

    let endpoint = env_string(&format!("{}_API_ENDPOINT", prefix))
        .or_else(|| default_endpoint(kind).map(str::to_string))
        .unwrap_or_default();

    let mut config = ProviderConfig::new(kind, endpoint);
    config.api_key = api_key;
    config.model = model;
    if kind == ProviderKind::Coze {
        config.bot_id = env_string("MEALWISE_COZE_BOT_ID");
        config = config.with_polling(poll_interval, max_poll_attempts);
    }
    Some(config)
}

// ============================================================================
// REDIS CONFIGURATION
// ============================================================================

/// Cache backend selection. Without a URL the in-memory backend is used.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: Option<String>,
}

impl RedisConfig {
    /// Create RedisConfig from `MEALWISE_REDIS_URL`.
    pub fn from_env() -> Self {
        Self {
            url: env_string("MEALWISE_REDIS_URL"),
        }
    }

    pub fn local() -> Self {
        Self {
            url: Some(DEFAULT_REDIS_URL.to_string()),
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URLs may carry a password.
        f.debug_struct("RedisConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================================================
// APPLICATION CONFIGURATION
// ============================================================================

/// Everything the service binary needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub warmup: WarmupConfig,
    pub providers: ProvidersConfig,
    pub cache_ttls: CacheTtls,
    pub redis: RedisConfig,
    pub db: DbConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            warmup: WarmupConfig::from_env(),
            providers: ProvidersConfig::from_env()?,
            cache_ttls: CacheTtls::from_env(),
            redis: RedisConfig::from_env(),
            db: DbConfig::from_env(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that touch process environment.
    pub fn lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        pub fn set(key: &str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(&self.key, v),
                None => std::env::remove_var(&self.key),
            }
        }
    }
}
