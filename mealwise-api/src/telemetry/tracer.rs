//! Tracing subscriber initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::DEFAULT_LOG_FILTER;
use crate::error::{ApiError, ApiResult};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines, for local development.
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Log line format
    pub log_format: LogFormat,
    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("MEALWISE_SERVICE_NAME")
                .unwrap_or_else(|_| "mealwise-api".to_string()),
            service_version: std::env::var("MEALWISE_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: std::env::var("MEALWISE_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            log_format: std::env::var("MEALWISE_LOG_FORMAT")
                .ok()
                .and_then(|s| LogFormat::parse(&s))
                .unwrap_or(LogFormat::Json),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. `RUST_LOG` takes precedence over
/// [`TelemetryConfig::default_filter`].
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        environment = %config.environment,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}
