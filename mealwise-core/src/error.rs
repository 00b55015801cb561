//! Error types for Mealwise operations

use thiserror::Error;

/// Errors raised while talking to a text-generation provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request to {provider} failed with status {status}: {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Transport error talking to {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} did not finish after {attempts} polling attempts")]
    Timeout { provider: String, attempts: u32 },

    #[error("Provider {provider} is misconfigured: {reason}")]
    Misconfigured { provider: String, reason: String },

    #[error("Invalid API key for {provider}: {message}")]
    InvalidApiKey { provider: String, message: String },

    #[error("Rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("{provider} reported an error: {message}")]
    Reported { provider: String, message: String },

    #[error("Malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },
}

impl ProviderError {
    /// Shorthand for a misconfiguration error.
    pub fn misconfigured(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Misconfigured {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a transport-level failure.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an error the provider reported in-band.
    pub fn reported(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reported {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an unusable response body.
    pub fn malformed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Structural problems found in a generated recipe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Response is not a JSON object: {reason}")]
    MalformedJson { reason: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid ingredient #{index} ({name}): {reason}")]
    InvalidIngredient {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("Invalid nutrition field {field}: {reason}")]
    InvalidNutrition { field: String, reason: String },
}

/// Relational store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Failed to decode {entity} row: {reason}")]
    Decode { entity: String, reason: String },
}

/// Cache store errors. Absorbed by the cache adapter and never returned to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Failure of a single warmup task. Recorded on the task, never propagated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task panicked: {reason}")]
    Panicked { reason: String },

    #[error("Task was cancelled")]
    Cancelled,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Mealwise errors.
#[derive(Debug, Clone, Error)]
pub enum MealwiseError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// User-visible classification of a failed recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The selected provider cannot be used with the stored settings.
    ProviderMisconfigured,
    /// The provider failed, timed out or returned nothing usable.
    UpstreamFailure,
    /// The provider answered, but the answer is not a valid recipe.
    UnparseableRecipe,
    /// Anything else.
    Internal,
}

impl MealwiseError {
    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MealwiseError::Provider(ProviderError::Misconfigured { .. }) => {
                ErrorKind::ProviderMisconfigured
            }
            MealwiseError::Provider(_) => ErrorKind::UpstreamFailure,
            MealwiseError::Validation(_) => ErrorKind::UnparseableRecipe,
            MealwiseError::Store(_)
            | MealwiseError::Cache(_)
            | MealwiseError::Task(_)
            | MealwiseError::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for Mealwise operations.
pub type MealwiseResult<T> = Result<T, MealwiseError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display_upstream() {
        let err = ProviderError::Upstream {
            provider: "dify".to_string(),
            status: 502,
            message: "bad gateway".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("dify"));
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));
    }

    #[test]
    fn test_provider_error_display_timeout() {
        let err = ProviderError::Timeout {
            provider: "coze".to_string(),
            attempts: 60,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("coze"));
        assert!(msg.contains("60"));
    }

    #[test]
    fn test_validation_error_display_invalid_ingredient() {
        let err = ValidationError::InvalidIngredient {
            index: 2,
            name: "盐".to_string(),
            reason: "unknown unit".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("#2"));
        assert!(msg.contains("盐"));
        assert!(msg.contains("unknown unit"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "MEALWISE_DEFAULT_PROVIDER".to_string(),
            value: "gpt".to_string(),
            reason: "unknown provider".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("MEALWISE_DEFAULT_PROVIDER"));
        assert!(msg.contains("gpt"));
        assert!(msg.contains("unknown provider"));
    }

    #[test]
    fn test_task_error_from_store_error() {
        let err = TaskError::from(StoreError::Query {
            reason: "syntax".to_string(),
        });
        assert!(matches!(err, TaskError::Store(_)));
        assert!(format!("{}", err).contains("syntax"));
    }

    #[test]
    fn test_mealwise_error_from_variants() {
        let provider = MealwiseError::from(ProviderError::RateLimited {
            provider: "deepseek".to_string(),
            message: "slow down".to_string(),
        });
        assert!(matches!(provider, MealwiseError::Provider(_)));

        let validation = MealwiseError::from(ValidationError::MissingField {
            field: "name".to_string(),
        });
        assert!(matches!(validation, MealwiseError::Validation(_)));

        let store = MealwiseError::from(StoreError::Connection {
            reason: "refused".to_string(),
        });
        assert!(matches!(store, MealwiseError::Store(_)));

        let cache = MealwiseError::from(CacheError::Backend {
            reason: "down".to_string(),
        });
        assert!(matches!(cache, MealwiseError::Cache(_)));

        let config = MealwiseError::from(ConfigError::MissingRequired {
            field: "endpoint".to_string(),
        });
        assert!(matches!(config, MealwiseError::Config(_)));
    }

    #[test]
    fn test_error_kind_classification() {
        let misconfigured = MealwiseError::from(ProviderError::misconfigured("custom", "no key"));
        assert_eq!(misconfigured.kind(), ErrorKind::ProviderMisconfigured);

        let timeout = MealwiseError::from(ProviderError::Timeout {
            provider: "coze".to_string(),
            attempts: 3,
        });
        assert_eq!(timeout.kind(), ErrorKind::UpstreamFailure);

        let invalid = MealwiseError::from(ValidationError::InvalidNutrition {
            field: "fat".to_string(),
            reason: "negative".to_string(),
        });
        assert_eq!(invalid.kind(), ErrorKind::UnparseableRecipe);

        let store = MealwiseError::from(StoreError::Query {
            reason: "x".to_string(),
        });
        assert_eq!(store.kind(), ErrorKind::Internal);
    }
}
