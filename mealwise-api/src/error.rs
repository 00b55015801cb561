//! Error Types for Mealwise API
//!
//! This module defines the caller-facing error surface:
//! - ErrorCode enum for categorizing errors
//! - ApiError struct for structured error payloads
//! - Conversions from the internal error taxonomy
//!
//! Every error serializes as JSON and carries the HTTP status a transport
//! layer would answer with.

use mealwise_core::{ConfigError, ErrorKind, MealwiseError, ProviderError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client Errors (400)
    // ========================================================================
    /// The selected provider cannot be used with the stored settings
    ProviderMisconfigured,

    /// Request contains invalid input data
    InvalidInput,

    // ========================================================================
    // Upstream Errors (422, 502)
    // ========================================================================
    /// The provider failed, timed out or returned nothing usable
    UpstreamFailure,

    /// The provider answered with something that is not a valid recipe
    UnparseableRecipe,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// A warmup or other background job is already running
    JobInProgress,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::ProviderMisconfigured | ErrorCode::InvalidInput => 400,
            ErrorCode::UnparseableRecipe => 422,
            ErrorCode::UpstreamFailure => 502,
            ErrorCode::JobInProgress => 503,
            ErrorCode::InternalError => 500,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ProviderMisconfigured => "Provider is not configured",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::UpstreamFailure => "Recommendation provider failed",
            ErrorCode::UnparseableRecipe => "Provider response is not a valid recipe",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::JobInProgress => "Job already in progress",
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ProviderMisconfigured => ErrorCode::ProviderMisconfigured,
            ErrorKind::UpstreamFailure => ErrorCode::UpstreamFailure,
            ErrorKind::UnparseableRecipe => ErrorCode::UnparseableRecipe,
            ErrorKind::Internal => ErrorCode::InternalError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error payload returned by every service operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn provider_misconfigured(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderMisconfigured, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn upstream_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamFailure, message)
    }

    pub fn unparseable_recipe(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnparseableRecipe, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn job_in_progress(job: &str) -> Self {
        Self::new(ErrorCode::JobInProgress, format!("{} is already running", job))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<MealwiseError> for ApiError {
    fn from(err: MealwiseError) -> Self {
        let code = ErrorCode::from(err.kind());
        match &err {
            // Internal details stay in the logs.
            MealwiseError::Store(_) | MealwiseError::Cache(_) | MealwiseError::Task(_) => {
                tracing::error!(error = %err, "Internal error");
                ApiError::from_code(code)
            }
            MealwiseError::Provider(inner) => {
                let provider = provider_name(inner);
                ApiError::new(code, err.to_string())
                    .with_details(serde_json::json!({ "provider": provider }))
            }
            _ => ApiError::new(code, err.to_string()),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        MealwiseError::from(err).into()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        MealwiseError::from(err).into()
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

fn provider_name(err: &ProviderError) -> &str {
    match err {
        ProviderError::Upstream { provider, .. }
        | ProviderError::Transport { provider, .. }
        | ProviderError::Timeout { provider, .. }
        | ProviderError::Misconfigured { provider, .. }
        | ProviderError::InvalidApiKey { provider, .. }
        | ProviderError::RateLimited { provider, .. }
        | ProviderError::EmptyResponse { provider }
        | ProviderError::Reported { provider, .. }
        | ProviderError::MalformedResponse { provider, .. } => provider,
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// TESTS
// ============================================================================
