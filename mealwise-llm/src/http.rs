//! Shared HTTP helpers for the protocol clients.

use crate::ProviderResult;
use mealwise_core::ProviderError;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

/// Send a request, mapping transport failures and non-success statuses.
pub(crate) async fn send(provider: &str, request: RequestBuilder) -> ProviderResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, format!("HTTP request failed: {}", e)))?;
    check_status(provider, response).await
}

/// Turn a non-success response into the matching provider error.
pub(crate) async fn check_status(provider: &str, response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = extract_error_message(&error_text).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });

    tracing::warn!(
        provider,
        status = status.as_u16(),
        error = %message,
        "Provider request failed"
    );

    Err(status_error(provider, status, message))
}

pub(crate) fn status_error(provider: &str, status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::InvalidApiKey {
            provider: provider.to_string(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            provider: provider.to_string(),
            message,
        },
        _ => ProviderError::Upstream {
            provider: provider.to_string(),
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull a human readable message out of an error body.
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}`,
/// `{"msg": "..."}` and `{"message": "..."}`; anything else is returned as is.
pub fn extract_error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_string());
    };
    error_message_from_value(&value).or_else(|| Some(body.to_string()))
}

/// Error message carried by a decoded JSON value, if any.
pub fn error_message_from_value(value: &Value) -> Option<String> {
    let text = |v: &Value| v.as_str().map(str::to_string);
    match value.get("error") {
        Some(Value::String(message)) => return Some(message.clone()),
        Some(Value::Object(detail)) => {
            if let Some(message) = detail.get("message").and_then(text) {
                return Some(message);
            }
        }
        _ => {}
    }
    value
        .get("msg")
        .and_then(text)
        .filter(|m| !m.is_empty())
        .or_else(|| value.get("message").and_then(text))
}
