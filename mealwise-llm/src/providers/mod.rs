//! Recipe provider implementations
//!
//! One client per wire protocol. The OpenAI-compatible client serves every
//! provider kind that speaks the chat-completions format.

pub mod coze;
pub mod dify;
pub mod ollama;
pub mod openai;

pub use coze::CozeClient;
pub use dify::DifyClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;

use crate::ProviderResult;
use mealwise_core::ProviderError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Connection establishment limit for every provider request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by one provider client.
pub(crate) fn http_client(provider: &str) -> ProviderResult<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| {
            ProviderError::misconfigured(provider, format!("failed to build HTTP client: {}", e))
        })
}

/// Join a base endpoint and a path with exactly one slash.
pub(crate) fn endpoint_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Decode a successful response body as JSON.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
) -> ProviderResult<T> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::malformed(provider, format!("Failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_slashes() {
        assert_eq!(
            endpoint_url("https://api.coze.cn/", "/v3/chat"),
            "https://api.coze.cn/v3/chat"
        );
        assert_eq!(
            endpoint_url("http://localhost:11434", "api/chat"),
            "http://localhost:11434/api/chat"
        );
    }
}
