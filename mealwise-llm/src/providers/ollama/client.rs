//! Ollama HTTP client

use super::types::{ChatChunk, ChatMessage, ChatRequest};
use crate::http::send;
use crate::prompt::RECIPE_SYSTEM_PROMPT;
use crate::providers::{decode_json, endpoint_url, http_client};
use crate::stream::{consume_ndjson, Frame};
use crate::{ChunkSink, CompletionProvider, ProviderResult};
use async_trait::async_trait;
use mealwise_core::{ProviderConfig, ProviderError};
use reqwest::{Client, RequestBuilder};

const PROVIDER: &str = "ollama";

/// Ollama chat client.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OllamaClient {
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        Ok(Self {
            client: http_client(PROVIDER)?,
            base_url: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone().unwrap_or_default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat(&self, prompt: &str, stream: bool) -> RequestBuilder {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::new("system", &RECIPE_SYSTEM_PROMPT),
                ChatMessage::new("user", prompt),
            ],
            stream,
        };
        let request = self
            .client
            .post(endpoint_url(&self.base_url, "api/chat"))
            .json(&body);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaClient {
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let response = send(PROVIDER, self.chat(prompt, false)).await?;
        let chunk: ChatChunk = decode_json(PROVIDER, response).await?;
        if let Some(error) = chunk.error {
            return Err(ProviderError::reported(PROVIDER, error));
        }
        chunk
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse {
                provider: PROVIDER.to_string(),
            })
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String> {
        let response = send(PROVIDER, self.chat(prompt, true)).await?;
        consume_ndjson(PROVIDER, response.bytes_stream(), sink, interpret_line).await
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

/// Interpret one NDJSON line of a chat stream.
pub(crate) fn interpret_line(line: &str) -> Result<Frame, String> {
    let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| e.to_string())?;
    if let Some(error) = chunk.error {
        return Ok(Frame::Error(error));
    }
    match chunk.message {
        Some(message) if !message.content.is_empty() => Ok(Frame::Chunk(message.content)),
        _ if chunk.done => Ok(Frame::Done),
        _ => Ok(Frame::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mealwise_core::ProviderKind;

    #[test]
    fn test_interpret_lines() {
        assert_eq!(
            interpret_line(r#"{"model":"qwen2","message":{"role":"assistant","content":"{\"na"},"done":false}"#),
            Ok(Frame::Chunk("{\"na".to_string()))
        );
        assert_eq!(
            interpret_line(r#"{"model":"qwen2","message":{"role":"assistant","content":""},"done":true,"total_duration":1}"#),
            Ok(Frame::Done)
        );
        assert_eq!(
            interpret_line(r#"{"error":"model 'qwen9' not found"}"#),
            Ok(Frame::Error("model 'qwen9' not found".to_string()))
        );
        assert_eq!(interpret_line(r#"{"done":false}"#), Ok(Frame::Skip));
        assert!(interpret_line("{\"message\":").is_err());
    }

    #[tokio::test]
    async fn test_ndjson_stream_split_mid_line() {
        let parts = vec![
            "{\"message\":{\"role\":\"assistant\",\"content\":\"番",
            "茄\"},\"done\":false}\n{\"message\":{\"role\":\"assistant\",\"content\":\"炒蛋\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        ];
        let body = futures_util::stream::iter(
            parts
                .into_iter()
                .map(|p| Ok::<_, std::io::Error>(Bytes::from(p)))
                .collect::<Vec<_>>(),
        );
        let mut chunks = Vec::new();
        let mut sink = |c: &str| chunks.push(c.to_string());
        let text = consume_ndjson(PROVIDER, body, &mut sink, interpret_line)
            .await
            .unwrap();
        assert_eq!(text, "番茄炒蛋");
        assert_eq!(chunks, vec!["番茄", "炒蛋"]);
    }

    #[test]
    fn test_from_config_without_api_key() {
        let config = ProviderConfig::new(ProviderKind::Ollama, "http://localhost:11434")
            .with_model("qwen2.5:7b");
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "qwen2.5:7b");
        assert_eq!(client.provider_id(), "ollama");
    }

    #[test]
    fn test_from_config_requires_model() {
        let config = ProviderConfig::new(ProviderKind::Ollama, "http://localhost:11434");
        assert!(matches!(
            OllamaClient::from_config(&config),
            Err(ProviderError::Misconfigured { .. })
        ));
    }
}
