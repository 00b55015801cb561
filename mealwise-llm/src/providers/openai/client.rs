//! OpenAI-compatible HTTP client

use super::types::{CompletionChunk, CompletionRequest, CompletionResponse, Message};
use crate::framing::SseEvent;
use crate::http::{error_message_from_value, send};
use crate::prompt::RECIPE_SYSTEM_PROMPT;
use crate::providers::{decode_json, endpoint_url, http_client};
use crate::stream::{consume_sse, Frame};
use crate::{ChunkSink, CompletionProvider, ProviderResult};
use async_trait::async_trait;
use mealwise_core::{ProviderConfig, ProviderError, ProviderKind};
use reqwest::{Client, RequestBuilder};

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Chat-completions client for one OpenAI-compatible provider.
pub struct OpenAiCompatibleClient {
    client: Client,
    kind: ProviderKind,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        let provider = config.kind.as_str();
        Ok(Self {
            client: http_client(provider)?,
            kind: config.kind,
            base_url: config.endpoint.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone().unwrap_or_default(),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completion(&self, prompt: &str, stream: bool) -> RequestBuilder {
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message::new("system", &RECIPE_SYSTEM_PROMPT),
                Message::new("user", prompt),
            ],
            stream,
            temperature: Some(DEFAULT_TEMPERATURE),
        };
        self.client
            .post(endpoint_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let provider = self.kind.as_str();
        let response = send(provider, self.completion(prompt, false)).await?;
        let body: CompletionResponse = decode_json(provider, response).await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse {
                provider: provider.to_string(),
            })
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String> {
        let provider = self.kind.as_str();
        let response = send(provider, self.completion(prompt, true)).await?;
        consume_sse(provider, response.bytes_stream(), sink, interpret_event).await
    }

    fn provider_id(&self) -> &str {
        self.kind.as_str()
    }
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// Interpret one chat-completions SSE event.
pub(crate) fn interpret_event(event: &SseEvent) -> Result<Frame, String> {
    let data = event.data.trim();
    if data == "[DONE]" {
        return Ok(Frame::Done);
    }
    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| e.to_string())?;
    if value.get("error").is_some_and(|e| !e.is_null()) {
        return Ok(Frame::Error(
            error_message_from_value(&value).unwrap_or_else(|| data.to_string()),
        ));
    }
    let chunk: CompletionChunk = serde_json::from_value(value).map_err(|e| e.to_string())?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .map(Frame::Chunk)
        .unwrap_or(Frame::Skip))
}
