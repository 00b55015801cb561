//! Dify HTTP client

use super::types::{ChatMessagesRequest, StreamEvent};
use crate::framing::SseEvent;
use crate::http::send;
use crate::providers::{endpoint_url, http_client};
use crate::stream::{consume_sse, Frame};
use crate::{ChunkSink, CompletionProvider, ProviderResult};
use async_trait::async_trait;
use mealwise_core::ProviderConfig;
use reqwest::Client;
use serde_json::Map;

const PROVIDER: &str = "dify";

/// End-user identity Dify attributes the conversation to.
const DIFY_USER: &str = "recommendation-user";

/// Dify chat-messages client.
pub struct DifyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DifyClient {
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        Ok(Self {
            client: http_client(PROVIDER)?,
            base_url: config.endpoint.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CompletionProvider for DifyClient {
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let mut discard = |_: &str| {};
        self.stream_complete(prompt, &mut discard).await
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String> {
        let body = ChatMessagesRequest {
            inputs: Map::new(),
            query: prompt,
            response_mode: "streaming",
            conversation_id: "",
            user: DIFY_USER,
        };
        let request = self
            .client
            .post(endpoint_url(&self.base_url, "chat-messages"))
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send(PROVIDER, request).await?;
        consume_sse(PROVIDER, response.bytes_stream(), sink, interpret_event).await
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

impl std::fmt::Debug for DifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifyClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Interpret one Dify SSE event. The event name travels inside the JSON data.
pub(crate) fn interpret_event(event: &SseEvent) -> Result<Frame, String> {
    let data: StreamEvent = serde_json::from_str(&event.data).map_err(|e| e.to_string())?;
    match data.event.as_str() {
        "message" | "agent_message" => Ok(data
            .answer
            .map(Frame::Chunk)
            .unwrap_or(Frame::Skip)),
        "message_end" => Ok(Frame::Done),
        "error" => Ok(Frame::Error(data.error_message())),
        _ => Ok(Frame::Skip),
    }
}
