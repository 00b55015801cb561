//! Coze v3 HTTP client

use super::types::{ChatInfo, ChatMessage, ChatStatus, CreateChatRequest, Envelope, MessageItem};
use crate::framing::SseEvent;
use crate::http::{error_message_from_value, send};
use crate::providers::{decode_json, endpoint_url, http_client};
use crate::stream::{consume_sse, Frame};
use crate::{ChunkSink, CompletionProvider, ProviderResult};
use async_trait::async_trait;
use mealwise_core::{ProviderConfig, ProviderError};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

const PROVIDER: &str = "coze";

/// User identity attached to chats created by the service.
const DEFAULT_USER_ID: &str = "mealwise";

/// Coze v3 chat client.
pub struct CozeClient {
    client: Client,
    base_url: String,
    api_key: String,
    bot_id: String,
    user_id: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl CozeClient {
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        Ok(Self {
            client: http_client(PROVIDER)?,
            base_url: config.endpoint.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            bot_id: config.bot_id.clone().unwrap_or_default(),
            user_id: DEFAULT_USER_ID.to_string(),
            poll_interval: config.poll_interval,
            max_poll_attempts: config.max_poll_attempts,
        })
    }

    /// Attribute chats to a specific user instead of the service identity.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    fn chat_request<'a>(&'a self, prompt: &'a str, stream: bool) -> CreateChatRequest<'a> {
        CreateChatRequest {
            bot_id: &self.bot_id,
            user_id: &self.user_id,
            stream,
            auto_save_history: true,
            additional_messages: vec![ChatMessage::user(prompt)],
        }
    }

    async fn create_chat(&self, prompt: &str) -> ProviderResult<ChatInfo> {
        let request = self
            .client
            .post(endpoint_url(&self.base_url, "v3/chat"))
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(prompt, false));
        let response = send(PROVIDER, request).await?;
        decode_json::<Envelope<ChatInfo>>(PROVIDER, response)
            .await?
            .into_data(PROVIDER)
    }

    async fn retrieve_chat(&self, conversation_id: &str, chat_id: &str) -> ProviderResult<ChatInfo> {
        let request = self
            .client
            .get(endpoint_url(&self.base_url, "v3/chat/retrieve"))
            .bearer_auth(&self.api_key)
            .query(&[("conversation_id", conversation_id), ("chat_id", chat_id)]);
        let response = send(PROVIDER, request).await?;
        decode_json::<Envelope<ChatInfo>>(PROVIDER, response)
            .await?
            .into_data(PROVIDER)
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        chat_id: &str,
    ) -> ProviderResult<Vec<MessageItem>> {
        let request = self
            .client
            .get(endpoint_url(&self.base_url, "v3/chat/message/list"))
            .bearer_auth(&self.api_key)
            .query(&[("conversation_id", conversation_id), ("chat_id", chat_id)]);
        let response = send(PROVIDER, request).await?;
        decode_json::<Envelope<Vec<MessageItem>>>(PROVIDER, response)
            .await?
            .into_data(PROVIDER)
    }
}

#[async_trait]
impl CompletionProvider for CozeClient {
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let chat = self.create_chat(prompt).await?;
        let conversation_id = chat.conversation_id.as_str();
        let chat_id = chat.id.as_str();
        tracing::debug!(conversation_id, chat_id, "Coze chat created");

        poll_until_complete(self.poll_interval, self.max_poll_attempts, move || {
            self.retrieve_chat(conversation_id, chat_id)
        })
        .await?;

        let messages = self.list_messages(conversation_id, chat_id).await?;
        answer_content(messages)
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String> {
        let request = self
            .client
            .post(endpoint_url(&self.base_url, "v3/chat"))
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(prompt, true));
        let response = send(PROVIDER, request).await?;
        consume_sse(PROVIDER, response.bytes_stream(), sink, interpret_event).await
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

impl std::fmt::Debug for CozeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CozeClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("bot_id", &self.bot_id)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

/// Poll a chat until it completes.
///
/// Each call to `retrieve` counts as one attempt. The delay is only applied
/// between attempts, so a chat that is already complete costs no sleep.
pub(crate) async fn poll_until_complete<F, Fut>(
    interval: Duration,
    max_attempts: u32,
    mut retrieve: F,
) -> ProviderResult<ChatInfo>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<ChatInfo>>,
{
    for attempt in 1..=max_attempts {
        let chat = retrieve().await?;
        match chat.status {
            ChatStatus::Completed => {
                tracing::debug!(attempt, "Coze chat completed");
                return Ok(chat);
            }
            status if status.is_terminal_failure() => {
                let message = chat
                    .error_message()
                    .unwrap_or_else(|| format!("chat ended with status {:?}", status));
                return Err(ProviderError::reported(PROVIDER, message));
            }
            status => {
                tracing::trace!(attempt, ?status, "Coze chat still running");
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    tracing::warn!(attempts = max_attempts, "Coze chat did not complete in time");
    Err(ProviderError::Timeout {
        provider: PROVIDER.to_string(),
        attempts: max_attempts,
    })
}

/// Content of the assistant's answer message.
pub(crate) fn answer_content(messages: Vec<MessageItem>) -> ProviderResult<String> {
    messages
        .into_iter()
        .find(MessageItem::is_answer)
        .map(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ProviderError::EmptyResponse {
            provider: PROVIDER.to_string(),
        })
}

/// Interpret one Coze SSE event.
pub(crate) fn interpret_event(event: &SseEvent) -> Result<Frame, String> {
    match event.event.as_deref() {
        Some("conversation.message.delta") => {
            let message: MessageItem =
                serde_json::from_str(&event.data).map_err(|e| e.to_string())?;
            if message.kind.is_empty() || message.kind == "answer" {
                Ok(Frame::Chunk(message.content))
            } else {
                Ok(Frame::Skip)
            }
        }
        Some("conversation.chat.completed") | Some("done") => Ok(Frame::Done),
        Some("conversation.chat.failed") => {
            let chat: ChatInfo = serde_json::from_str(&event.data).map_err(|e| e.to_string())?;
            Ok(Frame::Error(
                chat.error_message()
                    .unwrap_or_else(|| "chat failed".to_string()),
            ))
        }
        Some("error") => {
            let message = serde_json::from_str::<serde_json::Value>(&event.data)
                .ok()
                .and_then(|v| error_message_from_value(&v))
                .unwrap_or_else(|| event.data.clone());
            Ok(Frame::Error(message))
        }
        _ if event.data.trim() == "[DONE]" => Ok(Frame::Done),
        _ => Ok(Frame::Skip),
    }
}
