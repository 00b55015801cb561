//! Coze v3 API request and response types

use crate::ProviderResult;
use mealwise_core::ProviderError;
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CreateChatRequest<'a> {
    pub bot_id: &'a str,
    pub user_id: &'a str,
    pub stream: bool,
    pub auto_save_history: bool,
    pub additional_messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
    pub content_type: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
            content_type: "text",
        }
    }
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Every Coze response wraps its payload with a business status code.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning a non-zero code into a reported error.
    pub fn into_data(self, provider: &str) -> ProviderResult<T> {
        if self.code != 0 {
            return Err(ProviderError::reported(
                provider,
                format!("code {}: {}", self.code, self.msg),
            ));
        }
        self.data
            .ok_or_else(|| ProviderError::malformed(provider, "response carries no data"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub status: ChatStatus,
    #[serde(default)]
    pub last_error: Option<LastError>,
}

impl ChatInfo {
    /// Message of the chat's last error, if it carries a non-empty one.
    pub fn error_message(&self) -> Option<String> {
        self.last_error
            .as_ref()
            .map(|e| e.msg.clone())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    #[default]
    Created,
    InProgress,
    Completed,
    Failed,
    RequiresAction,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ChatStatus {
    /// Statuses after which the chat will never produce an answer.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            ChatStatus::Failed | ChatStatus::RequiresAction | ChatStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageItem {
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl MessageItem {
    pub fn is_answer(&self) -> bool {
        self.role == "assistant" && self.kind == "answer"
    }
}
