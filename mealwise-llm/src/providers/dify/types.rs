//! Dify API request and response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessagesRequest<'a> {
    pub inputs: Map<String, Value>,
    pub query: &'a str,
    pub response_mode: &'a str,
    pub conversation_id: &'a str,
    pub user: &'a str,
}

/// One `data:` payload of the event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl StreamEvent {
    /// Human readable message of an `error` event.
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .filter(|m| !m.is_empty())
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}
