//! Provider identities and connection settings.

use crate::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default delay between conversation status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of conversation status polls before giving up.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

// ============================================================================
// PROVIDER KIND
// ============================================================================

/// Text-generation backends a recommendation can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Coze,
    Ollama,
    Dify,
    Deepseek,
    Siliconflow,
    Ark,
    /// User supplied OpenAI-compatible endpoint, loaded from the user's settings.
    Custom,
}

/// Wire protocol family spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderProtocol {
    /// Create a chat, poll its status, then fetch the answer message.
    Conversation,
    /// Newline-delimited JSON frames.
    Ndjson,
    /// Server-sent events with Dify's event names.
    DifyEvents,
    /// Server-sent events in the OpenAI chat-completions format.
    OpenAiCompatible,
}

impl ProviderKind {
    /// Every provider kind.
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Coze,
        ProviderKind::Ollama,
        ProviderKind::Dify,
        ProviderKind::Deepseek,
        ProviderKind::Siliconflow,
        ProviderKind::Ark,
        ProviderKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Coze => "coze",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Dify => "dify",
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::Siliconflow => "siliconflow",
            ProviderKind::Ark => "ark",
            ProviderKind::Custom => "custom",
        }
    }

    pub fn protocol(&self) -> ProviderProtocol {
        match self {
            ProviderKind::Coze => ProviderProtocol::Conversation,
            ProviderKind::Ollama => ProviderProtocol::Ndjson,
            ProviderKind::Dify => ProviderProtocol::DifyEvents,
            ProviderKind::Deepseek
            | ProviderKind::Siliconflow
            | ProviderKind::Ark
            | ProviderKind::Custom => ProviderProtocol::OpenAiCompatible,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

// ============================================================================
// PROVIDER CONFIG
// ============================================================================

/// Everything needed to build a provider client.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Bot identifier, conversation providers only.
    pub bot_id: Option<String>,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, endpoint: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
            bot_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
    }

    /// Check that every field the provider's protocol needs is present.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let provider = self.kind.as_str();
        if self.endpoint.trim().is_empty() {
            return Err(ProviderError::misconfigured(provider, "missing api endpoint"));
        }
        let needs_key = self.kind != ProviderKind::Ollama;
        if needs_key && is_blank(&self.api_key) {
            return Err(ProviderError::misconfigured(provider, "missing api key"));
        }
        match self.kind.protocol() {
            ProviderProtocol::Conversation => {
                if is_blank(&self.bot_id) {
                    return Err(ProviderError::misconfigured(provider, "missing bot id"));
                }
                if self.max_poll_attempts == 0 {
                    return Err(ProviderError::misconfigured(
                        provider,
                        "max poll attempts must be at least 1",
                    ));
                }
            }
            ProviderProtocol::Ndjson | ProviderProtocol::OpenAiCompatible => {
                if is_blank(&self.model) {
                    return Err(ProviderError::misconfigured(provider, "missing model name"));
                }
            }
            ProviderProtocol::DifyEvents => {}
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("bot_id", &self.bot_id)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

// ============================================================================
// USER SETTINGS
// ============================================================================

/// Per-user provider settings row.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    pub llm_service: String,
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub is_paid: bool,
}

impl UserSettings {
    /// Build a provider configuration for the `custom` provider.
    ///
    /// Fails without touching the network when the row does not select the
    /// custom provider or lacks the key, endpoint or model name.
    pub fn custom_provider_config(&self) -> Result<ProviderConfig, ProviderError> {
        let provider = ProviderKind::Custom.as_str();
        if self.llm_service.parse::<ProviderKind>() != Ok(ProviderKind::Custom) {
            return Err(ProviderError::misconfigured(
                provider,
                format!(
                    "user {} has selected '{}', not the custom provider",
                    self.user_id, self.llm_service
                ),
            ));
        }
        let (Some(api_key), Some(endpoint), Some(model)) = (
            non_blank(&self.api_key),
            non_blank(&self.api_endpoint),
            non_blank(&self.model_name),
        ) else {
            return Err(ProviderError::misconfigured(
                provider,
                "custom provider requires api key, api endpoint and model name",
            ));
        };
        Ok(ProviderConfig::new(ProviderKind::Custom, endpoint)
            .with_api_key(api_key)
            .with_model(model))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Debug for UserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSettings")
            .field("user_id", &self.user_id)
            .field("llm_service", &self.llm_service)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_endpoint", &self.api_endpoint)
            .field("is_paid", &self.is_paid)
            .finish()
    }
}
