//! Mealwise LLM - Recipe Provider Layer
//!
//! One capability trait for every text-generation backend, the protocol
//! clients implementing it, and the framing and aggregation code they share.
//! Providers must be registered explicitly; there is no discovery.

pub mod framing;
pub mod http;
pub mod prompt;
pub mod providers;
pub mod stream;

pub use framing::{EventBuffer, LineBuffer, SseEvent};
pub use mealwise_core::{strip_code_fence, RecipeParser};
pub use prompt::{build_recipe_prompt, RECIPE_SYSTEM_PROMPT};
pub use providers::{CozeClient, DifyClient, OllamaClient, OpenAiCompatibleClient};
pub use stream::Frame;

use async_trait::async_trait;
use mealwise_core::{ProviderConfig, ProviderError, ProviderKind, ProviderProtocol};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// CHUNK SINK
// ============================================================================

/// Receiver of streamed text chunks, in arrival order.
pub trait ChunkSink: Send {
    fn on_chunk(&mut self, chunk: &str);
}

impl<F> ChunkSink for F
where
    F: FnMut(&str) + Send,
{
    fn on_chunk(&mut self, chunk: &str) {
        self(chunk)
    }
}

// ============================================================================
// COMPLETION PROVIDER TRAIT
// ============================================================================

/// A text-generation backend that turns a prompt into text.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate the full response for `prompt`.
    async fn complete(&self, prompt: &str) -> ProviderResult<String>;

    /// Generate the response for `prompt`, forwarding each text chunk to
    /// `sink` as it arrives. Returns the concatenation of delivered chunks.
    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String>;

    /// Identifier used in logs and errors.
    fn provider_id(&self) -> &str;
}

// ============================================================================
// PROVIDER CLIENT
// ============================================================================

/// A built-in protocol client, chosen by the provider kind's protocol.
#[derive(Debug)]
pub enum ProviderClient {
    Conversation(CozeClient),
    Ndjson(OllamaClient),
    DifyEvents(DifyClient),
    OpenAiCompatible(OpenAiCompatibleClient),
}

impl ProviderClient {
    /// Build the client for `config`. Fails before any network call when the
    /// configuration is incomplete.
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        Ok(match config.kind.protocol() {
            ProviderProtocol::Conversation => Self::Conversation(CozeClient::from_config(config)?),
            ProviderProtocol::Ndjson => Self::Ndjson(OllamaClient::from_config(config)?),
            ProviderProtocol::DifyEvents => Self::DifyEvents(DifyClient::from_config(config)?),
            ProviderProtocol::OpenAiCompatible => {
                Self::OpenAiCompatible(OpenAiCompatibleClient::from_config(config)?)
            }
        })
    }

    fn inner(&self) -> &dyn CompletionProvider {
        match self {
            Self::Conversation(client) => client,
            Self::Ndjson(client) => client,
            Self::DifyEvents(client) => client,
            Self::OpenAiCompatible(client) => client,
        }
    }
}

#[async_trait]
impl CompletionProvider for ProviderClient {
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        self.inner().complete(prompt).await
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String> {
        self.inner().stream_complete(prompt, sink).await
    }

    fn provider_id(&self) -> &str {
        self.inner().provider_id()
    }
}

// ============================================================================
// PROVIDER FACTORY
// ============================================================================

/// Builds provider clients from configuration.
///
/// The recommendation service builds per-user clients through this seam, so
/// tests can hand out scripted providers instead of HTTP clients.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, config: &ProviderConfig) -> ProviderResult<Arc<dyn CompletionProvider>>;
}

/// Factory producing the built-in HTTP clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, config: &ProviderConfig) -> ProviderResult<Arc<dyn CompletionProvider>> {
        Ok(Arc::new(ProviderClient::from_config(config)?))
    }
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Process-wide providers, keyed by kind.
///
/// # Example
/// ```ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register(ProviderKind::Deepseek, Arc::new(client));
/// let provider = registry.get(ProviderKind::Deepseek)?;
/// ```
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Build every configured provider with `factory`.
    ///
    /// Invalid configurations are logged and left unregistered, so requests
    /// for that provider fail as misconfigured instead of aborting startup.
    pub fn from_configs<I>(configs: I, factory: &dyn ProviderFactory) -> Self
    where
        I: IntoIterator<Item = ProviderConfig>,
    {
        let mut registry = Self::new();
        for config in configs {
            match factory.build(&config) {
                Ok(provider) => {
                    tracing::info!(provider = config.kind.as_str(), endpoint = %config.endpoint, "Registered provider");
                    registry.register(config.kind, provider);
                }
                Err(e) => {
                    tracing::warn!(provider = config.kind.as_str(), error = %e, "Provider not registered");
                }
            }
        }
        registry
    }

    /// Register a provider, replacing any previous one of the same kind.
    pub fn register(&mut self, kind: ProviderKind, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(kind, provider);
    }

    /// Get the provider registered for `kind`.
    pub fn get(&self, kind: ProviderKind) -> ProviderResult<Arc<dyn CompletionProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::misconfigured(kind.as_str(), "provider is not configured"))
    }

    pub fn has(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Registered kinds, in declaration order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.kinds())
            .finish()
    }
}

// ============================================================================
// MOCK PROVIDER FOR TESTING
// ============================================================================

/// Scripted provider for tests.
///
/// Responses are served in script order; once the script is exhausted every
/// call gets the fallback. Streaming splits the response into chunks of
/// `chunk_chars` characters.
pub struct MockCompletionProvider {
    id: String,
    script: Mutex<VecDeque<ProviderResult<String>>>,
    fallback: ProviderResult<String>,
    chunk_chars: usize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionProvider {
    /// A provider that always answers `response`.
    pub fn new(id: impl Into<String>, response: impl Into<String>) -> Self {
        Self::with_fallback(id, Ok(response.into()))
    }

    /// A provider that always fails with `error`.
    pub fn failing(id: impl Into<String>, error: ProviderError) -> Self {
        Self::with_fallback(id, Err(error))
    }

    fn with_fallback(id: impl Into<String>, fallback: ProviderResult<String>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(VecDeque::new()),
            fallback,
            chunk_chars: 8,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Serve `responses` in order before falling back.
    pub fn with_script(mut self, responses: Vec<ProviderResult<String>>) -> Self {
        self.script = Mutex::new(responses.into());
        self
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    /// Number of completed or streamed calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    async fn next_response(&self, prompt: &str) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        let scripted = self.script.lock().await.pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        self.next_response(prompt).await
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        sink: &mut dyn ChunkSink,
    ) -> ProviderResult<String> {
        let text = self.next_response(prompt).await?;
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(self.chunk_chars) {
            let chunk: String = chunk.iter().collect();
            sink.on_chunk(&chunk);
        }
        Ok(text)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for MockCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCompletionProvider")
            .field("id", &self.id)
            .field("calls", &self.call_count())
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct MockFactory;

    impl ProviderFactory for MockFactory {
        fn build(&self, config: &ProviderConfig) -> ProviderResult<Arc<dyn CompletionProvider>> {
            config.validate()?;
            Ok(Arc::new(MockCompletionProvider::new(config.kind.as_str(), "{}")))
        }
    }

    fn deepseek() -> ProviderConfig {
        ProviderConfig::new(ProviderKind::Deepseek, "https://api.deepseek.com/v1")
            .with_api_key("sk")
            .with_model("deepseek-chat")
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.has(ProviderKind::Coze));
    }

    #[test]
    fn test_registry_get_unregistered_is_misconfigured() {
        let registry = ProviderRegistry::new();
        let err = registry.get(ProviderKind::Ark).err();
        assert!(matches!(err, Some(ProviderError::Misconfigured { provider, .. }) if provider == "ark"));
    }

    #[test]
    fn test_registry_register_and_replace() {
        let mut registry = ProviderRegistry::new();
        registry.register(ProviderKind::Coze, Arc::new(MockCompletionProvider::new("first", "a")));
        registry.register(ProviderKind::Coze, Arc::new(MockCompletionProvider::new("second", "b")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ProviderKind::Coze).unwrap().provider_id(), "second");
    }

    #[test]
    fn test_registry_from_configs_skips_invalid() {
        let missing_bot = ProviderConfig::new(ProviderKind::Coze, "https://api.coze.cn")
            .with_api_key("pat");
        let registry = ProviderRegistry::from_configs(vec![deepseek(), missing_bot], &MockFactory);
        assert_eq!(registry.kinds(), vec![ProviderKind::Deepseek]);
        assert!(registry.get(ProviderKind::Coze).is_err());
    }

    #[test]
    fn test_provider_client_dispatch() {
        let client = ProviderClient::from_config(&deepseek()).unwrap();
        assert!(matches!(client, ProviderClient::OpenAiCompatible(_)));
        assert_eq!(client.provider_id(), "deepseek");

        let ollama = ProviderConfig::new(ProviderKind::Ollama, "http://localhost:11434")
            .with_model("qwen2.5");
        let client = ProviderClient::from_config(&ollama).unwrap();
        assert!(matches!(client, ProviderClient::Ndjson(_)));

        let dify = ProviderConfig::new(ProviderKind::Dify, "https://dify.example.com/v1")
            .with_api_key("app");
        let client = ProviderClient::from_config(&dify).unwrap();
        assert_eq!(client.provider_id(), "dify");
    }

    #[test]
    fn test_http_factory_rejects_incomplete_custom() {
        let config = ProviderConfig::new(ProviderKind::Custom, "https://llm.example.com/v1")
            .with_api_key("sk");
        assert!(matches!(
            HttpProviderFactory.build(&config).err(),
            Some(ProviderError::Misconfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_script_then_fallback() {
        let mock = MockCompletionProvider::new("mock", "fallback").with_script(vec![
            Ok("first".to_string()),
            Err(ProviderError::EmptyResponse {
                provider: "mock".to_string(),
            }),
        ]);
        assert_eq!(mock.complete("p1").await.unwrap(), "first");
        assert!(mock.complete("p2").await.is_err());
        assert_eq!(mock.complete("p3").await.unwrap(), "fallback");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.prompts().await, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_mock_stream_chunks_in_order() {
        let mock = MockCompletionProvider::new("mock", "番茄炒蛋盖饭").with_chunk_chars(2);
        let mut chunks = Vec::new();
        let mut sink = |c: &str| chunks.push(c.to_string());
        let text = mock.stream_complete("p", &mut sink).await.unwrap();
        assert_eq!(text, "番茄炒蛋盖饭");
        assert_eq!(chunks, vec!["番茄", "炒蛋", "盖饭"]);
    }
}
