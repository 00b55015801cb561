//! Recommendation Service
//!
//! Turns a [`RecommendationRequest`] into validated recipes: resolves the
//! provider, builds the prompt, calls the provider and runs the answer
//! through [`RecipeParser`]. Provider and validation errors reach the caller
//! unchanged; there is no fallback to another provider.
//!
//! Provider resolution:
//! - the request's provider wins, else the configured default
//! - built-in providers come from the [`ProviderRegistry`]; one without
//!   configuration is misconfigured
//! - `custom` needs a user id and that user's settings row. The built client
//!   is kept in a single slot keyed by user id and replaced when another
//!   user asks.

use std::sync::Arc;
use std::time::Duration;

use mealwise_core::{
    DietaryPreferences, MealSlot, MealwiseResult, ProviderError, ProviderKind, Recipe,
    RecommendationRequest,
};
use mealwise_llm::{
    build_recipe_prompt, ChunkSink, CompletionProvider, ProviderFactory, ProviderRegistry,
    RecipeParser,
};
use mealwise_storage::{CacheKey, CacheStore, RecipeStore};
use tokio::sync::Mutex;

use crate::config::ProvidersConfig;
use crate::constants::DEFAULT_RECOMMENDATION_TTL_SECS;

/// Days in a weekly plan.
pub const WEEK_DAYS: usize = 7;

// ============================================================================
// CUSTOM PROVIDER SLOT
// ============================================================================

/// Single-slot cache of the last user's custom provider client.
#[derive(Default)]
pub struct CustomProviderSlot {
    slot: Mutex<Option<(String, Arc<dyn CompletionProvider>)>>,
}

impl CustomProviderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// User id whose client is currently held.
    pub async fn holder(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|(user, _)| user.clone())
    }

    async fn held_by(&self, user_id: &str) -> Option<Arc<dyn CompletionProvider>> {
        match self.slot.lock().await.as_ref() {
            Some((holder, provider)) if holder == user_id => Some(provider.clone()),
            _ => None,
        }
    }

    /// Drop the held client if it belongs to `user_id`.
    pub async fn invalidate(&self, user_id: &str) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|(user, _)| user == user_id) {
            *slot = None;
        }
    }
}

impl std::fmt::Debug for CustomProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomProviderSlot").finish_non_exhaustive()
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Generates recipe recommendations through the configured providers.
pub struct RecommendationService {
    registry: ProviderRegistry,
    default_provider: ProviderKind,
    store: Arc<dyn RecipeStore>,
    factory: Arc<dyn ProviderFactory>,
    cache: Option<CacheStore>,
    recommendation_ttl: Duration,
    custom: CustomProviderSlot,
}

impl RecommendationService {
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn RecipeStore>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            registry,
            default_provider: ProviderKind::Coze,
            store,
            factory,
            cache: None,
            recommendation_ttl: Duration::from_secs(DEFAULT_RECOMMENDATION_TTL_SECS),
            custom: CustomProviderSlot::new(),
        }
    }

    /// Build the registry from configuration with `factory`, which is also
    /// used for custom providers.
    pub fn from_config(
        config: &ProvidersConfig,
        store: Arc<dyn RecipeStore>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        let registry = ProviderRegistry::from_configs(config.providers.clone(), factory.as_ref());
        Self::new(registry, store, factory).with_default_provider(config.default_provider)
    }

    pub fn with_default_provider(mut self, kind: ProviderKind) -> Self {
        self.default_provider = kind;
        self
    }

    /// Cache non-streamed results for `ttl`.
    pub fn with_cache(mut self, cache: CacheStore, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.recommendation_ttl = ttl;
        self
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    pub fn custom_slot(&self) -> &CustomProviderSlot {
        &self.custom
    }

    // ========================================================================
    // Provider resolution
    // ========================================================================

    /// Provider the request will be served by.
    pub fn provider_kind(&self, request: &RecommendationRequest) -> ProviderKind {
        request.provider.unwrap_or(self.default_provider)
    }

    /// Resolve the provider client for `request`.
    ///
    /// Never touches the network: misconfiguration is reported before any
    /// provider call is made.
    pub async fn resolve_provider(
        &self,
        request: &RecommendationRequest,
    ) -> MealwiseResult<Arc<dyn CompletionProvider>> {
        match self.provider_kind(request) {
            ProviderKind::Custom => {
                let user_id = request
                    .user_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        ProviderError::misconfigured(
                            ProviderKind::Custom.as_str(),
                            "custom provider requires a user id",
                        )
                    })?;
                self.resolve_custom(user_id).await
            }
            kind => Ok(self.registry.get(kind)?),
        }
    }

    async fn resolve_custom(&self, user_id: &str) -> MealwiseResult<Arc<dyn CompletionProvider>> {
        if let Some(provider) = self.custom.held_by(user_id).await {
            return Ok(provider);
        }

        // The slot stays unlocked while settings are loaded and the client built.
        let settings = self.store.user_settings(user_id).await?.ok_or_else(|| {
            ProviderError::misconfigured(
                ProviderKind::Custom.as_str(),
                format!("no provider settings for user {}", user_id),
            )
        })?;
        let config = settings.custom_provider_config()?;
        let provider = self.factory.build(&config)?;

        let mut slot = self.custom.slot.lock().await;
        if let Some((holder, current)) = slot.as_ref() {
            if holder == user_id {
                return Ok(current.clone());
            }
        }
        tracing::info!(user_id, endpoint = %config.endpoint, "Custom provider initialized");
        *slot = Some((user_id.to_string(), provider.clone()));
        Ok(provider)
    }

    // ========================================================================
    // Generation
    // ========================================================================

    fn cache_key(&self, request: &RecommendationRequest) -> CacheKey {
        let mut keyed = request.clone();
        keyed.provider = Some(self.provider_kind(request));
        CacheKey::recommendation(&keyed.fingerprint())
    }

    async fn recommend_one(&self, request: &RecommendationRequest) -> MealwiseResult<Recipe> {
        let provider = self.resolve_provider(request).await?;

        let key = self.cache.as_ref().map(|_| self.cache_key(request));
        if let (Some(cache), Some(key)) = (self.cache.as_ref(), key.as_ref()) {
            if let Some(recipe) = cache.get::<Recipe>(key).await {
                tracing::debug!(key = %key, "Recommendation cache hit");
                return Ok(recipe);
            }
        }

        let prompt = build_recipe_prompt(&request.preferences, request.meal_slot);
        let raw = provider.complete(&prompt).await?;
        let recipe = parse_response(provider.as_ref(), &raw)?;

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), key.as_ref()) {
            cache.set(key, &recipe, self.recommendation_ttl).await;
        }
        Ok(recipe)
    }

    async fn stream_one(
        &self,
        request: &RecommendationRequest,
        sink: &mut dyn ChunkSink,
    ) -> MealwiseResult<Recipe> {
        let provider = self.resolve_provider(request).await?;
        let prompt = build_recipe_prompt(&request.preferences, request.meal_slot);
        let raw = provider.stream_complete(&prompt, sink).await?;
        Ok(parse_response(provider.as_ref(), &raw)?)
    }

    /// One recipe for the request's meal slot.
    pub async fn single_meal(&self, request: &RecommendationRequest) -> MealwiseResult<Recipe> {
        self.recommend_one(request).await
    }

    /// Breakfast, lunch and dinner, generated in that order. The first
    /// failure is returned.
    pub async fn daily_plan(&self, request: &RecommendationRequest) -> MealwiseResult<[Recipe; 3]> {
        let [breakfast, lunch, dinner] = MealSlot::DAILY;
        Ok([
            self.recommend_one(&for_slot(request, breakfast)).await?,
            self.recommend_one(&for_slot(request, lunch)).await?,
            self.recommend_one(&for_slot(request, dinner)).await?,
        ])
    }

    /// Seven daily plans. Recipes suggested on earlier days are excluded
    /// from later ones.
    pub async fn weekly_plan(
        &self,
        request: &RecommendationRequest,
    ) -> MealwiseResult<Vec<[Recipe; 3]>> {
        let mut day_request = request.clone();
        let mut week = Vec::with_capacity(WEEK_DAYS);
        for _ in 0..WEEK_DAYS {
            let day = self.daily_plan(&day_request).await?;
            exclude(&mut day_request.preferences, &day);
            week.push(day);
        }
        Ok(week)
    }

    /// Like [`single_meal`](Self::single_meal), forwarding text chunks to
    /// `sink` as they arrive. Never served from the cache.
    pub async fn stream_single_meal(
        &self,
        request: &RecommendationRequest,
        sink: &mut dyn ChunkSink,
    ) -> MealwiseResult<Recipe> {
        self.stream_one(request, sink).await
    }

    pub async fn stream_daily_plan(
        &self,
        request: &RecommendationRequest,
        sink: &mut dyn ChunkSink,
    ) -> MealwiseResult<[Recipe; 3]> {
        let [breakfast, lunch, dinner] = MealSlot::DAILY;
        Ok([
            self.stream_one(&for_slot(request, breakfast), sink).await?,
            self.stream_one(&for_slot(request, lunch), sink).await?,
            self.stream_one(&for_slot(request, dinner), sink).await?,
        ])
    }

    pub async fn stream_weekly_plan(
        &self,
        request: &RecommendationRequest,
        sink: &mut dyn ChunkSink,
    ) -> MealwiseResult<Vec<[Recipe; 3]>> {
        let mut day_request = request.clone();
        let mut week = Vec::with_capacity(WEEK_DAYS);
        for _ in 0..WEEK_DAYS {
            let day = self.stream_daily_plan(&day_request, sink).await?;
            exclude(&mut day_request.preferences, &day);
            week.push(day);
        }
        Ok(week)
    }
}

impl std::fmt::Debug for RecommendationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationService")
            .field("registry", &self.registry)
            .field("default_provider", &self.default_provider)
            .field("cached", &self.cache.is_some())
            .field("recommendation_ttl", &self.recommendation_ttl)
            .finish_non_exhaustive()
    }
}

fn for_slot(request: &RecommendationRequest, slot: MealSlot) -> RecommendationRequest {
    let mut request = request.clone();
    request.meal_slot = Some(slot);
    request
}

fn exclude(preferences: &mut DietaryPreferences, recipes: &[Recipe]) {
    for recipe in recipes {
        let name = recipe.name().to_string();
        if !preferences.excluded_recipes.contains(&name) {
            preferences.excluded_recipes.push(name);
        }
    }
}

fn parse_response(provider: &dyn CompletionProvider, raw: &str) -> MealwiseResult<Recipe> {
    RecipeParser::parse(raw).map_err(|e| {
        tracing::warn!(provider = provider.provider_id(), error = %e, "Provider returned an invalid recipe");
        e.into()
    })
}
