//! Mealwise Service Entry Point
//!
//! Loads configuration, connects the recipe store and cache, registers the
//! configured providers and arms the warmup scheduler, then waits for a
//! shutdown signal.

use std::sync::Arc;

use mealwise_api::telemetry::{init_tracing, TelemetryConfig};
use mealwise_api::{
    ApiError, ApiResult, AppConfig, CacheWarmupJob, RecommendationService, WarmupContext,
    WarmupScheduler,
};
use mealwise_core::MealwiseError;
use mealwise_llm::HttpProviderFactory;
use mealwise_storage::{CacheStore, InMemoryCacheBackend, PgRecipeStore, RedisCacheBackend};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = AppConfig::from_env()?;

    let store = Arc::new(PgRecipeStore::from_config(&config.db).map_err(MealwiseError::from)?);

    let cache = match config.redis.url.as_deref() {
        Some(url) => {
            let backend = RedisCacheBackend::connect(url)
                .await
                .map_err(MealwiseError::from)?;
            CacheStore::new(Arc::new(backend))
        }
        None => {
            tracing::warn!("MEALWISE_REDIS_URL not set, using in-process cache");
            CacheStore::new(Arc::new(InMemoryCacheBackend::new()))
        }
    };
    tracing::info!(backend = cache.backend_name(), "Cache ready");

    let recommendations = RecommendationService::from_config(
        &config.providers,
        store.clone(),
        Arc::new(HttpProviderFactory),
    )
    .with_cache(cache.clone(), config.cache_ttls.recommendation);
    tracing::info!(
        default_provider = recommendations.default_provider().as_str(),
        "Recommendation service ready"
    );

    let job = CacheWarmupJob::new(WarmupContext::new(
        store,
        cache,
        config.warmup.clone(),
        config.cache_ttls,
    ));
    let scheduler = WarmupScheduler::new(job, config.warmup.initial_delay, config.warmup.interval);
    scheduler.start();

    wait_for_shutdown().await?;
    tracing::info!("Shutdown signal received");

    scheduler.stop();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> ApiResult<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())
        .map_err(|e| ApiError::internal_error(format!("Failed to install SIGTERM handler: {}", e)))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| ApiError::internal_error(format!("Failed to listen for ctrl-c: {}", e)))
        }
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> ApiResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to listen for ctrl-c: {}", e)))
}
