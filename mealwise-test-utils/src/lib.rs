//! Mealwise Test Utilities
//!
//! Centralized test infrastructure for the Mealwise workspace:
//! - Proptest generators for recipes, preferences and store rows
//! - Test doubles for providers, provider factories and cache backends
//! - Test fixtures for common scenarios
//! - Custom assertions for error classification

// Re-export doubles from their source crates
pub use mealwise_llm::MockCompletionProvider;
pub use mealwise_storage::{InMemoryCacheBackend, MockRecipeStore, RecipeQuery};

// Re-export core types for convenience
pub use mealwise_core::{
    CacheError, DietaryPreferences, ErrorKind, MealSlot, MealwiseError, MealwiseResult,
    ProviderConfig, ProviderError, ProviderKind, RecommendationRequest, StoredRecipe, TaskKind,
    Timestamp, Unit, UserSettings,
};

use async_trait::async_trait;
use chrono::Utc;
use mealwise_llm::{CompletionProvider, ProviderFactory, ProviderResult};
use mealwise_storage::{CacheBackend, CacheResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// Provider factory that hands out one shared provider and records every
/// configuration it was asked to build.
pub struct RecordingProviderFactory {
    provider: Arc<dyn CompletionProvider>,
    builds: AtomicUsize,
    configs: Mutex<Vec<ProviderConfig>>,
}

impl RecordingProviderFactory {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            builds: AtomicUsize::new(0),
            configs: Mutex::new(Vec::new()),
        }
    }

    /// Number of successful builds.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Configurations received so far, in call order.
    pub fn configs(&self) -> Vec<ProviderConfig> {
        self.configs
            .lock()
            .map(|configs| configs.clone())
            .unwrap_or_default()
    }
}

impl ProviderFactory for RecordingProviderFactory {
    fn build(&self, config: &ProviderConfig) -> ProviderResult<Arc<dyn CompletionProvider>> {
        config.validate()?;
        if let Ok(mut configs) = self.configs.lock() {
            configs.push(config.clone());
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.provider))
    }
}

impl std::fmt::Debug for RecordingProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingProviderFactory")
            .field("provider", &self.provider.provider_id())
            .field("builds", &self.build_count())
            .finish()
    }
}

/// Cache backend whose every operation fails.
#[derive(Debug, Clone, Default)]
pub struct FailingCacheBackend;

impl FailingCacheBackend {
    fn error() -> CacheError {
        CacheError::Backend {
            reason: "cache unavailable".to_string(),
        }
    }
}

#[async_trait]
impl CacheBackend for FailingCacheBackend {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(Self::error())
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Err(Self::error())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(Self::error())
    }

    async fn delete_prefix(&self, _prefix: &str) -> CacheResult<u64> {
        Err(Self::error())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Mealwise data.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Generate a valid UUIDv7 (timestamp-sortable).
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // Generate timestamps within a reasonable range (2020-2030)
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    // === Enum Generators ===

    pub fn arb_unit() -> impl Strategy<Value = Unit> {
        prop::sample::select(Unit::ALL.to_vec())
    }

    pub fn arb_provider_kind() -> impl Strategy<Value = ProviderKind> {
        prop::sample::select(ProviderKind::ALL.to_vec())
    }

    pub fn arb_meal_slot() -> impl Strategy<Value = MealSlot> {
        prop_oneof![
            Just(MealSlot::Breakfast),
            Just(MealSlot::Lunch),
            Just(MealSlot::Dinner),
            Just(MealSlot::Snack),
        ]
    }

    pub fn arb_task_kind() -> impl Strategy<Value = TaskKind> {
        prop::sample::select(TaskKind::ALL.to_vec())
    }

    pub fn arb_cuisine() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["chinese", "western", "japanese", "korean", "thai"])
            .prop_map(str::to_string)
    }

    // === Recipe Payload Generators ===

    /// Generate one well-formed ingredient object.
    pub fn arb_ingredient_json() -> impl Strategy<Value = Value> {
        ("[a-z]{1,12}", 1u32..2000, arb_unit()).prop_map(|(name, tenths, unit)| {
            json!({
                "name": name,
                "amount": f64::from(tenths) / 10.0,
                "unit": unit.as_str(),
            })
        })
    }

    /// Generate a well-formed nutrition object.
    pub fn arb_nutrition_json() -> impl Strategy<Value = Value> {
        (0u32..200, 0u32..200, 0u32..400, 0u32..60).prop_map(|(protein, fat, carbs, fiber)| {
            json!({ "protein": protein, "fat": fat, "carbs": carbs, "fiber": fiber })
        })
    }

    /// Generate a recipe object every validator rule accepts.
    pub fn arb_recipe_json() -> impl Strategy<Value = Value> {
        (
            "[a-zA-Z]{1,20}",
            prop::collection::vec(arb_ingredient_json(), 1..8),
            prop::collection::vec("[a-z ]{1,30}", 1..6),
            0u32..2000,
            1u32..240,
            arb_nutrition_json(),
            prop::option::of(arb_cuisine()),
        )
            .prop_map(
                |(name, ingredients, steps, calories, cooking_time, nutrition, cuisine)| {
                    let mut recipe = json!({
                        "name": name,
                        "ingredients": ingredients,
                        "steps": steps,
                        "calories": calories,
                        "cooking_time": cooking_time,
                        "nutrition_facts": nutrition,
                    });
                    if let (Some(cuisine), Some(obj)) = (cuisine, recipe.as_object_mut()) {
                        obj.insert("cuisine_type".to_string(), Value::String(cuisine));
                    }
                    recipe
                },
            )
    }

    /// Generate provider output for a valid recipe, fenced or bare.
    pub fn arb_recipe_payload() -> impl Strategy<Value = String> {
        (arb_recipe_json(), any::<bool>()).prop_map(|(recipe, fenced)| {
            let body = recipe.to_string();
            if fenced {
                format!("```json\n{}\n```", body)
            } else {
                body
            }
        })
    }

    // === Store Row Generators ===

    pub fn arb_stored_recipe() -> impl Strategy<Value = StoredRecipe> {
        (
            "[a-zA-Z ]{1,30}",
            prop::option::of(arb_cuisine()),
            prop::option::of(1i32..240),
            0i64..500,
            arb_timestamp(),
        )
            .prop_map(|(name, cuisine, cooking_time, favorites, created_at)| {
                let mut recipe = fixtures::stored_recipe(&name, cuisine.as_deref(), favorites);
                recipe.cooking_time = cooking_time;
                recipe.created_at = created_at;
                recipe.updated_at = created_at;
                recipe
            })
    }

    pub fn arb_preferences() -> impl Strategy<Value = DietaryPreferences> {
        (
            prop::collection::vec("[a-z]{3,10}", 0..3),
            prop::collection::vec(arb_cuisine(), 0..3),
            prop::collection::vec("[a-z]{3,10}", 0..3),
            prop::option::of(100u32..600),
            prop::option::of(10u32..120),
        )
            .prop_map(
                |(diet_type, cuisine_type, allergies, calories_min, max_cooking_time)| {
                    DietaryPreferences {
                        diet_type,
                        cuisine_type,
                        allergies,
                        calories_min,
                        calories_max: calories_min.map(|min| min + 400),
                        max_cooking_time,
                        ..Default::default()
                    }
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Fenced soup recipe that passes validation.
    pub const SOUP_PAYLOAD: &str = "```json\n{\"name\":\"Soup\", \"ingredients\":[{\"name\":\"水\",\"amount\":1,\"unit\":\"升\"}], \"calories\":100, \"cooking_time\":10, \"nutrition_facts\":{\"protein\":1,\"fat\":1,\"carbs\":1,\"fiber\":1}, \"steps\":[\"煮\"]}\n```";

    /// [`SOUP_PAYLOAD`] with its only unit replaced.
    pub fn soup_payload_with_unit(unit: &str) -> String {
        SOUP_PAYLOAD.replace("\"升\"", &format!("\"{}\"", unit))
    }

    /// A valid, unfenced recipe payload named `name`.
    pub fn recipe_payload(name: &str) -> String {
        serde_json::json!({
            "name": name,
            "ingredients": [
                { "name": "鸡蛋", "amount": 2, "unit": "个" },
                { "name": "番茄", "amount": 300, "unit": "克" }
            ],
            "calories": 320,
            "cookingTime": 15,
            "nutritionFacts": { "protein": 14, "fat": 12, "carbohydrates": 18, "fiber": 3 },
            "steps": ["切块", "翻炒"],
            "cuisine_type": "chinese",
            "diet_type": ["balanced"]
        })
        .to_string()
    }

    /// A stored recipe row created now.
    pub fn stored_recipe(name: &str, cuisine: Option<&str>, favorite_count: i64) -> StoredRecipe {
        let now = Utc::now();
        StoredRecipe {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            ingredients: serde_json::json!([{ "name": "盐", "amount": 1, "unit": "茶匙" }]),
            steps: serde_json::json!(["prepare"]),
            calories: Some(350),
            cooking_time: Some(25),
            nutrition_facts: serde_json::json!({ "protein": 10, "fat": 5, "carbs": 40, "fiber": 4 }),
            cuisine_type: cuisine.map(str::to_string),
            diet_type: vec![],
            created_by: None,
            created_at: now,
            updated_at: now,
            views: 0,
            img: None,
            favorite_count,
        }
    }

    /// A small catalogue covering four cuisines, with distinct favorite
    /// counts and creation times.
    pub fn sample_catalogue() -> Vec<StoredRecipe> {
        let cuisines = ["chinese", "western", "japanese", "korean"];
        let now = Utc::now();
        (0..12)
            .map(|i| {
                let mut recipe = stored_recipe(
                    &format!("recipe-{:02}", i),
                    Some(cuisines[i % cuisines.len()]),
                    (i as i64 * 7) % 13,
                );
                recipe.created_at = now - chrono::Duration::hours(i as i64);
                recipe.updated_at = recipe.created_at;
                recipe.cooking_time = Some(10 + i as i32 * 5);
                recipe
            })
            .collect()
    }

    /// Settings row selecting a complete custom provider.
    pub fn custom_settings(user_id: &str) -> UserSettings {
        UserSettings {
            user_id: user_id.to_string(),
            llm_service: "custom".to_string(),
            model_name: Some("qwen2.5-7b".to_string()),
            api_key: Some(format!("sk-{}", user_id)),
            api_endpoint: Some("https://llm.example.com/v1".to_string()),
            is_paid: true,
        }
    }

    pub fn sample_preferences() -> DietaryPreferences {
        DietaryPreferences {
            diet_type: vec!["balanced".to_string()],
            cuisine_type: vec!["chinese".to_string()],
            allergies: vec!["peanut".to_string()],
            restrictions: vec![],
            calories_min: Some(300),
            calories_max: Some(700),
            max_cooking_time: Some(30),
            meals_per_day: Some(3),
            excluded_recipes: vec![],
        }
    }

    /// Configuration of a fully specified OpenAI-compatible provider.
    pub fn deepseek_config() -> ProviderConfig {
        ProviderConfig::new(ProviderKind::Deepseek, "https://api.deepseek.com")
            .with_api_key("sk-test")
            .with_model("deepseek-chat")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over the user-visible error classification.

    use super::*;

    #[track_caller]
    pub fn assert_error_kind<T: std::fmt::Debug>(result: &MealwiseResult<T>, expected: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), expected, "unexpected error kind for {:?}", e),
            Ok(value) => panic!("Expected {:?} error, got Ok: {:?}", expected, value),
        }
    }

    #[track_caller]
    pub fn assert_misconfigured<T: std::fmt::Debug>(result: &MealwiseResult<T>) {
        assert_error_kind(result, ErrorKind::ProviderMisconfigured);
    }

    #[track_caller]
    pub fn assert_upstream_failure<T: std::fmt::Debug>(result: &MealwiseResult<T>) {
        assert_error_kind(result, ErrorKind::UpstreamFailure);
    }

    #[track_caller]
    pub fn assert_unparseable<T: std::fmt::Debug>(result: &MealwiseResult<T>) {
        assert_error_kind(result, ErrorKind::UnparseableRecipe);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealwise_core::RecipeParser;
    use proptest::prelude::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_soup_fixture_validates() {
        assert!(RecipeParser::parse(fixtures::SOUP_PAYLOAD).is_ok());
        assert!(RecipeParser::parse(&fixtures::soup_payload_with_unit("杓")).is_err());
    }

    #[test]
    fn test_recipe_payload_fixture_validates() {
        let recipe = RecipeParser::parse(&fixtures::recipe_payload("番茄炒蛋")).unwrap();
        assert_eq!(recipe.name(), "番茄炒蛋");
        assert_eq!(recipe.cooking_time(), 15);
    }

    #[test]
    fn test_generated_payloads_validate() {
        let mut runner = TestRunner::default();
        for _ in 0..20 {
            let payload = generators::arb_recipe_payload()
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(RecipeParser::parse(&payload).is_ok(), "{}", payload);
        }
    }

    #[test]
    fn test_sample_catalogue_shape() {
        let catalogue = fixtures::sample_catalogue();
        assert_eq!(catalogue.len(), 12);
        assert!(catalogue.iter().all(|r| r.cuisine_type.is_some()));
    }

    #[tokio::test]
    async fn test_recording_factory_validates_and_counts() {
        let provider: Arc<dyn CompletionProvider> =
            Arc::new(MockCompletionProvider::new("custom", "{}"));
        let factory = RecordingProviderFactory::new(provider);

        let incomplete = ProviderConfig::new(ProviderKind::Custom, "https://x");
        assert!(factory.build(&incomplete).is_err());
        assert_eq!(factory.build_count(), 0);

        let built = factory.build(&fixtures::deepseek_config()).ok();
        assert_eq!(built.map(|p| p.provider_id().to_string()).as_deref(), Some("custom"));
        assert_eq!(factory.build_count(), 1);
        assert_eq!(factory.configs()[0].kind, ProviderKind::Deepseek);
    }

    #[tokio::test]
    async fn test_failing_cache_backend() {
        let backend = FailingCacheBackend;
        assert!(backend.get("recipe:1").await.is_err());
        assert!(backend.delete_prefix("recipe").await.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_arb_recipe_json_validates(recipe in generators::arb_recipe_json()) {
            prop_assert!(RecipeParser::from_value(&recipe).is_ok());
        }
    }
}
