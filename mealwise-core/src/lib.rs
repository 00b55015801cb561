//! Mealwise Core - Data Model
//!
//! Recipe, preference, provider and warmup types shared by every other crate,
//! plus the error taxonomy and the recipe validator. This crate performs no
//! I/O.

pub mod error;
pub mod preferences;
pub mod provider;
pub mod recipe;
pub mod validate;
pub mod warmup;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use error::{
    CacheError, ConfigError, ErrorKind, MealwiseError, MealwiseResult, ProviderError,
    StoreError, TaskError, ValidationError,
};
pub use preferences::{DietaryPreferences, MealSlot, RecommendationRequest};
pub use provider::{
    ProviderConfig, ProviderKind, ProviderProtocol, UserSettings, DEFAULT_MAX_POLL_ATTEMPTS,
    DEFAULT_POLL_INTERVAL,
};
pub use recipe::{Ingredient, MealPlan, NutritionFacts, Recipe, RecipeStats, Step, StoredRecipe, Unit};
pub use validate::{strip_code_fence, RecipeParser};
pub use warmup::{
    SessionStatus, TaskDetails, TaskKind, TaskStatus, TaskSummary, WarmupSession, WarmupStatus,
    WarmupSummary, WarmupTask,
};

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
