//! Dietary preferences and recommendation requests.

use crate::ProviderKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A user's dietary profile as used to build prompts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct DietaryPreferences {
    #[serde(alias = "dietType")]
    pub diet_type: Vec<String>,
    #[serde(alias = "cuisineType")]
    pub cuisine_type: Vec<String>,
    pub allergies: Vec<String>,
    pub restrictions: Vec<String>,
    #[serde(alias = "caloriesMin")]
    pub calories_min: Option<u32>,
    #[serde(alias = "caloriesMax")]
    pub calories_max: Option<u32>,
    #[serde(alias = "maxCookingTime")]
    pub max_cooking_time: Option<u32>,
    #[serde(alias = "mealsPerDay")]
    pub meals_per_day: Option<u32>,
    /// Recipe names the user does not want suggested again.
    #[serde(alias = "excludedRecipes")]
    pub excluded_recipes: Vec<String>,
}

/// Meal of the day a recipe is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    /// The three slots of a daily plan, in serving order.
    pub const DAILY: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of every recommendation operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecommendationRequest {
    /// Required when `provider` is `custom`.
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub preferences: DietaryPreferences,
    /// Explicit provider choice. Falls back to the configured default.
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default, alias = "mealType")]
    pub meal_slot: Option<MealSlot>,
}

impl RecommendationRequest {
    pub fn new(preferences: DietaryPreferences) -> Self {
        Self {
            preferences,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_meal_slot(mut self, slot: MealSlot) -> Self {
        self.meal_slot = Some(slot);
        self
    }

    /// Stable hex digest of the request, used as a cache identifier.
    ///
    /// Two requests with the same preferences, provider, slot and user hash
    /// to the same value.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_accept_camel_case() {
        let json = r#"{
            "dietType": ["vegetarian"],
            "cuisineType": ["chinese"],
            "allergies": ["peanut"],
            "caloriesMin": 300,
            "caloriesMax": 800,
            "maxCookingTime": 45
        }"#;
        let prefs: DietaryPreferences = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.diet_type, vec!["vegetarian"]);
        assert_eq!(prefs.cuisine_type, vec!["chinese"]);
        assert_eq!(prefs.calories_min, Some(300));
        assert_eq!(prefs.calories_max, Some(800));
        assert_eq!(prefs.max_cooking_time, Some(45));
        assert!(prefs.restrictions.is_empty());
    }

    #[test]
    fn test_meal_slot_daily_order() {
        assert_eq!(
            MealSlot::DAILY,
            [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner]
        );
        assert_eq!(MealSlot::Dinner.to_string(), "dinner");
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let base = RecommendationRequest::new(DietaryPreferences {
            diet_type: vec!["keto".to_string()],
            ..Default::default()
        });
        assert_eq!(base.fingerprint(), base.clone().fingerprint());
        assert_eq!(base.fingerprint().len(), 64);

        let lunch = base.clone().with_meal_slot(MealSlot::Lunch);
        assert_ne!(base.fingerprint(), lunch.fingerprint());

        let other_user = base.clone().with_user("u2");
        assert_ne!(base.fingerprint(), other_user.fingerprint());
    }
}
