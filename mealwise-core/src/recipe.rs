//! Recipe data model.
//!
//! A [`Recipe`] can only be obtained through [`crate::RecipeParser`] (or by
//! deserializing, which runs the same validation), so every value of the type
//! has already passed the structural checks.

use crate::{MealSlot, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// UNIT VOCABULARY
// ============================================================================

/// Measurement units accepted for ingredient amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Unit {
    #[serde(rename = "克")]
    Gram,
    #[serde(rename = "千克")]
    Kilogram,
    #[serde(rename = "毫升")]
    Milliliter,
    #[serde(rename = "升")]
    Liter,
    #[serde(rename = "个")]
    Piece,
    #[serde(rename = "勺")]
    Spoon,
    #[serde(rename = "杯")]
    Cup,
    #[serde(rename = "片")]
    Slice,
    #[serde(rename = "根")]
    Stalk,
    #[serde(rename = "块")]
    Chunk,
    #[serde(rename = "粒")]
    Grain,
    #[serde(rename = "包")]
    Pack,
    #[serde(rename = "袋")]
    Bag,
    #[serde(rename = "瓶")]
    Bottle,
    #[serde(rename = "盒")]
    Carton,
    #[serde(rename = "条")]
    Strip,
    #[serde(rename = "瓣")]
    Clove,
    #[serde(rename = "茶匙")]
    Teaspoon,
    #[serde(rename = "汤匙")]
    Tablespoon,
}

impl Unit {
    /// Every unit in the vocabulary, in prompt order.
    pub const ALL: [Unit; 19] = [
        Unit::Gram,
        Unit::Kilogram,
        Unit::Milliliter,
        Unit::Liter,
        Unit::Piece,
        Unit::Spoon,
        Unit::Cup,
        Unit::Slice,
        Unit::Stalk,
        Unit::Chunk,
        Unit::Grain,
        Unit::Pack,
        Unit::Bag,
        Unit::Bottle,
        Unit::Carton,
        Unit::Strip,
        Unit::Clove,
        Unit::Teaspoon,
        Unit::Tablespoon,
    ];

    /// The symbol providers are asked to emit.
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Gram => "克",
            Unit::Kilogram => "千克",
            Unit::Milliliter => "毫升",
            Unit::Liter => "升",
            Unit::Piece => "个",
            Unit::Spoon => "勺",
            Unit::Cup => "杯",
            Unit::Slice => "片",
            Unit::Stalk => "根",
            Unit::Chunk => "块",
            Unit::Grain => "粒",
            Unit::Pack => "包",
            Unit::Bag => "袋",
            Unit::Bottle => "瓶",
            Unit::Carton => "盒",
            Unit::Strip => "条",
            Unit::Clove => "瓣",
            Unit::Teaspoon => "茶匙",
            Unit::Tablespoon => "汤匙",
        }
    }

    /// Comma separated list of all unit symbols.
    pub fn vocabulary() -> String {
        Unit::ALL
            .iter()
            .map(Unit::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .iter()
            .copied()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| format!("unit '{}' is not one of: {}", s, Unit::vocabulary()))
    }
}

// ============================================================================
// RECIPE PARTS
// ============================================================================

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Ingredient {
    pub name: String,
    pub amount: f64,
    pub unit: Unit,
}

/// One preparation step. `order` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Step {
    pub order: u32,
    pub description: String,
}

/// Macro nutrients in grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NutritionFacts {
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
}

// ============================================================================
// RECIPE
// ============================================================================

/// A validated recipe candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Recipe {
    name: String,
    ingredients: Vec<Ingredient>,
    steps: Vec<Step>,
    calories: f64,
    cooking_time: u32,
    nutrition_facts: NutritionFacts,
    cuisine_tags: BTreeSet<String>,
    diet_tags: BTreeSet<String>,
}

impl Recipe {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_validated_parts(
        name: String,
        ingredients: Vec<Ingredient>,
        steps: Vec<Step>,
        calories: f64,
        cooking_time: u32,
        nutrition_facts: NutritionFacts,
        cuisine_tags: BTreeSet<String>,
        diet_tags: BTreeSet<String>,
    ) -> Self {
        Self {
            name,
            ingredients,
            steps,
            calories,
            cooking_time,
            nutrition_facts,
            cuisine_tags,
            diet_tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn calories(&self) -> f64 {
        self.calories
    }

    /// Cooking time in minutes.
    pub fn cooking_time(&self) -> u32 {
        self.cooking_time
    }

    pub fn nutrition_facts(&self) -> &NutritionFacts {
        &self.nutrition_facts
    }

    pub fn cuisine_tags(&self) -> &BTreeSet<String> {
        &self.cuisine_tags
    }

    pub fn diet_tags(&self) -> &BTreeSet<String> {
        &self.diet_tags
    }
}

impl TryFrom<serde_json::Value> for Recipe {
    type Error = crate::ValidationError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        crate::RecipeParser::from_value(&value)
    }
}

// ============================================================================
// STORED RECIPES
// ============================================================================

/// A recipe row as kept by the relational store.
///
/// Recipe bodies are stored as JSON documents and are passed through untouched;
/// only the listing columns are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoredRecipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub ingredients: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub steps: serde_json::Value,
    pub calories: Option<i32>,
    pub cooking_time: Option<i32>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub nutrition_facts: serde_json::Value,
    pub cuisine_type: Option<String>,
    pub diet_type: Vec<String>,
    pub created_by: Option<Uuid>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    pub views: i32,
    pub img: Option<String>,
    /// Number of users who marked this recipe as a favorite.
    #[serde(default)]
    pub favorite_count: i64,
}

/// A recipe scheduled for one meal of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MealPlan {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub meal_type: MealSlot,
    pub recipe_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<StoredRecipe>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Aggregate recipe statistics cached by the warmup job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecipeStats {
    pub total_count: i64,
    pub cuisine_type_counts: BTreeMap<String, i64>,
    /// Average cooking time in minutes, 0 when no recipe has one.
    pub avg_cooking_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_vocabulary_has_nineteen_symbols() {
        let vocabulary = Unit::vocabulary();
        assert_eq!(vocabulary.split(", ").count(), 19);
        assert!(vocabulary.starts_with("克, 千克"));
        assert!(vocabulary.ends_with("茶匙, 汤匙"));
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("瓣".parse::<Unit>(), Ok(Unit::Clove));
        assert_eq!("汤匙".parse::<Unit>(), Ok(Unit::Tablespoon));
        assert!("杓".parse::<Unit>().is_err());
        assert!("".parse::<Unit>().is_err());
        assert!("g".parse::<Unit>().is_err());
    }

    #[test]
    fn test_unit_serializes_as_symbol() {
        let json = serde_json::to_string(&Unit::Milliliter).unwrap();
        assert_eq!(json, "\"毫升\"");
        let unit: Unit = serde_json::from_str("\"根\"").unwrap();
        assert_eq!(unit, Unit::Stalk);
    }

    #[test]
    fn test_recipe_stats_default() {
        let stats = RecipeStats::default();
        assert_eq!(stats.total_count, 0);
        assert!(stats.cuisine_type_counts.is_empty());
        assert_eq!(stats.avg_cooking_time, 0.0);
    }
}
