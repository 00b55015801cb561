//! Recipe validation
//!
//! Turns free-form provider output into a [`Recipe`]. Providers wrap their JSON
//! in a markdown fence, mix snake_case and camelCase names, and emit steps as
//! either strings or objects; all of that is normalized here. Checks run in a
//! fixed order and the first failure is returned:
//!
//! 1. required top-level fields ([`ValidationError::MissingField`],
//!    [`ValidationError::InvalidField`])
//! 2. ingredients ([`ValidationError::InvalidIngredient`])
//! 3. nutrition facts ([`ValidationError::InvalidNutrition`])

use crate::{Ingredient, NutritionFacts, Recipe, Step, Unit, ValidationError};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

const FENCE: &str = "```";

const NAME: &[&str] = &["name"];
const INGREDIENTS: &[&str] = &["ingredients"];
const CALORIES: &[&str] = &["calories"];
const COOKING_TIME: &[&str] = &["cooking_time", "cookingTime"];
const NUTRITION: &[&str] = &["nutrition_facts", "nutritionFacts", "nutrition"];
const STEPS: &[&str] = &["steps"];
const CUISINE: &[&str] = &["cuisine_type", "cuisineType", "cuisine_tags", "cuisineTags"];
const DIET: &[&str] = &["diet_type", "dietType", "diet_tags", "dietTags"];

const PROTEIN: &[&str] = &["protein"];
const FAT: &[&str] = &["fat"];
const CARBS: &[&str] = &["carbs", "carbohydrate", "carbohydrates"];
const FIBER: &[&str] = &["fiber", "fibre"];

/// Parser for generated recipe text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeParser;

impl RecipeParser {
    /// Parse raw provider output into a validated recipe.
    pub fn parse(raw: &str) -> Result<Recipe, ValidationError> {
        let body = strip_code_fence(raw);
        let value: Value =
            serde_json::from_str(body).map_err(|e| ValidationError::MalformedJson {
                reason: e.to_string(),
            })?;
        Self::from_value(&value)
    }

    /// Validate an already decoded JSON value.
    pub fn from_value(value: &Value) -> Result<Recipe, ValidationError> {
        let obj = value.as_object().ok_or_else(|| ValidationError::MalformedJson {
            reason: "expected a JSON object".to_string(),
        })?;

        // Rule 1: presence, then shape of the top-level fields.
        let name = required(obj, NAME)?;
        let ingredients = required(obj, INGREDIENTS)?;
        let calories = required(obj, CALORIES)?;
        let cooking_time = required(obj, COOKING_TIME)?;
        let nutrition = required(obj, NUTRITION)?;
        let steps = required(obj, STEPS)?;

        let name = name
            .as_str()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid_field("name", "must be a non-empty string"))?;
        let ingredients = ingredients
            .as_array()
            .ok_or_else(|| invalid_field("ingredients", "must be an array"))?;
        let calories = non_negative(calories).ok_or_else(|| {
            invalid_field("calories", "must be a non-negative number")
        })?;
        let cooking_time = non_negative(cooking_time)
            .filter(|minutes| *minutes <= f64::from(u32::MAX))
            .ok_or_else(|| invalid_field("cooking_time", "must be a non-negative number"))?;
        let steps = parse_steps(steps)?;

        // Rule 2: every ingredient.
        let ingredients = ingredients
            .iter()
            .enumerate()
            .map(|(index, item)| parse_ingredient(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        // Rule 3: nutrition facts.
        let nutrition = nutrition
            .as_object()
            .ok_or_else(|| ValidationError::InvalidNutrition {
                field: "nutrition_facts".to_string(),
                reason: "must be an object".to_string(),
            })?;
        let nutrition_facts = NutritionFacts {
            protein: nutrient(nutrition, PROTEIN)?,
            fat: nutrient(nutrition, FAT)?,
            carbs: nutrient(nutrition, CARBS)?,
            fiber: nutrient(nutrition, FIBER)?,
        };

        Ok(Recipe::from_validated_parts(
            name.to_string(),
            ingredients,
            steps,
            calories,
            cooking_time.round() as u32,
            nutrition_facts,
            tags(obj, CUISINE),
            tags(obj, DIET),
        ))
    }
}

/// Remove an optional markdown code fence around the payload.
///
/// Either marker may be missing. When the fence is embedded in prose, the
/// first fenced block wins.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let before = trimmed[..open].trim();
    let after = &trimmed[open + FENCE.len()..];
    let after = after
        .strip_prefix("json")
        .or_else(|| after.strip_prefix("JSON"))
        .unwrap_or(after);

    // Only a closing marker is present.
    if !before.is_empty() && after.trim().is_empty() {
        return before;
    }

    match after.find(FENCE) {
        Some(close) => after[..close].trim(),
        None => after.trim(),
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    names: &[&str],
) -> Result<&'a Value, ValidationError> {
    lookup(obj, names).ok_or_else(|| ValidationError::MissingField {
        field: names[0].to_string(),
    })
}

fn invalid_field(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn non_negative(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
}

fn parse_steps(value: &Value) -> Result<Vec<Step>, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid_field("steps", "must be an array"))?;

    let mut steps = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let fallback_order = position as u32 + 1;
        let step = match item {
            Value::String(text) => Step {
                order: fallback_order,
                description: text.trim().to_string(),
            },
            Value::Object(fields) => {
                let description = lookup(fields, &["description", "content", "text"])
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        invalid_field("steps", "step objects need a description")
                    })?;
                let order = lookup(fields, &["order", "step"])
                    .and_then(Value::as_u64)
                    .map(|o| o as u32)
                    .unwrap_or(fallback_order);
                Step {
                    order,
                    description: description.trim().to_string(),
                }
            }
            _ => return Err(invalid_field("steps", "steps must be strings or objects")),
        };
        steps.push(step);
    }
    steps.sort_by_key(|step| step.order);
    Ok(steps)
}

fn parse_ingredient(index: usize, item: &Value) -> Result<Ingredient, ValidationError> {
    let fail = |name: &str, reason: String| ValidationError::InvalidIngredient {
        index,
        name: name.to_string(),
        reason,
    };

    let fields = item
        .as_object()
        .ok_or_else(|| fail("", "ingredient must be an object".to_string()))?;

    let name = lookup(fields, &["name"])
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() {
        return Err(fail(name, "name must be a non-empty string".to_string()));
    }

    let amount = lookup(fields, &["amount"])
        .and_then(Value::as_f64)
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| fail(name, "amount must be a positive number".to_string()))?;

    let unit = lookup(fields, &["unit"])
        .and_then(Value::as_str)
        .ok_or_else(|| fail(name, "unit is missing".to_string()))?
        .trim()
        .parse::<Unit>()
        .map_err(|reason| fail(name, reason))?;

    Ok(Ingredient {
        name: name.to_string(),
        amount,
        unit,
    })
}

fn nutrient(nutrition: &Map<String, Value>, names: &[&str]) -> Result<f64, ValidationError> {
    let field = names[0];
    let value = lookup(nutrition, names).ok_or_else(|| ValidationError::InvalidNutrition {
        field: field.to_string(),
        reason: "missing".to_string(),
    })?;
    non_negative(value).ok_or_else(|| ValidationError::InvalidNutrition {
        field: field.to_string(),
        reason: format!("must be a non-negative number, got {}", value),
    })
}

fn tags(obj: &Map<String, Value>, names: &[&str]) -> BTreeSet<String> {
    match lookup(obj, names) {
        Some(Value::String(tag)) => split_tags(tag),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(split_tags)
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split([',', '，'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
