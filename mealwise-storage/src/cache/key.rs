//! Namespaced cache keys.
//!
//! Every key is `<namespace>:<identifier>`, except the single stats entry
//! which is the bare namespace. Keys can only be built through the
//! constructors below, so no caller can write outside a known namespace.

use std::fmt;
use uuid::Uuid;

/// Separator between namespace and identifier.
const SEPARATOR: char = ':';

/// List identifier of the popular recipes list.
pub const POPULAR_RECIPES: &str = "popular-recipes";

/// List identifier of the recent recipes list.
pub const RECENT_RECIPES: &str = "recent-recipes";

/// Top-level key namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Recipe,
    RecipeList,
    MealPlan,
    UserMealPlans,
    RecipeStats,
    Recommendation,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Recipe => "recipe",
            CacheNamespace::RecipeList => "recipe-list",
            CacheNamespace::MealPlan => "meal-plan",
            CacheNamespace::UserMealPlans => "meal-plans",
            CacheNamespace::RecipeStats => "recipe-stats",
            CacheNamespace::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully formed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    encoded: String,
}

impl CacheKey {
    fn scoped(namespace: CacheNamespace, identifier: &str) -> Self {
        Self {
            namespace,
            encoded: format!("{}{}{}", namespace.as_str(), SEPARATOR, identifier),
        }
    }

    /// `recipe:<id>`
    pub fn recipe(id: Uuid) -> Self {
        Self::scoped(CacheNamespace::Recipe, &id.to_string())
    }

    /// `recipe-list:<name>`
    pub fn recipe_list(name: &str) -> Self {
        Self::scoped(CacheNamespace::RecipeList, name)
    }

    /// `recipe-list:popular-recipes`
    pub fn popular_recipes() -> Self {
        Self::recipe_list(POPULAR_RECIPES)
    }

    /// `recipe-list:recent-recipes`
    pub fn recent_recipes() -> Self {
        Self::recipe_list(RECENT_RECIPES)
    }

    /// `recipe-list:cuisine:<tag>`
    pub fn cuisine(tag: &str) -> Self {
        Self::recipe_list(&format!("cuisine{}{}", SEPARATOR, tag))
    }

    /// `meal-plan:<id>`
    pub fn meal_plan(id: Uuid) -> Self {
        Self::scoped(CacheNamespace::MealPlan, &id.to_string())
    }

    /// `meal-plans:<user>:<date key>`
    pub fn user_meal_plans(user_id: &str, date_key: &str) -> Self {
        Self::scoped(
            CacheNamespace::UserMealPlans,
            &format!("{}{}{}", user_id, SEPARATOR, date_key),
        )
    }

    /// `recipe-stats`
    pub fn recipe_stats() -> Self {
        Self {
            namespace: CacheNamespace::RecipeStats,
            encoded: CacheNamespace::RecipeStats.as_str().to_string(),
        }
    }

    /// `recommendation:<fingerprint>`
    pub fn recommendation(fingerprint: &str) -> Self {
        Self::scoped(CacheNamespace::Recommendation, fingerprint)
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Prefix whose `<prefix>:*` pattern covers every meal-plan list of a user.
pub fn user_meal_plans_prefix(user_id: &str) -> String {
    format!("{}{}{}", CacheNamespace::UserMealPlans.as_str(), SEPARATOR, user_id)
}
