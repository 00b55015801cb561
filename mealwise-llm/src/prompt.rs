//! Prompt text sent to recipe providers.

use mealwise_core::{DietaryPreferences, MealSlot, Unit};
use once_cell::sync::Lazy;

/// System prompt describing the expected recipe JSON.
///
/// Sent as the system message by providers that accept one; conversation
/// providers carry an equivalent prompt in their bot configuration.
pub static RECIPE_SYSTEM_PROMPT: Lazy<String> = Lazy::new(|| {
    format!(
        r#"# Role
你是一位食谱推荐专家，能够根据用户的喜好生成食谱推荐。你的推荐应当营养丰富、易于操作，并且符合用户的饮食需求。

## Skills
### Skill 1: 生成食谱推荐
- 根据用户的偏好，生成以下JSON格式的食谱推荐：
```json
{{
  "name": "菜品名称",
  "ingredients": [
    {{ "name": "食材名称", "amount": 数字, "unit": "单位" }}
  ],
  "calories": 数字,
  "cooking_time": 数字,
  "nutrition_facts": {{ "protein": 数字, "fat": 数字, "carbs": 数字, "fiber": 数字 }},
  "steps": ["步骤1", "步骤2"],
  "cuisine_type": "菜系",
  "diet_type": ["饮食类型"]
}}
```
- 确保所有数值均为纯数字，不要使用分数（如1/2）或带单位的数字。
- 确保`ingredients`中的`unit`必须是以下单位之一： {units}。不要使用空字符串或其他单位。
- 如果需要表示小份量，请使用小数，例如：0.5勺而不是1/2勺。
- 确保输出为有效的JSON格式，不要添加任何额外的解释性文本。

## Constraints
- 仅讨论与食谱相关的内容。
- 所有食材必须有明确的数量单位，不允许空单位。"#,
        units = Unit::vocabulary()
    )
});

/// Build the user prompt for one recipe.
pub fn build_recipe_prompt(preferences: &DietaryPreferences, slot: Option<MealSlot>) -> String {
    let mut prompt = String::from("基于以下用户偏好生成推荐食谱:\n");
    prompt.push_str(&format!("- 饮食类型: {}\n", preferences.diet_type.join(", ")));
    prompt.push_str(&format!("- 偏好菜系: {}\n", preferences.cuisine_type.join(", ")));
    prompt.push_str(&format!("- 过敏源: {}\n", preferences.allergies.join(", ")));
    prompt.push_str(&format!("- 饮食限制: {}\n", preferences.restrictions.join(", ")));
    prompt.push_str(&format!(
        "- 卡路里范围: {}-{}卡路里\n",
        optional(preferences.calories_min),
        optional(preferences.calories_max)
    ));
    prompt.push_str(&format!(
        "- 最长烹饪时间: {}分钟\n",
        optional(preferences.max_cooking_time)
    ));
    if let Some(slot) = slot {
        prompt.push_str(&format!("- 餐次类型: {}\n", slot));
    }
    if !preferences.excluded_recipes.is_empty() {
        prompt.push_str(&format!(
            "- 不要推荐: {}\n",
            preferences.excluded_recipes.join(", ")
        ));
    }
    prompt
}

fn optional(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
