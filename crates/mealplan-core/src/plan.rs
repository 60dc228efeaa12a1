//! The strict, fully-populated meal-plan model.
//!
//! Nothing in here is ever partially defined: every [`Meal`] field has a
//! total default and every [`DayPlan`] holds every expected slot. Maps are
//! `BTreeMap`s so iteration is always ascending by day and in canonical slot
//! order, regardless of the order the model produced them in.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name given to a meal the model did not describe.
pub const DEFAULT_MEAL_NAME: &str = "Meal not provided";

// ---------------------------------------------------------------------------
// Meal slots
// ---------------------------------------------------------------------------

/// A named position in the day's eating schedule.
///
/// Declaration order is the canonical order: `Ord` follows it, so a
/// `BTreeMap<MealSlotKey, _>` iterates breakfast first and dinner last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlotKey {
    Breakfast,
    Lunch,
    Snack,
    PreWorkout,
    PostWorkout,
    Dinner,
}

impl MealSlotKey {
    /// Every slot, in canonical order.
    pub const ALL: [MealSlotKey; 6] = [
        Self::Breakfast,
        Self::Lunch,
        Self::Snack,
        Self::PreWorkout,
        Self::PostWorkout,
        Self::Dinner,
    ];

    /// The slots expected for a given number of meals per day.
    ///
    /// Counts beyond the vocabulary yield every slot; zero yields none.
    pub fn for_meal_count(count: u32) -> &'static [MealSlotKey] {
        use MealSlotKey::*;
        match count {
            0 => &[],
            1 => &[Lunch],
            2 => &[Breakfast, Dinner],
            3 => &[Breakfast, Lunch, Dinner],
            4 => &[Breakfast, Lunch, Snack, Dinner],
            5 => &[Breakfast, Lunch, Snack, PostWorkout, Dinner],
            _ => &Self::ALL,
        }
    }

    /// Wire name used as the JSON key ("pre_workout").
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Snack => "snack",
            Self::PreWorkout => "pre_workout",
            Self::PostWorkout => "post_workout",
            Self::Dinner => "dinner",
        }
    }

    /// Title-cased label for cards and documents ("Pre-workout").
    pub fn label(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Snack => "Snack",
            Self::PreWorkout => "Pre-workout",
            Self::PostWorkout => "Post-workout",
            Self::Dinner => "Dinner",
        }
    }

    /// Match a slot name the way a model tends to write it: any case, with
    /// `-` or spaces instead of underscores.
    pub fn from_loose(name: &str) -> Option<Self> {
        let folded = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        folded.parse().ok()
    }
}

impl fmt::Display for MealSlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlotKey {
    type Err = SlotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| SlotParseError(s.to_owned()))
    }
}

/// Error returned when parsing an unknown meal slot name.
#[derive(Debug, Clone)]
pub struct SlotParseError(pub String);

impl fmt::Display for SlotParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown meal slot: {:?}", self.0)
    }
}

impl std::error::Error for SlotParseError {}

// ---------------------------------------------------------------------------
// Meals and days
// ---------------------------------------------------------------------------

/// Macronutrients in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macros {
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

impl Macros {
    pub fn is_zero(&self) -> bool {
        self.protein == 0 && self.carbs == 0 && self.fat == 0
    }
}

/// One meal in a day plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    pub ingredients: Vec<String>,
    pub calories: u32,
    pub macros: Macros,
    /// Preparation note; empty when the model gave none.
    pub preparation: String,
}

impl Default for Meal {
    fn default() -> Self {
        Self {
            name: DEFAULT_MEAL_NAME.to_owned(),
            ingredients: Vec::new(),
            calories: 0,
            macros: Macros::default(),
            preparation: String::new(),
        }
    }
}

impl Meal {
    /// Comma-joined ingredient list ("poha, peanuts, onion").
    pub fn ingredients_text(&self) -> String {
        self.ingredients.join(", ")
    }
}

/// Calories plus macros for a whole day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: u32,
    #[serde(flatten)]
    pub macros: Macros,
}

/// Every meal of one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub meals: BTreeMap<MealSlotKey, Meal>,
    /// Totals as reported by the model, if it reported them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_totals: Option<NutrientTotals>,
}

impl DayPlan {
    /// A day where every expected slot holds a default meal.
    pub fn defaulted(slots: &[MealSlotKey]) -> Self {
        Self {
            meals: slots.iter().map(|s| (*s, Meal::default())).collect(),
            declared_totals: None,
        }
    }

    /// Sum of the meals' calories, saturating at `u32::MAX`.
    pub fn total_calories(&self) -> u32 {
        self.meals
            .values()
            .fold(0u32, |acc, m| acc.saturating_add(m.calories))
    }

    /// Sum of the meals' calories and macros. Each total saturates.
    pub fn computed_totals(&self) -> NutrientTotals {
        self.meals
            .values()
            .fold(NutrientTotals::default(), |mut acc, m| {
                acc.calories = acc.calories.saturating_add(m.calories);
                acc.macros.protein = acc.macros.protein.saturating_add(m.macros.protein);
                acc.macros.carbs = acc.macros.carbs.saturating_add(m.macros.carbs);
                acc.macros.fat = acc.macros.fat.saturating_add(m.macros.fat);
                acc
            })
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Protein/carbs/fat split in percent of calories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroRatio {
    pub protein: u8,
    pub carbs: u8,
    pub fat: u8,
}

impl MacroRatio {
    pub const fn new(protein: u8, carbs: u8, fat: u8) -> Self {
        Self {
            protein,
            carbs,
            fat,
        }
    }
}

impl fmt::Display for MacroRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% protein / {}% carbs / {}% fat",
            self.protein, self.carbs, self.fat
        )
    }
}

/// Denormalized request data shown alongside the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub target_calories: u32,
    pub macro_ratio: MacroRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A complete multi-day plan. Days are keyed `1..=N`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealPlan {
    pub days: BTreeMap<u32, DayPlan>,
    pub summary: PlanSummary,
}

impl MealPlan {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of meals across all days.
    pub fn meal_count(&self) -> usize {
        self.days.values().map(|d| d.meals.len()).sum()
    }

    /// Render the plan in the response shape the prompt asks the model for:
    /// `{"1": {"breakfast": {"name": ..., "calories": ...}, ...}, ...}`.
    pub fn to_response_json(&self) -> Value {
        let mut root = Map::new();
        for (day, plan) in &self.days {
            let mut day_obj = Map::new();
            for (slot, meal) in &plan.meals {
                day_obj.insert(slot.as_str().to_owned(), meal_to_json(meal));
            }
            if let Some(totals) = plan.declared_totals {
                day_obj.insert(
                    "total_nutrients".to_owned(),
                    json!({
                        "calories": totals.calories,
                        "protein": totals.macros.protein,
                        "carbs": totals.macros.carbs,
                        "fats": totals.macros.fat,
                    }),
                );
            }
            root.insert(day.to_string(), Value::Object(day_obj));
        }
        Value::Object(root)
    }
}

fn meal_to_json(meal: &Meal) -> Value {
    json!({
        "name": meal.name,
        "ingredients": meal.ingredients,
        "calories": meal.calories,
        "protein": meal.macros.protein,
        "carbs": meal.macros.carbs,
        "fats": meal.macros.fat,
        "preparation": meal.preparation,
    })
}
