//! The user profile collected by the form, and its validation.
//!
//! A [`UserProfile`] is validated once, before any prompt is built or any
//! network call is made. Everything downstream assumes a valid profile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{MacroRatio, MealSlotKey};

/// Smallest accepted daily calorie target.
pub const MIN_DAILY_CALORIES: u32 = 1000;
/// Largest accepted daily calorie target.
pub const MAX_DAILY_CALORIES: u32 = 5000;
/// Longest plan that can be requested, in days.
pub const MAX_DAYS: u32 = 30;
/// Oldest accepted age.
pub const MAX_AGE: u32 = 120;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Gender as selected on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for Gender {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            other => Err(ProfileParseError::Gender(other.to_owned())),
        }
    }
}

/// What the plan should help the user achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    WeightLoss,
    WeightGain,
    MuscleGain,
}

impl Goal {
    /// Human-readable phrase used inside the prompt ("weight loss").
    pub fn phrase(self) -> &'static str {
        match self {
            Self::WeightLoss => "weight loss",
            Self::WeightGain => "weight gain",
            Self::MuscleGain => "muscle gain",
        }
    }

    /// Protein/carbs/fat split declared to the model for this goal.
    pub fn macro_ratio(self) -> MacroRatio {
        match self {
            Self::WeightLoss => MacroRatio::new(30, 40, 30),
            Self::WeightGain => MacroRatio::new(20, 50, 30),
            Self::MuscleGain => MacroRatio::new(35, 45, 20),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WeightLoss => "weight_loss",
            Self::WeightGain => "weight_gain",
            Self::MuscleGain => "muscle_gain",
        };
        f.write_str(s)
    }
}

impl FromStr for Goal {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight_loss" => Ok(Self::WeightLoss),
            "weight_gain" => Ok(Self::WeightGain),
            "muscle_gain" => Ok(Self::MuscleGain),
            other => Err(ProfileParseError::Goal(other.to_owned())),
        }
    }
}

/// Dietary preference. The form offers a fixed list, but any other string is
/// carried through to the prompt as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DietPreference {
    Balanced,
    Vegan,
    Vegetarian,
    Keto,
    Paleo,
    Mediterranean,
    LowCarb,
    HighProtein,
    Custom(String),
}

impl DietPreference {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Balanced => "balanced",
            Self::Vegan => "vegan",
            Self::Vegetarian => "vegetarian",
            Self::Keto => "keto",
            Self::Paleo => "paleo",
            Self::Mediterranean => "mediterranean",
            Self::LowCarb => "low_carb",
            Self::HighProtein => "high_protein",
            Self::Custom(s) => s,
        }
    }
}

impl From<String> for DietPreference {
    fn from(s: String) -> Self {
        let folded = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match folded.as_str() {
            "balanced" => Self::Balanced,
            "vegan" => Self::Vegan,
            "vegetarian" => Self::Vegetarian,
            "keto" => Self::Keto,
            "paleo" => Self::Paleo,
            "mediterranean" => Self::Mediterranean,
            "low_carb" => Self::LowCarb,
            "high_protein" => Self::HighProtein,
            _ => Self::Custom(s.trim().to_owned()),
        }
    }
}

impl From<DietPreference> for String {
    fn from(d: DietPreference) -> Self {
        d.as_str().to_owned()
    }
}

impl fmt::Display for DietPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid enum value from a string.
#[derive(Debug, Clone, Error)]
pub enum ProfileParseError {
    #[error("invalid gender: {0:?} (expected male, female, or other)")]
    Gender(String),

    #[error("invalid goal: {0:?} (expected weight_loss, weight_gain, or muscle_gain)")]
    Goal(String),
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Everything the user told us about themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name used on the exported document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub age: u32,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub diet: DietPreference,
    pub goal: Goal,
    /// Daily calorie target in kcal.
    pub daily_calories: u32,
    #[serde(default = "default_meals_per_day")]
    pub meals_per_day: u32,
    /// Number of days to plan.
    #[serde(default = "default_days")]
    pub days: u32,
    /// Allergies or disliked ingredients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Regional cuisine to draw dishes from (e.g. "Maharashtrian").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    /// Prefer cheap, locally available ingredients.
    #[serde(default)]
    pub budget_friendly: bool,
}

fn default_meals_per_day() -> u32 {
    4
}

fn default_days() -> u32 {
    7
}

/// Reasons a profile is rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("age {0} is out of range (expected 1 to {max})", max = MAX_AGE)]
    AgeOutOfRange(u32),

    #[error("{field} must be a positive number, got {value}")]
    InvalidBodyMetric { field: &'static str, value: f64 },

    #[error(
        "daily calorie target {0} is out of range (expected {min} to {max})",
        min = MIN_DAILY_CALORIES,
        max = MAX_DAILY_CALORIES
    )]
    CaloriesOutOfRange(u32),

    #[error("number of days {0} is out of range (expected 1 to {max})", max = MAX_DAYS)]
    DaysOutOfRange(u32),

    #[error("meals per day {value} is out of range (expected 1 to {max})")]
    MealCountOutOfRange { value: u32, max: usize },
}

impl UserProfile {
    /// Check every bounded field. Optional fields are never an error.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.age == 0 || self.age > MAX_AGE {
            return Err(ValidationError::AgeOutOfRange(self.age));
        }
        for (field, value) in [("height_cm", self.height_cm), ("weight_kg", self.weight_kg)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidBodyMetric { field, value });
            }
        }
        if !(MIN_DAILY_CALORIES..=MAX_DAILY_CALORIES).contains(&self.daily_calories) {
            return Err(ValidationError::CaloriesOutOfRange(self.daily_calories));
        }
        if self.days == 0 || self.days > MAX_DAYS {
            return Err(ValidationError::DaysOutOfRange(self.days));
        }
        let max = MealSlotKey::ALL.len();
        if self.meals_per_day == 0 || self.meals_per_day as usize > max {
            return Err(ValidationError::MealCountOutOfRange {
                value: self.meals_per_day,
                max,
            });
        }
        Ok(())
    }

    /// The meal slots every day of this profile's plan must contain.
    pub fn expected_slots(&self) -> &'static [MealSlotKey] {
        MealSlotKey::for_meal_count(self.meals_per_day)
    }

    /// Trimmed display name, if one was given and is non-blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Trimmed notes, if present and non-blank.
    pub fn notes(&self) -> Option<&str> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Trimmed cuisine hint, if present and non-blank.
    pub fn cuisine(&self) -> Option<&str> {
        self.cuisine
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
