//! Tolerant normalization of the model's reply into a strict [`MealPlan`].
//!
//! The reply is untrusted text. The only hard failure is a reply with no
//! parseable JSON object in it at all; every other defect (missing days,
//! missing slots, wrong field types) is repaired with the per-field defaults
//! from [`Meal::default`], and whatever was dropped or synthesized is
//! recorded in a [`RepairReport`].
//!
//! All field defaulting goes through three coercers, so the card view and the
//! document export can never disagree about what a missing field means:
//! - [`coerce_text`]: non-empty trimmed string.
//! - [`coerce_text_list`]: ordered list of non-empty trimmed strings.
//! - [`coerce_count`]: non-negative integer.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::plan::{
    DEFAULT_MEAL_NAME, DayPlan, Macros, Meal, MealPlan, MealSlotKey, NutrientTotals, PlanSummary,
};
use crate::profile::UserProfile;

/// Key under which a day may carry the model's own totals.
const TOTALS_KEY: &str = "total_nutrients";

/// Longest excerpt of the offending text kept in an error.
const EXCERPT_CHARS: usize = 200;

/// The reply contained no parseable JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model response did not contain a JSON object: {reason}")]
pub struct MalformedResponseError {
    /// Why parsing failed.
    pub reason: String,
    /// Start of the cleaned-up text, for diagnostics.
    pub excerpt: String,
}

impl MalformedResponseError {
    fn new(reason: impl Into<String>, text: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
        }
    }
}

/// What the normalizer had to repair or drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Expected days absent from the reply (or not objects).
    pub synthesized_days: Vec<u32>,
    /// Expected meals absent from the reply (or not objects).
    pub synthesized_meals: usize,
    /// Individual meal fields replaced by their default.
    pub defaulted_fields: usize,
    /// Keys present in the reply but outside the expected days and slots.
    pub ignored_keys: Vec<String>,
}

impl RepairReport {
    /// True when the reply already had exactly the expected shape.
    pub fn is_clean(&self) -> bool {
        self.synthesized_days.is_empty()
            && self.synthesized_meals == 0
            && self.defaulted_fields == 0
            && self.ignored_keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Normalize a raw reply into a plan with `expected_days` days, each holding
/// exactly `expected_slots`. The plan summary is left at its default.
pub fn normalize(
    raw: &str,
    expected_days: u32,
    expected_slots: &[MealSlotKey],
) -> Result<MealPlan, MalformedResponseError> {
    normalize_with_report(raw, expected_days, expected_slots).map(|(plan, _)| plan)
}

/// Like [`normalize`], but also returns what had to be repaired.
pub fn normalize_with_report(
    raw: &str,
    expected_days: u32,
    expected_slots: &[MealSlotKey],
) -> Result<(MealPlan, RepairReport), MalformedResponseError> {
    let cleaned = strip_code_fences(raw);
    let root = parse_object(cleaned)?;
    let root = unwrap_container(root);

    let mut report = RepairReport::default();
    let mut used: HashSet<&str> = HashSet::new();
    let mut days = BTreeMap::new();

    for day in 1..=expected_days {
        let plan = match find_day(&root, day) {
            Some((key, Value::Object(obj))) => {
                used.insert(key);
                normalize_day(day, obj, expected_slots, &mut report)
            }
            Some((key, _)) => {
                used.insert(key);
                report.synthesized_days.push(day);
                report.synthesized_meals += expected_slots.len();
                DayPlan::defaulted(expected_slots)
            }
            None => {
                report.synthesized_days.push(day);
                report.synthesized_meals += expected_slots.len();
                DayPlan::defaulted(expected_slots)
            }
        };
        days.insert(day, plan);
    }

    report.ignored_keys.extend(
        root.keys()
            .filter(|k| !used.contains(k.as_str()))
            .cloned(),
    );

    Ok((
        MealPlan {
            days,
            summary: PlanSummary::default(),
        },
        report,
    ))
}

/// Normalize a reply for the request made with `profile`, filling the plan
/// summary from the profile.
pub fn normalize_for_profile(
    raw: &str,
    profile: &UserProfile,
) -> Result<(MealPlan, RepairReport), MalformedResponseError> {
    let (mut plan, report) = normalize_with_report(raw, profile.days, profile.expected_slots())?;
    plan.summary = PlanSummary {
        target_calories: profile.daily_calories,
        macro_ratio: profile.goal.macro_ratio(),
        display_name: profile.display_name().map(str::to_owned),
    };
    Ok((plan, report))
}

// ---------------------------------------------------------------------------
// Text cleanup and parsing
// ---------------------------------------------------------------------------

/// Remove a surrounding Markdown code fence (with optional language tag) and
/// surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    let text = text.trim_end();
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse the cleaned text as a JSON object, falling back to the span between
/// the first `{` and the last `}` when the model wrapped the object in prose.
fn parse_object(text: &str) -> Result<Map<String, Value>, MalformedResponseError> {
    let reason = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => format!("top-level JSON value is {}", kind_of(&other)),
        Err(e) => e.to_string(),
    };

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Ok(map);
            }
        }
    }

    Err(MalformedResponseError::new(reason, text))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// If the root has no day keys but exactly one member is an object that
/// does (e.g. `{"meal_plan": {"1": ...}}`), descend into that member.
fn unwrap_container(root: Map<String, Value>) -> Map<String, Value> {
    let has_day_keys = |map: &Map<String, Value>| map.keys().any(|k| day_index(k).is_some());
    if has_day_keys(&root) {
        return root;
    }

    let candidates: Vec<String> = root
        .iter()
        .filter(|(_, v)| v.as_object().is_some_and(|m| has_day_keys(m)))
        .map(|(k, _)| k.clone())
        .collect();
    let [key] = candidates.as_slice() else {
        return root;
    };

    tracing::debug!(container = %key, "descending into wrapper object");
    let mut root = root;
    match root.remove(key) {
        Some(Value::Object(inner)) => inner,
        _ => root,
    }
}

// ---------------------------------------------------------------------------
// Days and meals
// ---------------------------------------------------------------------------

/// Day number encoded in a key: `"3"`, `"day3"`, `"Day 3"`, `"day_3"`.
fn day_index(key: &str) -> Option<u32> {
    let key = key.trim();
    if let Ok(n) = key.parse() {
        return Some(n);
    }
    let lower = key.to_ascii_lowercase();
    lower
        .strip_prefix("day")?
        .trim_start_matches([' ', '_', '-'])
        .parse()
        .ok()
}

/// Find the entry for `day`, preferring the exact numeric key over aliases.
fn find_day(root: &Map<String, Value>, day: u32) -> Option<(&str, &Value)> {
    let exact = day.to_string();
    root.iter()
        .find(|(k, _)| **k == exact)
        .or_else(|| root.iter().find(|(k, _)| day_index(k) == Some(day)))
        .map(|(k, v)| (k.as_str(), v))
}

/// Find the entry for `slot`, preferring the exact wire name over loose
/// spellings ("Pre-Workout").
fn find_slot(day: &Map<String, Value>, slot: MealSlotKey) -> Option<(&str, &Value)> {
    day.iter()
        .find(|(k, _)| k.as_str() == slot.as_str())
        .or_else(|| day.iter().find(|(k, _)| MealSlotKey::from_loose(k) == Some(slot)))
        .map(|(k, v)| (k.as_str(), v))
}

fn normalize_day(
    day: u32,
    obj: &Map<String, Value>,
    expected_slots: &[MealSlotKey],
    report: &mut RepairReport,
) -> DayPlan {
    let mut used: HashSet<&str> = HashSet::new();
    let mut meals = BTreeMap::new();

    for &slot in expected_slots {
        let meal = match find_slot(obj, slot) {
            Some((key, Value::Object(fields))) => {
                used.insert(key);
                coerce_meal(fields, report)
            }
            Some((key, _)) => {
                used.insert(key);
                report.synthesized_meals += 1;
                Meal::default()
            }
            None => {
                report.synthesized_meals += 1;
                Meal::default()
            }
        };
        meals.insert(slot, meal);
    }

    let declared_totals = obj.get(TOTALS_KEY).and_then(Value::as_object).map(|t| {
        NutrientTotals {
            calories: coerce_count(t.get("calories")).unwrap_or(0),
            macros: coerce_macros(t),
        }
    });

    report.ignored_keys.extend(
        obj.keys()
            .filter(|k| k.as_str() != TOTALS_KEY && !used.contains(k.as_str()))
            .map(|k| format!("{day}.{k}")),
    );

    DayPlan {
        meals,
        declared_totals,
    }
}

fn coerce_meal(fields: &Map<String, Value>, report: &mut RepairReport) -> Meal {
    let mut defaulted = 0;
    let mut or_default = |value: Option<_>, default| {
        value.unwrap_or_else(|| {
            defaulted += 1;
            default
        })
    };

    let name = or_default(coerce_text(fields.get("name")), DEFAULT_MEAL_NAME.to_owned());
    let preparation = or_default(coerce_text(fields.get("preparation")), String::new());
    let ingredients = coerce_text_list(fields.get("ingredients")).unwrap_or_else(|| {
        defaulted += 1;
        Vec::new()
    });
    let calories = coerce_count(fields.get("calories")).unwrap_or_else(|| {
        defaulted += 1;
        0
    });

    report.defaulted_fields += defaulted;
    Meal {
        name,
        ingredients,
        calories,
        macros: coerce_macros(fields),
        preparation,
    }
}

fn coerce_macros(fields: &Map<String, Value>) -> Macros {
    Macros {
        protein: coerce_count(fields.get("protein")).unwrap_or(0),
        carbs: coerce_count(fields.get("carbs")).unwrap_or(0),
        fat: coerce_count(fields.get("fats").or_else(|| fields.get("fat"))).unwrap_or(0),
    }
}

// ---------------------------------------------------------------------------
// Field coercers
// ---------------------------------------------------------------------------

/// A non-empty string, trimmed. Anything else is `None`.
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

/// An ordered list of non-empty trimmed strings.
///
/// Arrays keep their string elements in order and drop everything else. A
/// bare string is read as a comma-separated list. Anything else is `None`.
pub fn coerce_text_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
        _ => None,
    }
}

/// A non-negative integer. Fractions round to nearest; negative, non-finite,
/// non-numeric and missing values are `None`. An explicit `0` is `Some(0)`.
pub fn coerce_count(value: Option<&Value>) -> Option<u32> {
    let Value::Number(n) = value? else {
        return None;
    };
    if let Some(u) = n.as_u64() {
        return Some(u32::try_from(u).unwrap_or(u32::MAX));
    }
    let f = n.as_f64()?;
    if !f.is_finite() || f < 0.0 {
        return None;
    }
    Some(f.round().min(f64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TWO_SLOTS: [MealSlotKey; 2] = [MealSlotKey::Breakfast, MealSlotKey::Lunch];

    // -- cleanup --

    #[test]
    fn strips_fence_with_language_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("```json{}```"), "{}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn finds_object_inside_prose() {
        let raw = "Sure! Here is your plan:\n{\"1\": {\"lunch\": {\"name\": \"Dal\"}}}\nEnjoy.";
        let plan = normalize(raw, 1, &[MealSlotKey::Lunch]).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Lunch].name, "Dal");
    }

    #[test]
    fn rejects_text_without_json() {
        let err = normalize("not json at all", 1, &TWO_SLOTS).unwrap_err();
        assert_eq!(err.excerpt, "not json at all");
    }

    #[test]
    fn rejects_non_object_root() {
        let err = normalize("[1, 2, 3]", 1, &TWO_SLOTS).unwrap_err();
        assert!(err.reason.contains("array"), "unexpected reason: {}", err.reason);
    }

    #[test]
    fn excerpt_is_truncated() {
        let raw = "x".repeat(1000);
        let err = normalize(&raw, 1, &TWO_SLOTS).unwrap_err();
        assert_eq!(err.excerpt.chars().count(), EXCERPT_CHARS);
    }

    // -- repairs --

    #[test]
    fn fenced_partial_reply_is_repaired() {
        let raw = "```json\n{\"1\":{\"breakfast\":{\"name\":\"Poha\",\"calories\":300}}}\n```";
        let plan = normalize(raw, 1, &TWO_SLOTS).unwrap();

        assert_eq!(plan.days.len(), 1);
        let day = &plan.days[&1];
        assert_eq!(day.meals.len(), 2);

        let breakfast = &day.meals[&MealSlotKey::Breakfast];
        assert_eq!(breakfast.name, "Poha");
        assert_eq!(breakfast.calories, 300);
        assert!(breakfast.ingredients.is_empty());
        assert_eq!(breakfast.preparation, "");

        assert_eq!(day.meals[&MealSlotKey::Lunch], Meal::default());
    }

    #[test]
    fn missing_days_are_synthesized() {
        let (plan, report) = normalize_with_report("{}", 3, &TWO_SLOTS).unwrap();
        assert_eq!(plan.days.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        for day in plan.days.values() {
            assert_eq!(day, &DayPlan::defaulted(&TWO_SLOTS));
        }
        assert_eq!(report.synthesized_days, vec![1, 2, 3]);
        assert_eq!(report.synthesized_meals, 6);
    }

    #[test]
    fn zero_days_yields_empty_plan() {
        let plan = normalize("{\"1\": {}}", 0, &TWO_SLOTS).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn non_object_slot_becomes_default_meal() {
        let raw = json!({"1": {"breakfast": "eggs", "lunch": null}}).to_string();
        let (plan, report) = normalize_with_report(&raw, 1, &TWO_SLOTS).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Breakfast], Meal::default());
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Lunch], Meal::default());
        assert_eq!(report.synthesized_meals, 2);
    }

    #[test]
    fn non_object_day_becomes_default_day() {
        let raw = json!({"1": "rest day"}).to_string();
        let (plan, report) = normalize_with_report(&raw, 1, &TWO_SLOTS).unwrap();
        assert_eq!(plan.days[&1], DayPlan::defaulted(&TWO_SLOTS));
        assert_eq!(report.synthesized_days, vec![1]);
        assert!(report.ignored_keys.is_empty());
    }

    #[test]
    fn wrong_field_types_fall_back_to_defaults() {
        let raw = json!({"1": {"breakfast": {
            "name": 42,
            "ingredients": {"oats": true},
            "calories": "300",
            "preparation": ["stir"],
        }}})
        .to_string();
        let (plan, report) = normalize_with_report(&raw, 1, &[MealSlotKey::Breakfast]).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Breakfast], Meal::default());
        assert_eq!(report.defaulted_fields, 4);
    }

    #[test]
    fn explicit_zero_calories_are_kept() {
        let raw = json!({"1": {"breakfast": {"name": "Water", "calories": 0}}}).to_string();
        let plan = normalize(&raw, 1, &[MealSlotKey::Breakfast]).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Breakfast].calories, 0);
    }

    #[test]
    fn calories_are_coerced_to_non_negative_integers() {
        assert_eq!(coerce_count(Some(&json!(300))), Some(300));
        assert_eq!(coerce_count(Some(&json!(299.6))), Some(300));
        assert_eq!(coerce_count(Some(&json!(0))), Some(0));
        assert_eq!(coerce_count(Some(&json!(-5))), None);
        assert_eq!(coerce_count(Some(&json!(false))), None);
        assert_eq!(coerce_count(Some(&json!(null))), None);
        assert_eq!(coerce_count(None), None);
        assert_eq!(coerce_count(Some(&json!(u64::MAX))), Some(u32::MAX));
    }

    #[test]
    fn ingredient_lists_are_cleaned() {
        assert_eq!(
            coerce_text_list(Some(&json!([" rice ", "", 3, "dal"]))),
            Some(vec!["rice".to_string(), "dal".to_string()])
        );
        assert_eq!(
            coerce_text_list(Some(&json!("rice, dal ,, ghee"))),
            Some(vec!["rice".to_string(), "dal".to_string(), "ghee".to_string()])
        );
        assert_eq!(coerce_text_list(Some(&json!(7))), None);
    }

    #[test]
    fn blank_name_gets_default() {
        assert_eq!(coerce_text(Some(&json!("   "))), None);
        assert_eq!(coerce_text(Some(&json!(" Upma "))), Some("Upma".to_string()));
    }

    #[test]
    fn macros_accept_fat_and_fats() {
        let raw = json!({"1": {
            "breakfast": {"name": "A", "protein": 10, "carbs": 40, "fats": 12},
            "lunch": {"name": "B", "protein": 20, "carbs": 50, "fat": 15},
        }})
        .to_string();
        let plan = normalize(&raw, 1, &TWO_SLOTS).unwrap();
        let day = &plan.days[&1];
        assert_eq!(day.meals[&MealSlotKey::Breakfast].macros.fat, 12);
        assert_eq!(day.meals[&MealSlotKey::Lunch].macros.fat, 15);
        assert_eq!(day.meals[&MealSlotKey::Lunch].macros.protein, 20);
    }

    // -- keys and ordering --

    #[test]
    fn output_is_in_canonical_order() {
        let raw = r#"{
            "2": {"dinner": {"name": "D2"}, "breakfast": {"name": "B2"}},
            "1": {"dinner": {"name": "D1"}, "breakfast": {"name": "B1"}}
        }"#;
        let slots = [MealSlotKey::Dinner, MealSlotKey::Breakfast];
        let plan = normalize(raw, 2, &slots).unwrap();
        let names: Vec<&str> = plan
            .days
            .values()
            .flat_map(|d| d.meals.values().map(|m| m.name.as_str()))
            .collect();
        assert_eq!(names, vec!["B1", "D1", "B2", "D2"]);
    }

    #[test]
    fn unexpected_days_and_slots_are_ignored() {
        let raw = json!({
            "1": {"breakfast": {"name": "A"}, "lunch": {"name": "B"}, "brunch": {"name": "X"}},
            "5": {"breakfast": {"name": "far"}},
            "notes": "drink water",
        })
        .to_string();
        let (plan, report) = normalize_with_report(&raw, 1, &TWO_SLOTS).unwrap();
        assert_eq!(plan.days.len(), 1);
        assert_eq!(plan.days[&1].meals.len(), 2);
        let mut ignored = report.ignored_keys.clone();
        ignored.sort();
        assert_eq!(ignored, vec!["1.brunch", "5", "notes"]);
    }

    #[test]
    fn day_and_slot_aliases_are_recognized() {
        let raw = json!({
            "Day 1": {"Breakfast": {"name": "A"}},
            "day_2": {"Pre-Workout": {"name": "B"}},
        })
        .to_string();
        let slots = [MealSlotKey::Breakfast, MealSlotKey::PreWorkout];
        let plan = normalize(&raw, 2, &slots).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Breakfast].name, "A");
        assert_eq!(plan.days[&2].meals[&MealSlotKey::PreWorkout].name, "B");
    }

    #[test]
    fn exact_day_key_wins_over_alias() {
        let raw = json!({
            "day1": {"lunch": {"name": "alias"}},
            "1": {"lunch": {"name": "exact"}},
        })
        .to_string();
        let (plan, report) = normalize_with_report(&raw, 1, &[MealSlotKey::Lunch]).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Lunch].name, "exact");
        assert_eq!(report.ignored_keys, vec!["day1"]);
    }

    #[test]
    fn wrapper_object_is_unwrapped() {
        let raw = json!({"meal_plan": {"1": {"lunch": {"name": "Thali"}}}}).to_string();
        let plan = normalize(&raw, 1, &[MealSlotKey::Lunch]).unwrap();
        assert_eq!(plan.days[&1].meals[&MealSlotKey::Lunch].name, "Thali");
    }

    #[test]
    fn declared_totals_are_read() {
        let raw = json!({"1": {
            "lunch": {"name": "Thali", "calories": 700},
            "total_nutrients": {"calories": 1800, "protein": 65, "carbs": 230, "fats": 55},
        }})
        .to_string();
        let (plan, report) = normalize_with_report(&raw, 1, &[MealSlotKey::Lunch]).unwrap();
        let totals = plan.days[&1].declared_totals.expect("totals should be read");
        assert_eq!(totals.calories, 1800);
        assert_eq!(totals.macros.fat, 55);
        assert!(report.ignored_keys.is_empty());
    }

    // -- idempotence --

    #[test]
    fn well_formed_reply_roundtrips_unchanged() {
        let raw = json!({"1": {
            "breakfast": {
                "name": "Poha with peanuts",
                "ingredients": ["poha", "peanuts"],
                "calories": 350,
                "protein": 10, "carbs": 45, "fats": 12,
                "preparation": "Cook poha."
            },
            "lunch": {
                "name": "Dal rice",
                "ingredients": ["dal", "rice"],
                "calories": 600,
                "protein": 20, "carbs": 90, "fats": 10,
                "preparation": ""
            },
        }})
        .to_string();
        let (first, report) = normalize_with_report(&raw, 1, &TWO_SLOTS).unwrap();
        // Only the empty preparation note counts as a defaulted field.
        assert_eq!(report.defaulted_fields, 1);

        let again = normalize(&first.to_response_json().to_string(), 1, &TWO_SLOTS).unwrap();
        assert_eq!(again, first);
    }
}
