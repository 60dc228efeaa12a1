//! Prompt construction: structured profile in, instruction text out.
//!
//! Pure logic, no I/O. The day count and slot names written into the prompt
//! come from [`UserProfile::expected_slots`] and [`UserProfile::days`], which
//! are the same values the normalizer later checks the response against.

use crate::plan::MealSlotKey;
use crate::profile::UserProfile;

/// System message sent alongside every generated prompt.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a professional nutritionist. Provide meal plans in valid JSON only.";

// ---------------------------------------------------------------------------
// Calorie allocation
// ---------------------------------------------------------------------------

/// Calories assigned to one meal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAllocation {
    pub slot: MealSlotKey,
    pub calories: u32,
}

/// Relative share of the day's calories for each slot.
fn slot_weight(slot: MealSlotKey) -> u64 {
    match slot {
        MealSlotKey::Breakfast => 25,
        MealSlotKey::Lunch => 35,
        MealSlotKey::Snack => 15,
        MealSlotKey::PreWorkout => 10,
        MealSlotKey::PostWorkout => 10,
        MealSlotKey::Dinner => 25,
    }
}

/// The slot that absorbs the rounding remainder: the snack when there is
/// one, otherwise the last slot.
fn residual_slot(slots: &[MealSlotKey]) -> Option<MealSlotKey> {
    if slots.contains(&MealSlotKey::Snack) {
        Some(MealSlotKey::Snack)
    } else {
        slots.last().copied()
    }
}

/// Split `daily` calories across `slots` by fixed proportional weights.
///
/// Every slot but the residual one gets its weighted share rounded down; the
/// residual slot gets whatever is left, so the allocations always sum to
/// exactly `daily`. Output follows the order of `slots`.
pub fn allocate_calories(daily: u32, slots: &[MealSlotKey]) -> Vec<SlotAllocation> {
    let Some(residual) = residual_slot(slots) else {
        return Vec::new();
    };
    let total_weight: u64 = slots.iter().map(|s| slot_weight(*s)).sum();

    let share = |slot: MealSlotKey| -> u32 {
        // daily <= u32::MAX and weight <= total_weight, so this fits in u32.
        (u64::from(daily) * slot_weight(slot) / total_weight) as u32
    };
    let assigned: u32 = slots
        .iter()
        .filter(|s| **s != residual)
        .map(|s| share(*s))
        .sum();

    slots
        .iter()
        .map(|&slot| SlotAllocation {
            slot,
            calories: if slot == residual {
                daily - assigned
            } else {
                share(slot)
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

const OUTPUT_RULES: &str = "\
## Output format

Respond with a single JSON object and nothing else:
- No prose before or after the JSON.
- No Markdown, no code fences.
- Top-level keys are day numbers as strings (\"1\", \"2\", ...).
- Each day maps meal slot names to meal objects, plus an optional \"total_nutrients\" object.
- Each meal object has exactly these fields:
  - \"name\": string
  - \"ingredients\": array of strings
  - \"calories\": integer (kcal)
  - \"protein\": integer (grams)
  - \"carbs\": integer (grams)
  - \"fats\": integer (grams)
  - \"preparation\": string (one or two sentences)
";

/// Build the user prompt for a validated profile.
///
/// Total and deterministic: the same profile always yields the same text.
pub fn build_prompt(profile: &UserProfile) -> String {
    let slots = profile.expected_slots();
    let allocations = allocate_calories(profile.daily_calories, slots);
    let ratio = profile.goal.macro_ratio();

    let mut prompt = String::with_capacity(4096);

    // Role.
    prompt.push_str(
        "You are an expert nutritionist and weight management coach with over 15 years of experience.\n\n",
    );
    prompt.push_str(&format!(
        "Create a personalized {} diet plan for the following person.\n\n",
        profile.goal.phrase()
    ));

    // Profile.
    prompt.push_str("## Profile\n\n");
    if let Some(name) = profile.display_name() {
        prompt.push_str(&format!("- Name: {name}\n"));
    }
    prompt.push_str(&format!("- Gender: {}\n", profile.gender));
    prompt.push_str(&format!("- Age: {}\n", profile.age));
    prompt.push_str(&format!("- Height: {} cm\n", profile.height_cm));
    prompt.push_str(&format!("- Weight: {} kg\n", profile.weight_kg));
    prompt.push_str(&format!("- Diet preference: {}\n", profile.diet));
    prompt.push_str(&format!("- Goal: {}\n", profile.goal.phrase()));
    prompt.push_str(&format!(
        "- Daily calorie target: {} kcal\n",
        profile.daily_calories
    ));
    prompt.push_str(&format!("- Meals per day: {}\n", slots.len()));
    prompt.push_str(&format!("- Number of days: {}\n", profile.days));
    match profile.notes() {
        Some(notes) => prompt.push_str(&format!(
            "- Allergies or disliked ingredients (never use these): {notes}\n"
        )),
        None => prompt.push_str("- Allergies or disliked ingredients: none\n"),
    }

    if let Some(cuisine) = profile.cuisine() {
        prompt.push_str(&format!(
            "\nUse only {cuisine} dishes and easy-to-follow language.\n"
        ));
    }
    if profile.budget_friendly {
        prompt.push_str(
            "\nMeals must be affordable, simple and realistic, using locally available foods. \
             Avoid fancy or expensive ingredients.\n",
        );
    }

    // Calorie ceilings.
    prompt.push_str("\n## Calorie distribution\n\n");
    for a in &allocations {
        prompt.push_str(&format!("- {}: {} kcal\n", a.slot, a.calories));
    }
    prompt.push_str(&format!(
        "\nEach meal's calories must not exceed its assigned amount, and the total daily \
         calories must not exceed {} kcal.\n",
        profile.daily_calories
    ));
    prompt.push_str(&format!(
        "Aim for a macronutrient split of {ratio}.\n"
    ));

    // Output contract.
    prompt.push('\n');
    prompt.push_str(OUTPUT_RULES);
    let slot_names: Vec<&str> = slots.iter().map(|s| s.as_str()).collect();
    prompt.push_str(&format!(
        "- Every day must contain exactly these meal slots: {}.\n",
        slot_names.join(", ")
    ));
    prompt.push_str(&format!(
        "- Generate exactly {} day(s), keyed \"1\" to \"{}\".\n",
        profile.days, profile.days
    ));

    // Worked example.
    prompt.push_str("\n## Example of the exact structure\n\n");
    prompt.push_str(&example_structure(slots, profile.days));
    prompt.push('\n');

    prompt
}

/// One literal example of the nesting, using the expected slots. A second
/// day is only sketched when more than one day is requested.
fn example_structure(slots: &[MealSlotKey], days: u32) -> String {
    let mut out = String::from("{\n  \"1\": {\n");
    for (i, slot) in slots.iter().enumerate() {
        if i == 0 {
            out.push_str(&format!(
                "    \"{slot}\": {{\n\
                 \x20     \"name\": \"Poha with peanuts\",\n\
                 \x20     \"ingredients\": [\"poha\", \"peanuts\", \"onion\", \"oil\"],\n\
                 \x20     \"calories\": 350,\n\
                 \x20     \"protein\": 10,\n\
                 \x20     \"carbs\": 45,\n\
                 \x20     \"fats\": 12,\n\
                 \x20     \"preparation\": \"Cook poha with peanuts and onions.\"\n\
                 \x20   }},\n"
            ));
        } else {
            out.push_str(&format!("    \"{slot}\": {{ ... }},\n"));
        }
    }
    out.push_str(
        "    \"total_nutrients\": { \"calories\": 1800, \"protein\": 65, \"carbs\": 230, \"fats\": 55 }\n",
    );
    if days > 1 {
        out.push_str("  },\n  \"2\": { ... }\n}\n");
    } else {
        out.push_str("  }\n}\n");
    }
    out
}
