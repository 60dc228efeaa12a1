//! End-to-end pipeline without a network: profile -> prompt -> canned model
//! reply -> normalized plan -> laid-out document.

use mealplan_core::layout::{DocumentLayoutEngine, DrawInstruction, TextDocumentWriter};
use mealplan_core::normalize::{normalize, normalize_for_profile};
use mealplan_core::plan::MealSlotKey;
use mealplan_core::prompt::{allocate_calories, build_prompt};
use mealplan_test_utils::{canned_reply, canned_reply_value, fenced, sample_profile};

#[test]
fn prompt_and_normalizer_agree_on_shape() {
    let profile = sample_profile();
    let prompt = build_prompt(&profile);

    for slot in profile.expected_slots() {
        assert!(prompt.contains(slot.as_str()), "prompt lists {slot}");
    }
    for allocation in allocate_calories(profile.daily_calories, profile.expected_slots()) {
        assert!(prompt.contains(&format!(
            "{}: {} kcal",
            allocation.slot.as_str(),
            allocation.calories
        )));
    }

    let (plan, report) = normalize_for_profile(&canned_reply(&profile), &profile).unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(plan.days.len(), profile.days as usize);
    for day in plan.days.values() {
        let slots: Vec<MealSlotKey> = day.meals.keys().copied().collect();
        assert_eq!(slots, profile.expected_slots());
        assert_eq!(day.total_calories(), profile.daily_calories);
    }
}

#[test]
fn fenced_reply_normalizes_like_bare_reply() {
    let profile = sample_profile();
    let bare = canned_reply(&profile);
    let (a, _) = normalize_for_profile(&bare, &profile).unwrap();
    let (b, _) = normalize_for_profile(&fenced(&bare), &profile).unwrap();
    assert_eq!(a, b);
}

#[test]
fn normalized_plan_is_a_fixed_point() {
    let slots = MealSlotKey::for_meal_count(6);
    let reply = canned_reply_value(3, slots, 2400).to_string();
    let once = normalize(&reply, 3, slots).unwrap();
    let twice = normalize(&once.to_response_json().to_string(), 3, slots).unwrap();
    assert_eq!(once.days, twice.days);
}

#[test]
fn short_reply_still_produces_full_document() {
    let profile = sample_profile();
    let reply = canned_reply_value(1, &profile.expected_slots()[..2], 2000).to_string();

    let (plan, report) = normalize_for_profile(&reply, &profile).unwrap();
    assert_eq!(report.synthesized_days, vec![2]);
    assert_eq!(plan.meal_count(), 8);

    let text = DocumentLayoutEngine::with_defaults()
        .render(&plan)
        .write_to(TextDocumentWriter::new());
    assert!(text.contains("Prepared for Asha"));
    assert!(text.contains("DAY 1"));
    assert!(text.contains("DAY 2"));
    assert!(text.contains("Breakfast: Breakfast dish 1"));
    assert!(text.contains("Snack: Meal not provided"));
    assert_eq!(text.matches("Meal not provided").count(), 6);
}

#[test]
fn week_long_plan_paginates() {
    let slots = MealSlotKey::for_meal_count(6);
    let reply = canned_reply_value(7, slots, 2800).to_string();
    let plan = normalize(&reply, 7, slots).unwrap();

    let doc = DocumentLayoutEngine::with_defaults().render(&plan);
    assert!(doc.page_count > 1);
    assert_eq!(
        doc.instructions
            .iter()
            .filter(|i| **i == DrawInstruction::StartNewPage)
            .count(),
        doc.page_count - 1
    );
    for day in 1..=7 {
        let header = format!("DAY {day}");
        assert_eq!(doc.texts().filter(|t| *t == header).count(), 1);
    }
}

#[test]
fn oversized_calories_render_without_overflow() {
    let slots = [MealSlotKey::Breakfast, MealSlotKey::Lunch];
    let reply = r#"{"1":{"breakfast":{"name":"A","calories":1e12},"lunch":{"name":"B","calories":1e12}}}"#;

    let plan = normalize(reply, 1, &slots).unwrap();
    assert_eq!(plan.days[&1].meals[&MealSlotKey::Breakfast].calories, u32::MAX);
    assert_eq!(plan.days[&1].total_calories(), u32::MAX);

    let text = DocumentLayoutEngine::with_defaults()
        .render(&plan)
        .write_to(TextDocumentWriter::new());
    assert!(text.contains(&format!("Daily total: {} kcal", u32::MAX)));
}
