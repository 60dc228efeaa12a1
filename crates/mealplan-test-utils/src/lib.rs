//! Shared test utilities for mealplan integration tests.
//!
//! Provides fixture profiles, well-formed model replies built from the same
//! slot vocabulary the prompt uses, and completion clients whose behaviour a
//! test can script:
//! - [`ScriptedClient`] answers from a queue and records every request.
//! - [`GatedClient`] holds each call until the test releases it, so tests
//!   can force requests to finish in any order.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;

use mealplan_core::llm::{CompletionClient, CompletionRequest, UpstreamError};
use mealplan_core::plan::MealSlotKey;
use mealplan_core::profile::{DietPreference, Gender, Goal, UserProfile};
use mealplan_core::prompt::allocate_calories;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A valid two-day, four-meal profile.
pub fn sample_profile() -> UserProfile {
    UserProfile {
        name: Some("Asha".to_string()),
        age: 28,
        gender: Gender::Female,
        height_cm: 165.0,
        weight_kg: 60.0,
        diet: DietPreference::Vegetarian,
        goal: Goal::WeightLoss,
        daily_calories: 2000,
        meals_per_day: 4,
        days: 2,
        notes: Some("peanuts".to_string()),
        cuisine: Some("South Indian".to_string()),
        budget_friendly: false,
    }
}

/// One complete meal object in the wire shape the prompt asks for.
pub fn meal_json(day: u32, slot: MealSlotKey, calories: u32) -> Value {
    json!({
        "name": format!("{} dish {day}", slot.label()),
        "ingredients": [format!("{} base", slot.as_str()), "salt"],
        "calories": calories,
        "protein": calories / 20,
        "carbs": calories / 8,
        "fats": calories / 30,
        "preparation": format!("Cook the {} for day {day}.", slot.as_str()),
    })
}

/// A complete, well-formed reply for `days` days of `slots`, with each meal
/// at its allocated calorie share of `daily_calories`.
pub fn canned_reply_value(days: u32, slots: &[MealSlotKey], daily_calories: u32) -> Value {
    let allocations = allocate_calories(daily_calories, slots);
    let mut root = Map::new();
    for day in 1..=days {
        let mut day_obj = Map::new();
        for allocation in &allocations {
            day_obj.insert(
                allocation.slot.as_str().to_string(),
                meal_json(day, allocation.slot, allocation.calories),
            );
        }
        root.insert(day.to_string(), Value::Object(day_obj));
    }
    Value::Object(root)
}

/// [`canned_reply_value`] for a profile, serialised as model text.
pub fn canned_reply(profile: &UserProfile) -> String {
    canned_reply_value(profile.days, profile.expected_slots(), profile.daily_calories).to_string()
}

/// Wrap text in a Markdown code fence, the way chat models often answer.
pub fn fenced(text: &str) -> String {
    format!("```json\n{text}\n```")
}

/// A chat-completions response body carrying `content`.
pub fn chat_completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

// ---------------------------------------------------------------------------
// Scripted client
// ---------------------------------------------------------------------------

/// Answers each call with the next scripted result.
///
/// Running out of script is reported as an upstream transport error.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, UpstreamError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: impl IntoIterator<Item = Result<String, UpstreamError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A client that answers once with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::new([Ok(reply.into())])
    }

    /// A client whose only call fails with `err`.
    pub fn failing(err: UpstreamError) -> Self {
        Self::new([Err(err)])
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(UpstreamError::Transport {
                    detail: "scripted client has no replies left".to_string(),
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Gated client
// ---------------------------------------------------------------------------

/// Call `n` (0-based) returns `replies[n]`, but only after
/// [`GatedClient::release`] has been called for it.
pub struct GatedClient {
    gates: Vec<(String, Semaphore)>,
    started: AtomicUsize,
}

impl GatedClient {
    pub fn new(replies: impl IntoIterator<Item = String>) -> Self {
        Self {
            gates: replies
                .into_iter()
                .map(|reply| (reply, Semaphore::new(0)))
                .collect(),
            started: AtomicUsize::new(0),
        }
    }

    /// Let call `n` return.
    pub fn release(&self, n: usize) {
        self.gates[n].1.add_permits(1);
    }

    /// Number of calls that have reached the client so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have reached the client.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.started() < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl CompletionClient for GatedClient {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, UpstreamError> {
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        let (reply, gate) = self.gates.get(n).expect("more calls than gated replies");
        gate.acquire().await.expect("gate closed").forget();
        Ok(reply.clone())
    }
}
