//! Plan request orchestration: validate a profile, prompt the model once,
//! normalize the reply and install it as the current plan.
//!
//! Every submission is tagged with a monotonically increasing ticket. Only
//! the most recent ticket may touch the current plan, so a slow older
//! request can never overwrite the result of a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{CompletionClient, CompletionRequest, UpstreamError};
use crate::normalize::{MalformedResponseError, RepairReport, normalize_for_profile};
use crate::plan::MealPlan;
use crate::profile::{UserProfile, ValidationError};
use crate::prompt::{SYSTEM_INSTRUCTION, build_prompt};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Model parameters sent with every completion.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// The installed plan and where it came from.
#[derive(Debug, Clone)]
pub struct CurrentPlan {
    pub id: Uuid,
    pub ticket: u64,
    pub generated_at: DateTime<Utc>,
    pub plan: Arc<MealPlan>,
    pub report: RepairReport,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid profile: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Malformed(#[from] MalformedResponseError),

    #[error("request {ticket} was superseded by request {latest}")]
    Superseded { ticket: u64, latest: u64 },
}

impl PlanError {
    /// Short message suitable for showing to the person who submitted the
    /// profile.
    pub fn user_message(&self) -> String {
        match self {
            PlanError::Validation(e) => format!("Please check your details: {e}."),
            PlanError::Upstream(e) => format!("The meal planning service failed: {e}."),
            PlanError::Malformed(_) => {
                "The generated plan could not be read. Please try again.".to_string()
            }
            PlanError::Superseded { .. } => {
                "A newer request replaced this one.".to_string()
            }
        }
    }
}

/// Runs submissions against a [`CompletionClient`] and keeps the latest
/// successful plan.
pub struct PlanRequestOrchestrator {
    client: Arc<dyn CompletionClient>,
    settings: RequestSettings,
    latest_ticket: AtomicU64,
    current: RwLock<Option<CurrentPlan>>,
}

impl PlanRequestOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, settings: RequestSettings) -> Self {
        Self {
            client,
            settings,
            latest_ticket: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    /// Ticket of the most recent submission, 0 before the first one.
    pub fn latest_ticket(&self) -> u64 {
        self.latest_ticket.load(Ordering::SeqCst)
    }

    pub async fn current(&self) -> Option<CurrentPlan> {
        self.current.read().await.clone()
    }

    /// Produce a plan for `profile` and install it as the current plan.
    ///
    /// Makes at most one completion call and none at all when the profile is
    /// invalid. If a newer submission starts before this one finishes, the
    /// result is discarded and [`PlanError::Superseded`] is returned. A
    /// failure of the newest submission clears the current plan.
    pub async fn submit(&self, profile: &UserProfile) -> Result<CurrentPlan, PlanError> {
        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            ticket,
            days = profile.days,
            meals = profile.meals_per_day,
            calories = profile.daily_calories,
            "plan requested"
        );

        let outcome = self.produce(ticket, profile).await;

        let mut current = self.current.write().await;
        let latest = self.latest_ticket();
        if ticket != latest {
            warn!(ticket, latest, "discarding superseded plan request");
            return Err(PlanError::Superseded { ticket, latest });
        }

        match outcome {
            Ok(installed) => {
                info!(
                    ticket,
                    plan_id = %installed.id,
                    days = installed.plan.days.len(),
                    meals = installed.plan.meal_count(),
                    "plan installed"
                );
                *current = Some(installed.clone());
                Ok(installed)
            }
            Err(e) => {
                warn!(ticket, error = %e, "plan request failed");
                *current = None;
                Err(e)
            }
        }
    }

    async fn produce(&self, ticket: u64, profile: &UserProfile) -> Result<CurrentPlan, PlanError> {
        profile.validate()?;

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            system: SYSTEM_INSTRUCTION.to_string(),
            user: build_prompt(profile),
            temperature: self.settings.temperature,
        };
        debug!(
            ticket,
            client = self.client.name(),
            prompt_bytes = request.user.len(),
            "sending completion request"
        );

        let raw = self.client.complete(&request).await?;
        debug!(ticket, response_bytes = raw.len(), "completion received");

        let (plan, report) = normalize_for_profile(&raw, profile)?;
        if !report.is_clean() {
            debug!(
                ticket,
                synthesized_days = report.synthesized_days.len(),
                synthesized_meals = report.synthesized_meals,
                defaulted_fields = report.defaulted_fields,
                ignored_keys = report.ignored_keys.len(),
                "repaired model response"
            );
        }

        Ok(CurrentPlan {
            id: Uuid::new_v4(),
            ticket,
            generated_at: Utc::now(),
            plan: Arc::new(plan),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::profile::{DietPreference, Gender, Goal};

    /// Returns a fixed reply and records every request.
    struct FixedClient {
        reply: Result<String, u16>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FixedClient {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(UpstreamError::Status {
                    status: *status,
                    detail: "boom".into(),
                }),
            }
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            name: None,
            age: 30,
            gender: Gender::Female,
            height_cm: 160.0,
            weight_kg: 55.0,
            diet: DietPreference::Vegetarian,
            goal: Goal::WeightLoss,
            daily_calories: 1800,
            meals_per_day: 2,
            days: 1,
            notes: None,
            cuisine: None,
            budget_friendly: false,
        }
    }

    const REPLY: &str = r#"{"1": {"breakfast": {"name": "Idli", "calories": 300},
                                  "dinner": {"name": "Dal", "calories": 600}}}"#;

    #[tokio::test]
    async fn successful_submission_installs_plan() {
        let client = FixedClient::ok(REPLY);
        let orchestrator = PlanRequestOrchestrator::new(client.clone(), RequestSettings::default());

        let installed = orchestrator.submit(&profile()).await.unwrap();
        assert_eq!(installed.ticket, 1);
        assert_eq!(installed.plan.days[&1].total_calories(), 900);
        assert_eq!(installed.plan.summary.target_calories, 1800);

        let current = orchestrator.current().await.unwrap();
        assert_eq!(current.id, installed.id);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn request_carries_prompt_and_settings() {
        let client = FixedClient::ok(REPLY);
        let settings = RequestSettings {
            model: "local-model".into(),
            temperature: 0.2,
        };
        let orchestrator = PlanRequestOrchestrator::new(client.clone(), settings);
        orchestrator.submit(&profile()).await.unwrap();

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].model, "local-model");
        assert_eq!(seen[0].temperature, 0.2);
        assert_eq!(seen[0].system, SYSTEM_INSTRUCTION);
        assert_eq!(seen[0].user, build_prompt(&profile()));
    }

    #[tokio::test]
    async fn invalid_profile_never_calls_client() {
        let client = FixedClient::ok(REPLY);
        let orchestrator = PlanRequestOrchestrator::new(client.clone(), RequestSettings::default());

        let mut bad = profile();
        bad.daily_calories = 200;
        let err = orchestrator.submit(&bad).await.unwrap_err();

        assert!(matches!(err, PlanError::Validation(_)));
        assert!(err.user_message().starts_with("Please check your details"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_clears_current_plan() {
        let good = PlanRequestOrchestrator::new(FixedClient::ok(REPLY), RequestSettings::default());
        good.submit(&profile()).await.unwrap();
        assert!(good.current().await.is_some());

        let failing = FixedClient::failing(503);
        let orchestrator = PlanRequestOrchestrator {
            client: failing,
            ..good
        };
        let err = orchestrator.submit(&profile()).await.unwrap_err();
        assert!(matches!(
            err,
            PlanError::Upstream(UpstreamError::Status { status: 503, .. })
        ));
        assert!(orchestrator.current().await.is_none());
    }

    #[test]
    fn upstream_message_keeps_status_and_detail() {
        let err = PlanError::Upstream(UpstreamError::Status {
            status: 401,
            detail: "invalid api key".into(),
        });
        let message = err.user_message();
        assert!(message.starts_with("The meal planning service failed"), "{message}");
        assert!(message.contains("HTTP 401"), "{message}");
        assert!(message.contains("invalid api key"), "{message}");
    }

    #[tokio::test]
    async fn malformed_reply_is_reported() {
        let orchestrator =
            PlanRequestOrchestrator::new(FixedClient::ok("sorry, I can't"), RequestSettings::default());
        let err = orchestrator.submit(&profile()).await.unwrap_err();
        assert!(matches!(err, PlanError::Malformed(_)));
        assert_eq!(err.user_message(), "The generated plan could not be read. Please try again.");
        assert!(orchestrator.current().await.is_none());
    }

    #[tokio::test]
    async fn tickets_increase_per_submission() {
        let orchestrator = PlanRequestOrchestrator::new(FixedClient::ok(REPLY), RequestSettings::default());
        assert_eq!(orchestrator.latest_ticket(), 0);
        let first = orchestrator.submit(&profile()).await.unwrap();
        let second = orchestrator.submit(&profile()).await.unwrap();
        assert_eq!((first.ticket, second.ticket), (1, 2));
        assert_ne!(first.id, second.id);
        assert_eq!(orchestrator.current().await.unwrap().ticket, 2);
    }
}
