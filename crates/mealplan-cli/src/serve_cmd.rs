use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use mealplan_core::llm::Relay;
use mealplan_core::normalize::RepairReport;
use mealplan_core::orchestrator::{CurrentPlan, PlanError, PlanRequestOrchestrator};
use mealplan_core::plan::{MealPlan, PlanSummary};
use mealplan_core::profile::UserProfile;

use crate::export_cmd::{DocumentFormat, render_document};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        let status = match &err {
            PlanError::Validation(_) => StatusCode::BAD_REQUEST,
            PlanError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PlanError::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PlanError::Superseded { .. } => StatusCode::CONFLICT,
        };
        Self::new(status, err.user_message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub synthesized_days: Vec<u32>,
    pub synthesized_meals: usize,
    pub defaulted_fields: usize,
    pub ignored_keys: Vec<String>,
}

impl From<&RepairReport> for RepairResponse {
    fn from(r: &RepairReport) -> Self {
        Self {
            synthesized_days: r.synthesized_days.clone(),
            synthesized_meals: r.synthesized_meals,
            defaulted_fields: r.defaulted_fields,
            ignored_keys: r.ignored_keys.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: Uuid,
    pub ticket: u64,
    pub generated_at: DateTime<Utc>,
    pub summary: PlanSummary,
    /// Days in the same shape the model was asked to produce.
    pub days: Value,
    pub repairs: RepairResponse,
}

impl From<&CurrentPlan> for PlanResponse {
    fn from(current: &CurrentPlan) -> Self {
        Self {
            id: current.id,
            ticket: current.ticket,
            generated_at: current.generated_at,
            summary: current.plan.summary.clone(),
            days: current.plan.to_response_json(),
            repairs: RepairResponse::from(&current.report),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub format: DocumentFormat,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PlanRequestOrchestrator>,
    pub relay: Arc<Relay>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/generate", post(relay_generate))
        .route("/api/plans", post(create_plan))
        .route("/api/plans/current", get(current_plan))
        .route("/api/plans/current/document", get(current_document))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("mealplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("mealplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C; serving until killed");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Forward a raw chat-completions body to the provider with the server's key.
async fn relay_generate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<axum::response::Response, AppError> {
    let (status, payload) = state.relay.forward(&body).await.map_err(|e| {
        tracing::error!(error = %e, "relay request failed");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    })?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(payload)).into_response())
}

async fn create_plan(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<axum::response::Response, AppError> {
    let profile: UserProfile = serde_json::from_value(body)
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, format!("invalid profile: {e}")))?;

    let installed = state.orchestrator.submit(&profile).await?;
    Ok(Json(PlanResponse::from(&installed)).into_response())
}

async fn current_plan(State(state): State<AppState>) -> Result<axum::response::Response, AppError> {
    let current = state
        .orchestrator
        .current()
        .await
        .ok_or_else(|| AppError::not_found("no plan has been generated yet"))?;
    Ok(Json(PlanResponse::from(&current)).into_response())
}

async fn current_document(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<axum::response::Response, AppError> {
    let current = state
        .orchestrator
        .current()
        .await
        .ok_or_else(|| AppError::not_found("no plan has been generated yet"))?;

    let rendered = render_document(&current.plan, query.format).map_err(AppError::internal)?;
    let content_type = match query.format {
        DocumentFormat::Text => "text/plain; charset=utf-8",
        DocumentFormat::Json => "application/json",
    };
    Ok(([(axum::http::header::CONTENT_TYPE, content_type)], rendered).into_response())
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let body = match state.orchestrator.current().await {
        Some(current) => plan_cards(&current.plan),
        None => "<p>No plan yet. POST a profile to <code>/api/plans</code>.</p>".to_string(),
    };
    Html(format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>mealplan</title></head><body>\
<h1>Your meal plan</h1>\
<p><a href=\"/api/plans/current\">/api/plans/current</a> | \
<a href=\"/api/plans/current/document?format=text\">document</a></p>\
{body}\
</body></html>"
    ))
}

/// One card per day, one row per meal. All model text is escaped.
fn plan_cards(plan: &MealPlan) -> String {
    let mut html = String::new();
    for (day, day_plan) in &plan.days {
        html.push_str(&format!("<section class=\"day\"><h2>Day {day}</h2>"));
        for (slot, meal) in &day_plan.meals {
            html.push_str(&format!(
                "<div class=\"meal\"><h3>{slot}: {name}</h3><p>{calories} kcal</p>",
                slot = slot.label(),
                name = html_escape::encode_text(&meal.name),
                calories = meal.calories,
            ));
            if !meal.ingredients.is_empty() {
                html.push_str(&format!(
                    "<p>Ingredients: {}</p>",
                    html_escape::encode_text(&meal.ingredients_text())
                ));
            }
            if !meal.preparation.is_empty() {
                html.push_str(&format!(
                    "<p><em>{}</em></p>",
                    html_escape::encode_text(&meal.preparation)
                ));
            }
            html.push_str("</div>");
        }
        html.push_str(&format!(
            "<p><strong>Total: {} kcal</strong></p></section>",
            day_plan.total_calories()
        ));
    }
    html
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
