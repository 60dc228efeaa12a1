//! Core of the meal planner: turns a [`UserProfile`] into an LLM prompt,
//! repairs the model's semi-structured reply into a strict [`MealPlan`], and
//! lays that plan out onto fixed-size pages.
//!
//! ```text
//! UserProfile --build_prompt--> prompt text --CompletionClient--> raw text
//!     raw text --normalize--> MealPlan --DocumentLayoutEngine--> Document
//! ```
//!
//! [`PlanRequestOrchestrator`] wires the stages together for one submission.

pub mod layout;
pub mod llm;
pub mod normalize;
pub mod orchestrator;
pub mod plan;
pub mod profile;
pub mod prompt;

pub use layout::{
    Document, DocumentLayoutEngine, DocumentWriter, DrawInstruction, FontStyle, LayoutConfig,
    TextDocumentWriter,
};
pub use llm::{ChatEndpoint, CompletionClient, CompletionRequest, OpenAiClient, Relay, UpstreamError};
pub use normalize::{MalformedResponseError, RepairReport, normalize, normalize_for_profile};
pub use orchestrator::{CurrentPlan, PlanError, PlanRequestOrchestrator, RequestSettings};
pub use plan::{DayPlan, Macros, MacroRatio, Meal, MealPlan, MealSlotKey, NutrientTotals, PlanSummary};
pub use profile::{DietPreference, Gender, Goal, UserProfile, ValidationError};
pub use prompt::{SYSTEM_INSTRUCTION, SlotAllocation, allocate_calories, build_prompt};
