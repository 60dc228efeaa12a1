//! Paginated document layout for a normalized [`MealPlan`](crate::plan::MealPlan).
//!
//! The engine turns a plan into a flat stream of [`DrawInstruction`]s that any
//! [`DocumentWriter`] backend can replay. All geometry is in millimetres with
//! the origin at the top left of the page.

mod engine;
mod instructions;
mod measure;
mod text;

pub use engine::DocumentLayoutEngine;
pub use instructions::{Document, DocumentWriter, DrawInstruction, FontStyle};
pub use measure::{FixedWidthMeasurer, PT_TO_MM, TextMeasurer, wrap_text};
pub use text::TextDocumentWriter;

/// Physical page size and margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    /// Left and right margin.
    pub margin: f32,
    pub top_margin: f32,
    pub bottom_margin: f32,
}

impl PageGeometry {
    /// ISO A4 portrait.
    pub const A4: PageGeometry = PageGeometry {
        width: 210.0,
        height: 297.0,
        margin: 15.0,
        top_margin: 20.0,
        bottom_margin: 25.0,
    };

    /// Lowest baseline content may reach on a page.
    pub fn content_limit(&self) -> f32 {
        self.height - self.bottom_margin
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4
    }
}

/// Everything the layout engine needs besides the plan itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub page: PageGeometry,

    pub title: String,
    pub title_size: f32,
    /// Vertical space reserved for the title on the first page.
    pub title_height: f32,

    /// Repeated inside the top margin of every continuation page, above a
    /// rule. `None` disables it.
    pub running_header: Option<String>,
    pub running_header_size: f32,

    pub day_header_size: f32,
    pub day_header_advance: f32,
    pub meal_name_size: f32,
    pub body_size: f32,
    pub line_height: f32,
    pub meal_gap: f32,
    pub day_gap: f32,

    /// Append protein/carbs/fat to each meal's calorie line.
    pub show_macros: bool,

    /// Printed centred at the bottom of the final page.
    pub footer_lines: Vec<String>,
    pub footer_size: f32,
    /// Distance from the page bottom to the first footer baseline.
    pub footer_offset: f32,
    pub footer_line_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page: PageGeometry::A4,
            title: "MY PERSONALIZED MEAL PLAN".to_string(),
            title_size: 18.0,
            title_height: 15.0,
            running_header: Some("Personalized Meal Plan (continued)".to_string()),
            running_header_size: 9.0,
            day_header_size: 14.0,
            day_header_advance: 9.0,
            meal_name_size: 12.0,
            body_size: 11.0,
            line_height: 7.0,
            meal_gap: 5.0,
            day_gap: 10.0,
            show_macros: true,
            footer_lines: vec![
                "Stay hydrated: drink 2-3 litres of water throughout the day.".to_string(),
                "Generated by AI Meal Planner".to_string(),
            ],
            footer_size: 10.0,
            footer_offset: 20.0,
            footer_line_spacing: 6.0,
        }
    }
}
