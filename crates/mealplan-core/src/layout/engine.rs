use tracing::debug;

use super::instructions::{Document, DrawInstruction, FontStyle};
use super::measure::{FixedWidthMeasurer, TextMeasurer, wrap_text};
use super::LayoutConfig;
use crate::plan::{DayPlan, Meal, MealPlan, MealSlotKey};

const NAME_INDENT: f32 = 5.0;
const BODY_INDENT: f32 = 10.0;
/// Running header baseline and rule, measured up from the top margin.
const HEADER_TEXT_RISE: f32 = 8.0;
const HEADER_RULE_RISE: f32 = 4.0;

/// Lays a [`MealPlan`] out onto fixed-size pages.
///
/// Rendering is deterministic: the same plan, config and measurer always
/// produce the same instruction stream.
pub struct DocumentLayoutEngine<M: TextMeasurer = FixedWidthMeasurer> {
    config: LayoutConfig,
    measurer: M,
}

impl DocumentLayoutEngine<FixedWidthMeasurer> {
    pub fn with_defaults() -> Self {
        Self::new(LayoutConfig::default(), FixedWidthMeasurer::default())
    }
}

impl Default for DocumentLayoutEngine<FixedWidthMeasurer> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<M: TextMeasurer> DocumentLayoutEngine<M> {
    pub fn new(config: LayoutConfig, measurer: M) -> Self {
        Self { config, measurer }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn render(&self, plan: &MealPlan) -> Document {
        let mut pager = Pager::new(&self.config, &self.measurer);

        pager.title();
        self.summary_lines(&mut pager, plan);
        for (day, day_plan) in &plan.days {
            self.day(&mut pager, *day, day_plan, plan.summary.target_calories);
        }
        pager.footer();

        let document = pager.finish();
        debug!(
            days = plan.days.len(),
            pages = document.page_count,
            instructions = document.instructions.len(),
            "laid out meal plan"
        );
        document
    }

    fn summary_lines(&self, pager: &mut Pager<'_>, plan: &MealPlan) {
        let c = &self.config;
        let x = c.page.margin;
        if let Some(name) = plan.summary.display_name.as_deref() {
            pager.wrapped(x, &format!("Prepared for {name}"), FontStyle::Italic, c.body_size);
        }
        if plan.summary.target_calories > 0 {
            let line = format!(
                "Daily target: {} kcal | {}",
                plan.summary.target_calories, plan.summary.macro_ratio
            );
            pager.wrapped(x, &line, FontStyle::Italic, c.body_size);
        }
    }

    fn day(&self, pager: &mut Pager<'_>, day: u32, day_plan: &DayPlan, target: u32) {
        let c = &self.config;
        pager.line(
            c.page.margin,
            &format!("DAY {day}"),
            FontStyle::Bold,
            c.day_header_size,
            c.day_header_advance,
        );

        for (slot, meal) in &day_plan.meals {
            self.meal(pager, *slot, meal);
        }

        let total = day_plan.total_calories();
        let line = if target > 0 {
            format!("Daily total: {total} kcal (target {target} kcal)")
        } else {
            format!("Daily total: {total} kcal")
        };
        pager.wrapped(c.page.margin, &line, FontStyle::Bold, c.body_size);
        pager.gap(c.day_gap);
    }

    fn meal(&self, pager: &mut Pager<'_>, slot: MealSlotKey, meal: &Meal) {
        let c = &self.config;
        let name_x = c.page.margin + NAME_INDENT;
        let body_x = c.page.margin + BODY_INDENT;

        pager.wrapped(
            name_x,
            &format!("{}: {}", slot.label(), meal.name),
            FontStyle::Bold,
            c.meal_name_size,
        );

        if !meal.ingredients.is_empty() {
            let text = format!("Ingredients: {}", meal.ingredients_text());
            pager.wrapped(body_x, &text, FontStyle::Normal, c.body_size);
        }

        let mut energy = format!("Calories: {} kcal", meal.calories);
        if c.show_macros && !meal.macros.is_zero() {
            energy.push_str(&format!(
                " | Protein: {} g | Carbs: {} g | Fat: {} g",
                meal.macros.protein, meal.macros.carbs, meal.macros.fat
            ));
        }
        pager.wrapped(body_x, &energy, FontStyle::Normal, c.body_size);

        if !meal.preparation.is_empty() {
            let text = format!("Preparation: {}", meal.preparation);
            pager.wrapped(body_x, &text, FontStyle::Italic, c.body_size);
        }

        pager.gap(c.meal_gap);
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Position of the next baseline. Lives for a single `render` call.
#[derive(Debug, Clone, Copy)]
struct LayoutCursor {
    page: usize,
    y: f32,
}

struct Pager<'a> {
    config: &'a LayoutConfig,
    measurer: &'a dyn TextMeasurer,
    cursor: LayoutCursor,
    out: Vec<DrawInstruction>,
}

impl<'a> Pager<'a> {
    fn new(config: &'a LayoutConfig, measurer: &'a dyn TextMeasurer) -> Self {
        Self {
            config,
            measurer,
            cursor: LayoutCursor {
                page: 0,
                y: config.page.top_margin + config.title_height,
            },
            out: Vec::new(),
        }
    }

    fn place(&mut self, x: f32, y: f32, text: &str, style: FontStyle, size: f32) {
        self.out.push(DrawInstruction::PlaceText {
            x,
            y,
            text: text.to_owned(),
            style,
            size,
        });
    }

    fn centred(&mut self, y: f32, text: &str, style: FontStyle, size: f32) {
        let width = self.measurer.width(text, style, size);
        let x = ((self.config.page.width - width) / 2.0).max(0.0);
        self.place(x, y, text, style, size);
    }

    fn title(&mut self) {
        let c = self.config;
        self.centred(c.page.top_margin, &c.title, FontStyle::Bold, c.title_size);
    }

    /// Breaks to a fresh page when the next line would cross the content
    /// limit. A page that has no content yet is never abandoned.
    fn ensure_room(&mut self, advance: f32) {
        let page = &self.config.page;
        let at_top = self.cursor.y <= page.top_margin;
        if !at_top && self.cursor.y + advance > page.content_limit() {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        self.out.push(DrawInstruction::StartNewPage);
        self.cursor = LayoutCursor {
            page: self.cursor.page + 1,
            y: self.config.page.top_margin,
        };

        let c = self.config;
        if let Some(header) = c.running_header.as_deref() {
            let top = c.page.top_margin;
            self.place(
                c.page.margin,
                top - HEADER_TEXT_RISE,
                header,
                FontStyle::Italic,
                c.running_header_size,
            );
            self.out.push(DrawInstruction::DrawLine {
                x1: c.page.margin,
                y1: top - HEADER_RULE_RISE,
                x2: c.page.width - c.page.margin,
                y2: top - HEADER_RULE_RISE,
            });
        }
    }

    fn line(&mut self, x: f32, text: &str, style: FontStyle, size: f32, advance: f32) {
        self.ensure_room(advance);
        let y = self.cursor.y;
        self.place(x, y, text, style, size);
        self.cursor.y += advance;
    }

    /// Wraps `text` to the width left between `x` and the right margin and
    /// emits one line per wrapped row.
    fn wrapped(&mut self, x: f32, text: &str, style: FontStyle, size: f32) {
        let max_width = self.config.page.width - self.config.page.margin - x;
        let advance = self.config.line_height;
        for row in wrap_text(self.measurer, text, max_width, style, size) {
            self.line(x, &row, style, size, advance);
        }
    }

    fn gap(&mut self, amount: f32) {
        self.cursor.y += amount;
    }

    /// Footer baselines sit between the content limit and the page bottom,
    /// so they never collide with content on the final page.
    fn footer(&mut self) {
        let c = self.config;
        let first = c.page.height - c.footer_offset;
        for (i, line) in c.footer_lines.iter().enumerate() {
            let y = first + i as f32 * c.footer_line_spacing;
            self.centred(y, line, FontStyle::Italic, c.footer_size);
        }
    }

    fn finish(self) -> Document {
        Document {
            page_count: self.cursor.page + 1,
            instructions: self.out,
        }
    }
}
