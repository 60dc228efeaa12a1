//! Text measurement and word wrapping.
//!
//! The layout engine never asks a rendering backend how wide a string is; it
//! goes through [`TextMeasurer`], so tests can use the deterministic
//! [`FixedWidthMeasurer`].

use super::instructions::FontStyle;

/// Millimetres per typographic point.
pub const PT_TO_MM: f32 = 0.352_778;

/// Measures rendered text width in millimetres.
pub trait TextMeasurer: Send + Sync {
    /// Width of `text` set in `style` at `size` points.
    fn width(&self, text: &str, style: FontStyle, size: f32) -> f32;
}

/// Every glyph has the same advance, a fixed fraction of the font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWidthMeasurer {
    /// Glyph advance as a fraction of the em size.
    pub em_fraction: f32,
}

impl FixedWidthMeasurer {
    pub const fn new(em_fraction: f32) -> Self {
        Self { em_fraction }
    }
}

impl Default for FixedWidthMeasurer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TextMeasurer for FixedWidthMeasurer {
    fn width(&self, text: &str, _style: FontStyle, size: f32) -> f32 {
        text.chars().count() as f32 * size * PT_TO_MM * self.em_fraction
    }
}

/// Split `text` into the fewest lines that each fit `max_width`, breaking
/// only at whitespace.
///
/// Greedy filling is optimal for line count here. A single word wider than
/// `max_width` is never split; it gets a line of its own. Runs of whitespace
/// collapse to one space. Blank text yields no lines.
pub fn wrap_text(
    measurer: &dyn TextMeasurer,
    text: &str,
    max_width: f32,
    style: FontStyle,
    size: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measurer.width(&candidate, style, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_owned()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
