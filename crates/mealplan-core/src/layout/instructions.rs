//! Backend-agnostic draw instructions and the finished [`Document`].

use serde::{Deserialize, Serialize};

/// Font variant for a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    Normal,
    Bold,
    Italic,
}

/// One unit of paginated content. Coordinates are millimetres from the top
/// left corner of the current page; text `y` is the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawInstruction {
    PlaceText {
        x: f32,
        y: f32,
        text: String,
        style: FontStyle,
        size: f32,
    },
    DrawLine {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    StartNewPage,
}

/// A laid-out document: the instruction stream for every page, in order.
/// The first page is implicit; each later page starts with
/// [`DrawInstruction::StartNewPage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_count: usize,
    pub instructions: Vec<DrawInstruction>,
}

impl Document {
    /// Instructions grouped per page, without the page separators.
    pub fn pages(&self) -> Vec<&[DrawInstruction]> {
        self.instructions
            .split(|i| matches!(i, DrawInstruction::StartNewPage))
            .collect()
    }

    /// Every placed string, in emission order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(|i| match i {
            DrawInstruction::PlaceText { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Replay the instructions into a document-writing backend.
    pub fn write_to<W: DocumentWriter>(&self, mut writer: W) -> W::Output {
        for instruction in &self.instructions {
            match instruction {
                DrawInstruction::PlaceText {
                    x,
                    y,
                    text,
                    style,
                    size,
                } => writer.place_text(*x, *y, text, *style, *size),
                DrawInstruction::DrawLine { x1, y1, x2, y2 } => {
                    writer.draw_line(*x1, *y1, *x2, *y2)
                }
                DrawInstruction::StartNewPage => writer.start_new_page(),
            }
        }
        writer.finish()
    }
}

/// A concrete document format (PDF, plain text, ...) that consumes draw
/// instructions. The writer starts on its first page.
pub trait DocumentWriter {
    type Output;

    fn place_text(&mut self, x: f32, y: f32, text: &str, style: FontStyle, size: f32);
    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);
    fn start_new_page(&mut self);
    fn finish(self) -> Self::Output;
}
