use std::fmt::Write as _;

use super::instructions::{DocumentWriter, FontStyle};

const RULE_WIDTH: usize = 60;

#[derive(Debug)]
enum Row {
    Text { x: f32, text: String },
    Rule,
}

/// Renders a document as plain text, one block per page, rows ordered top
/// to bottom.
#[derive(Debug)]
pub struct TextDocumentWriter {
    pages: Vec<Vec<(f32, Row)>>,
}

impl TextDocumentWriter {
    pub fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
        }
    }

    fn current(&mut self) -> &mut Vec<(f32, Row)> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}

impl Default for TextDocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentWriter for TextDocumentWriter {
    type Output = String;

    fn place_text(&mut self, x: f32, y: f32, text: &str, _style: FontStyle, _size: f32) {
        self.current().push((
            y,
            Row::Text {
                x,
                text: text.to_owned(),
            },
        ));
    }

    fn draw_line(&mut self, _x1: f32, y1: f32, _x2: f32, y2: f32) {
        self.current().push((y1.min(y2), Row::Rule));
    }

    fn start_new_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn finish(self) -> String {
        let total = self.pages.len();
        let mut out = String::new();
        for (index, mut rows) in self.pages.into_iter().enumerate() {
            // Stable sort keeps emission order for rows on the same baseline.
            rows.sort_by(|a, b| {
                let ax = match &a.1 {
                    Row::Text { x, .. } => *x,
                    Row::Rule => 0.0,
                };
                let bx = match &b.1 {
                    Row::Text { x, .. } => *x,
                    Row::Rule => 0.0,
                };
                a.0.total_cmp(&b.0).then(ax.total_cmp(&bx))
            });

            if index > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "=== Page {} of {} ===", index + 1, total);
            for (_, row) in rows {
                match row {
                    Row::Text { text, .. } => out.push_str(&text),
                    Row::Rule => out.push_str(&"-".repeat(RULE_WIDTH)),
                }
                out.push('\n');
            }
        }
        out
    }
}
