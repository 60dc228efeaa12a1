use std::io::Write;
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use serde::Deserialize;

use mealplan_core::layout::{DocumentLayoutEngine, TextDocumentWriter};
use mealplan_core::plan::MealPlan;

/// Output format for a laid-out plan document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain text, one block per page
    #[default]
    Text,
    /// The draw instruction stream as JSON
    Json,
}

/// Lay out `plan` and render it in `format`.
pub fn render_document(plan: &MealPlan, format: DocumentFormat) -> anyhow::Result<String> {
    let document = DocumentLayoutEngine::with_defaults().render(plan);
    match format {
        DocumentFormat::Text => Ok(document.write_to(TextDocumentWriter::new())),
        DocumentFormat::Json => {
            serde_json::to_string_pretty(&document).context("failed to serialize document")
        }
    }
}

/// Read a plan saved by `generate --output` or `normalize --output`.
pub fn read_plan(path: &Path) -> anyhow::Result<MealPlan> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read plan file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a saved meal plan", path.display()))
}

pub fn write_plan(plan: &MealPlan, path: &Path) -> anyhow::Result<()> {
    let contents = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
    std::fs::write(path, contents)
        .with_context(|| format!("cannot write plan file: {}", path.display()))
}

/// Write `contents` to `output`, or to stdout when no path is given.
pub fn write_output(contents: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let mut writer: Box<dyn Write> = if let Some(path) = output {
        Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {}", path.display()))?,
        )
    } else {
        Box::new(std::io::stdout().lock())
    };
    writer.write_all(contents.as_bytes())?;
    if !contents.ends_with('\n') {
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export a saved plan as a document.
pub fn run_export(plan_path: &Path, format: DocumentFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let plan = read_plan(plan_path)?;
    let rendered = render_document(&plan, format)?;
    write_output(&rendered, output)?;

    if let Some(path) = output {
        println!(
            "Exported {} day(s), {} meal(s) to {}",
            plan.days.len(),
            plan.meal_count(),
            path.display()
        );
    }
    Ok(())
}
