//! CLI handlers for the plan pipeline.
//!
//! Implements:
//! - `mealplan prompt <profile>`      -- print the prompt for a profile
//! - `mealplan normalize <response>`  -- repair a saved model reply offline
//! - `mealplan generate <profile>`    -- call the model and save the plan

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use mealplan_core::llm::OpenAiClient;
use mealplan_core::normalize::{RepairReport, normalize_with_report};
use mealplan_core::orchestrator::{PlanError, PlanRequestOrchestrator};
use mealplan_core::plan::MealSlotKey;
use mealplan_core::profile::{MAX_DAYS, UserProfile};
use mealplan_core::prompt::{SYSTEM_INSTRUCTION, build_prompt};

use crate::config::{DEFAULT_BASE_URL, MealplanConfig};
use crate::export_cmd::{DocumentFormat, render_document, write_output, write_plan};

// -----------------------------------------------------------------------
// Input helpers
// -----------------------------------------------------------------------

/// Read a file, or stdin when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Load a profile from JSON, or from TOML when the file ends in `.toml`.
pub fn load_profile(path: &Path) -> Result<UserProfile> {
    let content = read_input(path)?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let profile: UserProfile = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("failed to parse profile file: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse profile file: {}", path.display()))?
    };
    Ok(profile)
}

fn print_repairs(report: &RepairReport) {
    if report.is_clean() {
        eprintln!("Response matched the expected shape; nothing repaired.");
        return;
    }
    eprintln!("Repairs:");
    if !report.synthesized_days.is_empty() {
        let days: Vec<String> = report.synthesized_days.iter().map(u32::to_string).collect();
        eprintln!("  missing days filled:   {}", days.join(", "));
    }
    eprintln!("  meals filled:          {}", report.synthesized_meals);
    eprintln!("  fields defaulted:      {}", report.defaulted_fields);
    if !report.ignored_keys.is_empty() {
        eprintln!("  ignored keys:          {}", report.ignored_keys.join(", "));
    }
}

// -----------------------------------------------------------------------
// mealplan prompt <profile>
// -----------------------------------------------------------------------

pub fn cmd_prompt(profile_path: &Path, with_system: bool) -> Result<()> {
    let profile = load_profile(profile_path)?;
    profile.validate().context("profile is not valid")?;

    if with_system {
        println!("{SYSTEM_INSTRUCTION}");
        println!();
    }
    println!("{}", build_prompt(&profile));
    Ok(())
}

// -----------------------------------------------------------------------
// mealplan normalize <response>
// -----------------------------------------------------------------------

pub fn cmd_normalize(response_path: &Path, days: u32, meals: u32, output: Option<&Path>) -> Result<()> {
    if days == 0 || days > MAX_DAYS {
        bail!("--days must be between 1 and {MAX_DAYS}, got {days}");
    }
    let max_meals = MealSlotKey::ALL.len();
    if meals == 0 || meals as usize > max_meals {
        bail!("--meals must be between 1 and {max_meals}, got {meals}");
    }
    let slots = MealSlotKey::for_meal_count(meals);

    let raw = read_input(response_path)?;
    let (plan, report) = normalize_with_report(&raw, days, slots)?;
    print_repairs(&report);

    let json = serde_json::to_string_pretty(&plan.to_response_json())
        .context("failed to serialize plan")?;
    println!("{json}");

    if let Some(path) = output {
        write_plan(&plan, path)?;
        eprintln!("Plan saved to {}", path.display());
    }
    Ok(())
}

// -----------------------------------------------------------------------
// mealplan generate <profile>
// -----------------------------------------------------------------------

pub struct GenerateOptions<'a> {
    pub output: Option<&'a Path>,
    pub document: Option<&'a Path>,
    pub format: DocumentFormat,
}

pub async fn cmd_generate(profile_path: &Path, config: &MealplanConfig, options: &GenerateOptions<'_>) -> Result<()> {
    let profile = load_profile(profile_path)?;

    if config.endpoint.api_key.is_none() && config.endpoint.base_url == DEFAULT_BASE_URL {
        tracing::warn!("no API key configured; set MEALPLAN_API_KEY or run `mealplan init --api-key ...`");
    }

    let client = OpenAiClient::new(config.endpoint.clone())?;
    let orchestrator = PlanRequestOrchestrator::new(Arc::new(client), config.settings.clone());

    let installed = orchestrator
        .submit(&profile)
        .await
        .map_err(|e| match e {
            PlanError::Upstream(_) => anyhow::anyhow!(e.user_message()),
            _ => anyhow::anyhow!("{}\n  cause: {e}", e.user_message()),
        })?;
    let plan = &installed.plan;

    eprintln!("Plan generated.");
    eprintln!();
    eprintln!("  Plan ID:  {}", installed.id);
    eprintln!("  Model:    {}", config.settings.model);
    eprintln!("  Days:     {}", plan.days.len());
    eprintln!("  Meals:    {}", plan.meal_count());
    print_repairs(&installed.report);

    match options.output {
        Some(path) => {
            write_plan(plan, path)?;
            eprintln!("Plan saved to {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(&plan.to_response_json())
                .context("failed to serialize plan")?;
            println!("{json}");
        }
    }

    if let Some(path) = options.document {
        let rendered = render_document(plan, options.format)?;
        write_output(&rendered, Some(path))?;
        eprintln!("Document written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealplan_test_utils::sample_profile;

    #[test]
    fn loads_json_and_toml_profiles() {
        let tmp = tempfile::TempDir::new().unwrap();
        let expected = sample_profile();

        let json_path = tmp.path().join("me.json");
        std::fs::write(&json_path, serde_json::to_string(&expected).unwrap()).unwrap();
        assert_eq!(load_profile(&json_path).unwrap(), expected);

        let toml_path = tmp.path().join("me.toml");
        std::fs::write(
            &toml_path,
            r#"
name = "Asha"
age = 28
gender = "female"
height_cm = 165.0
weight_kg = 60.0
diet = "vegetarian"
goal = "weight_loss"
daily_calories = 2000
meals_per_day = 4
days = 2
notes = "peanuts"
cuisine = "South Indian"
"#,
        )
        .unwrap();
        assert_eq!(load_profile(&toml_path).unwrap(), expected);
    }

    #[test]
    fn bad_profile_names_the_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_profile(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn normalize_rejects_bad_counts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reply.txt");
        std::fs::write(&path, "{}").unwrap();

        assert!(cmd_normalize(&path, 0, 3, None).is_err());
        assert!(cmd_normalize(&path, 2, 7, None).is_err());
        assert!(cmd_normalize(&path, 2, 3, None).is_ok());
    }
}
