mod config;
mod export_cmd;
mod plan_cmds;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use mealplan_core::llm::{OpenAiClient, Relay};
use mealplan_core::orchestrator::{DEFAULT_MODEL, PlanRequestOrchestrator};

use config::{CliOverrides, MealplanConfig};
use export_cmd::DocumentFormat;

#[derive(Parser)]
#[command(name = "mealplan", about = "Personalized meal plans from an LLM, laid out for print")]
struct Cli {
    /// Chat-completions base URL (overrides MEALPLAN_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model name (overrides MEALPLAN_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Sampling temperature, 0 to 2
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// API key (overrides MEALPLAN_API_KEY / OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a mealplan config file from --base-url, --model and --api-key
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the prompt that would be sent for a profile
    Prompt {
        /// Profile file (JSON, or TOML with a .toml extension; `-` for stdin)
        profile: PathBuf,
        /// Also print the system instruction
        #[arg(long)]
        system: bool,
    },
    /// Repair a raw model response into a strict plan, without calling the model
    Normalize {
        /// File holding the raw model text (`-` for stdin)
        response: PathBuf,
        /// Number of days expected
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Meals per day expected
        #[arg(long, default_value_t = 4)]
        meals: u32,
        /// Also save the plan for `mealplan export`
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a plan for a profile by calling the model
    Generate {
        /// Profile file (JSON, or TOML with a .toml extension; `-` for stdin)
        profile: PathBuf,
        /// Save the plan here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write the laid-out document here
        #[arg(long)]
        document: Option<PathBuf>,
        /// Document format
        #[arg(long, value_enum, default_value_t = DocumentFormat::Text)]
        format: DocumentFormat,
    },
    /// Lay out a saved plan as a paginated document
    Export {
        /// Plan file written by `generate --output` or `normalize --output`
        plan: PathBuf,
        /// Document format
        #[arg(long, value_enum, default_value_t = DocumentFormat::Text)]
        format: DocumentFormat,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the plan API and the completion relay over HTTP
    Serve {
        /// Address to bind
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            bind: None,
            port: None,
        }
    }
}

/// Execute the `mealplan init` command: write config file.
fn cmd_init(
    url: &str,
    model: &str,
    temperature: Option<f32>,
    key: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        llm: config::LlmSection {
            base_url: Some(url.to_string()),
            model: Some(model.to_string()),
            temperature,
            api_key: key.map(str::to_string),
        },
        server: config::ServerSection::default(),
    };
    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  llm.base_url = {url}");
    println!("  llm.model = {model}");
    if let Some(t) = temperature {
        println!("  llm.temperature = {t}");
    }
    match key {
        Some(k) => {
            let prefix: String = k.chars().take(4).collect();
            println!("  llm.api_key = {prefix}...");
        }
        None => {
            println!();
            println!("No API key stored. Set MEALPLAN_API_KEY before running `mealplan generate`.");
        }
    }

    Ok(())
}

/// Execute the `mealplan serve` command.
async fn cmd_serve(config: &MealplanConfig) -> anyhow::Result<()> {
    let client = OpenAiClient::new(config.endpoint.clone())?;
    let relay = Relay::new(config.endpoint.clone())?;
    let state = serve_cmd::AppState {
        orchestrator: Arc::new(PlanRequestOrchestrator::new(
            Arc::new(client),
            config.settings.clone(),
        )),
        relay: Arc::new(relay),
    };
    tracing::info!(
        model = %config.settings.model,
        provider = %config.endpoint.base_url,
        "starting plan server"
    );
    serve_cmd::run_serve(state, &config.bind, config.port).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Commands::Init { force } => {
            let url = overrides.base_url.as_deref().unwrap_or(config::DEFAULT_BASE_URL);
            let model = overrides.model.as_deref().unwrap_or(DEFAULT_MODEL);
            cmd_init(url, model, overrides.temperature, overrides.api_key.as_deref(), force)?;
        }
        Commands::Prompt { profile, system } => {
            plan_cmds::cmd_prompt(&profile, system)?;
        }
        Commands::Normalize {
            response,
            days,
            meals,
            output,
        } => {
            plan_cmds::cmd_normalize(&response, days, meals, output.as_deref())?;
        }
        Commands::Generate {
            profile,
            output,
            document,
            format,
        } => {
            let resolved = MealplanConfig::resolve(&overrides)?;
            let options = plan_cmds::GenerateOptions {
                output: output.as_deref(),
                document: document.as_deref(),
                format,
            };
            plan_cmds::cmd_generate(&profile, &resolved, &options).await?;
        }
        Commands::Export {
            plan,
            format,
            output,
        } => {
            export_cmd::run_export(&plan, format, output.as_deref())?;
        }
        Commands::Serve { bind, port } => {
            let resolved = MealplanConfig::resolve(&CliOverrides {
                bind,
                port,
                ..overrides
            })?;
            cmd_serve(&resolved).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mealplan", &mut std::io::stdout());
        }
    }

    Ok(())
}
