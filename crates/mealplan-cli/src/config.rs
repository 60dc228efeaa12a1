//! Configuration file management for mealplan.
//!
//! Provides a TOML-based config file at `~/.config/mealplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use mealplan_core::llm::ChatEndpoint;
use mealplan_core::orchestrator::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, RequestSettings};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

pub const ENV_API_KEY: &str = "MEALPLAN_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "MEALPLAN_BASE_URL";
pub const ENV_MODEL: &str = "MEALPLAN_MODEL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the mealplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/mealplan` or
/// `~/.config/mealplan`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("mealplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mealplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file may hold an API key, so it is made owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct MealplanConfig {
    pub endpoint: ChatEndpoint,
    pub settings: RequestSettings,
    pub bind: String,
    pub port: u16,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl MealplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default. A missing config file is not an error.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = if config_path().exists() {
            Some(load_config()?)
        } else {
            None
        };
        Self::resolve_with(cli, file.unwrap_or_default())
    }

    /// - API key: CLI > `MEALPLAN_API_KEY` > `OPENAI_API_KEY` > `llm.api_key` > none
    /// - Base URL: CLI > `MEALPLAN_BASE_URL` > `llm.base_url` > OpenAI
    /// - Model: CLI > `MEALPLAN_MODEL` > `llm.model` > `gpt-4o-mini`
    /// - Temperature, bind, port: CLI > config file > default
    pub fn resolve_with(cli: &CliOverrides, file: ConfigFile) -> Result<Self> {
        let ConfigFile { llm, server } = file;

        let api_key = cli
            .api_key
            .clone()
            .or_else(|| env_var(ENV_API_KEY))
            .or_else(|| env_var(ENV_OPENAI_API_KEY))
            .or(llm.api_key);

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env_var(ENV_BASE_URL))
            .or(llm.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("base URL must start with http:// or https://, got {base_url}");
        }

        let model = cli
            .model
            .clone()
            .or_else(|| env_var(ENV_MODEL))
            .or(llm.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = cli
            .temperature
            .or(llm.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            bail!("temperature must be between 0 and 2, got {temperature}");
        }

        Ok(Self {
            endpoint: ChatEndpoint::new(base_url, api_key),
            settings: RequestSettings { model, temperature },
            bind: cli
                .bind
                .clone()
                .or(server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: cli.port.or(server.port).unwrap_or(DEFAULT_PORT),
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
