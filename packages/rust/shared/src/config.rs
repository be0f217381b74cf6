//! Application configuration for toolscout.
//!
//! User config lives at `~/.toolscout/toolscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolscoutError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "toolscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".toolscout";

// ---------------------------------------------------------------------------
// Config structs (matching toolscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Analysis service settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Pipeline pacing and scheduling.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.toolscout/toolscout.db".into()
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for tool analysis.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Transport timeout for one analysis request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.2
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Pause after each record attempt within a batch.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Initial value of the auto-trigger flag (not persisted across restarts).
    #[serde(default = "default_true")]
    pub auto_trigger: bool,

    /// Warm-up delay before the startup batch.
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,

    /// Interval between scheduled batches.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit(),
            auto_trigger: true,
            startup_delay_secs: default_startup_delay(),
            interval_secs: default_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_startup_delay() -> u64 {
    10
}
fn default_interval() -> u64 {
    2 * 60 * 60
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause after each record attempt.
    pub rate_limit: Duration,
    /// Initial auto-trigger flag value.
    pub auto_trigger: bool,
    /// Delay before the startup batch.
    pub startup_delay: Duration,
    /// Interval between scheduled batches.
    pub interval: Duration,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            rate_limit: Duration::from_millis(config.pipeline.rate_limit_ms),
            auto_trigger: config.pipeline.auto_trigger,
            startup_delay: Duration::from_secs(config.pipeline.startup_delay_secs),
            interval: Duration::from_secs(config.pipeline.interval_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.toolscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ToolscoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.toolscout/toolscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ToolscoutError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ToolscoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ToolscoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ToolscoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ToolscoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` in the configured database path.
pub fn resolve_database_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.database_path;
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| ToolscoutError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Check values that would only fail later, deep inside a run.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    url::Url::parse(&config.analysis.base_url).map_err(|e| {
        ToolscoutError::config(format!(
            "analysis.base_url '{}' is not a valid URL: {e}",
            config.analysis.base_url
        ))
    })?;

    if config.pipeline.interval_secs == 0 {
        return Err(ToolscoutError::config(
            "pipeline.interval_secs must be greater than zero",
        ));
    }
    Ok(())
}

/// Check that the analysis API key env var is set and non-empty, returning it.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.analysis.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ToolscoutError::config(format!(
            "analysis API key not found. Set the {var_name} environment variable."
        ))),
    }
}
