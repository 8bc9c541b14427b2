//! Configuration loading and startup validation.
//!
//! Configuration comes from a TOML file with environment-variable overrides
//! for the secrets. Validation is deliberately fatal and runs before the
//! poll loop starts: the pipeline must never begin consuming the watermark
//! without working credentials.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Top-level configuration for the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub tasks: TasksConfig,
    #[serde(default)]
    pub engine: EngineSection,
}

/// Messenger database and watermark locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the messenger's SQLite database file.
    pub path: PathBuf,
    /// Path of the watermark file.
    #[serde(default = "default_watermark_path")]
    pub watermark_path: PathBuf,
}

/// Classification model endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// "openai" or "anthropic".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// API key; usually supplied via OPENAI_API_KEY / ANTHROPIC_API_KEY.
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    /// Optional base URL for OpenAI-compatible endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Calendar sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConfig {
    /// OAuth bearer token; usually supplied via INBOXPILOT_CALENDAR_TOKEN.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// IANA timezone label sent with event timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Fixed local offset applied to event timestamps.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

/// Task sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TasksConfig {
    /// OAuth bearer token; usually supplied via INBOXPILOT_TASKS_TOKEN.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_tasklist_id")]
    pub tasklist_id: String,
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            pace_ms: default_pace_ms(),
            debounce_ms: default_debounce_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_watermark_path() -> PathBuf {
    PathBuf::from("last_processed")
}
fn default_provider() -> String {
    "openai".to_owned()
}
fn default_calendar_id() -> String {
    "primary".to_owned()
}
fn default_timezone() -> String {
    "Asia/Seoul".to_owned()
}
fn default_utc_offset_hours() -> i32 {
    9
}
fn default_tasklist_id() -> String {
    "@default".to_owned()
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_pace_ms() -> u64 {
    1_000
}
fn default_debounce_ms() -> u64 {
    2_000
}
fn default_settle_ms() -> u64 {
    2_000
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull secrets and paths from the environment when set.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("INBOXPILOT_STORE_PATH")
            && !path.is_empty()
        {
            self.store.path = PathBuf::from(path);
        }

        let key_var = match self.llm.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        if let Ok(key) = std::env::var(key_var)
            && !key.is_empty()
        {
            self.llm.api_key = key;
        }

        if let Ok(token) = std::env::var("INBOXPILOT_CALENDAR_TOKEN")
            && !token.is_empty()
        {
            self.calendar.token = token;
        }
        if let Ok(token) = std::env::var("INBOXPILOT_TASKS_TOKEN")
            && !token.is_empty()
        {
            self.tasks.token = token;
        }
    }

    /// Validate what the read-only commands need: a reachable store.
    pub fn validate_store(&self) -> Result<()> {
        if self.store.path.as_os_str().is_empty() {
            bail!("store.path is not set");
        }
        if !self.store.path.exists() {
            bail!(
                "messenger database not found at {}",
                self.store.path.display()
            );
        }
        Ok(())
    }

    /// Validate everything the pipeline needs before it may start polling.
    pub fn validate(&self) -> Result<()> {
        self.validate_store()?;

        match self.llm.provider.as_str() {
            "openai" | "anthropic" => {}
            other => bail!("llm.provider must be \"openai\" or \"anthropic\", got {other:?}"),
        }
        if self.llm.api_key.trim().is_empty() {
            bail!("llm.api_key is not set (config or provider key env var)");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model is not set");
        }
        if self.calendar.token.trim().is_empty() {
            bail!("calendar.token is not set (config or INBOXPILOT_CALENDAR_TOKEN)");
        }
        if self.tasks.token.trim().is_empty() {
            bail!("tasks.token is not set (config or INBOXPILOT_TASKS_TOKEN)");
        }
        self.utc_offset()?;
        Ok(())
    }

    /// The fixed local offset for event timestamps.
    pub fn utc_offset(&self) -> Result<chrono::FixedOffset> {
        self.calendar
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(chrono::FixedOffset::east_opt)
            .with_context(|| {
                format!(
                    "calendar.utc_offset_hours out of range: {}",
                    self.calendar.utc_offset_hours
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
