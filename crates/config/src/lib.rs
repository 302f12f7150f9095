//! Configuration loading, validation, and management for Paperstack.
//!
//! Loads configuration from `~/.paperstack/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.paperstack/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key for the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Remote runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Loop round limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Session lifetime configuration
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Paper search backend configuration
    #[serde(default)]
    pub search: SearchConfig,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("gateway", &self.gateway)
            .field("runner", &self.runner)
            .field("limits", &self.limits)
            .field("sessions", &self.sessions)
            .field("search", &self.search)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Oldest chat conversations are evicted beyond this cap.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

fn default_port() -> u16 {
    41601
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_conversations() -> usize {
    100
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_conversations: default_max_conversations(),
        }
    }
}

/// Where remote sessions and deployments actually execute.
#[derive(Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// "local" runs sandboxes in this process; "remote" relays to base_url.
    #[serde(default = "default_runner_mode")]
    pub mode: String,

    /// Base URL of the remote runner (used when mode = "remote" and by the
    /// deploy tool).
    #[serde(default = "default_runner_base_url")]
    pub base_url: String,

    /// Sandbox workspace root; defaults to ~/.paperstack/workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<String>,

    /// Per-command timeout in the sandbox.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Per-step output cap in deployment summaries.
    #[serde(default = "default_max_step_output")]
    pub max_step_output: usize,
}

fn default_runner_mode() -> String {
    "local".into()
}
fn default_runner_base_url() -> String {
    format!("http://127.0.0.1:{}", default_port())
}
fn default_command_timeout() -> u64 {
    120
}
fn default_max_step_output() -> usize {
    3000
}

impl std::fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("mode", &self.mode)
            .field("base_url", &self.base_url)
            .field("workspace_root", &self.workspace_root)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("max_step_output", &self.max_step_output)
            .finish()
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: default_runner_mode(),
            base_url: default_runner_base_url(),
            workspace_root: None,
            command_timeout_secs: default_command_timeout(),
            max_step_output: default_max_step_output(),
        }
    }
}

impl RunnerConfig {
    /// The sandbox workspace root, falling back to the config directory.
    pub fn resolved_workspace_root(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) => PathBuf::from(root),
            None => AppConfig::workspace_dir(),
        }
    }
}

/// Hard round limits for the conversation loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// General chat loop
    #[serde(default = "default_chat_rounds")]
    pub chat_rounds: usize,

    /// Interactive remote coding-agent session
    #[serde(default = "default_session_rounds")]
    pub session_rounds: usize,

    /// Nested deployment run
    #[serde(default = "default_deploy_rounds")]
    pub deploy_rounds: usize,

    /// Nested deep-research run
    #[serde(default = "default_research_rounds")]
    pub research_rounds: usize,
}

fn default_chat_rounds() -> usize {
    8
}
fn default_session_rounds() -> usize {
    15
}
fn default_deploy_rounds() -> usize {
    25
}
fn default_research_rounds() -> usize {
    4
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            chat_rounds: default_chat_rounds(),
            session_rounds: default_session_rounds(),
            deploy_rounds: default_deploy_rounds(),
            research_rounds: default_research_rounds(),
        }
    }
}

/// Bounded session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are reaped.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the reaper scans.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

fn default_idle_timeout() -> u64 {
    1800
}
fn default_reap_interval() -> u64 {
    60
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

/// Paper search backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "catalog" (built-in deterministic index) or "elastic".
    #[serde(default = "default_search_backend")]
    pub backend: String,

    /// Elasticsearch endpoint.
    #[serde(default = "default_search_url")]
    pub url: String,

    /// Elasticsearch API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Index holding the paper corpus.
    #[serde(default = "default_search_index")]
    pub index: String,
}

fn default_search_backend() -> String {
    "catalog".into()
}
fn default_search_url() -> String {
    "http://localhost:9200".into()
}
fn default_search_index() -> String {
    "arxiv-papers-2026".into()
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("index", &self.index)
            .finish()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_search_backend(),
            url: default_search_url(),
            api_key: None,
            index: default_search_index(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            runner: RunnerConfig::default(),
            limits: LimitsConfig::default(),
            sessions: SessionsConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.paperstack/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PAPERSTACK_API_KEY` (highest priority)
    /// - `ANTHROPIC_API_KEY`
    /// - `PAPERSTACK_MODEL`
    /// - `ELASTICSEARCH_URL` / `ELASTICSEARCH_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = Self::config_dir();
        let config_path = config_dir.join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("PAPERSTACK_API_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("PAPERSTACK_MODEL") {
            config.default_model = model;
        }

        if let Ok(url) = std::env::var("ELASTICSEARCH_URL") {
            config.search.url = url;
        }
        if config.search.api_key.is_none() {
            config.search.api_key = std::env::var("ELASTICSEARCH_API_KEY").ok();
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".paperstack")
    }

    /// Get the sandbox workspace directory path.
    pub fn workspace_dir() -> PathBuf {
        Self::config_dir().join("workspace")
    }

    /// Serialize the default configuration for onboarding.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.runner.mode != "local" && self.runner.mode != "remote" {
            return Err(ConfigError::ValidationError(format!(
                "runner.mode must be \"local\" or \"remote\", got \"{}\"",
                self.runner.mode
            )));
        }

        if self.search.backend != "catalog" && self.search.backend != "elastic" {
            return Err(ConfigError::ValidationError(format!(
                "search.backend must be \"catalog\" or \"elastic\", got \"{}\"",
                self.search.backend
            )));
        }

        if self.limits.chat_rounds == 0
            || self.limits.session_rounds == 0
            || self.limits.deploy_rounds == 0
            || self.limits.research_rounds == 0
        {
            return Err(ConfigError::ValidationError(
                "all round limits must be at least 1".into(),
            ));
        }

        if self.runner.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "runner.command_timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
