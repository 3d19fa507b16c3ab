//! Configuration loading from toolbridge.toml.

use openapi::CollisionPolicy;
use runtime::{RegistryOptions, ToolErrorPolicy, TurnConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `backend.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Identifies whose chats are saved and listed.
    #[serde(default = "default_user")]
    pub user_id: String,

    #[serde(default)]
    pub backend: BackendConfig,

    /// The API whose operations are offered as tools.
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub turn: TurnSettings,
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

/// API description and HTTP settings.
#[derive(Debug, Deserialize, Default)]
pub struct ApiConfig {
    /// Path to a JSON or YAML API description. Without one, chats run with no tools.
    pub description: Option<PathBuf>,

    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub collision: CollisionPolicy,
}

/// Turn settings.
#[derive(Debug, Deserialize)]
pub struct TurnSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_temperature")]
    pub resume_temperature: f32,

    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,

    pub tool_timeout_secs: Option<u64>,

    #[serde(default)]
    pub on_tool_error: ToolErrorPolicy,

    pub system_prompt: Option<String>,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            resume_temperature: default_temperature(),
            max_tool_calls: default_max_tool_calls(),
            tool_timeout_secs: None,
            on_tool_error: ToolErrorPolicy::default(),
            system_prompt: None,
        }
    }
}

fn default_user() -> String {
    "local".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    runtime::providers::DEFAULT_BASE_URL.to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tool_calls() -> usize {
    TurnConfig::default().max_tool_calls
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default_config())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn default_config() -> Self {
        Self {
            user_id: default_user(),
            ..Self::default()
        }
    }

    /// The API key from config, or from `env` when the config has none.
    pub fn api_key(&self, env: Option<String>) -> Result<String, ConfigError> {
        self.backend
            .api_key
            .clone()
            .or(env)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            request_timeout: self.api.request_timeout_secs.map(Duration::from_secs),
            collision: self.api.collision,
        }
    }

    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            temperature: self.turn.temperature,
            resume_temperature: self.turn.resume_temperature,
            max_tool_calls: self.turn.max_tool_calls,
            tool_timeout: self.turn.tool_timeout_secs.map(Duration::from_secs),
            on_tool_error: self.turn.on_tool_error,
            system_prompt: self.turn.system_prompt.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set backend.api_key or {API_KEY_ENV}")]
    MissingApiKey,
}
