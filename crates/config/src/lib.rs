//! Configuration loading, validation, and management for ojisan.
//!
//! Loads configuration from `~/.ojisan/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use ojisan_core::SamplingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `~/.ojisan/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Persona/prompting settings
    #[serde(default)]
    pub persona: PersonaConfig,
}

/// Which backend to talk to and how.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend kind: "openai" (HTTP, OpenAI-compatible) or "local"
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key, if the endpoint needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name (HTTP: server-side id; local: preset alias or GGUF path)
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-turn generation timeout; omit to wait indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_backend_kind() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "http://localhost:8000/v1".into()
}
fn default_model() -> String {
    "Qwen/Qwen3-4B-Instruct-2507".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// Prompt strategy selection and optional sampling overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Prompt strategy: "chat" or "completion"
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Override the preset sampling hyperparameters entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingParams>,
}

fn default_strategy() -> String {
    "chat".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            sampling: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl AppConfig {
    /// Load configuration from the default path (~/.ojisan/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `OJISAN_BASE_URL`
    /// - `OJISAN_API_KEY`
    /// - `OJISAN_MODEL`
    /// - `OJISAN_STRATEGY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(base_url) = std::env::var("OJISAN_BASE_URL") {
            config.backend.base_url = base_url;
        }

        if config.backend.api_key.is_none() {
            config.backend.api_key = std::env::var("OJISAN_API_KEY").ok();
        }

        if let Ok(model) = std::env::var("OJISAN_MODEL") {
            config.backend.model = model;
        }

        if let Ok(strategy) = std::env::var("OJISAN_STRATEGY") {
            config.persona.strategy = strategy;
        }

        config.validate()?;
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
        dirs_home().join(".ojisan")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.backend.kind.as_str(), "openai" | "local") {
            return Err(ConfigError::ValidationError(format!(
                "backend.kind must be 'openai' or 'local', got '{}'",
                self.backend.kind
            )));
        }

        if !matches!(self.persona.strategy.as_str(), "chat" | "completion") {
            return Err(ConfigError::ValidationError(format!(
                "persona.strategy must be 'chat' or 'completion', got '{}'",
                self.persona.strategy
            )));
        }

        if let Some(sampling) = &self.persona.sampling {
            if sampling.temperature < 0.0 || sampling.temperature > 2.0 {
                return Err(ConfigError::ValidationError(
                    "sampling.temperature must be between 0.0 and 2.0".into(),
                ));
            }
            if let Some(top_p) = sampling.top_p {
                if top_p <= 0.0 || top_p > 1.0 {
                    return Err(ConfigError::ValidationError(
                        "sampling.top_p must be in (0.0, 1.0]".into(),
                    ));
                }
            }
            if sampling.max_new_tokens == 0 {
                return Err(ConfigError::ValidationError(
                    "sampling.max_new_tokens must be at least 1".into(),
                ));
            }
        }

        if self.backend.timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be at least 1 (omit it to disable)".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
