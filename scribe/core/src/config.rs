//! TOML Configuration File Support
//!
//! Loads settings from `~/.config/scribe/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/scribe/config.toml` (typically `~/.config/scribe/config.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4.1-mini"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_secs = 120
//! # 0 leaves the reply length to the service
//! max_output_tokens = 0
//!
//! [prompt]
//! include_context = false
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// API base URL
    pub base_url: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Whole-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Upper bound on generated tokens
    pub max_output_tokens: Option<u32>,
}

/// Prompt section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptToml {
    /// Send the whole document with the selection marked
    pub include_context: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Prompt configuration section
    pub prompt: PromptToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Connection settings for the generation service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendSettings {
    /// API base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Whole-request timeout, streamed body included
    pub timeout: Duration,
    /// Upper bound on generated tokens, 0 for the service default
    pub max_output_tokens: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout: Duration::from_secs(120),
            max_output_tokens: 0,
        }
    }
}

/// Effective configuration after all sources have been applied
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ScribeConfig {
    /// Backend settings
    pub backend: BackendSettings,

    /// Send the whole document with the selection marked
    pub include_context: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            include_context: false,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ScribeConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check that the values are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty model, base URL
    /// or key variable name, or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.model must not be empty".to_string(),
            ));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.base_url must not be empty".to_string(),
            ));
        }
        if self.backend.api_key_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.api_key_env must not be empty".to_string(),
            ));
        }
        if self.backend.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/scribe/config.toml` or
/// `~/.config/scribe/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("scribe").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are invalid. A missing config file is not an error.
pub fn load_config() -> Result<ScribeConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting values are invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ScribeConfig, ConfigError> {
    let mut config = ScribeConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ScribeToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ScribeConfig, toml: &ScribeToml) {
    if let Some(ref url) = toml.backend.base_url {
        config.backend.base_url = url.clone();
    }
    if let Some(ref model) = toml.backend.model {
        config.backend.model = model.clone();
    }
    if let Some(ref var) = toml.backend.api_key_env {
        config.backend.api_key_env = var.clone();
    }
    if let Some(secs) = toml.backend.timeout_secs {
        config.backend.timeout = Duration::from_secs(secs);
    }
    if let Some(tokens) = toml.backend.max_output_tokens {
        config.backend.max_output_tokens = tokens;
    }

    if let Some(include) = toml.prompt.include_context {
        config.include_context = include;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ScribeConfig) {
    if let Ok(url) = std::env::var("SCRIBE_BASE_URL") {
        config.backend.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(model) = std::env::var("SCRIBE_MODEL") {
        config.backend.model = model;
        config.source = ConfigSource::Env;
    }
    if let Ok(var) = std::env::var("SCRIBE_API_KEY_ENV") {
        config.backend.api_key_env = var;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("SCRIBE_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.backend.timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring non-numeric SCRIBE_TIMEOUT_SECS");
        }
    }
    if let Ok(tokens) = std::env::var("SCRIBE_MAX_OUTPUT_TOKENS") {
        if let Ok(tokens) = tokens.parse::<u32>() {
            config.backend.max_output_tokens = tokens;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %tokens, "Ignoring non-numeric SCRIBE_MAX_OUTPUT_TOKENS");
        }
    }
    if let Ok(include) = std::env::var("SCRIBE_INCLUDE_CONTEXT") {
        config.include_context = include != "0" && include.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Model override
    pub model: Option<String>,

    /// Base URL override
    pub base_url: Option<String>,

    /// Timeout override (seconds)
    pub timeout_secs: Option<u64>,

    /// Context mode override
    pub include_context: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set timeout override
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set context mode override
    #[must_use]
    pub fn with_include_context(mut self, include: bool) -> Self {
        self.include_context = Some(include);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the overridden
    /// configuration is invalid.
    pub fn apply(&self, config: &mut ScribeConfig) -> Result<(), ConfigError> {
        if self.model.is_some()
            || self.base_url.is_some()
            || self.timeout_secs.is_some()
            || self.include_context.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref model) = self.model {
            config.backend.model = model.clone();
        }
        if let Some(ref url) = self.base_url {
            config.backend.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.backend.timeout = Duration::from_secs(secs);
        }
        if let Some(include) = self.include_context {
            config.include_context = include;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
