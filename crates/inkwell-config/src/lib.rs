#![deny(unsafe_code)]

//! Configuration loading and validation for Inkwell.
//!
//! Loads a TOML file into [`AppConfig`]: the model service connection, the
//! assistant's conversation settings, logging, and the processor
//! documentation catalog.
//!
//! ```toml
//! [llm]
//! api_key_env = "OPENAI_API_KEY"
//! model = "gpt-5-mini"
//!
//! [assistant]
//! max_turns = 4
//! content_type = "xml"
//!
//! [[catalog.processors]]
//! name = "BaseProcessor"
//!
//! [[catalog.processors.commands]]
//! name = "Log"
//! description = "Writes a message to the log."
//! examples = ["<Log>text</Log>"]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no API key configured: set llm.api_key or the {env_var} environment variable")]
    MissingApiKey { env_var: String },
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model service connection.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Conversation settings.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Processor documentation shown to the model.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Model service connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Inline API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable read when no inline key is set.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Endpoint override for Responses-compatible services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_env", &self.api_key_env)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// The inline key, or the value of `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey {
                env_var: self.api_key_env.clone(),
            }),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Maximum model round trips per request.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Fence tag of the edited documents (e.g. "xml").
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Log full prompts and raw model output.
    #[serde(default)]
    pub log_transcript: bool,

    /// File whose contents open every prompt's context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_info: Option<PathBuf>,

    /// Extra instruction placed ahead of the marker description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            content_type: default_content_type(),
            log_transcript: false,
            general_info: None,
            instruction: None,
        }
    }
}

fn default_max_turns() -> u32 {
    4
}

fn default_content_type() -> String {
    "xml".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Processor documentation manifest.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub processors: Vec<ProcessorDocConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorDocConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub commands: Vec<CommandDocConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDocConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Usage examples, optionally prefixed with `description:`.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.model must not be empty".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.llm.api_key.is_none() && self.llm.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_key_env must not be empty when llm.api_key is unset".to_string(),
            ));
        }

        if self.assistant.max_turns == 0 {
            return Err(ConfigError::Validation(
                "assistant.max_turns must be at least 1".to_string(),
            ));
        }
        let content_type = &self.assistant.content_type;
        if content_type.is_empty()
            || !content_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+')
        {
            return Err(ConfigError::Validation(format!(
                "assistant.content_type must be a non-empty alphanumeric tag, got {content_type:?}"
            )));
        }

        let mut names = HashSet::new();
        for (i, processor) in self.catalog.processors.iter().enumerate() {
            if processor.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "catalog.processors[{i}].name must not be empty"
                )));
            }
            if !names.insert(processor.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "catalog.processors[{i}].name {:?} is declared twice",
                    processor.name
                )));
            }
            for (j, command) in processor.commands.iter().enumerate() {
                if command.name.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "catalog.processors[{i}].commands[{j}].name must not be empty"
                    )));
                }
            }
        }

        Ok(())
    }
}
