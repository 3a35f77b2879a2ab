//! Configuration loaded from environment variables

use crate::context::{InvalidPolicy, PolicySetting};
use crate::llm::GenerationConfig;
use crate::session::SessionSettings;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.0-pro-exp-02-05";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("{name} has invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("DISPATCH_CONTEXT_POLICY: {0}")]
    InvalidPolicy(#[from] InvalidPolicy),
}

/// Process-wide settings, read once at startup
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    /// Override for the Gemini endpoint, e.g. a local proxy
    pub base_url: Option<String>,
    pub port: u16,
    pub generation: GenerationConfig,
    pub request_timeout: Duration,
    pub context_policy: PolicySetting,
}

// Keeps the key out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("port", &self.port)
            .field("generation", &self.generation)
            .field("request_timeout", &self.request_timeout)
            .field("context_policy", &self.context_policy)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("GEMINI_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let defaults = GenerationConfig::default();

        Ok(Self {
            api_key,
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: var("GEMINI_BASE_URL"),
            port: parsed(&var, "DISPATCH_PORT")?.unwrap_or(DEFAULT_PORT),
            generation: GenerationConfig {
                temperature: parsed(&var, "DISPATCH_TEMPERATURE")?.unwrap_or(defaults.temperature),
                top_p: parsed(&var, "DISPATCH_TOP_P")?.unwrap_or(defaults.top_p),
                top_k: parsed(&var, "DISPATCH_TOP_K")?.unwrap_or(defaults.top_k),
                max_output_tokens: parsed(&var, "DISPATCH_MAX_OUTPUT_TOKENS")?
                    .unwrap_or(defaults.max_output_tokens),
            },
            request_timeout: Duration::from_secs(
                parsed(&var, "DISPATCH_REQUEST_TIMEOUT_SECS")?
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            context_policy: match var("DISPATCH_CONTEXT_POLICY") {
                Some(raw) => raw.parse()?,
                None => PolicySetting::default(),
            },
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            generation: self.generation,
            context_policy: self.context_policy,
            request_timeout: self.request_timeout,
        }
    }
}

fn parsed<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}
