//! Pipeline configuration
//!
//! Loaded from a TOML file (explicit path, or `<config_dir>/ryn-autofix/config.toml`
//! when present). Every field has a default so an empty file is a valid config.
//! Secrets never live in the file: providers name the environment variable
//! that holds their API key.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// xAI Grok (OpenAI-compatible chat completions)
    Xai,
    Openai,
    /// Any other endpoint speaking the OpenAI chat completions format; needs `api_base`
    OpenaiCompatible,
}

impl ProviderKind {
    pub fn default_name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude",
            ProviderKind::Xai => "grok",
            ProviderKind::Openai => "openai",
            ProviderKind::OpenaiCompatible => "openai-compatible",
        }
    }

    pub fn default_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Xai => "XAI_API_KEY",
            ProviderKind::Openai | ProviderKind::OpenaiCompatible => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            name: None,
            model: None,
            api_base: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            requests_per_minute: None,
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.kind.default_name().to_string())
    }

    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_key_env())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    pub branch_prefix: String,
    pub remote_name: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            branch_prefix: "autofix/".to_string(),
            remote_name: "origin".to_string(),
            author_name: "ryn-ai".to_string(),
            author_email: "autofix@ryn.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fallback order: first entry is tried first
    pub providers: Vec<ProviderConfig>,
    pub context_lines: usize,
    pub max_prompt_bytes: usize,
    pub max_response_bytes: usize,
    pub max_completion_tokens: u32,
    pub max_concurrent_synthesis: usize,
    pub run_timeout_secs: Option<u64>,
    pub publish: PublishConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig::new(ProviderKind::Anthropic),
                ProviderConfig::new(ProviderKind::Xai),
            ],
            context_lines: 20,
            max_prompt_bytes: 24 * 1024,
            max_response_bytes: 256 * 1024,
            max_completion_tokens: 4096,
            max_concurrent_synthesis: 4,
            run_timeout_secs: None,
            publish: PublishConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration
    ///
    /// With an explicit path the file must exist. Without one, the default
    /// location is used when present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ryn-autofix").join("config.toml"))
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one provider must be configured".to_string(),
            ));
        }
        if self.max_concurrent_synthesis == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_synthesis must be at least 1".to_string(),
            ));
        }
        if self.max_prompt_bytes < 1024 {
            return Err(ConfigError::Invalid(
                "max_prompt_bytes must be at least 1024".to_string(),
            ));
        }
        if self.publish.branch_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "publish.branch_prefix cannot be empty; fixes are never pushed to the default branch"
                    .to_string(),
            ));
        }
        for provider in &self.providers {
            if provider.kind == ProviderKind::OpenaiCompatible && provider.api_base.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' of kind openai_compatible needs api_base",
                    provider.display_name()
                )));
            }
            if provider.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' timeout_secs must be at least 1",
                    provider.display_name()
                )));
            }
        }
        Ok(())
    }
}
