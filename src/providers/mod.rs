//! AI completion providers
//!
//! Every backend implements [`CompletionProvider`]. Retries, timeouts and
//! rate limiting live in [`ProviderGateway`], not in the adapters; the order
//! in which gateways are tried is owned by the synthesizer.

pub mod claude_client;
pub mod gateway;
mod http;
pub mod openai_compat;
pub mod scripted;

pub use claude_client::ClaudeClient;
pub use gateway::{ProviderGateway, RetryPolicy};
pub use openai_compat::OpenAiCompatClient;
pub use scripted::{ScriptedProvider, ScriptedReply};

use crate::config::{PipelineConfig, ProviderConfig, ProviderKind};
use crate::error::{ConfigError, ProviderErrorKind};
use crate::utils::get_api_key;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub provider: String,
    pub text: String,
    pub usage: TokenUsage,
}

/// One AI backend. A single call, no retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderErrorKind>;
}

/// Build one gateway per configured provider, in configuration order
///
/// Providers whose API key variable is unset are skipped with a warning.
///
/// # Errors
/// Returns `ConfigError` if a key is present but invalid, or if no provider
/// is left once missing keys are skipped
pub fn build_gateways(config: &PipelineConfig) -> Result<Vec<ProviderGateway>, ConfigError> {
    let mut gateways = Vec::with_capacity(config.providers.len());

    for provider_config in &config.providers {
        let api_key = match get_api_key(provider_config.key_env()) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    provider = %provider_config.display_name(),
                    error = %e,
                    "skipping provider without API key"
                );
                continue;
            }
        };

        let provider = build_provider(provider_config, api_key, config.max_response_bytes)?;
        let mut gateway = ProviderGateway::new(provider, RetryPolicy::from_config(provider_config));
        if let Some(rpm) = provider_config.requests_per_minute {
            gateway = gateway.with_rate_limit(rpm);
        }
        gateways.push(gateway);
    }

    if gateways.is_empty() {
        return Err(ConfigError::Invalid(
            "no configured provider has an API key in the environment".to_string(),
        ));
    }
    Ok(gateways)
}

fn build_provider(
    config: &ProviderConfig,
    api_key: String,
    max_response_bytes: usize,
) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    let name = config.display_name();
    let provider: Arc<dyn CompletionProvider> = match config.kind {
        ProviderKind::Anthropic => {
            let mut client = ClaudeClient::with_key(api_key)?.named(name);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            Arc::new(client.with_max_response_bytes(max_response_bytes))
        }
        ProviderKind::Xai | ProviderKind::Openai | ProviderKind::OpenaiCompatible => {
            let mut client = match config.kind {
                ProviderKind::Xai => OpenAiCompatClient::grok(api_key)?,
                ProviderKind::Openai => OpenAiCompatClient::openai(api_key)?,
                _ => {
                    let base = config.api_base.clone().ok_or_else(|| {
                        ConfigError::Invalid(format!("provider '{}' needs api_base", name))
                    })?;
                    let model = config.model.clone().unwrap_or_else(|| "default".to_string());
                    OpenAiCompatClient::custom(name.clone(), api_key, base, model)?
                }
            }
            .named(name);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            Arc::new(client.with_max_response_bytes(max_response_bytes))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_build_gateways_skips_missing_keys() {
        std::env::remove_var("RYN_TEST_ABSENT_KEY");
        std::env::set_var("RYN_TEST_PRESENT_KEY", "xai-0123456789abcdefghijkl");

        let mut absent = ProviderConfig::new(ProviderKind::Anthropic);
        absent.api_key_env = Some("RYN_TEST_ABSENT_KEY".to_string());
        let mut present = ProviderConfig::new(ProviderKind::Xai);
        present.api_key_env = Some("RYN_TEST_PRESENT_KEY".to_string());
        present.requests_per_minute = Some(30);

        let config = PipelineConfig {
            providers: vec![absent, present],
            ..PipelineConfig::default()
        };

        let gateways = build_gateways(&config).unwrap();
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].name(), "grok");

        std::env::remove_var("RYN_TEST_PRESENT_KEY");
    }

    #[test]
    #[serial]
    fn test_build_gateways_errors_without_any_key() {
        std::env::remove_var("RYN_TEST_ABSENT_KEY");
        let mut absent = ProviderConfig::new(ProviderKind::Openai);
        absent.api_key_env = Some("RYN_TEST_ABSENT_KEY".to_string());
        let config = PipelineConfig {
            providers: vec![absent],
            ..PipelineConfig::default()
        };

        assert!(build_gateways(&config).is_err());
    }

    #[test]
    #[serial]
    fn test_build_gateways_rejects_short_key() {
        std::env::set_var("RYN_TEST_SHORT_KEY", "short");
        let mut provider = ProviderConfig::new(ProviderKind::Anthropic);
        provider.api_key_env = Some("RYN_TEST_SHORT_KEY".to_string());
        let config = PipelineConfig {
            providers: vec![provider],
            ..PipelineConfig::default()
        };

        let err = build_gateways(&config).err().unwrap();
        assert!(err.to_string().contains("too short"));
        std::env::remove_var("RYN_TEST_SHORT_KEY");
    }
}
