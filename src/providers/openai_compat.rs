//! OpenAI-compatible chat completions client
//!
//! Covers xAI Grok (`https://api.x.ai/v1`, model grok-code-fast-1), OpenAI
//! itself, and any self-hosted endpoint speaking the same format.
//! Authentication is a Bearer token.

use super::http::send_json;
use super::{Completion, CompletionProvider, Prompt, TokenUsage};
use crate::error::{ConfigError, ProviderErrorKind};
use crate::utils::validate_api_key;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const GROK_API_BASE: &str = "https://api.x.ai/v1";
pub const GROK_MODEL: &str = "grok-code-fast-1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user", or "assistant"
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<UsageMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageMetrics {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

pub struct OpenAiCompatClient {
    name: String,
    api_key: String,
    http_client: Client,
    api_base: String,
    model: String,
    max_response_bytes: usize,
}

impl OpenAiCompatClient {
    /// xAI Grok preset
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidApiKey` if the key is too short or lacks the `xai-` prefix
    pub fn grok(api_key: String) -> Result<Self, ConfigError> {
        if !api_key.starts_with("xai-") {
            return Err(ConfigError::InvalidApiKey {
                reason: "xAI keys must start with 'xai-'".to_string(),
            });
        }
        Self::custom("grok", api_key, GROK_API_BASE, GROK_MODEL)
    }

    pub fn openai(api_key: String) -> Result<Self, ConfigError> {
        Self::custom("openai", api_key, OPENAI_API_BASE, OPENAI_MODEL)
    }

    /// Any OpenAI-compatible endpoint
    pub fn custom(
        name: impl Into<String>,
        api_key: String,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        validate_api_key(&api_key)?;

        Ok(Self {
            name: name.into(),
            api_key,
            http_client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_response_bytes: 256 * 1024,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request(&self, prompt: &Prompt) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(Message {
                role: "system".to_string(),
                content: Some(prompt.system.clone()),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: Some(prompt.user.clone()),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: prompt.max_tokens,
            temperature: 0.0,
            stream: false,
        }
    }

    fn parse_response(body: &str) -> Result<(String, TokenUsage), ProviderErrorKind> {
        let response: ChatResponse =
            serde_json::from_str(body).map_err(|e| ProviderErrorKind::MalformedResponse {
                message: format!("failed to parse chat completion: {}", e),
            })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderErrorKind::MalformedResponse {
                message: "chat completion contained no message content".to_string(),
            })?;

        let usage = response.usage.unwrap_or_default();
        Ok((
            text,
            TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        ))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderErrorKind> {
        let request = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.build_request(prompt));

        let body = send_json(request, self.max_response_bytes).await?;
        let (text, usage) = Self::parse_response(&body)?;

        Ok(Completion {
            provider: self.name.clone(),
            text,
            usage,
        })
    }
}
