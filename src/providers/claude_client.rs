//! Anthropic Claude API client
//!
//! API Specifications:
//! - Endpoint: POST https://api.anthropic.com/v1/messages
//! - Authentication: `x-api-key` header plus `anthropic-version: 2023-06-01`
//! - Default model: claude-haiku-4-5

use super::http::send_json;
use super::{Completion, CompletionProvider, Prompt, TokenUsage};
use crate::error::{ConfigError, ProviderErrorKind};
use crate::utils::validate_api_key;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-haiku-4-5";
const API_VERSION: &str = "2023-06-01";

/// Request body for the Messages API
#[derive(Debug, Clone, Serialize)]
pub struct ClaudeRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    pub messages: Vec<Message>,
    /// Deterministic output for patch synthesis
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: UsageMetrics,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    /// Block type (usually "text")
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageMetrics {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Claude API Client
/// Handles all communication with Anthropic's Claude Messages API
pub struct ClaudeClient {
    name: String,
    api_key: String,
    http_client: Client,
    api_base: String,
    model: String,
    max_response_bytes: usize,
}

impl ClaudeClient {
    /// Create client with an explicit API key
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidApiKey` if the key is empty or too short
    pub fn with_key(api_key: String) -> Result<Self, ConfigError> {
        validate_api_key(&api_key)?;

        Ok(Self {
            name: "claude".to_string(),
            api_key,
            http_client: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_response_bytes: 256 * 1024,
        })
    }

    /// Create client with custom API base URL (for testing/staging)
    pub fn with_url(api_key: String, api_base: String) -> Result<Self, ConfigError> {
        Ok(Self::with_key(api_key)?.with_api_base(&api_base))
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

    pub fn api_version() -> &'static str {
        API_VERSION
    }

    fn build_request(&self, prompt: &Prompt) -> ClaudeRequest {
        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: prompt.max_tokens,
            system: prompt.system.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
            temperature: 0.0,
        }
    }

    /// Extract the concatenated text blocks from a Messages API response body
    fn parse_response(body: &str) -> Result<(String, TokenUsage), ProviderErrorKind> {
        let response: ClaudeResponse =
            serde_json::from_str(body).map_err(|e| ProviderErrorKind::MalformedResponse {
                message: format!("failed to parse Claude response: {}", e),
            })?;

        let text: String = response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(ProviderErrorKind::MalformedResponse {
                message: "Claude response contained no text".to_string(),
            });
        }

        Ok((
            text,
            TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        ))
    }
}

#[async_trait]
impl CompletionProvider for ClaudeClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderErrorKind> {
        let request = self
            .http_client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
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

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClaudeClient {
        ClaudeClient::with_key("sk-ant-REDACTED".to_string()).unwrap()
    }

    #[test]
    fn test_with_key_validates() {
        assert!(ClaudeClient::with_key(String::new()).is_err());
        assert!(ClaudeClient::with_key("sk-short".to_string()).is_err());
        assert_eq!(client().name(), "claude");
        assert_eq!(client().model(), "claude-haiku-4-5");
    }

    #[test]
    fn test_request_shape() {
        let prompt = Prompt {
            system: "You fix code.".to_string(),
            user: "Issue ID: A".to_string(),
            max_tokens: 1024,
        };
        let request = serde_json::to_value(client().build_request(&prompt)).unwrap();

        assert_eq!(request["model"], "claude-haiku-4-5");
        assert_eq!(request["max_tokens"], 1024);
        assert_eq!(request["system"], "You fix code.");
        assert_eq!(request["messages"][0]["role"], "user");
        assert_eq!(request["messages"][0]["content"], "Issue ID: A");
        assert_eq!(request["temperature"], 0.0);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let body = r#"{
            "id": "msg_01",
            "content": [
                {"type": "text", "text": "{\"original\": "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "\"a\"}"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 120, "output_tokens": 30}
        }"#;
        let (text, usage) = ClaudeClient::parse_response(body).unwrap();
        assert_eq!(text, r#"{"original": "a"}"#);
        assert_eq!(usage.input_tokens, 120);
        assert_eq!(usage.output_tokens, 30);
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(matches!(
            ClaudeClient::parse_response("<html>bad gateway</html>"),
            Err(ProviderErrorKind::MalformedResponse { .. })
        ));
        assert!(matches!(
            ClaudeClient::parse_response(r#"{"content": []}"#),
            Err(ProviderErrorKind::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_with_url_trims_trailing_slash() {
        let client = ClaudeClient::with_url(
            "sk-ant-REDACTED".to_string(),
            "http://127.0.0.1:9999/".to_string(),
        )
        .unwrap();
        assert_eq!(client.api_base, "http://127.0.0.1:9999");
    }
}
