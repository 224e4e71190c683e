//! Retry, timeout and rate-limit wrapper around one provider
//!
//! A gateway never switches providers: once its retry budget is spent it
//! reports a `ProviderError` and the caller decides what to try next.

use super::{Completion, CompletionProvider, Prompt};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::rate_limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-call timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
        }
    }

    /// Delay before retry number `retry` (1-based): base × 2^(retry-1)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

pub struct ProviderGateway {
    provider: Arc<dyn CompletionProvider>,
    policy: RetryPolicy,
    limiter: Option<RateLimiter>,
}

impl ProviderGateway {
    pub fn new(provider: Arc<dyn CompletionProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            limiter: None,
        }
    }

    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.limiter = Some(RateLimiter::per_minute(requests_per_minute));
        self
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ask the provider for a completion, retrying transient failures
    ///
    /// # Errors
    /// Returns `ProviderError` once a non-retryable error occurs or the retry
    /// budget is exhausted
    pub async fn generate(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        let mut retries = 0u32;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
                let stats = limiter.get_stats().await;
                debug!(
                    provider = %self.provider.name(),
                    tokens_available = stats.tokens_available,
                    total_calls = stats.total_calls,
                    "rate limit token taken"
                );
            }

            let call = self.provider.complete(prompt);
            let outcome = match tokio::time::timeout(self.policy.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderErrorKind::Timeout {
                    after_ms: self.policy.timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(completion) => {
                    debug!(
                        provider = %self.name(),
                        input_tokens = completion.usage.input_tokens,
                        output_tokens = completion.usage.output_tokens,
                        retries,
                        "completion received"
                    );
                    return Ok(completion);
                }
                Err(kind) if kind.is_retryable() && retries < self.policy.max_retries => {
                    retries += 1;
                    let delay = self.policy.backoff_for(retries);
                    warn!(
                        provider = %self.name(),
                        error = %kind,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(kind) => return Err(ProviderError::new(self.name(), kind)),
            }
        }
    }
}
