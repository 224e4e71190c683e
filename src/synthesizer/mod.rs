//! Fix synthesis
//!
//! Turns one issue plus the current file content into a `FixProposal` by
//! asking each provider gateway in priority order. The first provider whose
//! answer parses into a usable snippet pair wins; every failed attempt is kept
//! for the report.

pub mod context;
pub mod parse;
pub mod prompt;

use crate::config::PipelineConfig;
use crate::error::{ProviderError, ProviderErrorKind, SynthesisFailure};
use crate::models::{FixProposal, Issue};
use crate::obs;
use crate::providers::ProviderGateway;
use context::extract_context;
use parse::parse_fix;
use prompt::build_prompt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesizerConfig {
    pub context_lines: usize,
    pub max_prompt_bytes: usize,
    pub max_completion_tokens: u32,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for SynthesizerConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            context_lines: config.context_lines,
            max_prompt_bytes: config.max_prompt_bytes,
            max_completion_tokens: config.max_completion_tokens,
        }
    }
}

pub struct FixSynthesizer {
    gateways: Vec<ProviderGateway>,
    config: SynthesizerConfig,
}

impl FixSynthesizer {
    /// `gateways` are tried in the given order
    pub fn new(gateways: Vec<ProviderGateway>, config: SynthesizerConfig) -> Self {
        Self { gateways, config }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.gateways.iter().map(ProviderGateway::name).collect()
    }

    /// Produce a proposal for `issue` from the file's current content
    ///
    /// # Errors
    /// Returns `SynthesisFailure` listing one entry per provider tried when no
    /// provider produced a usable fix
    pub async fn synthesize(
        &self,
        issue: &Issue,
        file_content: &str,
    ) -> Result<FixProposal, SynthesisFailure> {
        let window = extract_context(
            file_content,
            issue.line_start,
            issue.line_end,
            self.config.context_lines,
            self.config.max_prompt_bytes,
        );
        let prompt = build_prompt(issue, &window, self.config.max_completion_tokens);
        debug!(
            issue_id = %issue.id,
            prompt_bytes = prompt.user.len(),
            window_first = window.first_line,
            window_last = window.last_line,
            truncated = window.truncated,
            "built synthesis prompt"
        );

        let mut attempts = Vec::new();
        for gateway in &self.gateways {
            let error = match gateway.generate(&prompt).await {
                Ok(completion) => match parse_fix(&completion.text) {
                    Ok(fix) => {
                        let mut proposal = FixProposal::new(
                            issue.id.clone(),
                            issue.file_path.clone(),
                            fix.original,
                            fix.replacement,
                            gateway.name(),
                        );
                        if let Some(confidence) = fix.confidence {
                            proposal = proposal.with_confidence(confidence);
                        }
                        proposal.explanation = fix.explanation;
                        return Ok(proposal);
                    }
                    Err(message) => ProviderError::new(
                        gateway.name(),
                        ProviderErrorKind::Unparseable { message },
                    ),
                },
                Err(error) => error,
            };

            obs::emit_provider_failed(&issue.id, gateway.name(), &error.cause);
            attempts.push(error);
        }

        Err(SynthesisFailure {
            issue_id: issue.id.clone(),
            attempts,
        })
    }
}
