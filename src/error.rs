//! Error taxonomy for the fix pipeline
//!
//! Per-issue failures (`SynthesisFailure`, `ApplyFailure`) are plain data: they
//! are serialized into the run report and never abort a run. Run-level
//! failures (`PublishFailure`) end a run as partially failed while keeping all
//! completed work.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a single provider call (after local retries) did not produce a completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderErrorKind {
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("rate limited by provider (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("response exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("no usable fix in response: {message}")]
    Unparseable { message: String },

    #[error("provider misconfigured: {message}")]
    Config { message: String },
}

impl ProviderErrorKind {
    /// Timeouts, transport errors, 429 and 5xx are worth another attempt;
    /// everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderErrorKind::Timeout { .. }
            | ProviderErrorKind::Transport { .. }
            | ProviderErrorKind::RateLimited { .. } => true,
            ProviderErrorKind::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A provider failure as reported by the gateway, tagged with the provider name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{provider}: {cause}")]
pub struct ProviderError {
    pub provider: String,
    pub cause: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, cause: ProviderErrorKind) -> Self {
        Self {
            provider: provider.into(),
            cause,
        }
    }
}

/// No configured provider produced a usable proposal for an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("no provider produced a usable fix for issue {issue_id}{}", render_attempts(.attempts))]
pub struct SynthesisFailure {
    pub issue_id: String,
    pub attempts: Vec<ProviderError>,
}

fn render_attempts(attempts: &[ProviderError]) -> String {
    if attempts.is_empty() {
        return " (no providers configured)".to_string();
    }
    let rendered: Vec<String> = attempts.iter().map(|a| a.to_string()).collect();
    format!(" [{}]", rendered.join("; "))
}

/// Distinct, reported outcomes of a rejected patch application.
///
/// Every variant guarantees the target file was left byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyFailure {
    #[error("path traversal rejected for '{path}': {detail}")]
    PathTraversal { path: String, detail: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read {path}: {detail}")]
    ReadFailure { path: String, detail: String },

    #[error("original snippet not found in {path}")]
    SnippetMismatch { path: String },

    #[error("original snippet matches {count} locations in {path}")]
    AmbiguousMatch { path: String, count: usize },

    #[error("failed to write {path}: {detail}")]
    WriteFailure { path: String, detail: String },
}

impl ApplyFailure {
    /// Stable short name, used in structured log events
    pub fn kind(&self) -> &'static str {
        match self {
            ApplyFailure::PathTraversal { .. } => "path_traversal",
            ApplyFailure::FileNotFound { .. } => "file_not_found",
            ApplyFailure::ReadFailure { .. } => "read_failure",
            ApplyFailure::SnippetMismatch { .. } => "snippet_mismatch",
            ApplyFailure::AmbiguousMatch { .. } => "ambiguous_match",
            ApplyFailure::WriteFailure { .. } => "write_failure",
        }
    }
}

/// Why publishing the run branch failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishFailure {
    #[error("authentication failed: {detail}")]
    Auth { detail: String },

    #[error("network failure: {detail}")]
    Network { detail: String },

    #[error("push rejected: {detail}")]
    Rejected { detail: String },

    #[error("refusing to publish directly to default branch '{branch}'")]
    ProtectedBranch { branch: String },

    #[error("git error: {detail}")]
    Git { detail: String },
}

/// Whole-report failures. Per-entry problems are reported as failed issues instead.
#[derive(Debug, Error)]
pub enum ScanReportError {
    #[error("failed to read scan report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan report is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected scan report layout: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {var} not set")]
    MissingKey { var: String },

    #[error("API key appears invalid: {reason}")]
    InvalidApiKey { reason: String },
}
