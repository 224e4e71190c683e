// ryn-autofix - automated fix pipeline
// Module re-exports

pub mod applier;
pub mod config;
pub mod error;
pub mod git;
pub mod models;
pub mod obs;
pub mod pipeline;
pub mod providers;
pub mod rate_limiter;
pub mod reporter;
pub mod synthesizer;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use applier::PatchApplier;
pub use config::{PipelineConfig, ProviderConfig, ProviderKind, PublishConfig};
pub use error::{
    ApplyFailure, ConfigError, ProviderError, ProviderErrorKind, PublishFailure,
    ScanReportError, SynthesisFailure,
};
pub use git::{Publisher, PublisherConfig, RepoRef};
pub use models::{
    AppliedChange, Credential, FailedIssue, FailureStage, FixProposal, Issue, IssueOutcome,
    IssueStatus, PublishStatus, RunResult, RunState, ScanReport, Severity,
};
pub use pipeline::{Pipeline, RunOptions};
pub use reporter::ChangeReporter;
pub use synthesizer::{FixSynthesizer, SynthesizerConfig};
