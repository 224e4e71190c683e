// Fix pipeline data models

pub mod change;
pub mod credential;
pub mod issue;
pub mod proposal;
pub mod run;
pub mod scan_report;

// Re-exports for convenience
pub use change::AppliedChange;
pub use credential::Credential;
pub use issue::{Issue, Severity};
pub use proposal::FixProposal;
pub use run::{
    FailedIssue, FailureStage, IssueOutcome, IssueStatus, PublishStatus, RunResult, RunState,
};
pub use scan_report::{RejectedEntry, ScanReport};
