use crate::error::PublishFailure;
use crate::models::change::AppliedChange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Synthesizing,
    Applying,
    Reporting,
    Publishing,
    Done,
    PartiallyFailed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Synthesizing => "synthesizing",
            RunState::Applying => "applying",
            RunState::Reporting => "reporting",
            RunState::Publishing => "publishing",
            RunState::Done => "done",
            RunState::PartiallyFailed => "partially_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::PartiallyFailed)
    }
}

/// Pipeline stage at which an issue dropped out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Validation,
    Synthesis,
    Apply,
    Cancelled,
    TimedOut,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Validation => "validation",
            FailureStage::Synthesis => "synthesis",
            FailureStage::Apply => "apply",
            FailureStage::Cancelled => "cancelled",
            FailureStage::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedIssue {
    pub issue_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueStatus {
    Applied {
        file_path: String,
        provider_used: String,
    },
    Failed {
        stage: FailureStage,
        reason: String,
    },
}

/// Final word on one issue, in scan-report order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueOutcome {
    pub issue_id: String,
    #[serde(flatten)]
    pub status: IssueStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishStatus {
    /// Run ended before publishing could start (cancellation)
    NotAttempted { reason: String },
    /// Caller asked for a local-only run
    Disabled,
    /// Nothing was applied, so there was nothing to push
    Skipped { reason: String },
    Published {
        branch: String,
        commit_sha: String,
        remote: String,
    },
    Failed {
        reason: String,
        failure: PublishFailure,
    },
}

impl PublishStatus {
    pub fn failed(failure: PublishFailure) -> Self {
        PublishStatus::Failed {
            reason: failure.to_string(),
            failure,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishStatus::Published { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::NotAttempted { .. } => "not_attempted",
            PublishStatus::Disabled => "disabled",
            PublishStatus::Skipped { .. } => "skipped",
            PublishStatus::Published { .. } => "published",
            PublishStatus::Failed { .. } => "failed",
        }
    }

    pub fn branch(&self) -> Option<&str> {
        match self {
            PublishStatus::Published { branch, .. } => Some(branch),
            _ => None,
        }
    }
}

/// The change report handed back to the caller at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub run_id: String,
    pub state: RunState,
    pub applied_changes: Vec<AppliedChange>,
    pub failed_issues: Vec<FailedIssue>,
    pub outcomes: Vec<IssueOutcome>,
    pub publish_status: PublishStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    /// Issue ids that made it into at least one applied change, in application order
    pub fn fixed_issue_ids(&self) -> Vec<&str> {
        self.applied_changes
            .iter()
            .flat_map(|change| change.issue_ids.iter().map(String::as_str))
            .collect()
    }

    pub fn applied_files(&self) -> Vec<&str> {
        self.applied_changes
            .iter()
            .map(|change| change.file_path.as_str())
            .collect()
    }

    pub fn outcome_for(&self, issue_id: &str) -> Option<&IssueStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.issue_id == issue_id)
            .map(|outcome| &outcome.status)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
