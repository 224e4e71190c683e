//! Structured log events for the fix run lifecycle
//!
//! All events carry `event` and `run_id` fields so a run can be followed in
//! JSON logs. Nothing here ever receives file contents or credentials.

use crate::models::RunState;
use tracing::{info, warn};

pub fn emit_run_started(run_id: &str, issue_count: usize, provider_count: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        issues = issue_count,
        providers = provider_count,
    );
}

pub fn emit_state_changed(run_id: &str, from: RunState, to: RunState) {
    info!(
        event = "run.state_changed",
        run_id = %run_id,
        from = from.as_str(),
        to = to.as_str(),
    );
}

/// Emit event: a provider attempt failed and the next one (if any) will be tried
pub fn emit_provider_failed(issue_id: &str, provider: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "provider.failed",
        issue_id = %issue_id,
        provider = %provider,
        error = %error,
    );
}

pub fn emit_issue_applied(run_id: &str, issue_id: &str, file_path: &str, provider: &str) {
    info!(
        event = "issue.applied",
        run_id = %run_id,
        issue_id = %issue_id,
        file = %file_path,
        provider = %provider,
    );
}

pub fn emit_issue_failed(run_id: &str, issue_id: &str, stage: &str, reason: &str) {
    warn!(
        event = "issue.failed",
        run_id = %run_id,
        issue_id = %issue_id,
        stage = %stage,
        reason = %reason,
    );
}

pub fn emit_publish_finished(run_id: &str, status: &str, branch: Option<&str>) {
    info!(
        event = "publish.finished",
        run_id = %run_id,
        status = %status,
        branch = branch.unwrap_or(""),
    );
}

/// Emit event: run reached a terminal state
pub fn emit_run_finished(
    run_id: &str,
    state: RunState,
    applied: usize,
    failed: usize,
    duration_ms: u64,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        state = state.as_str(),
        applied = applied,
        failed = failed,
        duration_ms = duration_ms,
    );
}
