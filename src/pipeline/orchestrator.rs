//! Pipeline orchestrator
//!
//! Drives one run end to end: validation failures from the scan report,
//! bounded concurrent synthesis, serial application in report order, change
//! reporting and publishing. Per-issue failures are collected, never raised.
//!
//! Synthesis tasks are spawned up front and gated by a semaphore, then
//! awaited in report order. Cancellation aborts every unfinished task and
//! applies nothing further. A run timeout stops waiting for synthesis: tasks
//! that already finished still have their proposals applied, the rest are
//! aborted.

use super::state::RunLifecycle;
use crate::applier::PatchApplier;
use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::git::{Publisher, PublisherConfig, RepoRef};
use crate::models::{
    Credential, FailedIssue, FailureStage, FixProposal, Issue, IssueOutcome, IssueStatus,
    PublishStatus, RunResult, RunState, ScanReport,
};
use crate::obs;
use crate::providers::build_gateways;
use crate::reporter::ChangeReporter;
use crate::synthesizer::{FixSynthesizer, SynthesizerConfig};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

const CANCELLED: &str = "run cancelled";
const TIMED_OUT: &str = "run timed out";

/// Per-run knobs supplied by the caller
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Generated when `None`
    pub run_id: Option<String>,
    pub run_timeout: Option<Duration>,
    pub cancel: CancellationToken,
    /// `false` keeps the run local: changes are applied and reported, never pushed
    pub publish: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_id: None,
            run_timeout: None,
            cancel: CancellationToken::new(),
            publish: true,
        }
    }
}

impl RunOptions {
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn without_publish(mut self) -> Self {
        self.publish = false;
        self
    }
}

/// `run-` followed by 12 hex characters
pub fn new_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &id[..12])
}

/// What a synthesis task hands back: a proposal, or the stage and reason it failed at
type Synthesized = Result<FixProposal, (FailureStage, String)>;

enum Waited {
    Joined(Result<Synthesized, JoinError>),
    Cancelled,
    TimedOut,
}

pub struct Pipeline {
    synthesizer: Arc<FixSynthesizer>,
    publisher: Publisher,
    max_concurrent: usize,
}

impl Pipeline {
    pub fn new(synthesizer: FixSynthesizer, publisher: Publisher, max_concurrent: usize) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
            publisher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Build providers, synthesizer and publisher from configuration
    ///
    /// # Errors
    /// Returns `ConfigError` when no provider can be constructed
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let gateways = build_gateways(config)?;
        Ok(Self::new(
            FixSynthesizer::new(gateways, SynthesizerConfig::from(config)),
            Publisher::new(PublisherConfig::from(&config.publish)),
            config.max_concurrent_synthesis,
        ))
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Execute one fix run against the working copy at `repo.workdir`
    ///
    /// Always returns a `RunResult`; failures of individual issues, of
    /// publishing, cancellation and timeout are all recorded in it.
    pub async fn run(
        &self,
        report: ScanReport,
        repo: &RepoRef,
        credential: Option<Credential>,
        options: RunOptions,
    ) -> RunResult {
        let run_id = options.run_id.clone().unwrap_or_else(new_run_id);
        let span = info_span!("autofix.run", run_id = %run_id);
        self.execute(run_id, report, repo, credential, options)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: String,
        report: ScanReport,
        repo: &RepoRef,
        credential: Option<Credential>,
        options: RunOptions,
    ) -> RunResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let deadline = options.run_timeout.map(|timeout| clock + timeout);
        let mut lifecycle = RunLifecycle::new(run_id.clone());
        let mut ledger = OutcomeLedger::new(&run_id);

        let ScanReport { issues, rejected } = report;
        obs::emit_run_started(
            &run_id,
            issues.len() + rejected.len(),
            self.synthesizer.provider_names().len(),
        );
        for entry in rejected {
            ledger.fail(entry.issue_id, FailureStage::Validation, entry.reason);
        }

        lifecycle.advance(RunState::Synthesizing);
        let applier = PatchApplier::new(repo.workdir.clone());
        let synthesized = self
            .synthesize_all(&issues, &applier, deadline, &options.cancel)
            .await;

        lifecycle.advance(RunState::Applying);
        let mut reporter = ChangeReporter::new();
        for (issue, outcome) in issues.iter().zip(synthesized) {
            let outcome = match outcome {
                Ok(_) if options.cancel.is_cancelled() => {
                    Err((FailureStage::Cancelled, CANCELLED.to_string()))
                }
                Ok(proposal) => {
                    let provider = proposal.provider_used.clone();
                    match applier.apply(proposal).await {
                        Ok(edit) => {
                            let file_path = edit.file_path.clone();
                            reporter.record(edit);
                            Ok((file_path, provider))
                        }
                        Err(failure) => Err((FailureStage::Apply, failure.to_string())),
                    }
                }
                Err(failed) => Err(failed),
            };

            match outcome {
                Ok((file_path, provider)) => ledger.applied(&issue.id, file_path, provider),
                Err((stage, reason)) => ledger.fail(issue.id.clone(), stage, reason),
            }
        }

        lifecycle.advance(RunState::Reporting);
        let (failed_issues, outcomes) = ledger.finish();
        let mut result = RunResult {
            run_id,
            state: lifecycle.state(),
            applied_changes: reporter.into_changes(),
            failed_issues,
            outcomes,
            publish_status: PublishStatus::NotAttempted {
                reason: CANCELLED.to_string(),
            },
            started_at,
            finished_at: started_at,
        };

        if options.cancel.is_cancelled() {
            info!(run_id = %result.run_id, "run cancelled, publishing skipped");
        } else {
            lifecycle.advance(RunState::Publishing);
            result.state = lifecycle.state();
            result.publish_status = if options.publish {
                self.publisher.publish(&result, repo, credential).await
            } else {
                PublishStatus::Disabled
            };
        }
        obs::emit_publish_finished(
            &result.run_id,
            result.publish_status.as_str(),
            result.publish_status.branch(),
        );

        let terminal = final_state(&result.publish_status, &result.failed_issues);
        lifecycle.advance(terminal);
        result.state = terminal;
        result.finished_at = Utc::now();
        obs::emit_run_finished(
            &result.run_id,
            result.state,
            result.applied_changes.len(),
            result.failed_issues.len(),
            clock.elapsed().as_millis() as u64,
        );
        result
    }

    /// Spawn one gated synthesis task per issue and collect their results in issue order
    async fn synthesize_all(
        &self,
        issues: &[Issue],
        applier: &PatchApplier,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Vec<Synthesized> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let handles: Vec<JoinHandle<Synthesized>> = issues
            .iter()
            .cloned()
            .map(|issue| {
                let semaphore = Arc::clone(&semaphore);
                let synthesizer = Arc::clone(&self.synthesizer);
                let applier = applier.clone();
                tokio::spawn(
                    async move {
                        let _permit = semaphore.acquire_owned().await.map_err(|_| {
                            (FailureStage::Synthesis, "synthesis pool closed".to_string())
                        })?;
                        synthesize_one(&synthesizer, &applier, &issue).await
                    }
                    .in_current_span(),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        let mut stopped: Option<FailureStage> = None;

        for mut handle in handles {
            if let Some(stage) = stopped {
                results.push(drain(handle, stage).await);
                continue;
            }

            let waited = tokio::select! {
                biased;
                _ = cancel.cancelled() => Waited::Cancelled,
                _ = deadline_reached(deadline) => Waited::TimedOut,
                joined = &mut handle => Waited::Joined(joined),
            };

            match waited {
                Waited::Joined(joined) => results.push(from_join(joined)),
                Waited::Cancelled => {
                    debug!("cancellation requested, aborting synthesis");
                    stopped = Some(FailureStage::Cancelled);
                    results.push(drain(handle, FailureStage::Cancelled).await);
                }
                Waited::TimedOut => {
                    debug!("run deadline reached, no further synthesis");
                    stopped = Some(FailureStage::TimedOut);
                    results.push(drain(handle, FailureStage::TimedOut).await);
                }
            }
        }

        results
    }

    /// Publish a finished run again without redoing synthesis or application
    ///
    /// Returns a new `RunResult`; `previous` is left as it was.
    pub async fn retry_publish(
        &self,
        previous: &RunResult,
        repo: &RepoRef,
        credential: Option<Credential>,
    ) -> RunResult {
        let span = info_span!("autofix.run", run_id = %previous.run_id);
        async {
            let clock = Instant::now();
            info!(run_id = %previous.run_id, "retrying publish");

            let mut result = previous.clone();
            result.publish_status = self.publisher.publish(previous, repo, credential).await;
            obs::emit_publish_finished(
                &result.run_id,
                result.publish_status.as_str(),
                result.publish_status.branch(),
            );

            result.state = final_state(&result.publish_status, &result.failed_issues);
            result.finished_at = Utc::now();
            obs::emit_run_finished(
                &result.run_id,
                result.state,
                result.applied_changes.len(),
                result.failed_issues.len(),
                clock.elapsed().as_millis() as u64,
            );
            result
        }
        .instrument(span)
        .await
    }
}

/// Guarded read of the issue's file, then synthesis against that content
async fn synthesize_one(
    synthesizer: &FixSynthesizer,
    applier: &PatchApplier,
    issue: &Issue,
) -> Synthesized {
    let content = applier
        .read_for_synthesis(&issue.file_path)
        .await
        .map_err(|failure| (FailureStage::Validation, failure.to_string()))?;

    synthesizer
        .synthesize(issue, &content)
        .await
        .map_err(|failure| (FailureStage::Synthesis, failure.to_string()))
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Settle a task after the run stopped waiting for synthesis
async fn drain(handle: JoinHandle<Synthesized>, stage: FailureStage) -> Synthesized {
    if stage == FailureStage::TimedOut && handle.is_finished() {
        return from_join(handle.await);
    }
    handle.abort();
    let reason = match stage {
        FailureStage::TimedOut => TIMED_OUT,
        _ => CANCELLED,
    };
    Err((stage, reason.to_string()))
}

fn from_join(joined: Result<Synthesized, JoinError>) -> Synthesized {
    joined.unwrap_or_else(|e| {
        let reason = if e.is_panic() {
            "synthesis task panicked"
        } else {
            "synthesis task aborted"
        };
        Err((FailureStage::Synthesis, reason.to_string()))
    })
}

/// Terminal state for a run that reached the end of its pipeline
///
/// Published runs are `Done` even with failed issues. A run with nothing to
/// publish is `Done` only if nothing failed. Cancelled runs never are.
pub fn final_state(publish: &PublishStatus, failed_issues: &[FailedIssue]) -> RunState {
    let cancelled = failed_issues
        .iter()
        .any(|failed| failed.stage == FailureStage::Cancelled);

    match publish {
        _ if cancelled => RunState::PartiallyFailed,
        PublishStatus::Published { .. } => RunState::Done,
        PublishStatus::Skipped { .. } if failed_issues.is_empty() => RunState::Done,
        _ => RunState::PartiallyFailed,
    }
}

/// Per-issue outcomes in the order they were settled
struct OutcomeLedger<'a> {
    run_id: &'a str,
    failed: Vec<FailedIssue>,
    outcomes: Vec<IssueOutcome>,
}

impl<'a> OutcomeLedger<'a> {
    fn new(run_id: &'a str) -> Self {
        Self {
            run_id,
            failed: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn applied(&mut self, issue_id: &str, file_path: String, provider_used: String) {
        obs::emit_issue_applied(self.run_id, issue_id, &file_path, &provider_used);
        self.outcomes.push(IssueOutcome {
            issue_id: issue_id.to_string(),
            status: IssueStatus::Applied {
                file_path,
                provider_used,
            },
        });
    }

    fn fail(&mut self, issue_id: String, stage: FailureStage, reason: String) {
        obs::emit_issue_failed(self.run_id, &issue_id, stage.as_str(), &reason);
        self.outcomes.push(IssueOutcome {
            issue_id: issue_id.clone(),
            status: IssueStatus::Failed {
                stage,
                reason: reason.clone(),
            },
        });
        self.failed.push(FailedIssue {
            issue_id,
            stage,
            reason,
        });
    }

    fn finish(self) -> (Vec<FailedIssue>, Vec<IssueOutcome>) {
        (self.failed, self.outcomes)
    }
}
