//! Publishing a run's changes
//!
//! Commits the applied files onto `<branch_prefix><run_id>` and pushes that
//! branch. The credential is moved into [`Publisher::publish`], used only by
//! the push callbacks, and dropped before the call returns. Every message
//! that leaves this module has the token redacted.

use super::operations::GitOperations;
use crate::config::PublishConfig;
use crate::error::PublishFailure;
use crate::models::{Credential, PublishStatus, RunResult};
use git2::{
    Cred, CredentialType, ErrorClass, ErrorCode, PushOptions, RemoteCallbacks, Repository,
    Signature,
};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use tracing::{debug, info};

/// Where a run's working copy lives and where it publishes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub workdir: PathBuf,
    /// Push target URL; when `None` the named remote's URL is used
    pub remote_url: Option<String>,
    pub remote_name: String,
    pub default_branch: String,
}

impl RepoRef {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            remote_url: None,
            remote_name: "origin".to_string(),
            default_branch: "main".to_string(),
        }
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_remote_name(mut self, name: impl Into<String>) -> Self {
        self.remote_name = name.into();
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub branch_prefix: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self::from(&PublishConfig::default())
    }
}

impl From<&PublishConfig> for PublisherConfig {
    fn from(config: &PublishConfig) -> Self {
        Self {
            branch_prefix: config.branch_prefix.clone(),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Publisher {
    config: PublisherConfig,
}

/// Everything the blocking push needs, owned so it can cross to the blocking pool
struct PushJob {
    workdir: PathBuf,
    remote_url: Option<String>,
    remote_name: String,
    branch: String,
    files: Vec<String>,
    message: String,
    author_name: String,
    author_email: String,
}

impl Publisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self { config }
    }

    pub fn branch_name(&self, run_id: &str) -> String {
        format!("{}{}", self.config.branch_prefix, run_id)
    }

    /// Commit and push the run's applied files
    ///
    /// Never fails outright: every outcome, including errors, is a `PublishStatus`.
    pub async fn publish(
        &self,
        result: &RunResult,
        repo: &RepoRef,
        credential: Option<Credential>,
    ) -> PublishStatus {
        if result.applied_changes.is_empty() {
            return PublishStatus::Skipped {
                reason: "no changes were applied".to_string(),
            };
        }

        let branch = self.branch_name(&result.run_id);
        if branch == repo.default_branch {
            return PublishStatus::failed(PublishFailure::ProtectedBranch { branch });
        }

        let job = PushJob {
            workdir: repo.workdir.clone(),
            remote_url: repo.remote_url.clone(),
            remote_name: repo.remote_name.clone(),
            branch: branch.clone(),
            files: result
                .applied_changes
                .iter()
                .map(|change| change.file_path.clone())
                .collect(),
            message: commit_message(result),
            author_name: self.config.author_name.clone(),
            author_email: self.config.author_email.clone(),
        };

        let outcome = tokio::task::spawn_blocking(move || push_blocking(job, credential)).await;

        match outcome {
            Ok(Ok((commit_sha, remote))) => {
                info!(branch = %branch, commit = %commit_sha, remote = %remote, "branch published");
                PublishStatus::Published {
                    branch,
                    commit_sha,
                    remote,
                }
            }
            Ok(Err(failure)) => PublishStatus::failed(failure),
            Err(e) => PublishStatus::failed(PublishFailure::Git {
                detail: format!("publish task failed: {}", e),
            }),
        }
    }
}

fn commit_message(result: &RunResult) -> String {
    let ids = result.fixed_issue_ids();
    let mut message = format!(
        "fix: automated fixes for {} issue{}\n\nRun: {}\n\nFixed issues:\n",
        ids.len(),
        if ids.len() == 1 { "" } else { "s" },
        result.run_id
    );
    for id in ids {
        message.push_str(&format!("- {}\n", id));
    }
    message
}

fn push_blocking(
    job: PushJob,
    credential: Option<Credential>,
) -> Result<(String, String), PublishFailure> {
    let redact = |text: &str| match &credential {
        Some(c) => c.redact(text),
        None => text.to_string(),
    };
    let git_failure = |e: git2::Error| PublishFailure::Git {
        detail: redact(e.message()),
    };

    let repo = Repository::open(&job.workdir).map_err(git_failure)?;
    let signature = Signature::now(&job.author_name, &job.author_email).map_err(git_failure)?;
    let files: Vec<&str> = job.files.iter().map(String::as_str).collect();

    let commit =
        GitOperations::commit_to_branch(&repo, &job.branch, &files, &job.message, &signature)
            .map_err(git_failure)?;
    debug!(
        branch = %job.branch,
        commit = %commit.sha,
        created = commit.created,
        "run branch committed"
    );

    let mut remote = match &job.remote_url {
        Some(url) => repo.remote_anonymous(url),
        None => repo.find_remote(&job.remote_name),
    }
    .map_err(git_failure)?;
    let remote_display = display_remote(remote.url().unwrap_or(&job.remote_name));

    let credential_requests = Cell::new(0u32);
    let rejection: RefCell<Option<String>> = RefCell::new(None);

    let push_result = {
        let mut callbacks = RemoteCallbacks::new();
        if let Some(cred) = &credential {
            callbacks.credentials(|_url, _username, allowed| {
                credential_requests.set(credential_requests.get() + 1);
                if credential_requests.get() > 1 {
                    return Err(git2::Error::from_str("credentials were rejected"));
                }
                if !allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                    return Err(git2::Error::from_str(
                        "remote does not accept token authentication",
                    ));
                }
                Cred::userpass_plaintext("x-access-token", cred.secret())
            });
        }
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some(format!("{}: {}", refname, message));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", job.branch);
        remote.push(&[refspec.as_str()], Some(&mut options))
    };

    if let Err(e) = push_result {
        return Err(classify_push_error(&e, credential_requests.get(), &redact));
    }
    if let Some(detail) = rejection.into_inner() {
        return Err(PublishFailure::Rejected {
            detail: redact(&detail),
        });
    }

    Ok((commit.sha, remote_display))
}

fn classify_push_error(
    error: &git2::Error,
    credential_requests: u32,
    redact: &dyn Fn(&str) -> String,
) -> PublishFailure {
    let detail = redact(error.message());
    let lowered = detail.to_ascii_lowercase();

    if error.code() == ErrorCode::Auth
        || credential_requests > 1
        || lowered.contains("authentication")
        || lowered.contains("401")
    {
        return PublishFailure::Auth { detail };
    }
    if error.code() == ErrorCode::NotFastForward
        || lowered.contains("rejected")
        || lowered.contains("non-fast-forward")
        || lowered.contains("protected branch")
    {
        return PublishFailure::Rejected { detail };
    }
    match error.class() {
        ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssl | ErrorClass::Os | ErrorClass::Ssh => {
            PublishFailure::Network { detail }
        }
        _ => PublishFailure::Git { detail },
    }
}

/// Remote URL without any userinfo
fn display_remote(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}
