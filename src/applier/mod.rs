//! Patch application
//!
//! Applies one `FixProposal` to the working copy: path guard, unique snippet
//! match, atomic write. Every rejection leaves the target file byte-identical
//! and is reported as a distinct `ApplyFailure`.

pub mod atomic_write;
pub mod matcher;
pub mod path_guard;

use crate::error::ApplyFailure;
use crate::models::FixProposal;
use matcher::{find_unique, splice, MatchError, MatchKind};
use path_guard::{resolve_in_repo, RepoPath};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of one successful application, handed to the change reporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub issue_id: String,
    /// Canonical repo-relative path of the file actually written
    pub file_path: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone)]
pub struct PatchApplier {
    root: PathBuf,
}

impl PatchApplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a repo-relative path through the path guard
    pub fn resolve(&self, relative_path: &str) -> Result<RepoPath, ApplyFailure> {
        resolve_in_repo(&self.root, relative_path)
    }

    /// Guarded, read-only load of a file's content for prompt building
    pub async fn read_for_synthesis(&self, relative_path: &str) -> Result<String, ApplyFailure> {
        let path = self.resolve(relative_path)?;
        let bytes = tokio::fs::read(&path.absolute)
            .await
            .map_err(|e| read_error(relative_path, e))?;
        decode_utf8(relative_path, bytes)
    }

    /// Apply a proposal on the blocking pool
    pub async fn apply(&self, proposal: FixProposal) -> Result<AppliedEdit, ApplyFailure> {
        let applier = self.clone();
        let file_path = proposal.file_path.clone();
        tokio::task::spawn_blocking(move || applier.apply_blocking(proposal))
            .await
            .unwrap_or_else(|e| {
                Err(ApplyFailure::WriteFailure {
                    path: file_path,
                    detail: format!("apply task failed: {}", e),
                })
            })
    }

    /// Apply a proposal, consuming it
    ///
    /// # Errors
    /// One `ApplyFailure` per rejection reason; the file is untouched in every case
    pub fn apply_blocking(&self, proposal: FixProposal) -> Result<AppliedEdit, ApplyFailure> {
        let FixProposal {
            issue_id,
            file_path,
            original_snippet,
            replacement_snippet,
            ..
        } = proposal;

        let RepoPath { absolute, relative } = self.resolve(&file_path)?;
        let bytes = fs::read(&absolute).map_err(|e| read_error(&file_path, e))?;
        let before = decode_utf8(&file_path, bytes)?;

        let found = find_unique(&before, &original_snippet).map_err(|e| match e {
            MatchError::NotFound => ApplyFailure::SnippetMismatch {
                path: file_path.clone(),
            },
            MatchError::Ambiguous(count) => ApplyFailure::AmbiguousMatch {
                path: file_path.clone(),
                count,
            },
        })?;
        debug!(
            issue_id = %issue_id,
            file = %relative,
            normalized = matches!(found.kind, MatchKind::Normalized { .. }),
            "snippet located"
        );

        let after = splice(&before, &found, &replacement_snippet);

        atomic_write::write_atomic(&absolute, &after).map_err(|e| ApplyFailure::WriteFailure {
            path: file_path.clone(),
            detail: e.to_string(),
        })?;

        Ok(AppliedEdit {
            issue_id,
            file_path: relative,
            before,
            after,
        })
    }
}

fn read_error(relative_path: &str, error: io::Error) -> ApplyFailure {
    if error.kind() == io::ErrorKind::NotFound {
        ApplyFailure::FileNotFound {
            path: relative_path.to_string(),
        }
    } else {
        ApplyFailure::ReadFailure {
            path: relative_path.to_string(),
            detail: error.to_string(),
        }
    }
}

fn decode_utf8(relative_path: &str, bytes: Vec<u8>) -> Result<String, ApplyFailure> {
    String::from_utf8(bytes).map_err(|_| ApplyFailure::ReadFailure {
        path: relative_path.to_string(),
        detail: "file is not valid UTF-8".to_string(),
    })
}
