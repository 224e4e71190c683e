//! Git operations for committing applied fixes
//!
//! Commits a run's files onto its branch without disturbing other
//! working-copy changes.

use git2::{Repository, Signature};
use std::path::Path;

/// Git operations for fix application and version control
pub struct GitOperations;

/// Result of committing a run's files onto its branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCommit {
    /// SHA-1 of the branch tip after the call
    pub sha: String,
    /// False when the branch already contained exactly these file states
    pub created: bool,
}

impl GitOperations {
    /// Commit `files` onto `branch`, creating the branch at HEAD if needed
    ///
    /// Only the listed repo-relative files are staged, on top of the branch
    /// tip (or HEAD for a new branch); other working-copy changes stay
    /// unstaged. HEAD is moved to the branch afterwards. When the resulting
    /// tree equals the tip's tree no commit is made, so a retried publish
    /// reuses the earlier commit.
    ///
    /// # Errors
    /// Returns the underlying `git2::Error` so callers can classify it
    pub fn commit_to_branch(
        repo: &Repository,
        branch: &str,
        files: &[&str],
        message: &str,
        signature: &Signature<'_>,
    ) -> Result<BranchCommit, git2::Error> {
        let refname = format!("refs/heads/{}", branch);

        let parent = match repo.find_branch(branch, git2::BranchType::Local) {
            Ok(existing) => existing.get().peel_to_commit()?,
            Err(e) if e.code() == git2::ErrorCode::NotFound => repo.head()?.peel_to_commit()?,
            Err(e) => return Err(e),
        };
        let parent_tree = parent.tree()?;

        let mut index = repo.index()?;
        index.read_tree(&parent_tree)?;
        for file in files {
            index.add_path(Path::new(file))?;
        }
        let tree_id = index.write_tree()?;

        let sha = if tree_id == parent_tree.id() {
            if repo.find_reference(&refname).is_err() {
                repo.reference(&refname, parent.id(), false, "autofix: create run branch")?;
            }
            BranchCommit {
                sha: parent.id().to_string(),
                created: false,
            }
        } else {
            let tree = repo.find_tree(tree_id)?;
            let oid = repo.commit(
                Some(&refname),
                signature,
                signature,
                message,
                &tree,
                &[&parent],
            )?;
            BranchCommit {
                sha: oid.to_string(),
                created: true,
            }
        };

        repo.set_head(&refname)?;
        index.write()?;
        Ok(sha)
    }
}
