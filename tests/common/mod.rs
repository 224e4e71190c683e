//! Common test helpers for integration tests
//!
//! Fixture repositories are real git repositories in temp directories, with
//! `main` as the initial branch. Remotes are bare repositories addressed by
//! path, so publishing needs no network and no credential.

#![allow(dead_code)]

use git2::{Repository, RepositoryInitOptions, Signature};
use ryn_autofix::git::{Publisher, RepoRef};
use ryn_autofix::models::{Issue, ScanReport, Severity};
use ryn_autofix::pipeline::Pipeline;
use ryn_autofix::providers::{ProviderGateway, RetryPolicy, ScriptedProvider, ScriptedReply};
use ryn_autofix::synthesizer::{FixSynthesizer, SynthesizerConfig};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Working copy with one initial commit on `main`
pub fn init_repo(files: &[(&str, &str)]) -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(dir.path(), &opts).unwrap();

    {
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@test.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();
    }

    (dir, repo)
}

/// Empty bare repository to push to, plus its path as a remote URL
pub fn bare_remote() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    Repository::init_bare(dir.path()).unwrap();
    let url = dir.path().to_string_lossy().to_string();
    (dir, url)
}

pub fn repo_ref(workdir: &Path, remote_url: &str) -> RepoRef {
    RepoRef::new(workdir).with_remote_url(remote_url)
}

/// Tip of `branch` in the repository at `path`, if the branch exists
pub fn branch_tip(path: &Path, branch: &str) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let reference = repo.find_reference(&format!("refs/heads/{}", branch)).ok()?;
    reference.target().map(|oid| oid.to_string())
}

/// Content of `file` as committed at the tip of `branch`
pub fn file_at_branch(path: &Path, branch: &str, file: &str) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let commit = repo
        .find_reference(&format!("refs/heads/{}", branch))
        .ok()?
        .peel_to_commit()
        .ok()?;
    let entry = commit.tree().ok()?.get_path(Path::new(file)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    String::from_utf8(blob.content().to_vec()).ok()
}

/// Short name of the branch HEAD points at
pub fn head_branch(path: &Path) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let head = repo.head().ok()?;
    head.shorthand().map(str::to_string)
}

/// Paths a commit changed relative to its first parent, sorted
pub fn commit_files(path: &Path, sha: &str) -> Vec<String> {
    let repo = Repository::open(path).unwrap();
    let commit = repo.find_commit(git2::Oid::from_str(sha).unwrap()).unwrap();
    let parent_tree = commit.parent(0).ok().map(|parent| parent.tree().unwrap());
    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree().unwrap()), None)
        .unwrap();
    let mut files: Vec<String> = diff
        .deltas()
        .filter_map(|delta| delta.new_file().path())
        .map(|path| path.to_string_lossy().to_string())
        .collect();
    files.sort();
    files
}

pub fn is_clean(path: &Path) -> bool {
    Repository::open(path).unwrap().statuses(None).unwrap().is_empty()
}

pub fn read(dir: &Path, file: &str) -> String {
    fs::read_to_string(dir.join(file)).unwrap()
}

/// A completion carrying one original/replacement pair
pub fn fix_reply(original: &str, replacement: &str) -> ScriptedReply {
    ScriptedReply::Text(
        serde_json::json!({
            "original": original,
            "replacement": replacement,
            "confidence": 0.9,
            "explanation": "scripted fix"
        })
        .to_string(),
    )
}

pub fn issue(id: &str, file: &str, line: u32) -> Issue {
    Issue::new(id, file, line, line, Severity::High, "reported problem")
}

pub fn report(issues: Vec<Issue>) -> ScanReport {
    ScanReport {
        issues,
        rejected: vec![],
    }
}

pub fn fast_policy(timeout: Duration) -> RetryPolicy {
    RetryPolicy {
        timeout,
        max_retries: 0,
        backoff_base: Duration::from_millis(1),
    }
}

/// Pipeline over the given providers, tried in order, each with a 2s call timeout
pub fn pipeline(providers: Vec<Arc<ScriptedProvider>>) -> Pipeline {
    pipeline_with_timeout(providers, Duration::from_secs(2))
}

pub fn pipeline_with_timeout(providers: Vec<Arc<ScriptedProvider>>, timeout: Duration) -> Pipeline {
    let gateways = providers
        .into_iter()
        .map(|provider| ProviderGateway::new(provider, fast_policy(timeout)))
        .collect();
    Pipeline::new(
        FixSynthesizer::new(gateways, SynthesizerConfig::default()),
        Publisher::default(),
        4,
    )
}
