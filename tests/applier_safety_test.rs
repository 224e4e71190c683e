//! Integration tests for patch application safety
//!
//! Every rejected proposal must leave the filesystem exactly as it was.

use rstest::rstest;
use ryn_autofix::applier::PatchApplier;
use ryn_autofix::error::ApplyFailure;
use ryn_autofix::models::FixProposal;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const APP: &str = "import os\r\n\r\nDEBUG = True\r\nPASSWORD = 'admin'\r\n\r\ndef login(user):\r\n    return True";

fn setup() -> (TempDir, PatchApplier) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/app.py"), APP).unwrap();
    fs::write(dir.path().join("src/dup.py"), "x = 1\ny = 2\nx = 1\n").unwrap();
    let applier = PatchApplier::new(dir.path());
    (dir, applier)
}

fn proposal(path: &str, original: &str, replacement: &str) -> FixProposal {
    FixProposal::new("I-1", path, original, replacement, "scripted")
}

fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push((path.display().to_string(), fs::read(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}

#[rstest]
#[case("../outside.py")]
#[case("src/../../outside.py")]
#[case("/etc/passwd")]
#[case(".git/config")]
#[case("")]
fn test_traversal_rejected_without_side_effects(#[case] path: &str) {
    let (dir, applier) = setup();
    let before = snapshot(dir.path());

    let result = applier.apply_blocking(proposal(path, "root", "owned"));

    assert!(
        matches!(result, Err(ApplyFailure::PathTraversal { .. })),
        "{:?} gave {:?}",
        path,
        result
    );
    assert_eq!(snapshot(dir.path()), before);
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_rejected() {
    let (dir, applier) = setup();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("target.py"), "secret = 1\n").unwrap();
    std::os::unix::fs::symlink(outside.path().join("target.py"), dir.path().join("src/link.py"))
        .unwrap();

    let result = applier.apply_blocking(proposal("src/link.py", "secret = 1", "secret = 2"));

    assert!(matches!(result, Err(ApplyFailure::PathTraversal { .. })));
    assert_eq!(
        fs::read_to_string(outside.path().join("target.py")).unwrap(),
        "secret = 1\n"
    );
}

#[test]
fn test_missing_snippet_leaves_file_identical() {
    let (dir, applier) = setup();
    let before = fs::read(dir.path().join("src/app.py")).unwrap();

    let result = applier.apply_blocking(proposal("src/app.py", "DEBUG = Maybe", "DEBUG = False"));

    assert_eq!(
        result.unwrap_err(),
        ApplyFailure::SnippetMismatch {
            path: "src/app.py".to_string()
        }
    );
    assert_eq!(fs::read(dir.path().join("src/app.py")).unwrap(), before);
}

#[test]
fn test_repeated_snippet_is_ambiguous() {
    let (dir, applier) = setup();

    let result = applier.apply_blocking(proposal("src/dup.py", "x = 1", "x = 2"));

    assert_eq!(
        result.unwrap_err(),
        ApplyFailure::AmbiguousMatch {
            path: "src/dup.py".to_string(),
            count: 2
        }
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("src/dup.py")).unwrap(),
        "x = 1\ny = 2\nx = 1\n"
    );
}

#[test]
fn test_missing_file_reported() {
    let (_dir, applier) = setup();
    let result = applier.apply_blocking(proposal("src/nope.py", "a", "b"));
    assert!(matches!(result, Err(ApplyFailure::FileNotFound { .. })));
}

#[test]
fn test_inverse_proposal_restores_exact_bytes() {
    let (dir, applier) = setup();
    let original = fs::read(dir.path().join("src/app.py")).unwrap();

    let forward = || {
        proposal(
            "src/app.py",
            "PASSWORD = 'admin'",
            "PASSWORD = os.environ['PASSWORD']",
        )
    };
    let edit = applier.apply_blocking(forward()).unwrap();
    assert_eq!(edit.before.as_bytes(), original.as_slice());
    assert!(edit.after.contains("PASSWORD = os.environ['PASSWORD']\r\n"));

    applier.apply_blocking(forward().inverse()).unwrap();
    assert_eq!(fs::read(dir.path().join("src/app.py")).unwrap(), original);
}

#[test]
fn test_successive_edits_to_one_file() {
    let (dir, applier) = setup();

    applier
        .apply_blocking(proposal("src/app.py", "DEBUG = True", "DEBUG = False"))
        .unwrap();
    let second = applier
        .apply_blocking(proposal("src/app.py", "    return True", "    return check(user)"))
        .unwrap();

    assert!(second.before.contains("DEBUG = False"));
    let content = fs::read_to_string(dir.path().join("src/app.py")).unwrap();
    assert!(content.ends_with("    return check(user)"));
    assert!(content.contains("DEBUG = False\r\n"));
}

#[tokio::test]
async fn test_async_apply_and_guarded_read() {
    let (dir, applier) = setup();

    let content = applier.read_for_synthesis("src/app.py").await.unwrap();
    assert_eq!(content, APP);
    assert!(matches!(
        applier.read_for_synthesis("../x").await,
        Err(ApplyFailure::PathTraversal { .. })
    ));

    let edit = applier
        .apply(proposal("src/app.py", "DEBUG = True", "DEBUG = False"))
        .await
        .unwrap();
    assert_eq!(edit.issue_id, "I-1");
    assert_eq!(edit.file_path, "src/app.py");
    assert!(fs::read_to_string(dir.path().join("src/app.py"))
        .unwrap()
        .contains("DEBUG = False"));
}
