//! Repository path guard
//!
//! Every repo-relative path from a scan report or a proposal goes through
//! [`resolve_in_repo`] before any filesystem access. Rejections are
//! `ApplyFailure::PathTraversal` and are never retried.

use crate::error::ApplyFailure;
use std::path::{Component, Path, PathBuf};

/// A guarded path: where the file really is, and how the repository names it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPath {
    /// Canonical absolute path, symlinks resolved
    pub absolute: PathBuf,
    /// Canonical path relative to the root, `/`-separated
    pub relative: String,
}

/// Validate and canonicalize a repo-relative file path
///
/// This function ensures that:
/// 1. The path is non-empty, relative and free of null bytes
/// 2. The path has no `..` components and does not point into `.git`
/// 3. The resolved path (symlinks followed) stays within the repository root
/// 4. The target exists and is a regular file
///
/// `./src/a.py`, `src//a.py` and an in-root symlink to `src/a.py` all come
/// back with `relative == "src/a.py"`.
///
/// # Arguments
/// * `root` - Repository working-copy root
/// * `relative_path` - Path as written in the scan report
///
/// # Errors
/// `PathTraversal` for anything escaping the root, `FileNotFound` when the
/// target does not exist or is not a file, `ReadFailure` when the root itself
/// cannot be resolved
pub fn resolve_in_repo(root: &Path, relative_path: &str) -> Result<RepoPath, ApplyFailure> {
    let reject = |detail: &str| ApplyFailure::PathTraversal {
        path: relative_path.replace('\0', "\\0"),
        detail: detail.to_string(),
    };

    if relative_path.trim().is_empty() {
        return Err(reject("empty path"));
    }
    if relative_path.contains('\0') {
        return Err(reject("null byte in path"));
    }

    let candidate = Path::new(relative_path);
    if candidate.is_absolute() || relative_path.starts_with('/') || relative_path.starts_with('\\') {
        return Err(reject("absolute paths are not allowed"));
    }

    let mut first_normal = true;
    for component in candidate.components() {
        match component {
            Component::ParentDir => return Err(reject("parent directory component")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(reject("absolute paths are not allowed"))
            }
            Component::Normal(part) => {
                if first_normal && part == ".git" {
                    return Err(reject("repository metadata is off limits"));
                }
                first_normal = false;
            }
            Component::CurDir => {}
        }
    }

    let canonical_root = root.canonicalize().map_err(|e| ApplyFailure::ReadFailure {
        path: relative_path.to_string(),
        detail: format!("repository root {} is not accessible: {}", root.display(), e),
    })?;

    let canonical = match canonical_root.join(candidate).canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApplyFailure::FileNotFound {
                path: relative_path.to_string(),
            })
        }
        Err(e) => {
            return Err(ApplyFailure::ReadFailure {
                path: relative_path.to_string(),
                detail: e.to_string(),
            })
        }
    };

    let inside = match canonical.strip_prefix(&canonical_root) {
        Ok(inside) => inside,
        Err(_) => return Err(reject("resolves outside the repository root")),
    };
    if inside.starts_with(".git") {
        return Err(reject("repository metadata is off limits"));
    }
    if !canonical.is_file() {
        return Err(ApplyFailure::FileNotFound {
            path: relative_path.to_string(),
        });
    }

    let mut parts = Vec::new();
    for component in inside.components() {
        match component.as_os_str().to_str() {
            Some(part) => parts.push(part),
            None => return Err(reject("path is not valid UTF-8")),
        }
    }
    let relative = parts.join("/");

    Ok(RepoPath {
        absolute: canonical,
        relative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn is_traversal(result: Result<RepoPath, ApplyFailure>) -> bool {
        matches!(result, Err(ApplyFailure::PathTraversal { .. }))
    }

    #[test]
    fn test_reject_absolute_path() {
        let base = TempDir::new().unwrap();
        assert!(is_traversal(resolve_in_repo(base.path(), "/etc/passwd")));
    }

    #[test]
    fn test_reject_parent_traversal() {
        let base = TempDir::new().unwrap();
        assert!(is_traversal(resolve_in_repo(base.path(), "../../../etc/passwd")));
        assert!(is_traversal(resolve_in_repo(base.path(), "src/../../x")));
    }

    #[test]
    fn test_reject_null_byte() {
        let base = TempDir::new().unwrap();
        let err = resolve_in_repo(base.path(), "file\0.txt").unwrap_err();
        assert!(err.to_string().contains("null byte"));
    }

    #[test]
    fn test_reject_git_dir() {
        let base = TempDir::new().unwrap();
        fs::create_dir(base.path().join(".git")).unwrap();
        fs::write(base.path().join(".git/config"), "[core]").unwrap();
        assert!(is_traversal(resolve_in_repo(base.path(), ".git/config")));
        assert!(is_traversal(resolve_in_repo(base.path(), "./.git/config")));
    }

    #[test]
    fn test_dotdot_inside_name_is_allowed() {
        let base = TempDir::new().unwrap();
        fs::write(base.path().join("notes..txt"), "x").unwrap();
        assert!(resolve_in_repo(base.path(), "notes..txt").is_ok());
    }

    #[test]
    fn test_allow_nested_relative_path() {
        let base = TempDir::new().unwrap();
        let subdir = base.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("file.txt"), "content").unwrap();

        let validated = resolve_in_repo(base.path(), "subdir/file.txt").unwrap();
        assert!(validated.absolute.starts_with(base.path().canonicalize().unwrap()));
        assert!(validated.absolute.ends_with("file.txt"));
        assert_eq!(validated.relative, "subdir/file.txt");
    }

    #[test]
    fn test_equivalent_spellings_share_one_relative_path() {
        let base = TempDir::new().unwrap();
        fs::create_dir(base.path().join("src")).unwrap();
        fs::write(base.path().join("src/a.py"), "A = 1\n").unwrap();

        for spelling in ["src/a.py", "./src/a.py", "src//a.py", "src/./a.py"] {
            let resolved = resolve_in_repo(base.path(), spelling).unwrap();
            assert_eq!(resolved.relative, "src/a.py", "{}", spelling);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_names_its_target() {
        let base = TempDir::new().unwrap();
        fs::write(base.path().join("real.py"), "DEBUG = True\n").unwrap();
        std::os::unix::fs::symlink(base.path().join("real.py"), base.path().join("link.py"))
            .unwrap();

        let resolved = resolve_in_repo(base.path(), "link.py").unwrap();
        assert_eq!(resolved.relative, "real.py");
        assert!(resolved.absolute.ends_with("real.py"));
    }

    #[test]
    fn test_missing_file_and_directory() {
        let base = TempDir::new().unwrap();
        fs::create_dir(base.path().join("dir")).unwrap();
        assert!(matches!(
            resolve_in_repo(base.path(), "nonexistent.txt"),
            Err(ApplyFailure::FileNotFound { .. })
        ));
        assert!(matches!(
            resolve_in_repo(base.path(), "dir"),
            Err(ApplyFailure::FileNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_reject_symlink_escape() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
        let base = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), base.path().join("link.txt"))
            .unwrap();

        assert!(is_traversal(resolve_in_repo(base.path(), "link.txt")));
    }
}
