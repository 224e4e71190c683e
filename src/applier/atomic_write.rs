//! Atomic file replacement
//!
//! Content goes to a temporary file in the target's own directory, is synced,
//! given the original permissions, and then renamed over the target. A
//! failure at any step leaves the target untouched and removes the temp file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory")
    })?;
    let permissions = fs::metadata(path)?.permissions();

    let mut tmp = tempfile::Builder::new()
        .prefix(".ryn-autofix-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), permissions)?;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
