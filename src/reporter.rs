//! Change reporting
//!
//! Accumulates applied edits per file and renders each file's total change as
//! a unified diff against the content it had before the run started.

use crate::applier::AppliedEdit;
use crate::models::AppliedChange;
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;

struct FileRecord {
    file_path: String,
    original: String,
    latest: String,
    issue_ids: Vec<String>,
}

impl FileRecord {
    fn to_change(&self) -> AppliedChange {
        let (lines_added, lines_removed) = line_counts(&self.original, &self.latest);
        AppliedChange {
            file_path: self.file_path.clone(),
            diff_text: unified_diff(&self.file_path, &self.original, &self.latest),
            issue_ids: self.issue_ids.clone(),
            lines_added,
            lines_removed,
        }
    }
}

#[derive(Default)]
pub struct ChangeReporter {
    files: Vec<FileRecord>,
    index: HashMap<String, usize>,
}

impl ChangeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one applied edit and return the file's updated change
    ///
    /// The first edit seen for a file fixes its pre-run content; later edits
    /// only move the latest content forward.
    pub fn record(&mut self, edit: AppliedEdit) -> AppliedChange {
        let AppliedEdit {
            issue_id,
            file_path,
            before,
            after,
        } = edit;

        let slot = match self.index.get(&file_path) {
            Some(&slot) => {
                let record = &mut self.files[slot];
                record.latest = after;
                record.issue_ids.push(issue_id);
                slot
            }
            None => {
                self.files.push(FileRecord {
                    file_path: file_path.clone(),
                    original: before,
                    latest: after,
                    issue_ids: vec![issue_id],
                });
                let slot = self.files.len() - 1;
                self.index.insert(file_path, slot);
                slot
            }
        };

        self.files[slot].to_change()
    }

    /// All changes, in order of first modification
    pub fn changes(&self) -> Vec<AppliedChange> {
        self.files.iter().map(FileRecord::to_change).collect()
    }

    pub fn into_changes(self) -> Vec<AppliedChange> {
        self.changes()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Line-based unified diff with 3 lines of context; empty when nothing changed
pub fn unified_diff(file_path: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let old_header = format!("a/{}", file_path);
    let new_header = format!("b/{}", file_path);
    diff.unified_diff()
        .context_radius(3)
        .header(&old_header, &new_header)
        .to_string()
}

fn line_counts(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
}
