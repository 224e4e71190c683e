use serde::{Deserialize, Serialize};

/// Total run impact on one file
///
/// `diff_text` is always computed against the file's pre-run content, and
/// `issue_ids` lists every issue whose fix landed in the file, in application
/// order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedChange {
    pub file_path: String,
    pub diff_text: String,
    pub issue_ids: Vec<String>,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl AppliedChange {
    pub fn is_empty(&self) -> bool {
        self.diff_text.is_empty()
    }
}
