use serde::{Deserialize, Serialize};

/// An AI-suggested original -> replacement snippet pair for one issue
///
/// Deliberately not `Clone`: a proposal is moved into the patch applier and
/// consumed by exactly one application attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FixProposal {
    pub issue_id: String,
    pub file_path: String,
    pub original_snippet: String,
    pub replacement_snippet: String,
    pub provider_used: String,
    pub confidence: Option<f32>,
    pub explanation: Option<String>,
}

impl FixProposal {
    pub fn new(
        issue_id: impl Into<String>,
        file_path: impl Into<String>,
        original_snippet: impl Into<String>,
        replacement_snippet: impl Into<String>,
        provider_used: impl Into<String>,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            file_path: file_path.into(),
            original_snippet: original_snippet.into(),
            replacement_snippet: replacement_snippet.into(),
            provider_used: provider_used.into(),
            confidence: None,
            explanation: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// The proposal that undoes this one (replacement -> original)
    pub fn inverse(self) -> Self {
        Self {
            original_snippet: self.replacement_snippet,
            replacement_snippet: self.original_snippet,
            ..self
        }
    }
}
