use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "info")]
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Parse a severity label as emitted by common analysis tools.
    ///
    /// Case-insensitive. SARIF-style levels (`error`, `warning`, `note`) map onto
    /// high, medium and low.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" => Some(Severity::Critical),
            "high" | "error" => Some(Severity::High),
            "medium" | "moderate" | "warning" => Some(Severity::Medium),
            "low" | "minor" | "note" => Some(Severity::Low),
            "info" | "informational" | "none" => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn numeric_value(&self) -> i32 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }
}

/// One issue reported by the external static-analysis tool
///
/// Immutable once read from the scan report. `file_path` is repo-relative and
/// is only ever resolved through the applier's path guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub id: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub severity: Severity,
    pub description: String,
    pub rule_id: Option<String>,
}

impl Issue {
    pub fn new(
        id: impl Into<String>,
        file_path: impl Into<String>,
        line_start: u32,
        line_end: u32,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            line_start,
            line_end: line_end.max(line_start),
            severity,
            description: description.into(),
            rule_id: None,
        }
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Number of reported lines (inclusive range)
    pub fn line_span(&self) -> u32 {
        self.line_end - self.line_start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_as_str() {
        assert_eq!(Severity::Critical.as_str(), "critical");
        assert_eq!(Severity::High.as_str(), "high");
        assert_eq!(Severity::Medium.as_str(), "medium");
        assert_eq!(Severity::Low.as_str(), "low");
        assert_eq!(Severity::Info.as_str(), "info");
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from_str("critical"), Some(Severity::Critical));
        assert_eq!(Severity::from_str("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_str(" warning "), Some(Severity::Medium));
        assert_eq!(Severity::from_str("note"), Some(Severity::Low));
        assert_eq!(Severity::from_str("bogus"), None);
    }

    #[test]
    fn test_severity_numeric_value() {
        assert!(Severity::Critical.numeric_value() > Severity::High.numeric_value());
        assert!(Severity::Low.numeric_value() > Severity::Info.numeric_value());
    }

    #[test]
    fn test_issue_creation_clamps_line_end() {
        let issue = Issue::new("I-1", "src/a.py", 10, 4, Severity::High, "Hardcoded secret")
            .with_rule("CC6.7");

        assert_eq!(issue.line_start, 10);
        assert_eq!(issue.line_end, 10);
        assert_eq!(issue.line_span(), 1);
        assert_eq!(issue.rule_id.as_deref(), Some("CC6.7"));
    }

    #[test]
    fn test_issue_serde() {
        let issue = Issue::new("I-2", "lib/b.js", 3, 5, Severity::Low, "Missing timeout");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"severity\":\"low\""));
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(issue, back);
    }
}
