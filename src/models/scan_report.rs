//! Scan report intake
//!
//! The report format belongs to the external analysis tool, so intake is
//! lenient about layout (top-level array or `{"issues": [...]}`) and field
//! names, but strict about the fields the pipeline needs. Entries that fail
//! validation are kept as [`RejectedEntry`] values and surface as failed issues
//! in the run report instead of aborting the run.

use crate::error::ScanReportError;
use crate::models::issue::{Issue, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const FILE_KEYS: &[&str] = &["file_path", "file", "path", "filename"];
const LINE_START_KEYS: &[&str] = &["line_start", "start_line", "line", "line_number"];
const LINE_END_KEYS: &[&str] = &["line_end", "end_line"];
const RULE_KEYS: &[&str] = &["rule_id", "rule", "check_id", "control_id"];
const DESCRIPTION_KEYS: &[&str] = &["description", "message", "title"];

/// A report entry that could not be turned into an [`Issue`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedEntry {
    pub issue_id: String,
    pub reason: String,
}

/// Validated contents of one scan report, in report order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanReport {
    pub issues: Vec<Issue>,
    pub rejected: Vec<RejectedEntry>,
}

impl ScanReport {
    pub fn from_path(path: &Path) -> Result<Self, ScanReportError> {
        let raw = fs::read_to_string(path).map_err(|source| ScanReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ScanReportError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ScanReportError> {
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut obj) => match obj.remove("issues") {
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    return Err(ScanReportError::Shape(
                        "`issues` must be an array".to_string(),
                    ))
                }
                None => {
                    return Err(ScanReportError::Shape(
                        "expected an array of issues or an object with an `issues` array"
                            .to_string(),
                    ))
                }
            },
            _ => {
                return Err(ScanReportError::Shape(
                    "expected an array of issues or an object with an `issues` array".to_string(),
                ))
            }
        };

        let mut report = ScanReport::default();
        let mut seen_ids = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            match parse_entry(index, entry) {
                Ok(issue) => {
                    if seen_ids.insert(issue.id.clone()) {
                        report.issues.push(issue);
                    } else {
                        report.rejected.push(RejectedEntry {
                            issue_id: issue.id,
                            reason: "duplicate issue id".to_string(),
                        });
                    }
                }
                Err(rejected) => report.rejected.push(rejected),
            }
        }

        Ok(report)
    }

    /// Total entries seen, accepted and rejected
    pub fn len(&self) -> usize {
        self.issues.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_entry(index: usize, entry: &Value) -> Result<Issue, RejectedEntry> {
    let fallback_id = format!("entry-{}", index);

    let obj = match entry.as_object() {
        Some(obj) => obj,
        None => {
            return Err(RejectedEntry {
                issue_id: fallback_id,
                reason: "entry is not a JSON object".to_string(),
            })
        }
    };

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(RejectedEntry {
                issue_id: fallback_id,
                reason: "missing required field `id`".to_string(),
            })
        }
    };

    let reject = |reason: String| RejectedEntry {
        issue_id: id.clone(),
        reason,
    };

    let file_path = string_field(obj, FILE_KEYS)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| reject("missing required field `file_path`".to_string()))?;

    let line_start = match line_field(obj, LINE_START_KEYS) {
        LineField::Value(n) if n >= 1 => n,
        LineField::Value(_) => return Err(reject("`line_start` must be >= 1".to_string())),
        LineField::Invalid => return Err(reject("`line_start` is not a line number".to_string())),
        LineField::Missing => return Err(reject("missing required field `line_start`".to_string())),
    };

    let line_end = match line_field(obj, LINE_END_KEYS) {
        LineField::Value(n) if n >= line_start => n,
        LineField::Value(n) => {
            return Err(reject(format!(
                "`line_end` ({}) is before `line_start` ({})",
                n, line_start
            )))
        }
        LineField::Invalid => return Err(reject("`line_end` is not a line number".to_string())),
        LineField::Missing => line_start,
    };

    let description = string_field(obj, DESCRIPTION_KEYS)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| reject("missing required field `description`".to_string()))?;

    let severity = string_field(obj, &["severity", "level"])
        .and_then(|s| Severity::from_str(&s))
        .unwrap_or(Severity::Medium);

    Ok(Issue {
        id,
        file_path,
        line_start,
        line_end,
        severity,
        description,
        rule_id: string_field(obj, RULE_KEYS),
    })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

enum LineField {
    Value(u32),
    Invalid,
    Missing,
}

fn line_field(obj: &Map<String, Value>, keys: &[&str]) -> LineField {
    let Some(value) = keys.iter().find_map(|key| obj.get(*key)) else {
        return LineField::Missing;
    };

    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match parsed.and_then(|n| u32::try_from(n).ok()) {
        Some(n) => LineField::Value(n),
        None => LineField::Invalid,
    }
}
