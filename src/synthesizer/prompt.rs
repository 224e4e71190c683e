//! Prompt construction for fix synthesis

use super::context::ContextWindow;
use crate::models::Issue;
use crate::providers::Prompt;

pub const SYSTEM_PROMPT: &str = "You are a security-focused code fixer. \
Your task is to fix the reported issue with the smallest possible edit, without breaking functionality. \
Answer with exactly one JSON object and nothing else:\n\
{\"original\": \"<exact lines copied from the file>\", \"replacement\": \"<fixed lines>\", \
\"confidence\": <0.0-1.0>, \"explanation\": \"<one sentence>\"}\n\
\"original\" must be copied verbatim from the file (without the line-number gutter) \
and must occur exactly once in it.";

/// Build the synthesis prompt for one issue
pub fn build_prompt(issue: &Issue, window: &ContextWindow, max_tokens: u32) -> Prompt {
    let mut user = String::with_capacity(window.rendered.len() + 512);
    user.push_str(&format!("Issue ID: {}\n", issue.id));
    user.push_str(&format!("File: {}\n", issue.file_path));
    user.push_str(&format!("Lines: {}-{}\n", issue.line_start, issue.line_end));
    user.push_str(&format!("Severity: {}\n", issue.severity.as_str()));
    if let Some(rule) = &issue.rule_id {
        user.push_str(&format!("Rule: {}\n", rule));
    }
    user.push_str(&format!("Description: {}\n\n", issue.description));

    if window.rendered.is_empty() {
        user.push_str("The file is empty.\n");
    } else {
        user.push_str(&format!(
            "Code (lines {}-{}, reported lines marked with '>'):\n```\n{}```\n",
            window.first_line, window.last_line, window.rendered
        ));
        if window.truncated {
            user.push_str("(surrounding code omitted for length)\n");
        }
    }

    user.push_str("\nRespond with the JSON object only.");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        max_tokens,
    }
}
