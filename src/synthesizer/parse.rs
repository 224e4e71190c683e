//! Extraction of an original/replacement pair from a model response
//!
//! Accepted shapes, tried in order:
//! 1. a bare JSON object
//! 2. a JSON object inside a Markdown code fence
//! 3. the outermost `{ ... }` span of otherwise chatty text
//! 4. `<<<ORIGINAL` / `<<<REPLACEMENT` blocks, each closed by `>>>` on a
//!    line of its own

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("valid fenced block regex")
});

// Body is optional so an empty block (a deletion) still matches
static ORIGINAL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<<<ORIGINAL[ \t]*\r?\n(?:(.*?)\r?\n)?>>>[ \t]*(?:\r?\n|$)")
        .expect("valid original block regex")
});

static REPLACEMENT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<<<REPLACEMENT[ \t]*\r?\n(?:(.*?)\r?\n)?>>>[ \t]*(?:\r?\n|$)")
        .expect("valid replacement block regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFix {
    pub original: String,
    pub replacement: String,
    pub confidence: Option<f32>,
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFix {
    #[serde(alias = "original_snippet", alias = "original_code", alias = "old")]
    original: String,
    #[serde(alias = "replacement_snippet", alias = "fixed_code", alias = "new")]
    replacement: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Parse a model response into a usable fix
///
/// # Errors
/// Returns a short reason when no pair can be extracted, the original is
/// blank, or the replacement is identical to the original
pub fn parse_fix(response: &str) -> Result<ParsedFix, String> {
    let parsed = extract_json(response)
        .or_else(|| extract_blocks(response))
        .ok_or_else(|| "response contains no original/replacement pair".to_string())?;

    if parsed.original.trim().is_empty() {
        return Err("original snippet is empty".to_string());
    }
    if parsed.original == parsed.replacement {
        return Err("replacement is identical to original".to_string());
    }
    Ok(parsed)
}

fn extract_json(response: &str) -> Option<ParsedFix> {
    let trimmed = response.trim();
    if let Some(fix) = decode(trimmed) {
        return Some(fix);
    }

    for captures in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(fix) = captures.get(1).and_then(|body| decode(body.as_str().trim())) {
            return Some(fix);
        }
    }

    let open = trimmed.find('{')?;
    let close = trimmed.rfind('}')?;
    if close > open {
        decode(&trimmed[open..=close])
    } else {
        None
    }
}

fn decode(candidate: &str) -> Option<ParsedFix> {
    let raw: RawFix = serde_json::from_str(candidate).ok()?;
    Some(ParsedFix {
        original: raw.original,
        replacement: raw.replacement,
        confidence: raw.confidence.map(|c| c.clamp(0.0, 1.0)),
        explanation: raw.explanation.filter(|e| !e.trim().is_empty()),
    })
}

fn extract_blocks(response: &str) -> Option<ParsedFix> {
    let body = |captures: regex::Captures<'_>| {
        captures.get(1).map_or(String::new(), |m| m.as_str().to_string())
    };
    let original = body(ORIGINAL_BLOCK.captures(response)?);
    let replacement = body(REPLACEMENT_BLOCK.captures(response)?);
    Some(ParsedFix {
        original,
        replacement,
        confidence: None,
        explanation: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_bare_json() {
        let fix = parse_fix(
            r#"{"original": "password = \"hunter2\"", "replacement": "password = os.environ[\"PW\"]", "confidence": 0.9, "explanation": "move secret to env"}"#,
        )
        .unwrap();
        assert_eq!(fix.original, "password = \"hunter2\"");
        assert_eq!(fix.replacement, "password = os.environ[\"PW\"]");
        assert_eq!(fix.confidence, Some(0.9));
        assert_eq!(fix.explanation.as_deref(), Some("move secret to env"));
    }

    #[test]
    fn test_fenced_json_with_chatter() {
        let response = "Here is the fix:\n```json\n{\"original\": \"a\", \"replacement\": \"b\"}\n```\nLet me know!";
        let fix = parse_fix(response).unwrap();
        assert_eq!((fix.original.as_str(), fix.replacement.as_str()), ("a", "b"));
        assert_eq!(fix.confidence, None);
    }

    #[test]
    fn test_embedded_object_without_fence() {
        let response = "Sure. {\"original_snippet\": \"x = 1\", \"replacement_snippet\": \"x = 2\"} Done.";
        let fix = parse_fix(response).unwrap();
        assert_eq!(fix.replacement, "x = 2");
    }

    #[test]
    fn test_block_format() {
        let response = "<<<ORIGINAL\nif a:\n    run()\n>>>\n<<<REPLACEMENT\nif a and b:\n    run()\n>>>\n";
        let fix = parse_fix(response).unwrap();
        assert_eq!(fix.original, "if a:\n    run()");
        assert_eq!(fix.replacement, "if a and b:\n    run()");
    }

    #[test]
    fn test_block_format_allows_deletion() {
        let response = "<<<ORIGINAL\ndebug = True\n>>>\n<<<REPLACEMENT\n>>>";
        let fix = parse_fix(response).unwrap();
        assert_eq!(fix.replacement, "");
    }

    #[test]
    fn test_block_body_may_contain_terminator_text() {
        let response = "<<<ORIGINAL\n>>> add(1, 2)\n4\n>>>\n<<<REPLACEMENT\n>>> add(1, 2)\n3\n>>>\n";
        let fix = parse_fix(response).unwrap();
        assert_eq!(fix.original, ">>> add(1, 2)\n4");
        assert_eq!(fix.replacement, ">>> add(1, 2)\n3");
    }

    #[test]
    fn test_block_with_crlf_and_trailing_space() {
        let response = "<<<ORIGINAL\r\nx = y >>> 2\r\n>>> \r\n<<<REPLACEMENT\r\nx = y >>> 3\r\n>>>";
        let fix = parse_fix(response).unwrap();
        assert_eq!(fix.original, "x = y >>> 2");
        assert_eq!(fix.replacement, "x = y >>> 3");
    }

    #[test]
    fn test_confidence_is_clamped() {
        let fix = parse_fix(r#"{"original": "a", "replacement": "b", "confidence": 7}"#).unwrap();
        assert_eq!(fix.confidence, Some(1.0));
    }

    #[rstest]
    #[case("I cannot help with that.", "no original/replacement pair")]
    #[case(r#"{"original": "   ", "replacement": "x"}"#, "empty")]
    #[case(r#"{"original": "same", "replacement": "same"}"#, "identical")]
    #[case(r#"{"replacement": "only"}"#, "no original/replacement pair")]
    fn test_unusable_responses(#[case] response: &str, #[case] expected: &str) {
        let err = parse_fix(response).unwrap_err();
        assert!(err.contains(expected), "{} did not contain {}", err, expected);
    }
}
