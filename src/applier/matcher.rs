//! Snippet location inside a file
//!
//! An exact occurrence is preferred. Without one, the snippet is matched line
//! by line with surrounding whitespace ignored, which absorbs indentation and
//! line-ending drift in model output. Either way the match must be unique.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    NotFound,
    Ambiguous(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    /// Line-wise match; indentation of the first non-blank line on each side
    Normalized {
        file_indent: String,
        snippet_indent: String,
        crlf: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetMatch {
    /// Byte range in the file content to replace
    pub range: Range<usize>,
    pub kind: MatchKind,
}

/// Find the single location of `snippet` in `content`
pub fn find_unique(content: &str, snippet: &str) -> Result<SnippetMatch, MatchError> {
    let exact = exact_occurrences(content, snippet);
    match exact.len() {
        1 => {
            let start = exact[0];
            return Ok(SnippetMatch {
                range: start..start + snippet.len(),
                kind: MatchKind::Exact,
            });
        }
        0 => {}
        count => return Err(MatchError::Ambiguous(count)),
    }

    normalized_match(content, snippet)
}

/// Produce the new content for a match
pub fn splice(content: &str, found: &SnippetMatch, replacement: &str) -> String {
    let replacement = match &found.kind {
        MatchKind::Exact => replacement.to_string(),
        MatchKind::Normalized {
            file_indent,
            snippet_indent,
            crlf,
        } => {
            let body = replacement
                .trim_start_matches(['\r', '\n'])
                .trim_end_matches(['\r', '\n']);
            let body = reindent(body, snippet_indent, file_indent);
            if *crlf {
                body.replace("\r\n", "\n").replace('\n', "\r\n")
            } else {
                body
            }
        }
    };

    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..found.range.start]);
    out.push_str(&replacement);
    out.push_str(&content[found.range.end..]);
    out
}

/// Start offsets of every occurrence, overlapping ones included
fn exact_occurrences(content: &str, snippet: &str) -> Vec<usize> {
    let mut found = Vec::new();
    if snippet.is_empty() {
        return found;
    }
    let mut from = 0;
    while let Some(offset) = content[from..].find(snippet) {
        let start = from + offset;
        found.push(start);
        // step one char so overlapping occurrences are counted
        let step = content[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
        if from >= content.len() {
            break;
        }
    }
    found
}

fn normalized_match(content: &str, snippet: &str) -> Result<SnippetMatch, MatchError> {
    let snippet_lines: Vec<&str> = snippet.lines().collect();
    let first = snippet_lines.iter().position(|l| !l.trim().is_empty());
    let last = snippet_lines.iter().rposition(|l| !l.trim().is_empty());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(MatchError::NotFound),
    };
    let wanted: Vec<&str> = snippet_lines[first..=last].iter().map(|l| l.trim()).collect();

    // (start offset, line including terminator)
    let mut file_lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        file_lines.push((offset, line));
        offset += line.len();
    }

    if wanted.len() > file_lines.len() {
        return Err(MatchError::NotFound);
    }

    let starts: Vec<usize> = (0..=file_lines.len() - wanted.len())
        .filter(|&i| {
            wanted
                .iter()
                .enumerate()
                .all(|(k, w)| file_lines[i + k].1.trim() == *w)
        })
        .collect();

    match starts.len() {
        0 => Err(MatchError::NotFound),
        1 => {
            let i = starts[0];
            let (start, first_line) = file_lines[i];
            let (last_start, last_line) = file_lines[i + wanted.len() - 1];
            let end = last_start + without_terminator(last_line).len();
            let crlf = file_lines[i..i + wanted.len()]
                .iter()
                .any(|(_, l)| l.ends_with("\r\n"));

            Ok(SnippetMatch {
                range: start..end,
                kind: MatchKind::Normalized {
                    file_indent: leading_whitespace(first_line).to_string(),
                    snippet_indent: leading_whitespace(snippet_lines[first]).to_string(),
                    crlf,
                },
            })
        }
        count => Err(MatchError::Ambiguous(count)),
    }
}

fn without_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn reindent(text: &str, from: &str, to: &str) -> String {
    if from == to {
        return text.to_string();
    }
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else if let Some(rest) = line.strip_prefix(from) {
                format!("{}{}", to, rest)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(content: &str, original: &str, replacement: &str) -> Result<String, MatchError> {
        let found = find_unique(content, original)?;
        Ok(splice(content, &found, replacement))
    }

    #[test]
    fn test_exact_match() {
        let out = apply("a = 1\nb = 2\nc = 3\n", "b = 2", "b = 20").unwrap();
        assert_eq!(out, "a = 1\nb = 20\nc = 3\n");
    }

    #[test]
    fn test_exact_duplicate_is_ambiguous() {
        let err = find_unique("x()\ny()\nx()\n", "x()").unwrap_err();
        assert_eq!(err, MatchError::Ambiguous(2));
    }

    #[test]
    fn test_overlapping_occurrences_are_counted() {
        assert_eq!(find_unique("aaa", "aa").unwrap_err(), MatchError::Ambiguous(2));
    }

    #[test]
    fn test_missing_snippet() {
        assert_eq!(find_unique("a\nb\n", "c").unwrap_err(), MatchError::NotFound);
        assert_eq!(find_unique("a\nb\n", "\n  \n").unwrap_err(), MatchError::NotFound);
    }

    #[test]
    fn test_normalized_match_reindents_replacement() {
        let content = "def f():\n    if x:\n        run(x)\n    return 1\n";
        // model dropped the indentation
        let out = apply(content, "if x:\n    run(x)\n", "if x is not None:\n    run(x)\n").unwrap();
        assert_eq!(
            out,
            "def f():\n    if x is not None:\n        run(x)\n    return 1\n"
        );
    }

    #[test]
    fn test_normalized_match_ignores_trailing_whitespace_and_blank_edges() {
        let content = "a = 1   \nb = 2\n";
        let out = apply(content, "\na = 1\nb = 2\n\n", "a = 1\nb = 3").unwrap();
        assert_eq!(out, "a = 1\nb = 3\n");
    }

    #[test]
    fn test_normalized_match_keeps_crlf() {
        let content = "one\r\n  two\r\n  three\r\n";
        let out = apply(content, "two\nthree", "two\nTHREE").unwrap();
        assert_eq!(out, "one\r\n  two\r\n  THREE\r\n");
    }

    #[test]
    fn test_normalized_duplicate_is_ambiguous() {
        let content = "  log(x)\nfoo\n    log(x)\n";
        assert_eq!(find_unique(content, "log(x) ").unwrap_err(), MatchError::Ambiguous(2));
    }

    #[test]
    fn test_utf8_content() {
        let out = apply("naïve = 'é'\n", "'é'", "'e'").unwrap();
        assert_eq!(out, "naïve = 'e'\n");
    }
}
