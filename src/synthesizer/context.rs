//! Code context extraction for fix prompts
//!
//! Renders the lines around an issue with line numbers, marking the reported
//! range, and keeps the rendering under a byte budget by dropping the lines
//! farthest from the reported range first.

/// Rendered slice of a file around an issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    /// First rendered line, 1-indexed (0 for an empty file)
    pub first_line: usize,
    /// Last rendered line, 1-indexed (0 for an empty file)
    pub last_line: usize,
    pub rendered: String,
    /// True when lines were dropped to fit the byte budget
    pub truncated: bool,
}

/// Extract the reported range plus `context_lines` on each side
///
/// # Arguments
/// * `code` - Full file content
/// * `line_start` / `line_end` - Reported range, 1-indexed inclusive; clamped to the file
/// * `context_lines` - Lines to include before and after the range
/// * `max_bytes` - Budget for the rendered window
pub fn extract_context(
    code: &str,
    line_start: u32,
    line_end: u32,
    context_lines: usize,
    max_bytes: usize,
) -> ContextWindow {
    let lines: Vec<&str> = code.lines().collect();
    if lines.is_empty() {
        return ContextWindow {
            first_line: 0,
            last_line: 0,
            rendered: String::new(),
            truncated: false,
        };
    }
    let total = lines.len();

    let target_start = (line_start.max(1) as usize - 1).min(total - 1);
    let target_end = (line_end.max(1) as usize - 1).clamp(target_start, total - 1);

    let window_start = target_start.saturating_sub(context_lines);
    let window_end = (target_end + context_lines).min(total - 1);

    let render = |idx: usize| -> String {
        let marker = if (target_start..=target_end).contains(&idx) {
            '>'
        } else {
            ' '
        };
        format!("{}{:4} | {}\n", marker, idx + 1, lines[idx])
    };

    // The reported range goes in first, trimmed from its tail if even that is too big
    let mut lo = target_start;
    let mut hi = target_start;
    let mut used = render(lo).len();
    let mut truncated = false;
    while hi < target_end {
        let next = render(hi + 1).len();
        if used + next > max_bytes {
            truncated = true;
            break;
        }
        used += next;
        hi += 1;
    }

    // Then grow outward one line at a time, alternating sides
    if !truncated {
        let mut before_open = lo > window_start;
        let mut after_open = hi < window_end;
        let mut take_before = true;
        while before_open || after_open {
            if take_before && before_open {
                let next = render(lo - 1).len();
                if used + next > max_bytes {
                    before_open = false;
                } else {
                    used += next;
                    lo -= 1;
                    before_open = lo > window_start;
                }
            } else if after_open {
                let next = render(hi + 1).len();
                if used + next > max_bytes {
                    after_open = false;
                } else {
                    used += next;
                    hi += 1;
                    after_open = hi < window_end;
                }
            }
            take_before = !take_before;
        }
        truncated = lo > window_start || hi < window_end;
    }

    let mut rendered: String = (lo..=hi).map(render).collect();
    if rendered.len() > max_bytes {
        // a single reported line wider than the whole budget
        rendered = clip_line(&rendered, max_bytes);
        truncated = true;
    }
    ContextWindow {
        first_line: lo + 1,
        last_line: hi + 1,
        rendered,
        truncated,
    }
}

/// Cut a rendered line to at most `max_bytes`, keeping its newline
fn clip_line(line: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    let mut end = max_bytes - 1;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    let mut clipped = line[..end].to_string();
    clipped.push('\n');
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("line {}\n", i)).collect()
    }

    #[test]
    fn test_extract_with_full_context() {
        let window = extract_context(&numbered(10), 5, 5, 2, 4096);

        assert_eq!((window.first_line, window.last_line), (3, 7));
        assert!(window.rendered.contains("line 3"));
        assert!(window.rendered.contains(">   5 | line 5"));
        assert!(window.rendered.contains("    4 | line 4"));
        assert!(!window.truncated);
    }

    #[test]
    fn test_extract_at_file_start() {
        let window = extract_context(&numbered(5), 1, 1, 2, 4096);
        assert_eq!((window.first_line, window.last_line), (1, 3));
    }

    #[test]
    fn test_extract_at_file_end() {
        let window = extract_context(&numbered(5), 5, 5, 2, 4096);
        assert_eq!((window.first_line, window.last_line), (3, 5));
    }

    #[test]
    fn test_range_past_end_is_clamped() {
        let window = extract_context(&numbered(3), 10, 12, 1, 4096);
        assert_eq!((window.first_line, window.last_line), (2, 3));
        assert!(window.rendered.contains(">   3 | line 3"));
    }

    #[test]
    fn test_multi_line_range_is_marked() {
        let window = extract_context(&numbered(10), 4, 6, 0, 4096);
        assert_eq!(window.rendered.matches('>').count(), 3);
    }

    #[test]
    fn test_byte_budget_drops_far_lines() {
        // each rendered line is 15 bytes: ">   5 | line 5\n"
        let window = extract_context(&numbered(9), 5, 5, 4, 15 * 3);

        assert_eq!((window.first_line, window.last_line), (4, 6));
        assert!(window.truncated);
        assert!(window.rendered.len() <= 45);
    }

    #[test]
    fn test_empty_file() {
        let window = extract_context("", 1, 1, 5, 1024);
        assert_eq!(window.rendered, "");
        assert_eq!(window.first_line, 0);
    }

    #[test]
    fn test_overlong_reported_line_is_clipped() {
        let code = format!("short\nx = \"{}\"\nshort\n", "é".repeat(500));
        let window = extract_context(&code, 2, 2, 1, 120);

        assert!(window.rendered.len() <= 120, "{} bytes", window.rendered.len());
        assert!(window.rendered.starts_with(">   2 | x = \""));
        assert!(window.rendered.ends_with('\n'));
        assert!(window.truncated);
        assert_eq!((window.first_line, window.last_line), (2, 2));
    }
}
