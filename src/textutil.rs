//! UTF-8-safe truncation helpers for log and error text.
//!
//! Model processes can print megabytes of diagnostics. Error messages keep
//! only the end of that output, and byte slicing must not cut inside a
//! multi-byte character.

/// Return a UTF-8-safe suffix whose byte length is at most `max_bytes`.
pub fn safe_suffix_by_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Keep the last `max_lines` non-blank lines, prefixed with a marker when
/// anything was dropped.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() <= max_lines {
        return lines.join("\n");
    }
    let kept = &lines[lines.len() - max_lines..];
    format!(
        "...[{} earlier lines]\n{}",
        lines.len() - max_lines,
        kept.join("\n")
    )
}
