/// Escape characters that break Markdown link syntax: `[`, `]`, `(`, `)`.
pub(crate) fn escape_md_link(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '[' | ']' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Sanitize user input for embedding in a Markdown heading.
/// Replaces newlines (which would break heading structure) with spaces.
pub(crate) fn sanitize_heading(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Keep at most `n` lines (never fewer than one).
pub(crate) fn cap_lines(md: &str, n: usize) -> String {
    md.lines().take(n.max(1)).collect::<Vec<_>>().join("\n")
}

/// Truncate to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Collapse a cell value onto one line for pipe tables.
pub(crate) fn table_cell(s: &str) -> String {
    sanitize_heading(s).replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_chars() {
        assert_eq!(escape_md_link("normal text"), "normal text");
        assert_eq!(escape_md_link("a[b]c(d)e"), r"a\[b\]c\(d\)e");
    }

    #[test]
    fn sanitize_heading_replaces_newlines() {
        assert_eq!(sanitize_heading("line1\nline2\rline3"), "line1 line2 line3");
        assert_eq!(sanitize_heading("no newlines"), "no newlines");
    }

    #[test]
    fn cap_lines_keeps_prefix() {
        assert_eq!(cap_lines("a\nb\nc", 2), "a\nb");
        assert_eq!(cap_lines("a\nb", 0), "a");
        assert_eq!(cap_lines("", 5), "");
    }

    #[test]
    fn truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("日本語", 1), "日");
    }

    #[test]
    fn table_cell_escapes_pipes() {
        assert_eq!(table_cell("a|b\nc"), r"a\|b c");
    }
}
