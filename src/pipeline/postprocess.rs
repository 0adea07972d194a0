//! Deterministic clean-up of provider text before aggregation.
//!
//! OCR output is plain text, but it arrives with Windows line endings from
//! some scanners, zero-width characters copied out of the source PDF, ragged
//! trailing spaces, and long runs of blank lines where the page had
//! whitespace. None of that helps a downstream chunker.
//!
//! ## Rules (applied in order)
//!
//! 1. Normalise line endings (`\r\n`, `\r` → `\n`)
//! 2. Remove invisible Unicode characters (zero-width space, BOM, soft hyphen, …)
//! 3. Trim trailing whitespace on every line
//! 4. Collapse 3+ consecutive blank lines into 2
//! 5. Trim leading and trailing blank lines

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all clean-up rules to one page's text.
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1 ───────────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2 ───────────────────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                *c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 3 ───────────────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4 ───────────────────────────────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld\t"),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_text_full_pipeline() {
        let input = "\r\n\r\nInvoice 42  \r\n\r\n\r\n\r\n\r\nTotal:\u{200B} 10  \r\n\r\n";
        assert_eq!(clean_text(input), "Invoice 42\n\n\nTotal: 10");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("\n\n\n"), "");
    }
}
