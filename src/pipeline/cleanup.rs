//! Reply cleanup: deterministic fixes applied before JSON parsing.
//!
//! Even when asked for "only a JSON array", chat models regularly wrap the
//! array in a ` ```json ` fence, prepend a sentence ("Here are the
//! issues:"), or leak a BOM / zero-width characters. None of that changes
//! what the model meant, so it is stripped here and the reconciler only ever
//! sees the payload. Each rule is a pure `&str → String` function.
//!
//! Rules (applied in order by [`prepare_reply`]):
//! 1. Strip invisible Unicode (BOM, zero-width spaces and joiners)
//! 2. Normalise line endings (CRLF → LF)
//! 3. Strip an outer Markdown code fence, with or without a language tag
//! 4. Trim surrounding whitespace
//!
//! [`extract_json_span`] is a fallback for prose around the payload.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model reply.
pub fn prepare_reply(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_code_fences(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}'
            )
        })
        .collect()
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Fallback: locate the JSON payload inside prose ───────────────────────────

/// Return the text from the first `[` or `{` to the last matching closer,
/// when the reply has prose around the JSON payload.
///
/// This is a span heuristic, not a parser: the caller still has to parse
/// the result and treat failure as "not JSON".
pub fn extract_json_span(input: &str) -> Option<&str> {
    let start = input.find(['[', '{'])?;
    let closer = if input[start..].starts_with('[') {
        ']'
    } else {
        '}'
    };
    let end = input.rfind(closer)?;
    if end <= start {
        return None;
    }
    let span = &input[start..=end];
    if span.len() == input.len() {
        None
    } else {
        Some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let input = "```json\n[{\"page\": 1}]\n```";
        assert_eq!(prepare_reply(input), "[{\"page\": 1}]");
    }

    #[test]
    fn strips_bare_fence() {
        let input = "```\n[]\n```\n";
        assert_eq!(prepare_reply(input), "[]");
    }

    #[test]
    fn unfenced_passthrough() {
        assert_eq!(prepare_reply("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn removes_bom_and_zero_width() {
        assert_eq!(prepare_reply("\u{FEFF}[\u{200B}]"), "[]");
    }

    #[test]
    fn normalises_crlf() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn extracts_array_from_prose() {
        let input = "Here are the issues:\n[{\"page\": 2}]\nHope this helps!";
        assert_eq!(extract_json_span(input), Some("[{\"page\": 2}]"));
    }

    #[test]
    fn extract_returns_none_for_plain_json() {
        assert_eq!(extract_json_span("[1]"), None);
    }

    #[test]
    fn extract_returns_none_without_brackets() {
        assert_eq!(extract_json_span("The slides look fine."), None);
    }
}
