//! Post-processing of raw completion output.
//!
//! Two independent passes live here:
//!
//! - [`clean_response`] normalises a Markdown answer. It is deliberately the
//!   only change made to the collaborator's text: lines are trimmed, blank
//!   lines dropped, and the rest rejoined. Markup is never rewritten.
//! - [`extract_json_payload`] digs the JSON array out of a structured-block
//!   answer, which models like to wrap in ```` ```json ```` fences or precede
//!   with a sentence of commentary.

use once_cell::sync::Lazy;
use regex::Regex;

/// Trim every line, drop blank ones, and join the rest with `\n`.
pub fn clean_response(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Strip one outer code fence, with or without a language tag.
pub fn strip_outer_fence(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    }
}

/// The JSON array inside a structured-block answer.
///
/// Returns the slice from the first `[` to the last `]` after fence
/// stripping, or `None` when no array is present.
pub fn extract_json_payload(raw: &str) -> Option<&str> {
    let body = strip_outer_fence(raw);
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    (end > start).then(|| &body[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_drops_blank_lines_and_trims() {
        let raw = "\n  # Title  \n\n\n- item\r\n   \nplain **bold** text \n";
        assert_eq!(clean_response(raw), "# Title\n- item\nplain **bold** text");
    }

    #[test]
    fn clean_keeps_markup_untouched() {
        let raw = "| a | b |\n|---|---|\n```\nlet x = 1;\n```";
        assert_eq!(clean_response(raw), raw);
    }

    #[test]
    fn clean_of_whitespace_is_empty() {
        assert_eq!(clean_response(" \n\t\n"), "");
    }

    #[test]
    fn fence_with_language_is_stripped() {
        assert_eq!(strip_outer_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_outer_fence("```\n[]\n```\n"), "[]");
        assert_eq!(strip_outer_fence("[3]"), "[3]");
    }

    #[test]
    fn payload_skips_commentary() {
        let raw = "Here are your blocks:\n[{\"type\": \"paragraph\"}]\nHope this helps!";
        assert_eq!(extract_json_payload(raw), Some("[{\"type\": \"paragraph\"}]"));
    }

    #[test]
    fn payload_missing_array() {
        assert_eq!(extract_json_payload("I cannot help with that."), None);
        assert_eq!(extract_json_payload("] ["), None);
    }
}
