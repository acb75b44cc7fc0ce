//! Basic statistics over a summary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Assumed reading speed for [`SummaryStats::estimated_reading_minutes`].
pub const WORDS_PER_MINUTE: usize = 200;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.,!?;:\-]").unwrap());
static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

/// Word, sentence and character counts plus a reading-time estimate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub word_count: usize,
    pub sentence_count: usize,
    pub character_count: usize,
    pub estimated_reading_minutes: usize,
}

impl SummaryStats {
    /// Compute statistics over the cleaned form of `text`.
    ///
    /// Empty input yields all zeros; otherwise reading time is at least one minute.
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }

        let cleaned = clean_text(text);
        let word_count = cleaned.split_whitespace().count();
        let sentence_count = RE_SENTENCE_END
            .split(&cleaned)
            .filter(|s| !s.trim().is_empty())
            .count();

        Self {
            word_count,
            sentence_count,
            character_count: cleaned.chars().count(),
            estimated_reading_minutes: (word_count / WORDS_PER_MINUTE).max(1),
        }
    }
}

/// Collapse whitespace runs and drop symbols other than basic punctuation.
pub fn clean_text(text: &str) -> String {
    let collapsed = RE_WHITESPACE.replace_all(text, " ");
    RE_SYMBOLS.replace_all(&collapsed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_all_zero() {
        assert_eq!(SummaryStats::from_text(""), SummaryStats::default());
    }

    #[test]
    fn markdown_symbols_are_cleaned() {
        assert_eq!(
            clean_text("# Title\n\n- **ship**   by Friday!"),
            "Title - ship by Friday!"
        );
    }

    #[test]
    fn counts_words_and_sentences() {
        let stats = SummaryStats::from_text("Meeting notes. Important: ship by Friday!");
        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.sentence_count, 2);
        assert_eq!(stats.character_count, 41);
        assert_eq!(stats.estimated_reading_minutes, 1);
    }

    #[test]
    fn reading_time_scales_with_length() {
        let text = "word ".repeat(650);
        assert_eq!(SummaryStats::from_text(&text).estimated_reading_minutes, 3);
    }
}
