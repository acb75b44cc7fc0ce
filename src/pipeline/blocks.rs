//! Line-oriented Markdown → [`Block`] classification.
//!
//! This is a per-line classifier, not a Markdown parser: each trimmed line
//! is matched against [`RULES`] in order and the first rule that fires
//! decides the block. There is no lookahead, so multi-line constructs
//! (fenced code regions, pipe tables) are not assembled. Table blocks only
//! come from the structured synthesis path and are passed through untouched
//! by [`BlockConverter::convert_all`].

use crate::model::Block;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Outcome of one rule on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// The line produces no block.
    Skip,
    Emit(Block),
}

/// One classification rule. `apply` returns `None` when the rule does not match.
pub struct LineRule {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<LineClass>,
}

/// Classification rules in priority order; first match wins.
pub static RULES: &[LineRule] = &[
    LineRule {
        name: "blank",
        apply: blank,
    },
    LineRule {
        name: "heading",
        apply: heading,
    },
    LineRule {
        name: "bullet",
        apply: bullet,
    },
    LineRule {
        name: "numbered",
        apply: numbered,
    },
    LineRule {
        name: "code",
        apply: code,
    },
    LineRule {
        name: "bold",
        apply: bold,
    },
    LineRule {
        name: "paragraph",
        apply: paragraph,
    },
];

fn blank(line: &str) -> Option<LineClass> {
    line.is_empty().then_some(LineClass::Skip)
}

fn heading(line: &str) -> Option<LineClass> {
    if !line.starts_with('#') {
        return None;
    }
    let level = line.chars().take_while(|&c| c == '#').count();
    let text = line.trim_start_matches('#').trim();
    Some(LineClass::Emit(Block::heading(level, text)))
}

fn bullet(line: &str) -> Option<LineClass> {
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))?;
    Some(LineClass::Emit(Block::BulletItem {
        text: rest.trim().to_string(),
    }))
}

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s").unwrap());

fn numbered(line: &str) -> Option<LineClass> {
    let prefix = RE_NUMBERED.find(line)?;
    Some(LineClass::Emit(Block::NumberedItem {
        text: line[prefix.end()..].trim().to_string(),
    }))
}

fn code(line: &str) -> Option<LineClass> {
    let rest = line.strip_prefix("```")?;
    Some(LineClass::Emit(Block::CodeLine {
        text: rest.to_string(),
    }))
}

fn bold(line: &str) -> Option<LineClass> {
    if !line.contains("**") {
        return None;
    }
    Some(LineClass::Emit(Block::BoldParagraph {
        text: line.replace("**", "").trim().to_string(),
    }))
}

fn paragraph(line: &str) -> Option<LineClass> {
    Some(LineClass::Emit(Block::paragraph(line)))
}

/// Classify a single line (trimmed first).
pub fn classify_line(line: &str) -> LineClass {
    let line = line.trim();
    RULES
        .iter()
        .find_map(|rule| (rule.apply)(line))
        .unwrap_or(LineClass::Skip)
}

/// Input segment for [`BlockConverter::convert_all`].
#[derive(Debug, Clone)]
pub enum BlockInput {
    /// Markdown text to classify line by line.
    Markdown(String),
    /// Blocks that already exist (e.g. from structured synthesis); passed through.
    Structured(Vec<Block>),
}

/// Converts synthesized Markdown into an ordered block sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockConverter;

impl BlockConverter {
    pub fn new() -> Self {
        Self
    }

    /// Classify every line of `markdown`, in order.
    pub fn to_blocks(&self, markdown: &str) -> Vec<Block> {
        let blocks: Vec<Block> = markdown
            .lines()
            .filter_map(|line| match classify_line(line) {
                LineClass::Emit(block) => Some(block),
                LineClass::Skip => None,
            })
            .collect();
        debug!("Classified {} lines into {} blocks", markdown.lines().count(), blocks.len());
        blocks
    }

    /// Convert mixed input, preserving segment order.
    pub fn convert_all(&self, inputs: impl IntoIterator<Item = BlockInput>) -> Vec<Block> {
        let mut out = Vec::new();
        for input in inputs {
            match input {
                BlockInput::Markdown(md) => out.extend(self.to_blocks(&md)),
                BlockInput::Structured(blocks) => out.extend(blocks),
            }
        }
        out
    }
}
