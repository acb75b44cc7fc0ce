//! Data model shared by every pipeline stage.
//!
//! [`ExtractionResult`] is what the text extractor produces for one document;
//! [`Block`] is one structural unit of the publishing target's document tree.
//! Both are plain data with serde derives so the CLI can print them as JSON
//! and callers can persist them.

use serde::{Deserialize, Serialize};

// ── Extraction ───────────────────────────────────────────────────────────

/// How the text of an [`ExtractionResult`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Read from the PDF's embedded text layer.
    Direct,
    /// Recognised from pixels.
    Ocr,
}

/// Position of one page header inside [`ExtractionResult::text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMarker {
    /// 1-indexed page number.
    pub page: usize,
    /// Byte offset of the marker line in the extracted text.
    pub offset: usize,
}

/// Best-effort plain text for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_breaks: Vec<PageMarker>,
}

impl ExtractionResult {
    /// Text of a single page (without its marker line), if it was recorded.
    pub fn page_text(&self, page: usize) -> Option<&str> {
        let idx = self.page_breaks.iter().position(|m| m.page == page)?;
        let start = self.page_breaks[idx].offset;
        let end = self
            .page_breaks
            .get(idx + 1)
            .map(|m| m.offset)
            .unwrap_or(self.text.len());
        let section = self.text.get(start..end)?;
        let body = section.split_once('\n').map(|(_, b)| b).unwrap_or("");
        Some(body.trim_end_matches('\n'))
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────

/// Heading depth supported by the publishing target (1–3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub const MAX: u8 = 3;

    /// Clamp any count of `#` characters into the supported range.
    pub fn clamped(level: usize) -> Self {
        Self(level.clamp(1, Self::MAX as usize) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (1..=Self::MAX).contains(&v) {
            Ok(Self(v))
        } else {
            Err(format!("heading level must be 1..=3, got {v}"))
        }
    }
}

impl From<HeadingLevel> for u8 {
    fn from(level: HeadingLevel) -> Self {
        level.0
    }
}

/// Plain text run. Inline styling is not modelled beyond the bold paragraph flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub String);

impl RichText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RichText {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One row of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<RichText>,
}

impl TableRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(|c| RichText::new(c)).collect(),
        }
    }
}

/// A child of a table block as it arrived from upstream.
///
/// Generated block trees sometimes put other block types under a table;
/// those are kept as `Foreign` until validation drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableChild {
    Row(TableRow),
    Foreign { kind: String },
}

/// Table block. After validation every row has exactly `width` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    pub width: usize,
    #[serde(default)]
    pub has_column_header: bool,
    #[serde(default)]
    pub has_row_header: bool,
    pub rows: Vec<TableChild>,
}

impl TableBlock {
    /// Iterate the recognised rows, skipping foreign children.
    pub fn table_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter().filter_map(|child| match child {
            TableChild::Row(row) => Some(row),
            TableChild::Foreign { .. } => None,
        })
    }
}

/// One structural unit of the publishing target's document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: HeadingLevel, text: String },
    BulletItem { text: String },
    NumberedItem { text: String },
    CodeLine { text: String },
    BoldParagraph { text: String },
    Paragraph { text: String },
    Table(TableBlock),
}

impl Block {
    pub fn heading(level: usize, text: impl Into<String>) -> Self {
        Block::Heading {
            level: HeadingLevel::clamped(level),
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table(_))
    }

    /// Short tag used in logs and the CLI listing.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::BulletItem { .. } => "bullet_item",
            Block::NumberedItem { .. } => "numbered_item",
            Block::CodeLine { .. } => "code_line",
            Block::BoldParagraph { .. } => "bold_paragraph",
            Block::Paragraph { .. } => "paragraph",
            Block::Table(_) => "table",
        }
    }
}
