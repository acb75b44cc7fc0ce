//! Output types returned by the note pipeline.
//!
//! A [`NoteOutput`] is always produced, even when a stage failed: stage
//! errors are stored as values so callers branch on them explicitly and the
//! artifact can still be persisted (via the sentinel accessors) like the
//! rest of the system expects.

use crate::error::{ExtractionError, StageFailure, SynthesisError};
use crate::model::{Block, ExtractionResult};
use crate::stats::SummaryStats;
use serde::{Deserialize, Serialize};

/// Where the final block sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    /// Line classification of the Markdown summary.
    Classified,
    /// Block JSON requested directly from the completion collaborator.
    Structured,
    /// No blocks were produced because synthesis failed.
    None,
}

/// Everything the pipeline produced for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteOutput {
    /// Document file name as given.
    pub name: String,
    pub extraction: Result<ExtractionResult, ExtractionError>,
    pub summary: Result<String, SynthesisError>,
    /// Validated blocks; empty when the summary failed.
    pub blocks: Vec<Block>,
    pub block_source: BlockSource,
    pub stats: SummaryStats,
    pub duration_ms: u64,
}

impl NoteOutput {
    /// Extracted text, or the persisted error text when extraction failed.
    pub fn extracted_text(&self) -> String {
        match &self.extraction {
            Ok(r) => r.text.clone(),
            Err(e) => e.sentinel_text(),
        }
    }

    /// Markdown summary, or the persisted error text when synthesis failed.
    pub fn summary_text(&self) -> String {
        match &self.summary {
            Ok(md) => md.clone(),
            Err(e) => e.sentinel_text(),
        }
    }

    /// Stage failures recorded for this document, in pipeline order.
    pub fn failures(&self) -> Vec<StageFailure> {
        let mut out = Vec::new();
        if let Err(e) = &self.extraction {
            out.push(e.to_failure());
        }
        if let Err(e) = &self.summary {
            out.push(e.to_failure());
        }
        out
    }

    /// True when both extraction and synthesis succeeded.
    pub fn is_ok(&self) -> bool {
        self.extraction.is_ok() && self.summary.is_ok()
    }

    pub fn has_tables(&self) -> bool {
        self.blocks.iter().any(Block::is_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::model::ExtractionMethod;

    fn output(
        extraction: Result<ExtractionResult, ExtractionError>,
        summary: Result<String, SynthesisError>,
    ) -> NoteOutput {
        NoteOutput {
            name: "n.png".into(),
            extraction,
            summary,
            blocks: vec![],
            block_source: BlockSource::None,
            stats: SummaryStats::default(),
            duration_ms: 0,
        }
    }

    #[test]
    fn failed_extraction_exposes_both_failures() {
        let out = output(
            Err(ExtractionError::UnsupportedFileType {
                extension: ".docx".into(),
            }),
            Err(SynthesisError::NoExtractedText),
        );
        let kinds: Vec<_> = out.failures().iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FailureKind::Extraction, FailureKind::Synthesis]);
        assert_eq!(out.extracted_text(), "Unsupported file type: .docx");
        assert!(!out.is_ok());
    }

    #[test]
    fn successful_output_has_no_failures() {
        let out = output(
            Ok(ExtractionResult {
                text: "t".into(),
                method: ExtractionMethod::Ocr,
                page_breaks: vec![],
            }),
            Ok("# T".into()),
        );
        assert!(out.failures().is_empty());
        assert_eq!(out.summary_text(), "# T");
        assert!(out.is_ok());
    }

    #[test]
    fn empty_input_summary_text_is_sentinel() {
        let out = output(
            Ok(ExtractionResult {
                text: String::new(),
                method: ExtractionMethod::Ocr,
                page_breaks: vec![],
            }),
            Err(SynthesisError::EmptyInput),
        );
        assert_eq!(out.summary_text(), "No input text provided for summary.");
    }
}
