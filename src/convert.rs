//! Note pipeline orchestration.
//!
//! [`NotePipeline`] wires the four stages together:
//!
//! ```text
//! Document ─► TextExtractor ─► MarkdownSynthesizer ─► BlockConverter ─► BlockValidator ─► blocks
//!                                                  └► (structured) ─────┘
//! ```
//!
//! Collaborators are constructed once by the caller and injected; the
//! pipeline holds no mutable state, so one instance can serve many
//! documents concurrently.
//!
//! Only setup problems (unreadable input path, bad configuration) are
//! returned as `Err(MemoirError)`. Extraction and synthesis failures are
//! stored in the returned [`NoteOutput`]; use [`crate::stream`] to receive
//! batch results as they finish.

use crate::config::{BlockMode, PipelineConfig};
use crate::document::Document;
use crate::error::{ExtractionError, MemoirError, PublishError, SynthesisError};
use crate::model::{Block, ExtractionResult};
use crate::notion::{Parent, PublishRequest, PublishedPage, Publisher};
use crate::output::{BlockSource, NoteOutput};
use crate::pipeline::blocks::BlockConverter;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::input;
use crate::pipeline::llm::CompletionService;
use crate::pipeline::ocr::OcrService;
use crate::pipeline::pdf::PdfBackend;
use crate::pipeline::synthesize::MarkdownSynthesizer;
use crate::pipeline::validate::BlockValidator;
use crate::progress::ProgressCallback;
use crate::stats::SummaryStats;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Extraction → synthesis → block conversion → validation, per document.
pub struct NotePipeline {
    config: PipelineConfig,
    extractor: TextExtractor,
    synthesizer: MarkdownSynthesizer,
    converter: BlockConverter,
    validator: BlockValidator,
    publisher: Option<Arc<dyn Publisher>>,
    progress: Option<ProgressCallback>,
}

impl NotePipeline {
    pub fn new(
        config: PipelineConfig,
        pdf: Arc<dyn PdfBackend>,
        ocr: Arc<dyn OcrService>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            extractor: TextExtractor::new(pdf, ocr, &config),
            synthesizer: MarkdownSynthesizer::new(completion, &config),
            converter: BlockConverter::new(),
            validator: BlockValidator::new(),
            publisher: None,
            progress: None,
            config,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ── Individual stages ────────────────────────────────────────────────

    pub async fn extract(&self, doc: &Document) -> Result<ExtractionResult, ExtractionError> {
        self.extractor.extract(doc).await
    }

    pub async fn synthesize(&self, text: &str) -> Result<String, SynthesisError> {
        self.synthesizer.synthesize(text).await
    }

    /// Classify Markdown into blocks and validate them.
    pub fn to_blocks(&self, markdown: &str) -> Vec<Block> {
        self.validator.validate(self.converter.to_blocks(markdown))
    }

    pub fn validate(&self, blocks: Vec<Block>) -> Vec<Block> {
        self.validator.validate(blocks)
    }

    // ── End-to-end ───────────────────────────────────────────────────────

    /// Run every stage on one document.
    pub async fn process(&self, doc: &Document) -> NoteOutput {
        self.process_indexed(doc, 0, 1).await
    }

    /// Resolve a path or URL, then [`process`](Self::process) it.
    pub async fn process_input(&self, input_str: impl AsRef<str>) -> Result<NoteOutput, MemoirError> {
        let doc = input::resolve_input(input_str.as_ref(), self.config.download_timeout_secs).await?;
        Ok(self.process(&doc).await)
    }

    /// Process in-memory bytes; the file name decides the document kind.
    pub async fn process_bytes(&self, name: impl Into<String>, bytes: Vec<u8>) -> NoteOutput {
        self.process(&Document::from_bytes(name, bytes)).await
    }

    /// Process independent documents with bounded concurrency.
    ///
    /// Outputs are returned in input order regardless of completion order.
    pub async fn process_batch(&self, docs: &[Document]) -> Vec<NoteOutput> {
        let total = docs.len();
        info!(
            "Processing batch of {} documents (concurrency {})",
            total, self.config.concurrency
        );
        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total);
        }

        let outputs: Vec<NoteOutput> = stream::iter(docs.iter().enumerate())
            .map(|(index, doc)| self.process_indexed(doc, index, total))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let succeeded = outputs.iter().filter(|o| o.is_ok()).count();
        info!("Batch complete: {}/{} documents succeeded", succeeded, total);
        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(total, succeeded);
        }
        outputs
    }

    pub(crate) async fn process_indexed(&self, doc: &Document, index: usize, total: usize) -> NoteOutput {
        let start = Instant::now();
        if let Some(ref cb) = self.progress {
            cb.on_document_start(index, total, doc.name());
        }

        let extraction = self.extractor.extract(doc).await;

        let summary = match &extraction {
            Ok(result) => self.synthesizer.synthesize(&result.text).await,
            Err(_) => Err(SynthesisError::NoExtractedText),
        };

        let (blocks, block_source) = match (&extraction, &summary) {
            (Ok(result), Ok(markdown)) => self.build_blocks(&result.text, markdown).await,
            _ => (Vec::new(), BlockSource::None),
        };

        let stats = summary
            .as_ref()
            .map(|md| SummaryStats::from_text(md))
            .unwrap_or_default();

        let output = NoteOutput {
            name: doc.name().to_string(),
            extraction,
            summary,
            blocks,
            block_source,
            stats,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if let Some(ref cb) = self.progress {
            match output.failures().first() {
                None => cb.on_document_complete(index, total, doc.name(), output.blocks.len()),
                Some(failure) => cb.on_document_error(index, total, doc.name(), &failure.message),
            }
        }
        output
    }

    async fn build_blocks(&self, text: &str, markdown: &str) -> (Vec<Block>, BlockSource) {
        if self.config.block_mode == BlockMode::Structured {
            match self.synthesizer.synthesize_blocks(text).await {
                Ok(candidates) => {
                    return (self.validator.validate(candidates), BlockSource::Structured);
                }
                Err(e) => warn!("Structured block synthesis failed, classifying Markdown instead: {}", e),
            }
        }
        (self.to_blocks(markdown), BlockSource::Classified)
    }

    // ── Publishing ───────────────────────────────────────────────────────

    /// Publish validated blocks. Failures are always surfaced.
    pub async fn publish(
        &self,
        title: impl Into<String>,
        blocks: Vec<Block>,
        parent: Parent,
    ) -> Result<PublishedPage, PublishError> {
        let publisher = self.publisher.as_ref().ok_or(PublishError::NoPublisher)?;
        let request = PublishRequest {
            title: title.into(),
            blocks: self.validator.validate(blocks),
            parent,
        };
        publisher.publish(&request).await
    }
}

/// Synchronous wrapper around [`NotePipeline::process_input`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_input_sync(
    pipeline: &NotePipeline,
    input_str: impl AsRef<str>,
) -> Result<NoteOutput, MemoirError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MemoirError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(pipeline.process_input(input_str))
}

/// Write `contents` via a temp file and rename, so readers never see a partial file.
pub async fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<(), MemoirError> {
    let path = path.as_ref();
    let fail = |source: std::io::Error| MemoirError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents.as_ref()).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("week1.md");
        write_atomic(&path, "# Week 1\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Week 1\n");
        assert!(!dir.path().join("nested").join("week1.md.tmp").exists());
    }

    #[tokio::test]
    async fn atomic_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        write_atomic(&path, "old").await.unwrap();
        write_atomic(&path, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
