//! # memoir-notes
//!
//! Turn scanned or PDF notes into a Markdown summary and a validated
//! sequence of Notion blocks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! note (PDF / image)
//!  │
//!  ├─ 1. Input      local path, URL or in-memory bytes
//!  ├─ 2. Extract    PDF text layer; OCR fallback when it has ≤ 10 chars
//!  ├─ 3. Synthesize completion collaborator renders faithful Markdown
//!  ├─ 4. Convert    ordered line rules → typed blocks
//!  ├─ 5. Validate   tables made rectangular (pad / truncate / infer width)
//!  └─ 6. Publish    optional Notion page, 100 blocks per request
//! ```
//!
//! Extraction and synthesis failures never abort a note: they are stored in
//! [`NoteOutput`] as [`ExtractionError`] / [`SynthesisError`] values, each
//! able to render the sentinel text older consumers persist. Only setup
//! errors ([`MemoirError`]) and publish failures ([`PublishError`]) are
//! returned as `Err`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memoir_notes::{
//!     LlmCompletion, NotePipeline, PdfiumBackend, PipelineConfig, TesseractOcr,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let completion = LlmCompletion::resolve(None, None, config.request_timeout_secs)?;
//!     let pipeline = NotePipeline::new(
//!         config.clone(),
//!         Arc::new(PdfiumBackend::new()),
//!         Arc::new(TesseractOcr::new(config.ocr_language.clone())),
//!         Arc::new(completion),
//!     );
//!
//!     let note = pipeline.process_input("lecture-3.pdf").await?;
//!     println!("{}", note.summary_text());
//!     for failure in note.failures() {
//!         eprintln!("{}: {}", failure.kind, failure.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `memoir` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod model;
pub mod notion;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stats;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BlockMode, PipelineConfig, PipelineConfigBuilder};
pub use convert::{process_input_sync, write_atomic, NotePipeline};
pub use document::{Document, DocumentKind, SUPPORTED_EXTENSIONS};
pub use error::{
    ExtractionError, FailureKind, MemoirError, PublishError, StageFailure, SynthesisError,
    NO_INPUT_SUMMARY,
};
pub use model::{
    Block, ExtractionMethod, ExtractionResult, HeadingLevel, PageMarker, RichText, TableBlock,
    TableChild, TableRow,
};
pub use notion::{NotionPublisher, Parent, PublishRequest, PublishedPage, Publisher};
pub use output::{BlockSource, NoteOutput};
pub use pipeline::blocks::{BlockConverter, BlockInput};
pub use pipeline::extract::TextExtractor;
pub use pipeline::llm::{
    CompletionError, CompletionRequest, CompletionService, LlmCompletion, MarkdownServer,
};
pub use pipeline::ocr::{OcrError, OcrInput, OcrService, RemoteOcr, TesseractOcr};
pub use pipeline::pdf::{PdfBackend, PdfError, PdfiumBackend};
pub use pipeline::synthesize::MarkdownSynthesizer;
pub use pipeline::validate::BlockValidator;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use stats::SummaryStats;
pub use stream::{process_inputs_stream, process_stream, IndexedNote};
