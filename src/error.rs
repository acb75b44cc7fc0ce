//! Error types for the memoir-notes library.
//!
//! Two families of errors reflect two distinct failure modes:
//!
//! * [`MemoirError`] — **Fatal**: the pipeline cannot start at all (missing
//!   file, bad URL, invalid configuration, no completion backend). Returned as
//!   `Err(MemoirError)` from the top-level entry points.
//!
//! * Stage errors — [`ExtractionError`] and [`SynthesisError`] are
//!   **non-fatal**: they are stored inside [`crate::output::NoteOutput`] so a
//!   note always yields a persistable artifact. Each can render the sentinel
//!   text older consumers expect via `sentinel_text()`, but callers should
//!   branch on the variant rather than on string prefixes.
//!
//! [`PublishError`] is the exception: by the time blocks are published there
//! is no fallback text left to substitute, so it is always surfaced as `Err`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the memoir-notes library.
#[derive(Debug, Error)]
pub enum MemoirError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Collaborator setup ────────────────────────────────────────────────
    /// The configured completion provider is not initialised (missing API key etc.).
    #[error("Completion provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which pipeline stage a stored failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Extraction,
    Synthesis,
    Publish,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Extraction => "extraction",
            FailureKind::Synthesis => "synthesis",
            FailureKind::Publish => "publish",
        };
        f.write_str(s)
    }
}

/// Tagged view of a stage failure: kind plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Text extraction failed for a document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The file extension is not in the supported allow-list.
    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    /// Both the direct text layer and the OCR fallback failed.
    #[error("Error processing PDF: {direct} | OCR Error: {ocr}")]
    PdfUnreadable { direct: String, ocr: String },

    /// OCR on a raster image failed.
    #[error("Error processing file: {cause}")]
    ImageUnreadable { cause: String },
}

impl ExtractionError {
    /// The string persisted in place of extracted text by older consumers.
    pub fn sentinel_text(&self) -> String {
        self.to_string()
    }

    pub fn to_failure(&self) -> StageFailure {
        StageFailure {
            kind: FailureKind::Extraction,
            message: self.to_string(),
        }
    }
}

/// Sentinel returned when there is nothing to summarise.
pub const NO_INPUT_SUMMARY: &str = "No input text provided for summary.";

/// Markdown synthesis failed or was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SynthesisError {
    /// The input text was empty or whitespace; the collaborator was not called.
    #[error("no input text provided")]
    EmptyInput,

    /// Extraction failed upstream, so there was nothing to summarise.
    #[error("no extracted text available")]
    NoExtractedText,

    /// The completion collaborator could not be reached or raised an error.
    #[error("Request failed: {0}")]
    Collaborator(String),

    /// The collaborator answered with an `{error: …}` payload.
    #[error("Error from server: {0}")]
    ServerError(String),

    /// The collaborator answered, but with no text.
    #[error("empty response from completion service")]
    EmptyResponse,

    /// The collaborator did not answer within the configured timeout.
    #[error("completion timed out after {0}s")]
    Timeout(u64),

    /// Structured block output could not be decoded.
    #[error("malformed block output: {0}")]
    MalformedBlocks(String),
}

impl SynthesisError {
    /// The string persisted in place of a summary by older consumers.
    pub fn sentinel_text(&self) -> String {
        match self {
            SynthesisError::EmptyInput => NO_INPUT_SUMMARY.to_string(),
            other => format!("Summary generation failed: {}", other),
        }
    }

    pub fn to_failure(&self) -> StageFailure {
        StageFailure {
            kind: FailureKind::Synthesis,
            message: self.to_string(),
        }
    }
}

/// The publishing target rejected or never received the page.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No access token was configured.
    #[error("Notion access token is missing")]
    MissingToken,

    /// The pipeline was built without a publisher.
    #[error("No publisher configured; build the pipeline with `with_publisher`")]
    NoPublisher,

    /// The API answered with a non-success status; `body` is verbatim.
    #[error("Failed to create Notion page (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The request never completed.
    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered 2xx but the body was not what we expected.
    #[error("Unexpected Notion response: {0}")]
    InvalidResponse(String),
}

impl PublishError {
    pub fn to_failure(&self) -> StageFailure {
        StageFailure {
            kind: FailureKind::Publish,
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_sentinel_matches_persisted_format() {
        let e = ExtractionError::PdfUnreadable {
            direct: "bad xref".into(),
            ocr: "tesseract not found".into(),
        };
        assert_eq!(
            e.sentinel_text(),
            "Error processing PDF: bad xref | OCR Error: tesseract not found"
        );
    }

    #[test]
    fn unsupported_sentinel_names_extension() {
        let e = ExtractionError::UnsupportedFileType {
            extension: ".docx".into(),
        };
        assert_eq!(e.sentinel_text(), "Unsupported file type: .docx");
        assert_eq!(e.to_failure().kind, FailureKind::Extraction);
    }

    #[test]
    fn empty_input_sentinel_is_exact() {
        assert_eq!(
            SynthesisError::EmptyInput.sentinel_text(),
            "No input text provided for summary."
        );
    }

    #[test]
    fn synthesis_failures_are_prefixed() {
        let e = SynthesisError::ServerError("model not loaded".into());
        assert_eq!(
            e.sentinel_text(),
            "Summary generation failed: Error from server: model not loaded"
        );
        assert!(SynthesisError::Timeout(1800)
            .sentinel_text()
            .starts_with("Summary generation failed: "));
    }

    #[test]
    fn rejected_publish_keeps_body_verbatim() {
        let e = PublishError::Rejected {
            status: 400,
            body: r#"{"object":"error","code":"validation_error"}"#.into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 400"));
        assert!(msg.contains(r#""code":"validation_error""#));
        assert_eq!(e.to_failure().kind, FailureKind::Publish);
    }
}
