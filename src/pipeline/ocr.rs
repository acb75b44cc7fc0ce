//! OCR collaborators.
//!
//! The extractor only needs "bytes in, text out", so the seam is a single
//! async method. Two engines are provided:
//!
//! - [`TesseractOcr`] — runs the local `tesseract` binary on a temp file.
//! - [`RemoteOcr`] — posts the file to an HTTP endpoint that answers
//!   `{"extracted_text": …}` or `{"error": …}`.
//!
//! Engines are built once per process and shared behind an `Arc`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Errors from an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("OCR service error: {0}")]
    Service(String),

    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One OCR request: a whole image file or a single rasterised page.
#[derive(Debug, Clone)]
pub struct OcrInput {
    pub bytes: Arc<[u8]>,
    /// File name whose extension tells the engine how to decode `bytes`.
    pub filename: String,
}

impl OcrInput {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_else(|| ".png".to_string())
    }
}

/// Recognise text in an image.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Recognise text; whitespace is normalised by the engine.
    async fn recognize(&self, input: &OcrInput) -> Result<String, OcrError>;
}

/// Join recognised lines with single spaces and trim.
///
/// Engines report text line by line; downstream prompting works on running
/// prose, so line structure inside a page is not preserved.
pub fn normalize_recognized(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Local Tesseract engine.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
    binary: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            binary: "tesseract".to_string(),
        }
    }

    /// Use a tesseract binary other than the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng")
    }
}

#[async_trait]
impl OcrService for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, input: &OcrInput) -> Result<String, OcrError> {
        let start = Instant::now();
        let tmp = tempfile::Builder::new()
            .prefix("memoir-ocr-")
            .suffix(&input.extension())
            .tempfile()?;
        tokio::fs::write(tmp.path(), &input.bytes[..]).await?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::BackendNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.binary
                )));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!("tesseract failed: {}", stderr.trim())));
        }

        let text = normalize_recognized(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "tesseract: {} → {} chars in {:?}",
            input.filename,
            text.len(),
            start.elapsed()
        );
        Ok(text)
    }
}

// ── Remote HTTP engine ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RemoteOcrRequest<'a> {
    filename: &'a str,
    /// Base64 of the file bytes.
    content: String,
}

#[derive(Debug, Deserialize)]
struct RemoteOcrResponse {
    extracted_text: Option<String>,
    error: Option<String>,
}

/// OCR over HTTP: `POST <endpoint>` with `{filename, content}`.
#[derive(Debug, Clone)]
pub struct RemoteOcr {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl RemoteOcr {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OcrError::BackendNotAvailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl OcrService for RemoteOcr {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn recognize(&self, input: &OcrInput) -> Result<String, OcrError> {
        let body = RemoteOcrRequest {
            filename: &input.filename,
            content: STANDARD.encode(&input.bytes[..]),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout(self.timeout_secs)
                } else {
                    OcrError::Service(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OcrError::Service(e.to_string()))?;

        parse_remote_response(status.as_u16(), &text)
    }
}

/// Interpret a remote OCR answer. An `error` field wins over the status code.
fn parse_remote_response(status: u16, body: &str) -> Result<String, OcrError> {
    match serde_json::from_str::<RemoteOcrResponse>(body) {
        Ok(RemoteOcrResponse {
            error: Some(err), ..
        }) => Err(OcrError::Service(err)),
        Ok(RemoteOcrResponse {
            extracted_text: Some(text),
            ..
        }) if (200..300).contains(&status) => Ok(normalize_recognized(&text)),
        _ => Err(OcrError::Service(format!("HTTP {status}: {body}"))),
    }
}
