//! Layered text extraction: PDF text layer first, OCR as the fallback.
//!
//! ## Decision rule
//!
//! Reading a PDF's embedded text layer is near-free and lossless, so it is
//! always tried first. If the concatenated text has more than
//! `min_direct_chars` (default 10) non-whitespace-trimmed characters it is
//! accepted as final and OCR is never invoked. Otherwise, or when the text
//! layer cannot be read at all, every page is rasterised at `ocr_dpi` and
//! sent to the OCR engine exactly once.
//!
//! Raster images skip straight to OCR. Anything else is rejected by
//! extension without touching the bytes.
//!
//! ## Page markers
//!
//! Each page that yields text is introduced by a marker line
//! (`--- Page N ---`, or `--- Page N (OCR) ---` on the fallback path).
//! Pages without text produce no marker. Marker offsets are recorded in
//! [`ExtractionResult::page_breaks`].

use crate::config::PipelineConfig;
use crate::document::{Document, DocumentKind};
use crate::error::ExtractionError;
use crate::model::{ExtractionMethod, ExtractionResult, PageMarker};
use crate::pipeline::encode::{encode_png, page_filename};
use crate::pipeline::ocr::{OcrInput, OcrService};
use crate::pipeline::pdf::PdfBackend;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Produces best-effort plain text for a [`Document`].
#[derive(Clone)]
pub struct TextExtractor {
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrService>,
    ocr_dpi: u32,
    min_direct_chars: usize,
    timeout_secs: u64,
}

impl TextExtractor {
    pub fn new(pdf: Arc<dyn PdfBackend>, ocr: Arc<dyn OcrService>, config: &PipelineConfig) -> Self {
        Self {
            pdf,
            ocr,
            ocr_dpi: config.ocr_dpi,
            min_direct_chars: config.min_direct_chars,
            timeout_secs: config.request_timeout_secs,
        }
    }

    /// Extract text from `doc`.
    ///
    /// Never panics and never returns a fatal error: every failure is an
    /// [`ExtractionError`] whose `sentinel_text()` is the persisted form.
    pub async fn extract(&self, doc: &Document) -> Result<ExtractionResult, ExtractionError> {
        let start = Instant::now();
        let result = match doc.kind() {
            DocumentKind::Pdf => self.extract_pdf(doc).await,
            DocumentKind::Image => self.extract_image(doc).await,
            DocumentKind::Unsupported(ext) => Err(ExtractionError::UnsupportedFileType {
                extension: ext.clone(),
            }),
        };

        match &result {
            Ok(r) => info!(
                "Extracted {} chars from {} via {:?} in {:?}",
                r.text.len(),
                doc.name(),
                r.method,
                start.elapsed()
            ),
            Err(e) => warn!("Extraction failed for {}: {}", doc.name(), e),
        }
        result
    }

    async fn extract_image(&self, doc: &Document) -> Result<ExtractionResult, ExtractionError> {
        let input = OcrInput::new(doc.name(), doc.shared_bytes());
        let text = self
            .recognize(&input)
            .await
            .map_err(|cause| ExtractionError::ImageUnreadable { cause })?;

        Ok(ExtractionResult {
            text: text.trim().to_string(),
            method: ExtractionMethod::Ocr,
            page_breaks: Vec::new(),
        })
    }

    async fn extract_pdf(&self, doc: &Document) -> Result<ExtractionResult, ExtractionError> {
        let direct_cause = match self.direct_pages(doc).await {
            Ok(pages) => {
                let (text, page_breaks) = join_pages(&pages, false);
                let trimmed_len = text.trim().chars().count();
                debug!("{}: direct text layer has {} chars", doc.name(), trimmed_len);

                if trimmed_len > self.min_direct_chars {
                    return Ok(ExtractionResult {
                        text,
                        method: ExtractionMethod::Direct,
                        page_breaks,
                    });
                }
                format!("text layer too short ({trimmed_len} chars)")
            }
            Err(e) => e,
        };

        info!(
            "{}: falling back to OCR at {} DPI ({})",
            doc.name(),
            self.ocr_dpi,
            direct_cause
        );

        match self.ocr_pages(doc).await {
            Ok(pages) => {
                let (text, page_breaks) = join_pages(&pages, true);
                Ok(ExtractionResult {
                    text,
                    method: ExtractionMethod::Ocr,
                    page_breaks,
                })
            }
            Err(ocr) => Err(ExtractionError::PdfUnreadable {
                direct: direct_cause,
                ocr,
            }),
        }
    }

    /// Text layer of every page, read on the blocking pool.
    async fn direct_pages(&self, doc: &Document) -> Result<Vec<String>, String> {
        let pdf = Arc::clone(&self.pdf);
        let bytes = doc.shared_bytes();
        tokio::task::spawn_blocking(move || pdf.page_texts(&bytes))
            .await
            .map_err(|e| format!("text extraction task panicked: {e}"))?
            .map_err(|e| e.to_string())
    }

    /// Rasterise every page and OCR each one once, in page order.
    async fn ocr_pages(&self, doc: &Document) -> Result<Vec<String>, String> {
        let pdf = Arc::clone(&self.pdf);
        let bytes = doc.shared_bytes();
        let dpi = self.ocr_dpi;
        let images = tokio::task::spawn_blocking(move || pdf.rasterize(&bytes, dpi))
            .await
            .map_err(|e| format!("rasterisation task panicked: {e}"))?
            .map_err(|e| e.to_string())?;

        debug!("{}: rasterised {} pages", doc.name(), images.len());

        let mut texts = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let page = idx + 1;
            let png = encode_png(image).map_err(|e| format!("page {page}: {e}"))?;
            let input = OcrInput::new(page_filename(doc.stem(), page), png);
            let text = self
                .recognize(&input)
                .await
                .map_err(|e| format!("page {page}: {e}"))?;
            texts.push(text);
        }
        Ok(texts)
    }

    async fn recognize(&self, input: &OcrInput) -> Result<String, String> {
        let call = self.ocr.recognize(input);
        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), call).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "{} timed out after {}s",
                self.ocr.name(),
                self.timeout_secs
            )),
        }
    }
}

/// Join per-page texts under marker lines, skipping pages without text.
fn join_pages(pages: &[String], ocr: bool) -> (String, Vec<PageMarker>) {
    let mut text = String::new();
    let mut markers = Vec::new();

    for (idx, page_text) in pages.iter().enumerate() {
        let body = page_text.trim();
        if body.is_empty() {
            continue;
        }
        let page = idx + 1;
        if !text.is_empty() {
            text.push('\n');
        }
        markers.push(PageMarker {
            page,
            offset: text.len(),
        });
        text.push_str(&page_marker(page, ocr));
        text.push('\n');
        text.push_str(body);
    }

    (text, markers)
}

/// Marker line introducing a page.
pub fn page_marker(page: usize, ocr: bool) -> String {
    if ocr {
        format!("--- Page {page} (OCR) ---")
    } else {
        format!("--- Page {page} ---")
    }
}
