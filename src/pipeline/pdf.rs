//! PDF access: per-page text layer and page rasterisation.
//!
//! The extractor talks to PDFs only through the [`PdfBackend`] trait so the
//! direct-vs-OCR decision can be exercised without a pdfium library present.
//! Backends are blocking; callers run them inside `spawn_blocking`.

use image::DynamicImage;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

/// PDF points per inch; rasterisation scale is `dpi / POINTS_PER_INCH`.
const POINTS_PER_INCH: f32 = 72.0;

/// Errors from a PDF backend.
#[derive(Debug, Clone, Error)]
pub enum PdfError {
    #[error("failed to bind to pdfium library: {0}")]
    Binding(String),

    #[error("document could not be opened: {0}")]
    Load(String),

    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },
}

/// Blocking access to the content of a PDF held in memory.
pub trait PdfBackend: Send + Sync {
    /// Text layer of every page, in page order. Pages without text yield "".
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>, PdfError>;

    /// Rasterise every page at `dpi`, in page order.
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, PdfError>;
}

/// [`PdfBackend`] backed by pdfium-render.
///
/// Bind order: `PDFIUM_LIB_PATH`, then `./`, `/usr/lib`, `/usr/local/lib`,
/// then whatever the system loader finds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumBackend;

impl PdfiumBackend {
    pub fn new() -> Self {
        Self
    }

    fn bind() -> Result<Pdfium, PdfError> {
        let from_env = std::env::var("PDFIUM_LIB_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(|p| Pdfium::bind_to_library(&p));

        let bindings = match from_env {
            Some(Ok(b)) => Ok(b),
            _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                        "/usr/lib",
                    ))
                })
                .or_else(|_| {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                        "/usr/local/lib",
                    ))
                })
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| PdfError::Binding(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>, PdfError> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfError::Load(format!("{:?}", e)))?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| PdfError::Page {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
            texts.push(text.all());
        }
        Ok(texts)
    }

    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, PdfError> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfError::Load(format!("{:?}", e)))?;

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        let mut images = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| PdfError::Page {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} at {} DPI → {}x{} px",
                idx + 1,
                dpi,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}
