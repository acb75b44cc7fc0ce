//! Raster encoding: `DynamicImage` → PNG bytes for the OCR boundary.
//!
//! OCR engines accept files, not pixel buffers, so every rasterised page is
//! encoded once before it crosses the [`crate::pipeline::ocr::OcrService`]
//! seam. PNG is lossless; JPEG artefacts around glyph edges hurt recognition
//! at the low DPI the fallback renders at.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// File name hint sent with a rasterised page (1-indexed).
pub fn page_filename(stem: &str, page: usize) -> String {
    format!("{stem}-page-{page}.png")
}
