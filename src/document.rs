//! Uploaded documents and file-kind detection.

use std::path::Path;
use std::sync::Arc;

/// Extensions the extractor knows how to read, lower-case with leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".tif", ".gif",
];

/// Declared kind of a document, derived from its file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    /// Anything outside the allow-list; carries the extension as seen (e.g. ".docx").
    Unsupported(String),
}

impl DocumentKind {
    /// Classify a file name by its extension (case-insensitive).
    pub fn from_filename(name: &str) -> Self {
        let ext = extension_of(name);
        match ext.as_str() {
            ".pdf" => DocumentKind::Pdf,
            e if SUPPORTED_EXTENSIONS.contains(&e) => DocumentKind::Image,
            _ => DocumentKind::Unsupported(ext),
        }
    }
}

/// Lower-cased extension with a leading dot, or "" when there is none.
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// True when `name` has an extension from [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(name: &str) -> bool {
    !matches!(DocumentKind::from_filename(name), DocumentKind::Unsupported(_))
}

/// Immutable document content plus its declared kind.
///
/// Bytes are shared behind an `Arc` so blocking PDF work and OCR requests can
/// hold the content without copying it.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    kind: DocumentKind,
    bytes: Arc<[u8]>,
}

impl Document {
    /// Wrap in-memory bytes; the kind is derived from `name`.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        Self {
            kind: DocumentKind::from_filename(&name),
            name,
            bytes: bytes.into(),
        }
    }

    /// File name as uploaded (used as the extension hint for OCR).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &DocumentKind {
        &self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle to the content for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Name without extension, used as a default page title.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}
