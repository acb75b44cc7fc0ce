//! Configuration types for the note pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Collaborators (OCR engine, completion
//! service, publisher) are constructed once by the caller and injected into
//! [`crate::convert::NotePipeline`]; this struct only carries the knobs.

use crate::error::MemoirError;
use serde::{Deserialize, Serialize};

/// Configuration for extracting, summarising and converting one note.
///
/// # Example
/// ```rust
/// use memoir_notes::{BlockMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .ocr_dpi(150)
///     .max_tokens(2048)
///     .block_mode(BlockMode::Structured)
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_dpi, 150);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rasterisation DPI for the OCR fallback. Range: 72–400. Default: 100.
    ///
    /// Low DPI keeps OCR fast and stable on handwritten scans; raise it for
    /// small print.
    pub ocr_dpi: u32,

    /// Direct text shorter than or equal to this many trimmed characters
    /// triggers the OCR fallback. Default: 10.
    pub min_direct_chars: usize,

    /// Tesseract language code. Default: "eng".
    pub ocr_language: String,

    /// Maximum tokens the completion collaborator may generate. Default: 1024.
    pub max_tokens: usize,

    /// Stop sequences marking end-of-turn. Default: `["</s>"]`.
    pub stop: Vec<String>,

    /// Sampling temperature, for providers that accept one. Default: 0.1.
    pub temperature: f32,

    /// Per-collaborator-call timeout in seconds. Default: 1800.
    ///
    /// Generous on purpose: local OCR and self-hosted models can take minutes.
    pub request_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom prompt template; must contain `{input}`. If None, uses the built-in one.
    pub prompt_template: Option<String>,

    /// How the block sequence is produced. Default: [`BlockMode::Classify`].
    pub block_mode: BlockMode,

    /// Documents processed at once by the batch APIs. Default: 4.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_dpi: 100,
            min_direct_chars: 10,
            ocr_language: "eng".to_string(),
            max_tokens: 1024,
            stop: vec!["</s>".to_string()],
            temperature: 0.1,
            request_timeout_secs: 1800,
            download_timeout_secs: 120,
            prompt_template: None,
            block_mode: BlockMode::default(),
            concurrency: 4,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn min_direct_chars(mut self, n: usize) -> Self {
        self.config.min_direct_chars = n;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.config.stop = stop;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn block_mode(mut self, mode: BlockMode) -> Self {
        self.config.block_mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, MemoirError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(MemoirError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(MemoirError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        if let Some(ref template) = c.prompt_template {
            if !template.contains("{input}") {
                return Err(MemoirError::InvalidConfig(
                    "prompt template must contain an {input} placeholder".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// Where the validated block sequence comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMode {
    /// Classify the Markdown summary line by line. (default)
    #[default]
    Classify,
    /// Ask the completion collaborator for block JSON directly. This is the
    /// only path that can produce tables; it falls back to `Classify` on failure.
    Structured,
}
