//! Progress events for single-note and batch processing.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] with
//! [`crate::convert::NotePipeline::with_progress`] to observe the pipeline.
//! The CLI uses it to drive an indicatif bar; a server could forward the
//! events to a channel instead.
//!
//! # Example
//!
//! ```rust
//! use memoir_notes::PipelineProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl PipelineProgressCallback for Counter {
//!     fn on_document_complete(&self, _index: usize, _total: usize, name: &str, _blocks: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("done: {name}");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the pipeline as documents move through it.
///
/// All methods default to no-ops. In batch mode documents run concurrently,
/// so the per-document methods may be called from several tasks at once;
/// implementations must synchronise their own state.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before extraction of a document begins.
    ///
    /// `index` is 0-based in input order.
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document produced a summary and blocks.
    fn on_document_complete(&self, index: usize, total: usize, name: &str, block_count: usize) {
        let _ = (index, total, name, block_count);
    }

    /// Called when a document finished with a stored stage failure.
    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every document of a batch has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// Callback that ignores every event.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Shared callback handle as stored by the pipeline.
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
