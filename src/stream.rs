//! Streaming batch API: yield each note as soon as it is done.
//!
//! [`crate::convert::NotePipeline::process_batch`] waits for the whole batch
//! and returns outputs in input order. The functions here instead emit
//! items in completion order, tagged with their input index, so a caller can
//! write files or update a UI while slower documents are still in OCR.

use crate::convert::NotePipeline;
use crate::document::Document;
use crate::error::MemoirError;
use crate::output::NoteOutput;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// One finished document and its position in the input.
#[derive(Debug)]
pub struct IndexedNote<T> {
    pub index: usize,
    pub item: T,
}

/// Boxed stream of finished notes.
pub type NoteStream = Pin<Box<dyn Stream<Item = IndexedNote<NoteOutput>> + Send>>;

/// Boxed stream of notes whose input may have failed to resolve.
pub type InputStream = Pin<Box<dyn Stream<Item = IndexedNote<Result<NoteOutput, MemoirError>>> + Send>>;

/// Process already-loaded documents, emitting outputs in completion order.
pub fn process_stream(pipeline: Arc<NotePipeline>, docs: Vec<Document>) -> NoteStream {
    let total = docs.len();
    let concurrency = pipeline.config().concurrency.max(1);
    info!("Streaming {} documents (concurrency {})", total, concurrency);

    let s = stream::iter(docs.into_iter().enumerate().map(move |(index, doc)| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            let item = pipeline.process_indexed(&doc, index, total).await;
            IndexedNote { index, item }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Resolve each path or URL and process it, emitting in completion order.
///
/// A path that cannot be read or a URL that cannot be downloaded fails only
/// its own item; the rest of the batch continues.
pub fn process_inputs_stream(pipeline: Arc<NotePipeline>, inputs: Vec<String>) -> InputStream {
    let total = inputs.len();
    let concurrency = pipeline.config().concurrency.max(1);
    let timeout = pipeline.config().download_timeout_secs;

    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input_str)| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            let item = match input::resolve_input(&input_str, timeout).await {
                Ok(doc) => Ok(pipeline.process_indexed(&doc, index, total).await),
                Err(e) => Err(e),
            };
            IndexedNote { index, item }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
