//! Markdown synthesis from extracted note text.
//!
//! The synthesizer owns no model state; it renders a prompt, hands it to the
//! injected [`CompletionService`] and normalises the answer. Every failure is
//! returned as a [`SynthesisError`] so the pipeline can store it next to the
//! extraction result instead of aborting.

use crate::config::PipelineConfig;
use crate::error::SynthesisError;
use crate::model::Block;
use crate::notion;
use crate::pipeline::llm::{CompletionRequest, CompletionService};
use crate::pipeline::postprocess::{clean_response, extract_json_payload};
use crate::prompts::{self, DEFAULT_MARKDOWN_PROMPT, STRUCTURED_BLOCKS_PROMPT};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Turns plain note text into Markdown (or candidate blocks) via a completion collaborator.
#[derive(Clone)]
pub struct MarkdownSynthesizer {
    completion: Arc<dyn CompletionService>,
    template: String,
    max_tokens: usize,
    stop: Vec<String>,
    temperature: f32,
}

impl MarkdownSynthesizer {
    pub fn new(completion: Arc<dyn CompletionService>, config: &PipelineConfig) -> Self {
        Self {
            completion,
            template: config
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_MARKDOWN_PROMPT.to_string()),
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
            temperature: config.temperature,
        }
    }

    /// Request a Markdown rendering of `text`.
    ///
    /// Empty or whitespace-only input short-circuits to
    /// [`SynthesisError::EmptyInput`] without calling the collaborator.
    pub async fn synthesize(&self, text: &str) -> Result<String, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }

        let raw = self.call(prompts::render(&self.template, text)).await?;
        let markdown = clean_response(&raw);
        if markdown.is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }
        Ok(markdown)
    }

    /// Ask the collaborator for the note as Notion block JSON.
    ///
    /// The returned blocks are candidates: tables may be ragged and carry
    /// foreign children until they pass through the validator.
    pub async fn synthesize_blocks(&self, text: &str) -> Result<Vec<Block>, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }

        let raw = self
            .call(prompts::render(STRUCTURED_BLOCKS_PROMPT, text))
            .await?;
        if raw.trim().is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }
        let payload = extract_json_payload(&raw).ok_or_else(|| {
            SynthesisError::MalformedBlocks("no JSON array in response".to_string())
        })?;

        notion::decode_blocks(payload).map_err(|e| SynthesisError::MalformedBlocks(e.to_string()))
    }

    async fn call(&self, prompt: String) -> Result<String, SynthesisError> {
        let request = CompletionRequest {
            prompt,
            max_tokens: self.max_tokens,
            stop: self.stop.clone(),
            temperature: self.temperature,
        };

        let start = Instant::now();
        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.completion.name(),
            request.prompt.len()
        );
        let raw = self.completion.complete(&request).await?;
        info!(
            "Completion from {}: {} chars in {:?}",
            self.completion.name(),
            raw.len(),
            start.elapsed()
        );
        Ok(raw)
    }
}
