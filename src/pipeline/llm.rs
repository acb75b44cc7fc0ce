//! Completion collaborators: prompt in, generated text out.
//!
//! [`CompletionService`] is the seam the synthesizer talks to. It is built
//! once per process and injected, so tests substitute a fake and the CLI
//! picks an implementation from flags:
//!
//! - [`LlmCompletion`] wraps any edgequake-llm provider (OpenAI, Anthropic,
//!   Ollama, …) and sends the prompt as a single user turn.
//! - [`MarkdownServer`] posts to a self-hosted `/generate-markdown` endpoint
//!   that answers `{"markdown": …}` or `{"error": …}`.
//!
//! No retries happen here; a failed call becomes a [`CompletionError`] and
//! the synthesizer records it.

use crate::error::{MemoirError, SynthesisError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub stop: Vec<String>,
    pub temperature: f32,
}

/// Errors from a completion collaborator.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The call never produced an answer (connection refused, provider error).
    #[error("{0}")]
    Request(String),

    /// The collaborator answered with an error payload.
    #[error("{0}")]
    Server(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl From<CompletionError> for SynthesisError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Request(msg) => SynthesisError::Collaborator(msg),
            CompletionError::Server(msg) => SynthesisError::ServerError(msg),
            CompletionError::Timeout(secs) => SynthesisError::Timeout(secs),
        }
    }
}

/// Generate text for a prompt.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Short collaborator name for logs.
    fn name(&self) -> String;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

// ── edgequake-llm provider ───────────────────────────────────────────────

/// Completion through an edgequake-llm provider.
pub struct LlmCompletion {
    provider: Arc<dyn LLMProvider>,
    label: String,
    timeout_secs: u64,
}

impl LlmCompletion {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout_secs: u64) -> Self {
        Self {
            provider,
            label: "llm".to_string(),
            timeout_secs,
        }
    }

    /// Name shown in logs, e.g. `openai/gpt-4.1-nano`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Resolve a provider from most-specific to least-specific:
    ///
    /// 1. named provider (+ model, default [`DEFAULT_MODEL`])
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
    /// 3. `OPENAI_API_KEY` present → OpenAI
    /// 4. whatever [`ProviderFactory::from_env`] detects
    pub fn resolve(
        provider_name: Option<&str>,
        model: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, MemoirError> {
        let (provider, label) = resolve_provider(provider_name, model)?;
        info!("Completion provider: {}", label);
        Ok(Self::new(provider, timeout_secs).with_label(label))
    }

    fn options(request: &CompletionRequest) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            stop: (!request.stop.is_empty()).then(|| request.stop.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CompletionService for LlmCompletion {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(request.prompt.as_str())];
        let options = Self::options(request);

        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| CompletionError::Timeout(self.timeout_secs))?
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        debug!(
            "Completion: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

type ResolvedProvider = (Arc<dyn LLMProvider>, String);

fn create_provider(name: &str, model: &str) -> Result<ResolvedProvider, MemoirError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        MemoirError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok((provider, format!("{name}/{model}")))
}

fn resolve_provider(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<ResolvedProvider, MemoirError> {
    if let Some(name) = provider_name {
        return create_provider(name, model.unwrap_or(DEFAULT_MODEL));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model.unwrap_or(DEFAULT_MODEL));
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MemoirError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No completion provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, use --markdown-server, or name a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}

// ── Markdown server ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    input: &'a str,
    max_tokens: usize,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    markdown: Option<String>,
    error: Option<String>,
}

/// Completion through a self-hosted `POST <base>/generate-markdown` endpoint.
#[derive(Debug, Clone)]
pub struct MarkdownServer {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl MarkdownServer {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, MemoirError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MemoirError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/generate-markdown", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for MarkdownServer {
    fn name(&self) -> String {
        format!("markdown-server@{}", self.base_url)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let start = Instant::now();
        let body = GenerateRequest {
            input: &request.prompt,
            max_tokens: request.max_tokens,
            stop: &request.stop,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout_secs)
                } else {
                    CompletionError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        debug!("Markdown server answered HTTP {} in {:?}", status, start.elapsed());

        parse_generate_response(status.as_u16(), &text)
    }
}

fn parse_generate_response(status: u16, body: &str) -> Result<String, CompletionError> {
    if !(200..300).contains(&status) {
        return Err(CompletionError::Request(format!("HTTP {status}: {body}")));
    }
    match serde_json::from_str::<GenerateResponse>(body) {
        Ok(GenerateResponse {
            markdown: Some(markdown),
            ..
        }) => Ok(markdown),
        Ok(GenerateResponse { error, .. }) => Err(CompletionError::Server(
            error.unwrap_or_else(|| "Unknown error".to_string()),
        )),
        Err(e) => Err(CompletionError::Request(format!("invalid JSON response: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "p".into(),
            max_tokens: 1024,
            stop: vec!["</s>".into()],
            temperature: 0.1,
        }
    }

    #[test]
    fn options_carry_budget_and_stop() {
        let opts = LlmCompletion::options(&request());
        assert_eq!(opts.max_tokens, Some(1024));
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.stop, Some(vec!["</s>".to_string()]));
    }

    #[test]
    fn server_markdown_payload() {
        let md = parse_generate_response(200, r##"{"markdown":"# Notes"}"##).unwrap();
        assert_eq!(md, "# Notes");
    }

    #[test]
    fn server_error_payload_maps_to_server_error() {
        let err = parse_generate_response(200, r#"{"error":"model not loaded"}"#).unwrap_err();
        let synth: SynthesisError = err.into();
        assert_eq!(
            synth.sentinel_text(),
            "Summary generation failed: Error from server: model not loaded"
        );
    }

    #[test]
    fn server_payload_without_fields_is_unknown_error() {
        let err = parse_generate_response(200, "{}").unwrap_err();
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn non_success_status_is_request_failure() {
        let err = parse_generate_response(503, "busy").unwrap_err();
        let synth: SynthesisError = err.into();
        assert_eq!(synth.to_string(), "Request failed: HTTP 503: busy");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let server = MarkdownServer::new("http://gpu:5000/", 5).unwrap();
        assert_eq!(server.endpoint(), "http://gpu:5000/generate-markdown");
    }

    #[test]
    fn request_json_shape() {
        let req = request();
        let body = GenerateRequest {
            input: &req.prompt,
            max_tokens: req.max_tokens,
            stop: &req.stop,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"], "p");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["stop"][0], "</s>");
    }
}
