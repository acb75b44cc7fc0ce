//! Pipeline stages for turning note documents into publishable blocks.
//!
//! Each submodule implements one step, so each can be tested alone and the
//! collaborator-backed ones (PDF, OCR, completion) can be swapped for fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ synthesize ──▶ blocks ──▶ validate
//!           │  ▲          │  ▲
//!           ▼  │          ▼  │
//!        pdf / ocr        llm + postprocess
//! ```
//!
//! 1. [`input`]      — resolve a path or URL into an in-memory document
//! 2. [`extract`]    — PDF text layer, falling back to [`ocr`] on rasterised
//!    pages ([`pdf`], [`encode`]); blocking PDF work runs in `spawn_blocking`
//! 3. [`synthesize`] — prompt the [`llm`] collaborator for Markdown (or block
//!    JSON) and normalise the answer with [`postprocess`]
//! 4. [`blocks`]     — ordered first-match-wins line classification
//! 5. [`validate`]   — make tables rectangular before publishing

pub mod blocks;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod pdf;
pub mod postprocess;
pub mod synthesize;
pub mod validate;
