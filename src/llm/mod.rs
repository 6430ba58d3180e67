//! LLM Module
//!
//! Provides the Ollama transport layer, response sanitization, and
//! structured (JSON) extraction on top of it.

mod client;
mod config;
mod extractor;
mod sanitize;
pub mod prompts;

pub use client::{GenerationResult, LlmError, LlmTransport, OllamaClient, SUPPORTED_MODELS};
pub use config::OllamaConfig;
pub use extractor::StructuredExtractor;
pub use sanitize::sanitize_response;
