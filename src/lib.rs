//! LLM-Backed Structured Extraction
//!
//! Turns free-form compliance text into typed records by delegating
//! interpretation to a locally hosted Ollama server:
//! - Resilient HTTP transport with bounded retry and exponential backoff
//! - Response sanitization and soft schema validation
//! - Compliance-report and expert-feedback parsers
//! - Unique, format-constrained scenario identifier synthesis

pub mod llm;
pub mod parsers;
pub mod scenario;

// Re-exports for convenience
pub use llm::{
    GenerationResult, LlmError, LlmTransport, OllamaClient, OllamaConfig, StructuredExtractor,
};
pub use parsers::{ComplianceReportParser, HumanFeedbackParser};
pub use scenario::ScenarioIdGenerator;
