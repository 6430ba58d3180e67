//! Structured (JSON) extraction on top of the transport layer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};

use super::client::{GenerationResult, LlmError, LlmTransport};
use super::sanitize::sanitize_response;

/// Temperature used for all structured extraction; low to favor
/// deterministic, parseable output.
const EXTRACTION_TEMPERATURE: f64 = 0.1;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a data extraction assistant. Extract information and respond with valid JSON only.";

/// Combines a prompt, an expected-shape schema, and the transport into a
/// sanitized, decoded, soft-validated JSON payload.
///
/// On success the returned `content` is guaranteed to be syntactically valid
/// JSON; schema keys are checked softly (missing top-level keys warn, they
/// never fail the call).
pub struct StructuredExtractor {
    transport: Arc<dyn LlmTransport>,
}

impl StructuredExtractor {
    pub fn new(transport: Arc<dyn LlmTransport>) -> Self {
        Self { transport }
    }

    /// The underlying transport, for callers that also need plain-text
    /// generation (e.g. the feedback parser's reference-matching fallback).
    pub fn transport(&self) -> Arc<dyn LlmTransport> {
        Arc::clone(&self.transport)
    }

    pub async fn extract(
        &self,
        prompt: &str,
        schema: &Value,
        model: &str,
        system_prompt: Option<&str>,
    ) -> Result<GenerationResult, LlmError> {
        let schema_text =
            serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        let json_prompt = format!(
            "{prompt}\n\nPlease respond with valid JSON only, following this structure:\n{schema_text}\n\nResponse:"
        );

        let response = self
            .transport
            .generate(
                &json_prompt,
                model,
                Some(system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT)),
                EXTRACTION_TEMPERATURE,
                None,
            )
            .await?;

        if !response.success {
            return Ok(response);
        }

        let cleaned = sanitize_response(&response.content);
        let parsed: Value = match serde_json::from_str(&cleaned) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON from LLM response: {}", e);
                error!("Raw response: {}", response.content);
                return Ok(GenerationResult::failure(
                    model,
                    format!("Invalid JSON response: {}", e),
                ));
            }
        };

        // Soft validation: report missing top-level keys, keep going.
        if let Some(expected) = schema.as_object() {
            for key in expected.keys() {
                if parsed.get(key).is_none() {
                    warn!("Missing expected key '{}' in LLM response", key);
                }
            }
        }

        Ok(GenerationResult {
            content: serde_json::to_string_pretty(&parsed)
                .unwrap_or_else(|_| parsed.to_string()),
            ..response
        })
    }
}
