//! LLM-powered scenario identifier generation.
//!
//! Identifiers have the shape `{domain}_r{number}_{key_concept}` with an
//! optional numeric suffix for disambiguation. Components come from the
//! structured extractor, are normalized into identifier-safe tokens, and the
//! final string is checked against the identifier format before it is
//! registered and returned.

use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::llm::{prompts, LlmError, StructuredExtractor};

const MAX_COMPONENT_LEN: usize = 20;

lazy_static! {
    static ref WHITESPACE_OR_HYPHEN: Regex = Regex::new(r"[\s-]").unwrap();
    static ref NON_IDENT: Regex = Regex::new(r"[^a-z0-9_]").unwrap();
    static ref REPEATED_SEP: Regex = Regex::new(r"_+").unwrap();
    static ref FIRST_DIGITS: Regex = Regex::new(r"\d+").unwrap();
    // {domain}_r{number}_{key_concept}[_{suffix}]
    static ref ID_FORMAT: Regex =
        Regex::new(r"^[a-z][a-z0-9_]*_r\d+_[a-z][a-z0-9_]*(?:_\d+)?$").unwrap();
}

/// Components extracted for one identifier. Transient; exists only during a
/// single `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioIdComponents {
    pub domain: String,
    pub requirement_number: String,
    pub key_concept: String,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum ScenarioIdError {
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM extraction failed: {0}")]
    Extraction(String),

    #[error("invalid LLM response format: {0}")]
    InvalidResponse(String),

    #[error("generated ID {0:?} does not match the expected format")]
    InvalidFormat(String),
}

/// Generator for unique, human-readable scenario identifiers.
///
/// The registry of issued identifiers is scoped to one generator instance;
/// share an instance (e.g. behind an `Arc`) to get process-wide uniqueness.
pub struct ScenarioIdGenerator {
    extractor: StructuredExtractor,
    model: String,
    generated_ids: Mutex<HashSet<String>>,
}

impl ScenarioIdGenerator {
    pub fn new(extractor: StructuredExtractor, model: impl Into<String>) -> Self {
        Self {
            extractor,
            model: model.into(),
            generated_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Generate a unique scenario identifier from requirement text.
    ///
    /// Caller-supplied overrides replace the model-extracted domain and
    /// requirement number before cleaning. Fails if extraction fails, the
    /// response is unusable, or the final string misses the identifier
    /// format; nothing is registered on failure.
    pub async fn generate(
        &self,
        requirement_text: &str,
        domain_override: Option<&str>,
        requirement_number_override: Option<&str>,
    ) -> Result<String, ScenarioIdError> {
        let components = self
            .extract_components(requirement_text, domain_override, requirement_number_override)
            .await?;

        let base_id = format!(
            "{}_{}_{}",
            components.domain, components.requirement_number, components.key_concept
        );

        // Dedupe-check, format-check, and registration form one critical
        // section; concurrent callers racing here could otherwise be issued
        // the same identifier.
        let mut registry = self.generated_ids.lock().expect("registry poisoned");
        let unique_id = if registry.contains(&base_id) {
            let mut counter = 1u64;
            while registry.contains(&format!("{}_{}", base_id, counter)) {
                counter += 1;
            }
            format!("{}_{}", base_id, counter)
        } else {
            base_id
        };

        if !ID_FORMAT.is_match(&unique_id) {
            return Err(ScenarioIdError::InvalidFormat(unique_id));
        }

        registry.insert(unique_id.clone());
        drop(registry);

        info!("Generated scenario ID: {}", unique_id);
        Ok(unique_id)
    }

    async fn extract_components(
        &self,
        requirement_text: &str,
        domain_override: Option<&str>,
        req_num_override: Option<&str>,
    ) -> Result<ScenarioIdComponents, ScenarioIdError> {
        let (prompt, schema) = prompts::scenario_component_extraction(requirement_text);

        let response = self
            .extractor
            .extract(
                &prompt,
                &schema,
                &self.model,
                Some(prompts::SCENARIO_SYSTEM_PROMPT),
            )
            .await?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
            error!("Scenario component extraction failed: {}", reason);
            return Err(ScenarioIdError::Extraction(reason));
        }

        let data: Value = serde_json::from_str(&response.content)
            .map_err(|e| ScenarioIdError::InvalidResponse(e.to_string()))?;

        let domain = domain_override
            .map(str::to_string)
            .or_else(|| value_text(&data, "domain"))
            .unwrap_or_else(|| "unknown".to_string());
        let req_num = req_num_override
            .map(str::to_string)
            .or_else(|| value_text(&data, "requirement_number"))
            .unwrap_or_else(|| "r1".to_string());
        let key_concept =
            value_text(&data, "key_concept").unwrap_or_else(|| "general".to_string());
        let confidence = data.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);

        Ok(ScenarioIdComponents {
            domain: clean_component(&domain),
            requirement_number: clean_requirement_number(&req_num),
            key_concept: clean_component(&key_concept),
            confidence,
        })
    }

    /// Forget all previously issued identifiers.
    pub fn reset(&self) {
        self.generated_ids.lock().expect("registry poisoned").clear();
    }

    /// Copy of the issued-identifier registry; never the live set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.generated_ids.lock().expect("registry poisoned").clone()
    }
}

/// Coerce a payload component to text the way the record converters do:
/// numbers and bools stringify (cleaning extracts digits from anywhere in
/// the raw value), missing/null/nested values fall through to the default.
fn value_text(data: &Value, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) => Some(s.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Normalize a domain or key-concept component into an identifier-safe
/// token: lowercase, separators collapsed to single underscores, bounded
/// length, never empty.
fn clean_component(component: &str) -> String {
    let cleaned = component.to_lowercase();
    let cleaned = WHITESPACE_OR_HYPHEN.replace_all(cleaned.trim(), "_");
    let cleaned = NON_IDENT.replace_all(&cleaned, "_");
    let cleaned = REPEATED_SEP.replace_all(&cleaned, "_");
    let cleaned = cleaned.trim_matches('_');

    if cleaned.is_empty() {
        return "unknown".to_string();
    }

    if cleaned.len() > MAX_COMPONENT_LEN {
        cleaned[..MAX_COMPONENT_LEN].trim_end_matches('_').to_string()
    } else {
        cleaned.to_string()
    }
}

/// Normalize a requirement number to `r{digits}`, taking the first run of
/// digits found anywhere in the raw value; `r1` when there are none.
fn clean_requirement_number(req_num: &str) -> String {
    match FIRST_DIGITS.find(req_num) {
        Some(m) => format!("r{}", m.as_str()),
        None => "r1".to_string(),
    }
}
