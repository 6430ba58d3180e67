//! LLM-backed human expert feedback parser.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::ComplianceRequirement;
use crate::llm::{prompts, StructuredExtractor};

lazy_static! {
    static ref REQ_REFERENCE: Regex = Regex::new(r"(?i)R\d+").unwrap();
}

/// One expert decision pulled out of free-form feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub requirement_reference: String,
    pub decision: String,
    pub rationale: String,
    pub suggestion: String,
    pub confidence: String,
}

/// Result of parsing one feedback document, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedHumanFeedback {
    pub feedback_items: Vec<FeedbackItem>,
    pub raw_text: String,
    pub parsing_success: bool,
    pub error_message: Option<String>,
}

impl ParsedHumanFeedback {
    fn failure(raw_text: &str, error: impl Into<String>) -> Self {
        Self {
            feedback_items: Vec::new(),
            raw_text: raw_text.to_string(),
            parsing_success: false,
            error_message: Some(error.into()),
        }
    }
}

/// Parses expert feedback through the structured extractor.
pub struct HumanFeedbackParser {
    extractor: StructuredExtractor,
    model: String,
}

impl HumanFeedbackParser {
    pub fn new(extractor: StructuredExtractor, model: impl Into<String>) -> Self {
        Self {
            extractor,
            model: model.into(),
        }
    }

    pub async fn parse_feedback_file(&self, path: impl AsRef<Path>) -> ParsedHumanFeedback {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => self.parse_feedback_text(&text).await,
            Err(e) => {
                error!("Error reading human feedback file {}: {}", path.display(), e);
                ParsedHumanFeedback::failure("", format!("File reading error: {}", e))
            }
        }
    }

    pub async fn parse_feedback_text(&self, feedback_text: &str) -> ParsedHumanFeedback {
        if feedback_text.trim().is_empty() {
            return ParsedHumanFeedback::failure(feedback_text, "Empty feedback text provided");
        }

        let (prompt, schema) = prompts::human_feedback_extraction(feedback_text);

        info!("Extracting feedback items using LLM");
        let response = match self
            .extractor
            .extract(
                &prompt,
                &schema,
                &self.model,
                Some(prompts::FEEDBACK_SYSTEM_PROMPT),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Feedback extraction rejected: {}", e);
                return ParsedHumanFeedback::failure(feedback_text, e.to_string());
            }
        };

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
            error!("LLM extraction failed: {}", reason);
            return ParsedHumanFeedback::failure(
                feedback_text,
                format!("LLM extraction failed: {}", reason),
            );
        }

        let parsed: Value = match serde_json::from_str(&response.content) {
            Ok(value) => value,
            Err(e) => {
                return ParsedHumanFeedback::failure(
                    feedback_text,
                    format!("JSON parsing error: {}", e),
                )
            }
        };

        let entries = parsed
            .get("feedback_items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let feedback_items = convert_feedback_items(&entries);

        info!("Successfully parsed {} feedback items", feedback_items.len());
        ParsedHumanFeedback {
            feedback_items,
            raw_text: feedback_text.to_string(),
            parsing_success: true,
            error_message: None,
        }
    }
}

/// One feedback item paired with the requirement it refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedFeedback {
    pub requirement: ComplianceRequirement,
    pub feedback: FeedbackItem,
}

impl HumanFeedbackParser {
    /// Map feedback items onto compliance requirements by requirement
    /// number.
    ///
    /// References that already look like a requirement number (`R` plus
    /// digits) match directly; unclear references fall back to one LLM
    /// round-trip over the requirement texts. Items that still match
    /// nothing are dropped with a warning.
    pub async fn map_feedback_to_requirements(
        &self,
        feedback: &ParsedHumanFeedback,
        requirements: &[ComplianceRequirement],
    ) -> HashMap<String, MappedFeedback> {
        if !feedback.parsing_success {
            error!("Cannot map feedback: parsing was unsuccessful");
            return HashMap::new();
        }

        let by_number: HashMap<&str, &ComplianceRequirement> = requirements
            .iter()
            .map(|req| (req.requirement_number.as_str(), req))
            .collect();

        let mut mapping = HashMap::new();
        for item in &feedback.feedback_items {
            let reference = item.requirement_reference.trim().to_uppercase();
            let req_num = if is_requirement_number(&reference) {
                reference.clone()
            } else {
                self.extract_requirement_reference(item, requirements).await
            };

            match by_number.get(req_num.as_str()) {
                Some(requirement) => {
                    mapping.insert(
                        req_num,
                        MappedFeedback {
                            requirement: (*requirement).clone(),
                            feedback: item.clone(),
                        },
                    );
                }
                None => {
                    warn!("No matching requirement found for feedback reference: {}", reference);
                }
            }
        }

        mapping
    }

    /// One plain-text LLM round-trip to pin an unclear reference to a
    /// requirement number. Empty string when nothing usable comes back.
    async fn extract_requirement_reference(
        &self,
        item: &FeedbackItem,
        requirements: &[ComplianceRequirement],
    ) -> String {
        let requirements_text = requirements
            .iter()
            .map(|req| format!("Requirement {}: {}", req.requirement_number, req.requirement_text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "\
Determine which requirement number this feedback item refers to.
The feedback might mention the requirement explicitly or implicitly.

Available requirements:
{requirements_text}

Feedback item:
Decision: {}
Rationale: {}
Suggestion: {}

Return only the requirement number (e.g., R1, R2) that this feedback most likely refers to.",
            item.decision, item.rationale, item.suggestion
        );

        let system_prompt = "You are an expert at matching feedback to requirements. \
Identify which requirement a feedback item refers to based on context clues.";

        match self
            .extractor
            .transport()
            .generate(&prompt, &self.model, Some(system_prompt), 0.1, None)
            .await
        {
            Ok(response) if response.success => REQ_REFERENCE
                .find(&response.content)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_default(),
            Ok(response) => {
                error!(
                    "Reference matching failed: {}",
                    response.error.unwrap_or_else(|| "unknown error".to_string())
                );
                String::new()
            }
            Err(e) => {
                error!("Error extracting requirement reference: {}", e);
                String::new()
            }
        }
    }

    /// Feedback items whose decision contains the given text,
    /// case-insensitive.
    pub fn feedback_by_decision<'a>(
        feedback: &'a ParsedHumanFeedback,
        decision: &str,
    ) -> Vec<&'a FeedbackItem> {
        let decision_lower = decision.to_lowercase();
        feedback
            .feedback_items
            .iter()
            .filter(|item| item.decision.to_lowercase().contains(&decision_lower))
            .collect()
    }
}

fn is_requirement_number(reference: &str) -> bool {
    reference
        .strip_prefix('R')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Convert raw JSON entries into typed feedback items.
///
/// Same per-entry semantics as requirement conversion; the only mandatory
/// field is the requirement reference.
pub fn convert_feedback_items(entries: &[Value]) -> Vec<FeedbackItem> {
    let mut items = Vec::new();

    for entry in entries {
        let Some(item) = convert_one(entry) else {
            warn!("Skipping malformed feedback entry: {}", entry);
            continue;
        };
        if item.requirement_reference.is_empty() {
            warn!("Skipping feedback item with missing requirement reference: {}", entry);
            continue;
        }
        items.push(item);
    }

    items
}

fn convert_one(entry: &Value) -> Option<FeedbackItem> {
    Some(FeedbackItem {
        requirement_reference: super::field_text(entry, "requirement_reference")?,
        decision: super::field_text(entry, "decision")?,
        rationale: super::field_text(entry, "rationale")?,
        suggestion: super::field_text(entry, "suggestion")?,
        confidence: super::field_text(entry, "confidence")?,
    })
}
