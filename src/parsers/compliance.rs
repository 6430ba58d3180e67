//! LLM-backed compliance report parser.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::llm::{prompts, StructuredExtractor};

/// One requirement pulled out of a compliance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRequirement {
    pub requirement_number: String,
    pub requirement_text: String,
    pub status: String,
    pub rationale: String,
    pub recommendation: String,
}

/// Result of parsing one report, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedComplianceReport {
    pub requirements: Vec<ComplianceRequirement>,
    pub raw_text: String,
    pub parsing_success: bool,
    pub error_message: Option<String>,
}

impl ParsedComplianceReport {
    fn failure(raw_text: &str, error: impl Into<String>) -> Self {
        Self {
            requirements: Vec::new(),
            raw_text: raw_text.to_string(),
            parsing_success: false,
            error_message: Some(error.into()),
        }
    }
}

/// Parses compliance reports through the structured extractor.
pub struct ComplianceReportParser {
    extractor: StructuredExtractor,
    model: String,
}

impl ComplianceReportParser {
    pub fn new(extractor: StructuredExtractor, model: impl Into<String>) -> Self {
        Self {
            extractor,
            model: model.into(),
        }
    }

    /// Read a report from disk and parse it. Read failures become failed
    /// parse results, same as every other failure in this pipeline.
    pub async fn parse_report_file(&self, path: impl AsRef<Path>) -> ParsedComplianceReport {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => self.parse_report_text(&text).await,
            Err(e) => {
                error!("Error reading compliance report file {}: {}", path.display(), e);
                ParsedComplianceReport::failure("", format!("File reading error: {}", e))
            }
        }
    }

    pub async fn parse_report_text(&self, report_text: &str) -> ParsedComplianceReport {
        if report_text.trim().is_empty() {
            return ParsedComplianceReport::failure(report_text, "Empty report text provided");
        }

        let (prompt, schema) = prompts::compliance_report_extraction(report_text);

        info!("Extracting compliance requirements using LLM");
        let response = match self
            .extractor
            .extract(
                &prompt,
                &schema,
                &self.model,
                Some(prompts::COMPLIANCE_SYSTEM_PROMPT),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Compliance extraction rejected: {}", e);
                return ParsedComplianceReport::failure(report_text, e.to_string());
            }
        };

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
            error!("LLM extraction failed: {}", reason);
            return ParsedComplianceReport::failure(
                report_text,
                format!("LLM extraction failed: {}", reason),
            );
        }

        // The extractor guarantees syntactically valid JSON on success.
        let parsed: Value = match serde_json::from_str(&response.content) {
            Ok(value) => value,
            Err(e) => {
                return ParsedComplianceReport::failure(
                    report_text,
                    format!("JSON parsing error: {}", e),
                )
            }
        };

        let entries = parsed
            .get("requirements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let requirements = convert_requirements(&entries);

        info!("Successfully parsed {} requirements", requirements.len());
        ParsedComplianceReport {
            requirements,
            raw_text: report_text.to_string(),
            parsing_success: true,
            error_message: None,
        }
    }

    /// Requirements whose status contains the given text, case-insensitive.
    pub fn requirements_by_status<'a>(
        report: &'a ParsedComplianceReport,
        status: &str,
    ) -> Vec<&'a ComplianceRequirement> {
        let status_lower = status.to_lowercase();
        report
            .requirements
            .iter()
            .filter(|req| req.status.to_lowercase().contains(&status_lower))
            .collect()
    }
}

/// Convert raw JSON entries into typed requirements.
///
/// Each entry converts independently; entries missing mandatory fields
/// (number and text) or carrying non-scalar field values are dropped with a
/// warning. The batch never aborts.
pub fn convert_requirements(entries: &[Value]) -> Vec<ComplianceRequirement> {
    let mut requirements = Vec::new();

    for entry in entries {
        let Some(requirement) = convert_one(entry) else {
            warn!("Skipping malformed requirement entry: {}", entry);
            continue;
        };
        if requirement.requirement_number.is_empty() || requirement.requirement_text.is_empty() {
            warn!("Skipping requirement with missing required fields: {}", entry);
            continue;
        }
        requirements.push(requirement);
    }

    requirements
}

fn convert_one(entry: &Value) -> Option<ComplianceRequirement> {
    Some(ComplianceRequirement {
        requirement_number: super::field_text(entry, "requirement_number")?,
        requirement_text: super::field_text(entry, "requirement_text")?,
        status: super::field_text(entry, "status")?,
        rationale: super::field_text(entry, "rationale")?,
        recommendation: super::field_text(entry, "recommendation")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_keeps_only_entries_with_mandatory_fields() {
        let entries = vec![
            json!({"requirement_number": "R1", "requirement_text": "Encrypt data", "status": "Compliant", "rationale": "AES in place", "recommendation": ""}),
            json!({"requirement_number": "", "requirement_text": "No number", "status": "Compliant", "rationale": "", "recommendation": ""}),
            json!({"requirement_number": "R3", "requirement_text": "", "status": "", "rationale": "", "recommendation": ""}),
            json!({"requirement_number": "R4", "requirement_text": "Audit logs", "status": "Non-Compliant", "rationale": "none kept", "recommendation": "add logging"}),
        ];

        let converted = convert_requirements(&entries);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].requirement_number, "R1");
        assert_eq!(converted[1].requirement_number, "R4");
    }

    #[test]
    fn test_convert_trims_and_coerces_scalars() {
        let entries = vec![json!({
            "requirement_number": 7,
            "requirement_text": "  padded  ",
            "status": "Compliant",
            "rationale": null,
            "recommendation": true,
        })];

        let converted = convert_requirements(&entries);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].requirement_number, "7");
        assert_eq!(converted[0].requirement_text, "padded");
        assert_eq!(converted[0].rationale, "");
        assert_eq!(converted[0].recommendation, "true");
    }

    #[test]
    fn test_convert_drops_entries_with_non_scalar_fields() {
        let entries = vec![
            json!({"requirement_number": "R1", "requirement_text": ["not", "a", "string"], "status": "", "rationale": "", "recommendation": ""}),
            json!("not an object"),
            json!({"requirement_number": "R2", "requirement_text": "ok", "status": "", "rationale": "", "recommendation": ""}),
        ];

        let converted = convert_requirements(&entries);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].requirement_number, "R2");
    }

    #[test]
    fn test_requirements_by_status() {
        let report = ParsedComplianceReport {
            requirements: vec![
                ComplianceRequirement {
                    requirement_number: "R1".into(),
                    requirement_text: "t".into(),
                    status: "Compliant".into(),
                    rationale: String::new(),
                    recommendation: String::new(),
                },
                ComplianceRequirement {
                    requirement_number: "R2".into(),
                    requirement_text: "t".into(),
                    status: "Non-Compliant".into(),
                    rationale: String::new(),
                    recommendation: String::new(),
                },
            ],
            raw_text: String::new(),
            parsing_success: true,
            error_message: None,
        };

        let hits = ComplianceReportParser::requirements_by_status(&report, "non-compliant");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].requirement_number, "R2");
    }
}
