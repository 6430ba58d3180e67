//! Prompt templates and expected-shape schemas for the extraction tasks.
//!
//! Schemas are prompt-formatting aids and soft post-hoc validators, not
//! strict contracts; the extractor only checks top-level key presence.

use serde_json::{json, Value};

/// Prompt and schema for pulling requirement records out of a compliance
/// report.
pub fn compliance_report_extraction(report_text: &str) -> (String, Value) {
    let prompt = format!(
        "\
Extract structured information from the following compliance report text.
Focus on identifying requirements, their assessment status, rationale, and recommendations.

Compliance Report Text:
{report_text}

Extract the following information for each requirement found:
- requirement_number: The requirement identifier (e.g., R1, R2, etc.)
- requirement_text: The full text describing what needs to be compliant
- status: The compliance status (Compliant, Non-Compliant, Partially Compliant, etc.)
- rationale: The reasoning behind the assessment
- recommendation: Suggested actions to achieve compliance

If multiple requirements are present, extract all of them.
"
    );

    let schema = json!({
        "requirements": [
            {
                "requirement_number": "string",
                "requirement_text": "string",
                "status": "string",
                "rationale": "string",
                "recommendation": "string"
            }
        ]
    });

    (prompt, schema)
}

/// Prompt and schema for pulling expert decisions out of free-form human
/// feedback.
pub fn human_feedback_extraction(feedback_text: &str) -> (String, Value) {
    let prompt = format!(
        "\
Extract structured information from the following human expert feedback text.
Focus on identifying the expert's decisions, rationale, and refined suggestions.

Human Feedback Text:
{feedback_text}

Extract the following information for each feedback item:
- requirement_reference: Which requirement this feedback relates to (e.g., R1, R2, etc.)
- decision: The expert's decision (Accept, Reject, Modify, etc.)
- rationale: The expert's reasoning for their decision
- suggestion: Any refined or additional suggestions from the expert
- confidence: Expert's confidence level if mentioned

If multiple feedback items are present, extract all of them.
"
    );

    let schema = json!({
        "feedback_items": [
            {
                "requirement_reference": "string",
                "decision": "string",
                "rationale": "string",
                "suggestion": "string",
                "confidence": "string"
            }
        ]
    });

    (prompt, schema)
}

/// Prompt and schema for extracting scenario identifier components from
/// requirement text.
pub fn scenario_component_extraction(requirement_text: &str) -> (String, Value) {
    let prompt = format!(
        "\
Analyze this compliance requirement text and extract components for scenario ID generation:

REQUIREMENT TEXT:
{requirement_text}

Extract the following components:
- domain: The business/technical domain this requirement applies to
- requirement_number: The requirement identifier (format: r + number)
- key_concept: The main concept or topic being addressed

Respond with valid JSON only."
    );

    let schema = json!({
        "domain": "string",
        "requirement_number": "string",
        "key_concept": "string",
        "confidence": "float"
    });

    (prompt, schema)
}

pub const COMPLIANCE_SYSTEM_PROMPT: &str = "\
You are an expert compliance analyst. Extract structured requirement \
information from compliance reports accurately and completely. Respond with \
valid JSON only.";

pub const FEEDBACK_SYSTEM_PROMPT: &str = "\
You are an expert at interpreting human reviewer feedback on compliance \
assessments. Extract each decision faithfully without adding your own \
judgement. Respond with valid JSON only.";

pub const SCENARIO_SYSTEM_PROMPT: &str = "\
You are an expert at analyzing compliance requirements and extracting key \
information for ID generation.
Your task is to analyze requirement text and extract:
1. Domain: The business/technical domain (e.g., ecommerce, healthcare, finance)
2. Requirement number: The requirement identifier (e.g., r1, r2, req1, requirement_1)
3. Key concept: The main concept being addressed (e.g., consent, authentication, encryption)

Guidelines:
- Domain should be lowercase, single word or hyphenated
- Requirement number should be in format 'r' + number (e.g., r1, r2, r10)
- Key concept should be lowercase, single word or underscored
- All components should be suitable for use in identifiers (no spaces, special chars except underscore/hyphen)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_input_text() {
        let (prompt, schema) = compliance_report_extraction("R1 must encrypt data at rest.");
        assert!(prompt.contains("R1 must encrypt data at rest."));
        assert!(schema.get("requirements").is_some());

        let (prompt, schema) = human_feedback_extraction("I reject R2.");
        assert!(prompt.contains("I reject R2."));
        assert!(schema.get("feedback_items").is_some());

        let (prompt, schema) = scenario_component_extraction("Users must consent.");
        assert!(prompt.contains("Users must consent."));
        for key in ["domain", "requirement_number", "key_concept", "confidence"] {
            assert!(schema.get(key).is_some(), "schema missing {}", key);
        }
    }
}
