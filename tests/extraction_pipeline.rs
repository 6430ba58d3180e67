//! End-to-end pipeline behavior over a scripted transport: report and
//! feedback parsing, scenario identifier synthesis, uniqueness, and
//! failure propagation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use compliance_extract::llm::{
    GenerationResult, LlmError, LlmTransport, StructuredExtractor,
};
use compliance_extract::parsers::{
    ComplianceReportParser, ComplianceRequirement, HumanFeedbackParser, ParsedHumanFeedback,
};
use compliance_extract::scenario::ScenarioIdGenerator;

/// Replays a fixed queue of raw model outputs, like a reasoning model
/// would produce them (scaffolding included). Repeats the last entry once
/// the queue runs dry.
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<GenerationResult>>>,
}

impl ScriptedTransport {
    fn with_contents(contents: Vec<&str>) -> Arc<Self> {
        let queue = contents
            .into_iter()
            .map(|content| GenerationResult {
                content: content.to_string(),
                model: "qwq:32b".to_string(),
                success: true,
                error: None,
                tokens_used: Some(100),
            })
            .collect();
        Arc::new(Self {
            responses: Arc::new(Mutex::new(queue)),
        })
    }

    fn with_results(results: Vec<GenerationResult>) -> Arc<Self> {
        Arc::new(Self {
            responses: Arc::new(Mutex::new(results.into())),
        })
    }
}

#[async_trait]
impl LlmTransport for ScriptedTransport {
    async fn generate(
        &self,
        _prompt: &str,
        _model: &str,
        _system_prompt: Option<&str>,
        _temperature: f64,
        _max_tokens: Option<u32>,
    ) -> Result<GenerationResult, LlmError> {
        let mut queue = self.responses.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().expect("script exhausted")
        };
        Ok(next)
    }

    async fn check_health(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Vec<String> {
        vec!["qwq:32b".to_string(), "gemma3:27b".to_string()]
    }
}

const SIGNUP_REQUIREMENT: &str =
    "During account signup, the user must agree to our Terms of Service.";

const CONSENT_COMPONENTS: &str = r#"<think>The domain looks like ecommerce; the key concept is consent.</think>
Response: {"domain": "ecommerce", "requirement_number": "r1", "key_concept": "consent", "confidence": 0.9}"#;

#[tokio::test]
async fn scenario_id_end_to_end_with_dedup() {
    let transport = ScriptedTransport::with_contents(vec![CONSENT_COMPONENTS]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let first = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    assert_eq!(first, "ecommerce_r1_consent");

    // Identical components on the second call force dedup suffixing.
    let second = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    assert_eq!(second, "ecommerce_r1_consent_1");
}

#[tokio::test]
async fn scenario_ids_pairwise_distinct_with_one_unsuffixed() {
    let transport = ScriptedTransport::with_contents(vec![CONSENT_COMPONENTS]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap());
    }

    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    let unsuffixed = ids.iter().filter(|id| *id == "ecommerce_r1_consent").count();
    assert_eq!(unsuffixed, 1);
    assert_eq!(generator.snapshot().len(), 5);
}

#[tokio::test]
async fn scenario_id_overrides_replace_extracted_components() {
    let transport = ScriptedTransport::with_contents(vec![CONSENT_COMPONENTS]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let id = generator
        .generate(SIGNUP_REQUIREMENT, Some("Health-Care"), Some("REQ-42"))
        .await
        .unwrap();
    assert_eq!(id, "health_care_r42_consent");
}

#[tokio::test]
async fn scenario_id_accepts_numeric_components() {
    // Models routinely emit numbers for numeric-looking fields; the digits
    // still feed the r-prefix rule instead of falling back to r1.
    let transport = ScriptedTransport::with_contents(vec![
        r#"{"domain": "ecommerce", "requirement_number": 3, "key_concept": "consent", "confidence": 0.9}"#,
    ]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let id = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    assert_eq!(id, "ecommerce_r3_consent");
}

#[tokio::test]
async fn scenario_id_defaults_for_missing_components() {
    let transport = ScriptedTransport::with_contents(vec![r#"{"confidence": 0.2}"#]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let id = generator.generate("some requirement", None, None).await.unwrap();
    assert_eq!(id, "unknown_r1_general");
}

#[tokio::test]
async fn scenario_id_failure_registers_nothing() {
    let transport = ScriptedTransport::with_results(vec![GenerationResult::failure(
        "qwq:32b",
        "HTTP 503 from stub",
    )]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let err = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap_err();
    assert!(err.to_string().contains("503"));
    assert!(generator.snapshot().is_empty());
}

#[tokio::test]
async fn scenario_id_reset_allows_reissue() {
    let transport = ScriptedTransport::with_contents(vec![CONSENT_COMPONENTS]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    let first = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    generator.reset();
    assert!(generator.snapshot().is_empty());

    let again = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    assert_eq!(first, again);
}

#[tokio::test]
async fn snapshot_is_a_copy_not_the_live_registry() {
    let transport = ScriptedTransport::with_contents(vec![CONSENT_COMPONENTS]);
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(transport), "qwq:32b");

    generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    let mut snapshot = generator.snapshot();
    snapshot.clear();

    // Mutating the snapshot must not free the identifier for reuse.
    let second = generator.generate(SIGNUP_REQUIREMENT, None, None).await.unwrap();
    assert_eq!(second, "ecommerce_r1_consent_1");
}

#[tokio::test]
async fn compliance_report_parse_drops_invalid_entries() {
    let report_json = r#"<reasoning>two of these lack mandatory fields</reasoning>
{
  "requirements": [
    {"requirement_number": "R1", "requirement_text": "Users must consent to ToS.", "status": "Compliant", "rationale": "Checkbox present", "recommendation": ""},
    {"requirement_number": "", "requirement_text": "Orphaned text", "status": "", "rationale": "", "recommendation": ""},
    {"requirement_number": "R3", "requirement_text": "Data must be encrypted.", "status": "Non-Compliant", "rationale": "Plaintext storage", "recommendation": "Adopt AES-256"}
  ]
}"#;
    let transport = ScriptedTransport::with_contents(vec![report_json]);
    let parser =
        ComplianceReportParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let report = parser.parse_report_text("R1... R3...").await;

    assert!(report.parsing_success);
    assert_eq!(report.requirements.len(), 2);
    assert_eq!(report.requirements[0].requirement_number, "R1");
    assert_eq!(report.requirements[1].recommendation, "Adopt AES-256");
}

#[tokio::test]
async fn compliance_report_empty_input_short_circuits() {
    // No scripted response: reaching the transport would panic.
    let transport = ScriptedTransport::with_results(vec![]);
    let parser =
        ComplianceReportParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let report = parser.parse_report_text("   \n  ").await;
    assert!(!report.parsing_success);
    assert!(report.error_message.unwrap().contains("Empty report text"));
}

#[tokio::test]
async fn compliance_report_transport_failure_is_captured() {
    let transport = ScriptedTransport::with_results(vec![GenerationResult::failure(
        "qwq:32b",
        "Connection error for http://localhost:11434/api/generate",
    )]);
    let parser =
        ComplianceReportParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let report = parser.parse_report_text("R1 must do things.").await;
    assert!(!report.parsing_success);
    assert!(report.error_message.unwrap().contains("LLM extraction failed"));
}

#[tokio::test]
async fn feedback_parse_end_to_end() {
    let feedback_json = r#"{
  "feedback_items": [
    {"requirement_reference": "R1", "decision": "Accept", "rationale": "Matches policy", "suggestion": "", "confidence": "high"},
    {"requirement_reference": "", "decision": "Reject", "rationale": "dropped", "suggestion": "", "confidence": ""}
  ]
}"#;
    let transport = ScriptedTransport::with_contents(vec![feedback_json]);
    let parser = HumanFeedbackParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let feedback = parser.parse_feedback_text("The expert accepted R1.").await;

    assert!(feedback.parsing_success);
    assert_eq!(feedback.feedback_items.len(), 1);
    assert_eq!(feedback.feedback_items[0].decision, "Accept");
}

fn requirement(number: &str, text: &str) -> ComplianceRequirement {
    ComplianceRequirement {
        requirement_number: number.to_string(),
        requirement_text: text.to_string(),
        status: "Compliant".to_string(),
        rationale: String::new(),
        recommendation: String::new(),
    }
}

#[tokio::test]
async fn feedback_maps_to_requirements_with_llm_fallback() {
    let feedback_json = r#"{
  "feedback_items": [
    {"requirement_reference": " r2 ", "decision": "Accept", "rationale": "", "suggestion": "", "confidence": ""},
    {"requirement_reference": "the encryption point", "decision": "Modify", "rationale": "key rotation missing", "suggestion": "rotate yearly", "confidence": ""},
    {"requirement_reference": "R9", "decision": "Reject", "rationale": "", "suggestion": "", "confidence": ""}
  ]
}"#;
    // First reply answers the parse; the second answers the plain-text
    // reference-matching round-trip for the unclear item.
    let transport = ScriptedTransport::with_contents(vec![
        feedback_json,
        "It most likely refers to r1.",
    ]);
    let parser = HumanFeedbackParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let feedback = parser.parse_feedback_text("Expert notes...").await;
    assert!(feedback.parsing_success);

    let requirements = vec![
        requirement("R1", "Data must be encrypted at rest."),
        requirement("R2", "Users must consent to ToS."),
    ];
    let mapping = parser.map_feedback_to_requirements(&feedback, &requirements).await;

    // "r2" matches directly after normalization, the unclear reference is
    // resolved by the model, and R9 matches nothing.
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping["R2"].feedback.decision, "Accept");
    assert_eq!(mapping["R1"].feedback.decision, "Modify");
    assert_eq!(mapping["R1"].requirement.requirement_text, "Data must be encrypted at rest.");
    assert!(!mapping.contains_key("R9"));
}

#[tokio::test]
async fn feedback_mapping_empty_when_parse_failed() {
    // No scripted response: reaching the transport would panic.
    let transport = ScriptedTransport::with_results(vec![]);
    let parser = HumanFeedbackParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let feedback = ParsedHumanFeedback {
        feedback_items: Vec::new(),
        raw_text: String::new(),
        parsing_success: false,
        error_message: Some("LLM extraction failed: boom".to_string()),
    };

    let mapping = parser
        .map_feedback_to_requirements(&feedback, &[requirement("R1", "text")])
        .await;
    assert!(mapping.is_empty());
}

#[tokio::test]
async fn garbage_model_output_fails_without_panic() {
    let transport = ScriptedTransport::with_contents(vec![
        "<think>I am confused</think>here is your json: oops",
    ]);
    let parser =
        ComplianceReportParser::new(StructuredExtractor::new(transport), "qwq:32b");

    let report = parser.parse_report_text("R1 must do things.").await;
    assert!(!report.parsing_success);
    assert!(report.error_message.unwrap().contains("Invalid JSON response"));
}
