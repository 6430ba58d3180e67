//! Parsers Module
//!
//! LLM-backed parsers that turn free-form report and feedback text into
//! typed records, dropping malformed entries instead of failing the batch.

mod compliance;
mod feedback;

use serde_json::Value;

/// Coerce one field of a raw entry to trimmed text.
///
/// Missing and null fields become empty strings; scalars are stringified;
/// a non-object entry or a nested array/object value is a type error
/// (`None`), which drops the entry.
pub(crate) fn field_text(entry: &Value, key: &str) -> Option<String> {
    let obj = entry.as_object()?;
    match obj.get(key) {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => None,
    }
}

pub use compliance::{
    convert_requirements, ComplianceReportParser, ComplianceRequirement, ParsedComplianceReport,
};
pub use feedback::{
    convert_feedback_items, FeedbackItem, HumanFeedbackParser, MappedFeedback, ParsedHumanFeedback,
};
