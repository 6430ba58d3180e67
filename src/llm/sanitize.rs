//! Scaffolding removal for raw model output.
//!
//! Reasoning models wrap internal deliberation in tag pairs that must not
//! reach the JSON decoder. Kept as a standalone pure function so new tag
//! families can be added without touching extraction logic.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Paired scaffolding blocks, case-insensitive, spanning newlines.
    static ref SCAFFOLDING: [Regex; 3] = [
        Regex::new(r"(?is)<think>.*?</think>").unwrap(),
        Regex::new(r"(?is)<reasoning>.*?</reasoning>").unwrap(),
        Regex::new(r"(?is)<analysis>.*?</analysis>").unwrap(),
    ];
    static ref RESPONSE_LABEL: Regex = Regex::new(r"(?i)^response:").unwrap();
}

/// Strip model scaffolding blocks, a leading `Response:` label, and
/// surrounding whitespace. Idempotent: stripping runs to a fixed point, so
/// blocks reassembled by a removal (or stacked labels) cannot survive one
/// call only to be removed by the next.
pub fn sanitize_response(raw: &str) -> String {
    let mut cleaned = raw.trim().to_string();
    loop {
        let previous = cleaned.clone();
        for pattern in SCAFFOLDING.iter() {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        cleaned = cleaned.trim().to_string();
        if let Some(m) = RESPONSE_LABEL.find(&cleaned) {
            cleaned = cleaned[m.end()..].trim_start().to_string();
        }
        if cleaned == previous {
            return cleaned;
        }
    }
}
