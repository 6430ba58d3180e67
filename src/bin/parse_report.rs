//! Parse a compliance report file against a live Ollama server and print
//! the extracted requirements.
//!
//! Usage: parse_report <report-file> [model]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;

use compliance_extract::llm::{LlmTransport, OllamaClient, OllamaConfig, StructuredExtractor};
use compliance_extract::parsers::ComplianceReportParser;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: parse_report <report-file> [model]");
    };
    let model = args.next().unwrap_or_else(|| "qwq:32b".to_string());

    let client = Arc::new(
        OllamaClient::new(OllamaConfig::from_env()).context("failed to build Ollama client")?,
    );
    if !client.check_health().await {
        warn!("Ollama health check failed; extraction may not succeed");
    }

    let parser = ComplianceReportParser::new(StructuredExtractor::new(client), model);
    let report = parser.parse_report_file(&path).await;

    if !report.parsing_success {
        bail!(
            "parsing failed: {}",
            report.error_message.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    println!("Extracted {} requirement(s) from {}", report.requirements.len(), path);
    for req in &report.requirements {
        println!("\n[{}] {}", req.requirement_number, req.status);
        println!("  {}", req.requirement_text);
        if !req.rationale.is_empty() {
            println!("  rationale: {}", req.rationale);
        }
        if !req.recommendation.is_empty() {
            println!("  recommendation: {}", req.recommendation);
        }
    }

    Ok(())
}
