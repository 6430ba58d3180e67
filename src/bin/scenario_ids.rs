//! Generate scenario identifiers for requirement texts given as arguments,
//! against a live Ollama server.
//!
//! Usage: scenario_ids <requirement-text> [<requirement-text>...]

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use compliance_extract::llm::{OllamaClient, OllamaConfig, StructuredExtractor};
use compliance_extract::scenario::ScenarioIdGenerator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let texts: Vec<String> = std::env::args().skip(1).collect();
    if texts.is_empty() {
        bail!("usage: scenario_ids <requirement-text> [<requirement-text>...]");
    }

    let client = Arc::new(
        OllamaClient::new(OllamaConfig::from_env()).context("failed to build Ollama client")?,
    );
    let generator = ScenarioIdGenerator::new(StructuredExtractor::new(client), "qwq:32b");

    for text in &texts {
        match generator.generate(text, None, None).await {
            Ok(id) => println!("{}  <-  {}", id, text),
            Err(e) => eprintln!("FAILED   <-  {} ({})", text, e),
        }
    }

    Ok(())
}
