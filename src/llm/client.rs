//! Ollama transport layer.
//!
//! One HTTP client per [`OllamaClient`], reused across calls. Transient
//! failures (retryable status codes, connect errors, timeouts) are retried
//! with exponential backoff up to the configured attempt budget; terminal
//! failures are returned as data in [`GenerationResult`], never panics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use super::config::OllamaConfig;

/// Models the pipeline is allowed to request. Anything else is rejected
/// before a request is made.
pub const SUPPORTED_MODELS: [&str; 2] = ["qwq:32b", "gemma3:27b"];

/// Errors raised directly to callers, as opposed to failures captured in a
/// [`GenerationResult`].
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("unsupported model {model:?}; supported: {}", SUPPORTED_MODELS.join(", "))]
    UnsupportedModel { model: String },

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outcome of one generation round-trip.
///
/// Transport and decode failures are reported here through `success` and
/// `error` so batch callers can treat them as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub model: String,
    pub success: bool,
    pub error: Option<String>,
    pub tokens_used: Option<u64>,
}

impl GenerationResult {
    pub fn failure(model: &str, error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            model: model.to_string(),
            success: false,
            error: Some(error.into()),
            tokens_used: None,
        }
    }
}

/// Seam between the extraction pipeline and the inference service.
///
/// Production code uses [`OllamaClient`]; tests substitute scripted mocks.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// One generation round-trip. `Err` is reserved for configuration
    /// problems caught before any network I/O; everything that happens on
    /// the wire lands in the returned [`GenerationResult`].
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        system_prompt: Option<&str>,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> Result<GenerationResult, LlmError>;

    /// True only if the server responds and every supported model is
    /// present in its reported list. Never propagates an error.
    async fn check_health(&self) -> bool;

    /// Names of the models the server reports. Empty on any failure.
    async fn list_models(&self) -> Vec<String>;
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for the Ollama API.
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// POST to `/api/generate`, retrying transient failures with exponential
    /// backoff. Returns a descriptive error string once the attempt budget
    /// is exhausted or a non-retryable failure is hit.
    async fn post_generate(&self, body: &Value) -> Result<GenerateResponse, String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let mut delay = self.config.retry_delay;
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.config.max_retries.max(1) {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            match self.client.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<GenerateResponse>()
                            .await
                            .map_err(|e| format!("Malformed response body from {}: {}", url, e));
                    }

                    last_error = format!("HTTP {} from {}", status.as_u16(), url);
                    let retryable = matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504);
                    if !retryable {
                        return Err(last_error);
                    }
                    warn!(
                        "Attempt {}/{} failed: {}",
                        attempt, self.config.max_retries, last_error
                    );
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        format!("Request timeout after {:?} for {}", self.config.timeout, url)
                    } else {
                        format!("Connection error for {}: {}", url, e)
                    };
                    // Anything that never produced a response is worth
                    // retrying; the server may simply be restarting.
                    warn!(
                        "Attempt {}/{} failed: {}",
                        attempt, self.config.max_retries, last_error
                    );
                }
            }
        }

        Err(last_error)
    }

    async fn fetch_tags(&self) -> Result<TagsResponse, String> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| format!("Failed to reach {}: {}", url, e))?;
        if !response.status().is_success() {
            return Err(format!("HTTP {} from {}", response.status().as_u16(), url));
        }
        response
            .json::<TagsResponse>()
            .await
            .map_err(|e| format!("Malformed tags response from {}: {}", url, e))
    }
}

#[async_trait]
impl LlmTransport for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        system_prompt: Option<&str>,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> Result<GenerationResult, LlmError> {
        // Fail fast before any network I/O.
        if !SUPPORTED_MODELS.contains(&model) {
            return Err(LlmError::UnsupportedModel {
                model: model.to_string(),
            });
        }

        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature },
        });
        if let Some(n) = max_tokens {
            body["options"]["num_predict"] = json!(n);
        }
        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }

        info!("Generating text with model {}", model);
        match self.post_generate(&body).await {
            Ok(data) => Ok(GenerationResult {
                content: data.response,
                model: model.to_string(),
                success: true,
                error: None,
                tokens_used: data.eval_count,
            }),
            Err(e) => {
                error!("Text generation failed: {}", e);
                Ok(GenerationResult::failure(model, e))
            }
        }
    }

    async fn check_health(&self) -> bool {
        let tags = match self.fetch_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                error!("Ollama health check failed: {}", e);
                return false;
            }
        };

        let available: Vec<&str> = tags.models.iter().map(|m| m.name.as_str()).collect();
        for required in SUPPORTED_MODELS {
            if !available.contains(&required) {
                warn!("Model {} not found in Ollama", required);
                return false;
            }
        }

        info!("Ollama server health check passed");
        true
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                error!("Failed to list models: {}", e);
                Vec::new()
            }
        }
    }
}
