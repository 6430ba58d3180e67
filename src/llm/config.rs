//! Transport configuration for the Ollama client.

use std::time::Duration;

use tracing::warn;

/// Connection and retry settings for [`super::OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server, without a trailing slash.
    pub base_url: String,
    /// Hard cap on each individual request attempt.
    pub timeout: Duration,
    /// Total number of attempts per call (first try included).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub retry_delay: Duration,
    /// Model used when callers don't specify one.
    pub default_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            default_model: "qwq:32b".to_string(),
        }
    }
}

impl OllamaConfig {
    /// Build a config from `OLLAMA_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: env_secs("OLLAMA_TIMEOUT").unwrap_or(defaults.timeout),
            max_retries: env_parse("OLLAMA_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay: env_secs_f64("OLLAMA_RETRY_DELAY").unwrap_or(defaults.retry_delay),
            default_model: std::env::var("OLLAMA_DEFAULT_MODEL").unwrap_or(defaults.default_model),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

fn env_secs_f64(key: &str) -> Option<Duration> {
    env_parse::<f64>(key)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}
