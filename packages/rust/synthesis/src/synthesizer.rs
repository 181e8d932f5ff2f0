//! Retry loop turning provider completions into validated payloads.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use dealboard_shared::{DealboardError, EnrichSettings, TokenUsage};

use crate::client::{GenerationBackend, GenerationRequest};
use crate::extract::{self, ExtractOptions};
use crate::usage::UsageAccumulator;

/// Knobs for one synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Retries after the first failed attempt (total attempts = retries + 1).
    pub retries: u32,
    /// Base delay for linear backoff; the Nth retry waits N * base.
    pub retry_base_delay: Duration,
    /// String-aware boundary scanning, see [`ExtractOptions`].
    pub strict_extraction: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            model: "moonshotai/kimi-k2.5".into(),
            max_tokens: 2000,
            temperature: 0.2,
            retries: 2,
            retry_base_delay: Duration::from_millis(500),
            strict_extraction: false,
        }
    }
}

impl From<&EnrichSettings> for SynthesisOptions {
    fn from(settings: &EnrichSettings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            retries: settings.retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            strict_extraction: false,
        }
    }
}

/// What one synthesis call produced, successful or not.
///
/// Failure is data here, not an `Err`: a subject that cannot be
/// synthesized is skipped while the rest of the batch proceeds, so the
/// caller needs the raw text and error message rather than a bubbled-up
/// failure.
#[derive(Debug)]
pub struct SynthesisOutcome<T> {
    /// Completion text from the final attempt.
    pub raw_text: String,
    /// JSON substring located in the raw text, when extraction got that far.
    pub extracted_json: Option<String>,
    /// Parsed payload, present on success.
    pub data: Option<T>,
    /// Token usage from the successful attempt; zero when all attempts failed.
    pub usage: TokenUsage,
    /// Attempts actually made.
    pub attempts: u32,
    /// Error message from the final attempt when all attempts failed.
    pub error: Option<String>,
}

impl<T> SynthesisOutcome<T> {
    pub fn success(&self) -> bool {
        self.data.is_some()
    }
}

/// Drives generation calls through extraction and schema validation,
/// retrying transient failures with linear backoff.
pub struct Synthesizer {
    backend: Arc<dyn GenerationBackend>,
    usage: Arc<UsageAccumulator>,
}

impl Synthesizer {
    pub fn new(backend: Arc<dyn GenerationBackend>, usage: Arc<UsageAccumulator>) -> Self {
        Self { backend, usage }
    }

    /// Run one prompt through the provider and parse the reply as `T`.
    ///
    /// Retryable failures (provider errors, empty completions, extraction,
    /// syntax, and schema failures) consume attempts; anything else stops
    /// the loop immediately. Usage is recorded for the successful attempt
    /// only, so failed runs never skew cost accounting.
    #[instrument(skip_all, fields(model = %options.model))]
    pub async fn synthesize<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &SynthesisOptions,
    ) -> SynthesisOutcome<T> {
        let request = GenerationRequest {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };
        let extract_options = ExtractOptions {
            strict: options.strict_extraction,
        };

        let mut raw_text = String::new();
        let mut last_extracted = None;
        let mut last_error: Option<DealboardError> = None;
        let mut attempts = 0;

        while attempts <= options.retries {
            if attempts > 0 {
                let delay = options.retry_base_delay * attempts;
                if let Some(error) = &last_error {
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "synthesis attempt failed, backing off"
                    );
                }
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            let completion = match self.backend.complete(&request).await {
                Ok(completion) => completion,
                Err(e) => {
                    raw_text.clear();
                    last_extracted = None;
                    let fatal = !e.is_retryable();
                    last_error = Some(e);
                    if fatal {
                        break;
                    }
                    continue;
                }
            };
            raw_text = completion.text;
            last_extracted = None;

            if raw_text.trim().is_empty() {
                last_error = Some(DealboardError::Synthesis("empty completion".into()));
                continue;
            }

            let extracted = match extract::extract_json_with(&raw_text, extract_options) {
                Ok(extracted) => extracted,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let value: serde_json::Value = match serde_json::from_str(&extracted) {
                Ok(value) => value,
                Err(e) => {
                    last_error = Some(DealboardError::syntax(e.to_string()));
                    last_extracted = Some(extracted);
                    continue;
                }
            };

            let data: T = match serde_json::from_value(value) {
                Ok(data) => data,
                Err(e) => {
                    last_error = Some(DealboardError::schema(e.to_string()));
                    last_extracted = Some(extracted);
                    continue;
                }
            };

            self.usage.record(completion.usage);
            debug!(attempts, tokens = completion.usage.total(), "synthesis succeeded");
            return SynthesisOutcome {
                raw_text,
                extracted_json: Some(extracted),
                data: Some(data),
                usage: completion.usage,
                attempts,
                error: None,
            };
        }

        SynthesisOutcome {
            raw_text,
            extracted_json: last_extracted,
            data: None,
            usage: TokenUsage::default(),
            attempts,
            error: last_error.map(|e| e.to_string()),
        }
    }
}
