//! Generation provider client.
//!
//! Wraps the OpenRouter chat-completions API behind the
//! [`GenerationBackend`] trait so the synthesis loop and downstream tests
//! can swap in scripted completions.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use dealboard_shared::{DealboardError, OpenRouterConfig, Result, TokenUsage};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("Dealboard/", env!("CARGO_PKG_VERSION"));

/// One completion with the provider's token accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Parameters for a single generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// A text-generation provider.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion>;
}

// ---------------------------------------------------------------------------
// OpenRouter client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenRouter-backed generation client.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    /// Create a client against a given endpoint. Tests point this at a
    /// mock server.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DealboardError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a client from config, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &OpenRouterConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            DealboardError::config(format!(
                "generation API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;

        Self::new(&config.base_url, api_key, config.timeout_secs)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerationBackend for OpenRouterClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion> {
        debug!(model = %request.model, "issuing generation request");

        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.completions_url())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| DealboardError::Network(format!("generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DealboardError::Synthesis(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DealboardError::Synthesis(format!("malformed completion response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        debug!(
            chars = text.len(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion received"
        );
        Ok(Completion { text, usage })
    }
}

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

/// Scripted generation backend for tests in this and downstream crates.
///
/// Queued responses are returned in order; once the queue is empty the
/// fallback text (when set) is returned for every further call.
pub struct MockGeneration {
    queued: Mutex<VecDeque<Result<Completion>>>,
    fallback: Option<Completion>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGeneration {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always completes with the given text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Some(Completion {
                text: text.into(),
                usage: TokenUsage::new(120, 45),
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue one successful completion (consumed in FIFO order).
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_response(Ok(Completion {
            text: text.into(),
            usage: TokenUsage::new(120, 45),
        }));
    }

    /// Queue one response, including its usage or error.
    pub fn push_response(&self, response: Result<Completion>) {
        self.queued.lock().expect("mock poisoned").push_back(response);
    }

    /// Number of generation calls made so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock poisoned").len()
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("mock poisoned").clone()
    }
}

impl Default for MockGeneration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGeneration {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion> {
        self.requests
            .lock()
            .expect("mock poisoned")
            .push(request.clone());

        if let Some(response) = self.queued.lock().expect("mock poisoned").pop_front() {
            return response;
        }
        match &self.fallback {
            Some(completion) => Ok(completion.clone()),
            None => Err(DealboardError::Synthesis(
                "no scripted completion left".into(),
            )),
        }
    }
}
