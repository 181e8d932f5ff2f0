//! Search provider client.
//!
//! Wraps the Tavily HTTP API behind the [`SearchBackend`] trait so the
//! pipeline and downstream tests can swap in scripted results.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use dealboard_shared::{DealboardError, Result, SearchConfig, SearchHit};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("Dealboard/", env!("CARGO_PKG_VERSION"));

/// A web search provider returning ranked documents for a query.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Tavily client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Tavily-backed search client.
pub struct TavilySearch {
    client: Client,
    base_url: String,
    api_key: String,
    depth: String,
    max_results: u32,
}

impl TavilySearch {
    /// Create a client against a given endpoint. Tests point this at a
    /// mock server.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        depth: impl Into<String>,
        max_results: u32,
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
            depth: depth.into(),
            max_results,
        })
    }

    /// Create a client from config, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            DealboardError::config(format!(
                "search API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;

        Self::new(
            &config.base_url,
            api_key,
            &config.depth,
            config.max_results,
            config.timeout_secs,
        )
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        debug!(%query, depth = %self.depth, "issuing search request");

        let request = SearchRequest {
            query,
            search_depth: &self.depth,
            max_results: self.max_results,
        };

        let response = self
            .client
            .post(self.search_url())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| DealboardError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DealboardError::Search(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| DealboardError::Search(format!("malformed search response: {e}")))?;

        debug!(results = parsed.results.len(), "search response received");
        Ok(parsed.results)
    }
}

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

/// Scripted search backend for tests in this and downstream crates.
///
/// Queued responses are returned in order; once the queue is empty the
/// fallback hit set is returned for every further call.
pub struct MockSearch {
    queued: Mutex<VecDeque<Result<Vec<SearchHit>>>>,
    fallback: Vec<SearchHit>,
    requests: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always returns the given hits.
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: hits,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue one response (consumed in FIFO order before the fallback).
    pub fn push_response(&self, response: Result<Vec<SearchHit>>) {
        self.queued.lock().expect("mock poisoned").push_back(response);
    }

    /// Number of search calls made so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock poisoned").len()
    }

    /// Queries received, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("mock poisoned").clone()
    }
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for MockSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.requests
            .lock()
            .expect("mock poisoned")
            .push(query.to_string());

        if let Some(response) = self.queued.lock().expect("mock poisoned").pop_front() {
            return response;
        }
        Ok(self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.into(),
            url: "https://example.com/a".into(),
            content: "Lori invested $200k for 20%.".into(),
            score: Some(0.91),
        }
    }

    #[tokio::test]
    async fn search_parses_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "query": "scrub daddy shark tank deal",
                "search_depth": "basic",
                "max_results": 5,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "Scrub Daddy update", "url": "https://example.com/a",
                     "content": "Lori invested $200k for 20%.", "score": 0.93},
                    {"title": "Deal recap", "url": "https://example.com/b",
                     "content": "The sponge company.", "score": 0.71}
                ]
            })))
            .mount(&server)
            .await;

        let client = TavilySearch::new(server.uri(), "test-key", "basic", 5, 5).unwrap();
        let hits = client
            .search("scrub daddy shark tank deal")
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Scrub Daddy update");
        assert_eq!(hits[0].score, Some(0.93));
    }

    #[tokio::test]
    async fn non_success_status_is_search_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = TavilySearch::new(server.uri(), "test-key", "basic", 5, 5).unwrap();
        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, DealboardError::Search(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn missing_results_field_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"answer": null})),
            )
            .mount(&server)
            .await;

        let client = TavilySearch::new(server.uri(), "test-key", "basic", 5, 5).unwrap();
        let hits = client.search("anything").await.expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn mock_returns_queued_then_fallback() {
        let mock = MockSearch::with_hits(vec![hit("fallback")]);
        mock.push_response(Ok(vec![hit("queued")]));
        mock.push_response(Err(DealboardError::Search("boom".into())));

        assert_eq!(mock.search("q1").await.unwrap()[0].title, "queued");
        assert!(mock.search("q2").await.is_err());
        assert_eq!(mock.search("q3").await.unwrap()[0].title, "fallback");
        assert_eq!(mock.request_count(), 3);
        assert_eq!(mock.requests(), vec!["q1", "q2", "q3"]);
    }
}
