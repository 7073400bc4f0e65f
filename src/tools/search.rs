//! Web search used by the fallback agent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::config::{SearchConfig, SearchProvider};
use crate::core::http::{send_json_with_retry, HttpFailure};

pub const NO_RESULT_OBSERVATION: &str = "No good search result found";

const SERPAPI_URL: &str = "https://serpapi.com";
const GOOGLE_URL: &str = "https://www.googleapis.com";
const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search transport error: {0}")]
    Transport(String),

    #[error("search provider rate limited: {0}")]
    RateLimited(String),

    #[error("search provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed search response: {0}")]
    Malformed(String),

    #[error("search provider reported an error: {0}")]
    Provider(String),
}

impl From<HttpFailure> for SearchError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Transport(err) => SearchError::Transport(err.to_string()),
            HttpFailure::Status { status, body } if status.as_u16() == 429 => {
                SearchError::RateLimited(body)
            }
            HttpFailure::Status { status, body } => SearchError::Upstream {
                status: status.as_u16(),
                body,
            },
            HttpFailure::Decode(message) => SearchError::Malformed(message),
        }
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Observation text handed back to the agent.
pub fn render_observation(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULT_OBSERVATION.to_string();
    }
    results
        .iter()
        .map(|r| {
            if r.title.is_empty() {
                r.snippet.clone()
            } else {
                format!("{}: {}", r.title, r.snippet)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct WebSearchClient {
    provider: SearchProvider,
    api_key: String,
    engine_id: String,
    base_url: String,
    max_results: usize,
    max_retries: usize,
    client: Client,
}

impl WebSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        let default_url = match config.provider {
            SearchProvider::SerpApi => SERPAPI_URL,
            SearchProvider::Google => GOOGLE_URL,
            SearchProvider::DuckDuckGo => DUCKDUCKGO_URL,
        };

        Ok(Self {
            provider: config.provider,
            api_key: config.api_key.clone().unwrap_or_default(),
            engine_id: config.engine_id.clone().unwrap_or_default(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(default_url)
                .trim_end_matches('/')
                .to_string(),
            max_results: config.max_results.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, SearchError> {
        Ok(send_json_with_retry(self.max_retries, || self.client.get(url)).await?)
    }

    async fn serpapi_search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "{}/search?engine=google&q={}&api_key={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key)
        );
        let payload = self.get_json(&url).await?;
        if let Some(error) = payload.get("error").and_then(|v| v.as_str()) {
            return Err(SearchError::Provider(error.to_string()));
        }
        Ok(parse_serpapi(&payload, self.max_results))
    }

    async fn google_search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "{}/customsearch/v1?key={}&cx={}&q={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.engine_id),
            urlencoding::encode(query)
        );
        let payload = self.get_json(&url).await?;
        let items = payload
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for item in items {
            let title = str_field(&item, "title");
            let url = str_field(&item, "link");
            let snippet = str_field(&item, "snippet");
            if !title.is_empty() && !url.is_empty() {
                results.push(SearchResult {
                    title,
                    url,
                    snippet,
                });
            }
        }
        results.truncate(self.max_results);
        Ok(results)
    }

    async fn duckduckgo_search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "{}/?q={}&format=json&no_redirect=1&no_html=1",
            self.base_url,
            urlencoding::encode(query)
        );
        let payload = self.get_json(&url).await?;
        let mut results = Vec::new();

        let abstract_text = str_field(&payload, "AbstractText");
        let abstract_url = str_field(&payload, "AbstractURL");
        if !abstract_text.is_empty() && !abstract_url.is_empty() {
            results.push(SearchResult {
                title: abstract_text
                    .split(" - ")
                    .next()
                    .unwrap_or(&abstract_text)
                    .to_string(),
                url: abstract_url,
                snippet: abstract_text.clone(),
            });
        }

        if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }
        if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }

        results.truncate(self.max_results);
        Ok(results)
    }
}

#[async_trait]
impl WebSearch for WebSearchClient {
    fn name(&self) -> &str {
        match self.provider {
            SearchProvider::SerpApi => "serpapi",
            SearchProvider::Google => "google",
            SearchProvider::DuckDuckGo => "duckduckgo",
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let results = match self.provider {
            SearchProvider::SerpApi => self.serpapi_search(query).await?,
            SearchProvider::Google => self.google_search(query).await?,
            SearchProvider::DuckDuckGo => self.duckduckgo_search(query).await?,
        };
        tracing::debug!(provider = self.name(), results = results.len(), "web search finished");
        Ok(results)
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Answer box first, then the knowledge graph description, then organic snippets.
fn parse_serpapi(payload: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(answer_box) = payload.get("answer_box") {
        let answer = ["answer", "snippet"]
            .iter()
            .map(|key| str_field(answer_box, key))
            .find(|text| !text.is_empty())
            .or_else(|| {
                answer_box
                    .get("snippet_highlighted_words")
                    .and_then(|v| v.get(0))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });
        if let Some(answer) = answer {
            results.push(SearchResult {
                title: str_field(answer_box, "title"),
                url: str_field(answer_box, "link"),
                snippet: answer,
            });
        }
    }

    if let Some(graph) = payload.get("knowledge_graph") {
        let description = str_field(graph, "description");
        if !description.is_empty() {
            results.push(SearchResult {
                title: str_field(graph, "title"),
                url: str_field(graph, "website"),
                snippet: description,
            });
        }
    }

    if let Some(items) = payload.get("organic_results").and_then(|v| v.as_array()) {
        for item in items {
            let snippet = str_field(item, "snippet");
            if snippet.is_empty() {
                continue;
            }
            results.push(SearchResult {
                title: str_field(item, "title"),
                url: str_field(item, "link"),
                snippet,
            });
        }
    }

    results.truncate(max_results);
    results
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::serve;

    fn config(provider: SearchProvider, base_url: String) -> SearchConfig {
        SearchConfig {
            provider,
            api_key: Some("key&1".to_string()),
            engine_id: Some("cx".to_string()),
            base_url: Some(base_url),
            max_results: 3,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn serpapi_prefers_answer_box_then_knowledge_graph() {
        let payload = json!({
            "answer_box": { "title": "Capital", "answer": "Paris" },
            "knowledge_graph": { "title": "France", "description": "Country in Europe" },
            "organic_results": [
                { "title": "A", "link": "https://a", "snippet": "first" },
                { "title": "B", "link": "https://b", "snippet": "second" }
            ]
        });

        let results = parse_serpapi(&payload, 3);

        let snippets: Vec<&str> = results.iter().map(|r| r.snippet.as_str()).collect();
        assert_eq!(snippets, vec!["Paris", "Country in Europe", "first"]);
    }

    #[test]
    fn empty_results_render_no_result_observation() {
        assert_eq!(render_observation(&[]), NO_RESULT_OBSERVATION);
        let rendered = render_observation(&[SearchResult {
            title: "T".to_string(),
            url: String::new(),
            snippet: "S".to_string(),
        }]);
        assert_eq!(rendered, "T: S");
    }

    #[test]
    fn duckduckgo_topics_are_flattened() {
        let items = vec![
            json!({ "Text": "Rust - a language", "FirstURL": "https://rust-lang.org" }),
            json!({ "Topics": [{ "Text": "Cargo - build tool", "FirstURL": "https://crates.io" }] }),
            json!({ "Text": "", "FirstURL": "https://skipped" }),
        ];
        let mut results = Vec::new();
        extract_ddg_topics(&items, &mut results);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust", "Cargo"]);
    }

    #[tokio::test]
    async fn serpapi_client_sends_encoded_key_and_query() {
        let app = Router::new().route(
            "/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("api_key").map(String::as_str) != Some("key&1") {
                    return Json(json!({ "error": "Invalid API key" }));
                }
                Json(json!({
                    "organic_results": [{ "title": "Echo", "link": "https://x", "snippet": params.get("q").cloned().unwrap_or_default() }]
                }))
            }),
        );
        let base = serve(app).await;
        let client = WebSearchClient::new(&config(SearchProvider::SerpApi, base)).unwrap();

        let results = client.search("who won the 2022 world cup?").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "who won the 2022 world cup?");
    }

    #[tokio::test]
    async fn provider_errors_surface_as_search_errors() {
        let app = Router::new().route(
            "/search",
            get(|| async { Json(json!({ "error": "Invalid API key" })) }),
        );
        let base = serve(app).await;
        let mut cfg = config(SearchProvider::SerpApi, base);
        cfg.api_key = Some("wrong".to_string());
        let client = WebSearchClient::new(&cfg).unwrap();

        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::Provider(_)));
    }

    fn rate_limited_once() -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/search",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": "slow down" })))
                    } else {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "organic_results": [{ "title": "T", "link": "https://t", "snippet": "ok" }]
                            })),
                        )
                    }
                }
            }),
        );
        (app, calls)
    }

    #[tokio::test]
    async fn retry_budget_comes_from_config() {
        let (app, calls) = rate_limited_once();
        let base = serve(app).await;
        let mut cfg = config(SearchProvider::SerpApi, base);
        cfg.max_retries = 0;
        let client = WebSearchClient::new(&cfg).unwrap();

        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::RateLimited(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let (app, calls) = rate_limited_once();
        let base = serve(app).await;
        let mut cfg = config(SearchProvider::SerpApi, base);
        cfg.max_retries = 1;
        let client = WebSearchClient::new(&cfg).unwrap();

        let results = client.search("anything").await.unwrap();
        assert_eq!(results[0].snippet, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
