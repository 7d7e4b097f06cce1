//! Google Custom Search JSON API client with caching and daily metrics.

use super::metrics::{SearchMetrics, SearchMetricsStore, SearchOutcome};
use super::SearchError;
use crate::cache::TtlCache;
use crate::config::SearchConfig;
use crate::executor::retry::{retry_with_backoff, RetryConfig, RetryPolicy};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The API returns at most ten results per request.
const MAX_RESULTS_PER_QUERY: usize = 10;

/// One formatted search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    pagemap: Option<RawPagemap>,
}

#[derive(Debug, Deserialize)]
struct RawPagemap {
    #[serde(default)]
    cse_image: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default)]
    src: String,
}

impl From<RawItem> for SearchResult {
    fn from(item: RawItem) -> Self {
        let image_url = item
            .pagemap
            .and_then(|p| p.cse_image.into_iter().next())
            .map(|img| img.src);
        Self {
            title: item.title,
            link: item.link,
            snippet: item.snippet,
            source: "google_search".to_string(),
            image_url,
        }
    }
}

/// Google Custom Search client.
#[derive(Clone)]
pub struct GoogleSearchClient {
    client: Client,
    api_key: Option<String>,
    engine_id: Option<String>,
    base_url: String,
    max_results: usize,
    retry: RetryConfig,
    cache: TtlCache<String, Vec<SearchResult>>,
    metrics: SearchMetricsStore,
}

impl GoogleSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let retry = RetryConfig::new(config.retries.saturating_sub(1))
            .with_initial_backoff(config.cooldown_ms)
            .with_multiplier(2.0);

        Ok(Self {
            client,
            api_key: config.api_key(),
            engine_id: config.engine_id(),
            base_url: config.base_url.clone(),
            max_results: config.max_results,
            retry,
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
            metrics: SearchMetricsStore::new(),
        })
    }

    /// Override the retry schedule.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.engine_id.is_some()
    }

    fn cache_key(query: &str, num: usize, search_type: Option<&str>) -> String {
        let normalized = query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "google_search_{}_{}_{}",
            normalized,
            num,
            search_type.unwrap_or("web")
        )
    }

    /// Run a query. `num_results` defaults to the configured maximum and is
    /// capped at ten; `search_type` is passed through (e.g. `image`).
    pub async fn search(
        &self,
        query: &str,
        num_results: Option<usize>,
        search_type: Option<&str>,
        use_cache: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let started = Instant::now();

        let (Some(api_key), Some(engine_id)) = (&self.api_key, &self.engine_id) else {
            let err = SearchError::NotConfigured;
            self.metrics.record(
                query,
                SearchOutcome::Failure {
                    error: &err.to_string(),
                    status_code: None,
                },
            );
            return Err(err);
        };

        let num = num_results
            .unwrap_or(self.max_results)
            .clamp(1, MAX_RESULTS_PER_QUERY);
        let key = Self::cache_key(query, num, search_type);

        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                self.metrics.record(query, SearchOutcome::Cached);
                return Ok(cached);
            }
        }

        let num_param = num.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("key", api_key.as_str()),
            ("cx", engine_id.as_str()),
            ("q", query),
            ("num", num_param.as_str()),
        ];
        if let Some(kind) = search_type {
            params.push(("searchType", kind));
        }

        let params = params.as_slice();
        let outcome = retry_with_backoff(
            &self.retry,
            RetryPolicy::Transient,
            "google_search",
            move || self.fetch(params),
        )
        .await;

        match outcome {
            Ok(retried) => {
                let results = retried.value;
                if use_cache && !results.is_empty() {
                    self.cache.insert(key, results.clone());
                }
                self.metrics.record(
                    query,
                    SearchOutcome::Success {
                        elapsed: started.elapsed(),
                    },
                );
                debug!(results = results.len(), attempts = retried.attempts, "Search completed");
                Ok(results)
            }
            Err(failure) => {
                let message = if failure.exhausted {
                    format!(
                        "Google Search failed after {} attempts. Last error: {}",
                        failure.attempts, failure.error
                    )
                } else {
                    failure.error.to_string()
                };
                self.metrics.record(
                    query,
                    SearchOutcome::Failure {
                        error: &message,
                        status_code: failure.error.status_code(),
                    },
                );
                Err(failure.error)
            }
        }
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let raw: RawResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        Ok(raw.items.into_iter().map(SearchResult::from).collect())
    }

    /// Search results rendered as model context with citation guidance.
    pub async fn search_context(
        &self,
        query: &str,
        max_results: usize,
        use_cache: bool,
    ) -> Result<String, SearchError> {
        let results = self
            .search(query, Some(max_results), None, use_cache)
            .await?;
        Ok(format_context(&results))
    }

    /// Metrics for `date` (`YYYYMMDD`), today when `None`.
    pub fn metrics(&self, date: Option<&str>) -> SearchMetrics {
        self.metrics.get(date)
    }

    /// Drop one cached query, or the whole cache when `query` is `None`.
    pub fn clear_cache(
        &self,
        query: Option<&str>,
        num_results: Option<usize>,
        search_type: Option<&str>,
    ) {
        match query {
            Some(query) => {
                let num = num_results
                    .unwrap_or(self.max_results)
                    .clamp(1, MAX_RESULTS_PER_QUERY);
                let key = Self::cache_key(query, num, search_type);
                self.cache.remove(&key);
                info!(key = %key, "Cleared search cache entry");
            }
            None => {
                self.cache.clear();
                info!("Cleared search cache");
            }
        }
    }
}

/// Render results the way the chat prompt expects them.
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No relevant search results found.".to_string();
    }

    let mut context = String::from("Here is information from recent web searches:\n\n");
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!(
            "[Source {}] {}\nURL: {}\nExcerpt: {}\n\n",
            i + 1,
            result.title,
            result.link,
            result.snippet
        ));
    }

    context.push_str(
        "\nWhen citing sources in your response, please include the full source information as follows:\n",
    );
    context.push_str(
        "For example, instead of just saying [Source 1], say [Source 1: Title of the Source (URL)].\n\n",
    );
    context.push_str("Sources for reference:\n");
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!(
            "[Source {}: {} ({})]\n",
            i + 1,
            result.title,
            result.link
        ));
    }
    context
}
