//! Daily search counters.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// One failed search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchErrorDetail {
    pub timestamp: String,
    pub query: String,
    pub error: String,
    pub status_code: Option<u16>,
}

/// Counters for a single day plus derived rates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetrics {
    pub date: String,
    pub total_searches: u64,
    pub successful_searches: u64,
    pub failed_searches: u64,
    pub cached_searches: u64,
    /// Seconds spent on non-cached successful searches
    pub total_response_time: f64,
    /// Percent of searches that succeeded
    pub success_rate: f64,
    /// Percent of searches served from cache
    pub cache_hit_rate: f64,
    /// Seconds per non-cached successful search
    pub average_response_time: f64,
    pub error_details: Vec<SearchErrorDetail>,
}

impl SearchMetrics {
    fn empty(date: &str) -> Self {
        Self {
            date: date.to_string(),
            ..Default::default()
        }
    }

    fn with_derived(mut self) -> Self {
        if self.total_searches == 0 {
            self.success_rate = 0.0;
            self.cache_hit_rate = 0.0;
            self.average_response_time = 0.0;
            return self;
        }

        let total = self.total_searches as f64;
        self.success_rate = self.successful_searches as f64 / total * 100.0;
        self.cache_hit_rate = self.cached_searches as f64 / total * 100.0;

        let api_calls = self.successful_searches.saturating_sub(self.cached_searches);
        self.average_response_time = if api_calls > 0 && self.total_response_time > 0.0 {
            self.total_response_time / api_calls as f64
        } else {
            0.0
        };
        self
    }
}

/// Outcome of one search call.
#[derive(Debug, Clone)]
pub enum SearchOutcome<'a> {
    Cached,
    Success { elapsed: Duration },
    Failure {
        error: &'a str,
        status_code: Option<u16>,
    },
}

/// Per-day counters keyed `YYYYMMDD`. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct SearchMetricsStore {
    days: Arc<Mutex<HashMap<String, SearchMetrics>>>,
}

impl SearchMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Today's key in local time.
    pub fn today() -> String {
        Local::now().format("%Y%m%d").to_string()
    }

    pub fn record(&self, query: &str, outcome: SearchOutcome<'_>) {
        self.record_on(&Self::today(), Utc::now(), query, outcome);
    }

    fn record_on(&self, day: &str, at: DateTime<Utc>, query: &str, outcome: SearchOutcome<'_>) {
        let preview: String = query.chars().take(100).collect();
        let mut days = self.days.lock();
        let metrics = days
            .entry(day.to_string())
            .or_insert_with(|| SearchMetrics::empty(day));

        metrics.total_searches += 1;
        match outcome {
            SearchOutcome::Cached => {
                metrics.successful_searches += 1;
                metrics.cached_searches += 1;
                info!(query = %preview, status = "CACHED", "Google Search");
            }
            SearchOutcome::Success { elapsed } => {
                metrics.successful_searches += 1;
                metrics.total_response_time += elapsed.as_secs_f64();
                info!(
                    query = %preview,
                    status = "SUCCESS",
                    response_time_ms = elapsed.as_millis() as u64,
                    "Google Search"
                );
            }
            SearchOutcome::Failure { error: message, status_code } => {
                metrics.failed_searches += 1;
                metrics.error_details.push(SearchErrorDetail {
                    timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    query: query.to_string(),
                    error: message.to_string(),
                    status_code,
                });
                error!(
                    query = %preview,
                    status = "FAILED",
                    error = message,
                    status_code = ?status_code,
                    "Google Search"
                );
            }
        }
    }

    /// Metrics for `date` (`YYYYMMDD`), today when `None`.
    pub fn get(&self, date: Option<&str>) -> SearchMetrics {
        let day = date.map(str::to_string).unwrap_or_else(Self::today);
        self.days
            .lock()
            .get(&day)
            .cloned()
            .unwrap_or_else(|| SearchMetrics::empty(&day))
            .with_derived()
    }
}
