//! Web search enrichment via Google Custom Search.

pub mod google;
pub mod metrics;

pub use google::{GoogleSearchClient, SearchResult};
pub use metrics::{SearchErrorDetail, SearchMetrics, SearchMetricsStore, SearchOutcome};

use crate::executor::retry::{ErrorClass, RetryableError};
use thiserror::Error;

/// Search failures.
#[derive(Debug, Error)]
pub enum SearchError {
    /// API key or engine id missing
    #[error("Google Search API key and Search Engine ID must be configured")]
    NotConfigured,

    /// The API answered 429
    #[error("Google Search API rate limit exceeded")]
    RateLimited,

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Timeout, connection or other request failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// Body could not be decoded
    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

impl SearchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SearchError::RateLimited => Some(429),
            SearchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl RetryableError for SearchError {
    fn error_class(&self) -> ErrorClass {
        match self {
            SearchError::RateLimited | SearchError::Transport(_) => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }

    fn is_rate_limit(&self) -> bool {
        matches!(self, SearchError::RateLimited)
    }
}
