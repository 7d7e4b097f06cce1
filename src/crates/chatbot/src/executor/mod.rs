//! Provider call execution: retry loops and dual-provider routing.

pub mod fallback;
pub mod retry;

pub use fallback::{ModelRouter, ResponseSource, RoutedResponse};
pub use retry::{retry_with_backoff, RetryConfig, RetryPolicy, RetryableError};
