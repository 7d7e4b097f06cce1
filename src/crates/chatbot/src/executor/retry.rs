//! Retry logic for provider and search calls
//!
//! Exponential backoff with uniform jitter, error classification
//! (transient vs permanent), and structured logging of every attempt.

use llm::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Classification of errors for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on retry (rate limits, timeouts, 5xx)
    Transient,

    /// Permanent errors that won't succeed on retry (invalid auth, bad request)
    Permanent,

    /// Unknown errors - treated as transient
    Unknown,
}

/// Which failures a retry loop is allowed to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry anything not classified as permanent
    Transient,

    /// Retry rate limit rejections only
    RateLimitOnly,
}

/// Errors that can be classified for retry decisions
pub trait RetryableError: Display {
    fn error_class(&self) -> ErrorClass;

    fn is_rate_limit(&self) -> bool;

    /// Whether `policy` allows another attempt after this error.
    fn should_retry(&self, policy: RetryPolicy) -> bool {
        match policy {
            RetryPolicy::Transient => self.error_class() != ErrorClass::Permanent,
            RetryPolicy::RateLimitOnly => self.is_rate_limit(),
        }
    }
}

impl RetryableError for LlmError {
    fn error_class(&self) -> ErrorClass {
        classify_error(self)
    }

    fn is_rate_limit(&self) -> bool {
        LlmError::is_rate_limit(self)
    }
}

/// Classify a provider error to determine if it should be retried
pub fn classify_error(error: &LlmError) -> ErrorClass {
    if error.is_retryable() {
        return ErrorClass::Transient;
    }

    match error {
        LlmError::AuthenticationError(_)
        | LlmError::ApiKeyNotFound(_)
        | LlmError::ModelNotFound(_)
        | LlmError::ContextLengthExceeded(_)
        | LlmError::InvalidRequest(_)
        | LlmError::InvalidResponse(_)
        | LlmError::ConfigError(_)
        | LlmError::SerializationError(_) => ErrorClass::Permanent,
        LlmError::ProviderError(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
                || msg_lower.contains("timeout")
                || msg_lower.contains("timed out")
            {
                ErrorClass::Transient
            } else {
                ErrorClass::Unknown
            }
        }
        _ => ErrorClass::Unknown,
    }
}

/// Retry strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier for exponential backoff (typically 2.0)
    pub backoff_multiplier: f64,

    /// Whether to add up to one second of random jitter
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Settings used against the alternate provider: three attempts in
    /// total with a five second base cooldown.
    pub fn fallback_default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 5000,
            ..Default::default()
        }
    }

    /// Set initial backoff delay
    pub fn with_initial_backoff(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Set maximum backoff delay
    pub fn with_max_backoff(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    /// Set backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of calls the loop may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculate backoff delay for a given attempt (0-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_backoff_ms as f64
            * self.backoff_multiplier.powi(attempt as i32)) as u64;

        let delay_ms = delay_ms.min(self.max_backoff_ms);

        let delay_ms = if self.jitter {
            delay_ms + (1000.0 * rand::random::<f64>()) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// A value produced by [`retry_with_backoff`] and the calls it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// The last error from [`retry_with_backoff`].
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
    /// True when the policy still allowed a retry but attempts ran out.
    pub exhausted: bool,
}

/// Execute an async operation with retry logic
///
/// # Arguments
/// * `config` - Retry configuration
/// * `policy` - Which errors may be retried
/// * `operation_name` - Name of the operation for logging
/// * `f` - Async function to execute
///
/// # Returns
/// The first successful value, or the last error encountered
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    policy: RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<Retried<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        if attempt > 1 {
            info!(
                operation = operation_name,
                attempt = attempt,
                max_attempts = max_attempts,
                "Retrying operation"
            );
        }

        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) => {
                let retryable = e.should_retry(policy);

                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    classification = ?e.error_class(),
                    retryable = retryable,
                    "Operation failed"
                );

                if !retryable {
                    warn!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable error, aborting retries"
                    );
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                        exhausted: false,
                    });
                }

                if attempt >= max_attempts {
                    error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "All retry attempts exhausted"
                    );
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                        exhausted: true,
                    });
                }

                let delay = config.backoff_delay(attempt - 1);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable error, will retry after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
