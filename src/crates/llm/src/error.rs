//! Error types for chat model providers.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when calling a chat model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed (bad or revoked key).
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not configured.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Model not found or not available to this key.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Prompt plus history exceeds the model's context window.
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Provider returned a 5xx or is otherwise unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Check if this error is worth retrying against the same provider.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::ServiceUnavailable(_)
            | LlmError::Timeout(_)
            | LlmError::RateLimitExceeded(_) => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication or a missing key.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// Check if this error is a rate limit rejection.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            LlmError::RateLimitExceeded(_) => true,
            LlmError::ProviderError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("rate limit") || msg.contains("too many requests") || msg.contains("429")
            }
            _ => false,
        }
    }

    /// Map a transport-level failure, separating timeouts from other errors.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else {
            LlmError::HttpError(err)
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::RateLimitExceeded("slow down".into()).is_retryable());
        assert!(LlmError::Timeout("15s".into()).is_retryable());
        assert!(LlmError::ServiceUnavailable("502".into()).is_retryable());
        assert!(!LlmError::AuthenticationError("bad key".into()).is_retryable());
        assert!(!LlmError::ContextLengthExceeded("too long".into()).is_retryable());
        assert!(!LlmError::InvalidResponse("no candidates".into()).is_retryable());
    }

    #[test]
    fn test_auth_classification() {
        assert!(LlmError::AuthenticationError("401".into()).is_auth_error());
        assert!(LlmError::ApiKeyNotFound("OPENAI_API_KEY".into()).is_auth_error());
        assert!(!LlmError::RateLimitExceeded("429".into()).is_auth_error());
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(LlmError::RateLimitExceeded("quota".into()).is_rate_limit());
        assert!(LlmError::ProviderError("HTTP 429 Too Many Requests".into()).is_rate_limit());
        assert!(!LlmError::ProviderError("HTTP 500".into()).is_rate_limit());
        assert!(!LlmError::Timeout("15s".into()).is_rate_limit());
    }

    #[test]
    fn test_serde_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let llm_err: LlmError = err.into();
        assert!(matches!(llm_err, LlmError::SerializationError(_)));
    }
}
