//! Provider utility functions for connection testing.

use crate::error::{LlmError, Result};
use crate::model::{ChatModel, ChatRequest, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Information about a configured model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier/name.
    pub id: String,

    /// Provider identifier (`openai` or `gemini`).
    pub provider: String,

    /// Human-readable provider name.
    pub display_name: String,
}

/// Connection testing available on every [`ChatModel`].
#[async_trait]
pub trait ProviderUtils: Send + Sync {
    /// Ping the provider to check if it's reachable and responsive.
    ///
    /// Returns `Ok(true)` if the provider answered, `Ok(false)` if it could
    /// not be reached, or an error for authentication or configuration
    /// problems, which retrying will not fix.
    async fn ping(&self) -> Result<bool>;

    /// Describe the configured model.
    fn model_info(&self) -> ModelInfo;
}

#[async_trait]
impl<T> ProviderUtils for T
where
    T: ChatModel + ?Sized,
{
    async fn ping(&self) -> Result<bool> {
        let request = ChatRequest::new(vec![Message::user("ping")]).with_max_tokens(1);
        match self.chat(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_auth_error() => Err(e),
            Err(LlmError::ConfigError(msg)) => Err(LlmError::ConfigError(msg)),
            Err(e) => {
                tracing::warn!(provider = %self.provider(), error = %e, "Provider ping failed");
                Ok(false)
            }
        }
    }

    fn model_info(&self) -> ModelInfo {
        let provider = self.provider();
        ModelInfo {
            id: self.model_name().to_string(),
            provider: provider.as_str().to_string(),
            display_name: provider.display_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatResponse, MessageRole};
    use crate::provider::ProviderKind;
    use std::collections::HashMap;

    struct Scripted(fn() -> Result<ChatResponse>);

    #[async_trait]
    impl ChatModel for Scripted {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            (self.0)()
        }

        fn provider(&self) -> ProviderKind {
            ProviderKind::Gemini
        }

        fn model_name(&self) -> &str {
            "gemini-2.5-flash"
        }
    }

    fn ok_response() -> Result<ChatResponse> {
        Ok(ChatResponse {
            message: Message::new(MessageRole::Assistant, "pong"),
            usage: None,
            metadata: HashMap::new(),
        })
    }

    #[tokio::test]
    async fn test_ping_reachable() {
        assert!(Scripted(ok_response).ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_ping_unavailable_is_false() {
        let model = Scripted(|| Err(LlmError::ServiceUnavailable("503".into())));
        assert!(!model.ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_ping_auth_error_propagates() {
        let model = Scripted(|| Err(LlmError::AuthenticationError("401".into())));
        assert!(model.ping().await.unwrap_err().is_auth_error());
    }

    #[test]
    fn test_model_info() {
        let info = Scripted(ok_response).model_info();
        assert_eq!(info.id, "gemini-2.5-flash");
        assert_eq!(info.provider, "gemini");
    }
}
