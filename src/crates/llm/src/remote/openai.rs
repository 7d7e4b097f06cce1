//! OpenAI client implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::{ChatModel, ChatRequest, Message, RemoteLlmConfig};
//!
//! let config = RemoteLlmConfig::from_env(
//!     "OPENAI_API_KEY",
//!     "https://api.openai.com/v1",
//!     "gpt-4o-mini"
//! )?;
//! let client = OpenAiClient::new(config)?;
//!
//! let request = ChatRequest::new(vec![Message::user("Hello!")]);
//! let response = client.chat(request).await?;
//! ```

use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::model::{ChatModel, ChatRequest, ChatResponse, Message, MessageRole, UsageMetadata};
use crate::provider::ProviderKind;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    fn convert_message(&self, msg: &Message) -> OpenAiMessage {
        OpenAiMessage {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone()),
        }
    }

    fn convert_response(&self, openai_resp: OpenAiResponse) -> Result<ChatResponse> {
        let choice = openai_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("OpenAI returned no choices".to_string()))?;

        let usage = openai_resp
            .usage
            .as_ref()
            .map(|u| UsageMetadata::new(u.prompt_tokens, u.completion_tokens));

        let mut metadata = HashMap::new();
        metadata.insert(
            "model".to_string(),
            serde_json::Value::String(openai_resp.model),
        );
        metadata.insert(
            "finish_reason".to_string(),
            serde_json::Value::String(choice.finish_reason.unwrap_or_default()),
        );

        Ok(ChatResponse {
            message: Message::new(
                MessageRole::Assistant,
                choice.message.content.unwrap_or_default(),
            ),
            usage,
            metadata,
        })
    }
}

/// Map a non-success status and body onto the error taxonomy.
fn map_error(status: StatusCode, body: String) -> LlmError {
    if body.contains("context_length_exceeded") {
        return LlmError::ContextLengthExceeded(body);
    }
    if body.contains("model_not_found") || status == StatusCode::NOT_FOUND {
        return LlmError::ModelNotFound(body);
    }
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationError(body),
        429 => LlmError::RateLimitExceeded(body),
        400 => LlmError::InvalidRequest(body),
        500..=599 => LlmError::ServiceUnavailable(format!("OpenAI API error {}: {}", status, body)),
        _ => LlmError::ProviderError(format!("OpenAI API error {}: {}", status, body)),
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.config.ensure_api_key("OpenAI")?;

        let url = format!("{}/chat/completions", self.config.base_url);

        let messages: Vec<OpenAiMessage> = request
            .messages
            .iter()
            .map(|m| self.convert_message(m))
            .collect();

        let req_body = OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.config.temperature,
            max_tokens: request.config.max_tokens,
            top_p: request.config.top_p,
            stop: if request.config.stop_sequences.is_empty() {
                None
            } else {
                Some(request.config.stop_sequences.clone())
            },
            stream: false,
        };

        let mut req = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&req_body);

        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }

        debug!(model = %self.config.model, messages = req_body.messages.len(), "Sending OpenAI request");

        let response = req.send().await.map_err(LlmError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_error(status, error_text));
        }

        let openai_resp: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        self.convert_response(openai_resp)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client_for(base_url: &str) -> OpenAiClient {
        let config = RemoteLlmConfig::new("sk-test", base_url, "gpt-4o-mini")
            .with_timeout(Duration::from_secs(5));
        OpenAiClient::new(config).unwrap()
    }

    #[test]
    fn test_message_conversion_all_roles() {
        let client = client_for("https://api.openai.com/v1");

        assert_eq!(client.convert_message(&Message::system("s")).role, "system");
        assert_eq!(client.convert_message(&Message::user("u")).role, "user");
        assert_eq!(client.convert_message(&Message::assistant("a")).role, "assistant");
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            map_error(StatusCode::UNAUTHORIZED, "bad key".into()),
            LlmError::AuthenticationError(_)
        ));
        assert!(matches!(
            map_error(StatusCode::TOO_MANY_REQUESTS, "slow".into()),
            LlmError::RateLimitExceeded(_)
        ));
        assert!(matches!(
            map_error(StatusCode::BAD_REQUEST, r#"{"error":{"code":"context_length_exceeded"}}"#.into()),
            LlmError::ContextLengthExceeded(_)
        ));
        assert!(matches!(
            map_error(StatusCode::NOT_FOUND, r#"{"error":{"code":"model_not_found"}}"#.into()),
            LlmError::ModelNotFound(_)
        ));
        assert!(matches!(
            map_error(StatusCode::BAD_GATEWAY, "upstream".into()),
            LlmError::ServiceUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 500
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "chatcmpl-1",
                    "object": "chat.completion",
                    "created": 1700000000,
                    "model": "gpt-4o-mini",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "Three projects are active."},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 40, "completion_tokens": 6, "total_tokens": 46}
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let request = ChatRequest::new(vec![Message::user("How many projects are active?")])
            .with_max_tokens(500);
        let response = client.chat(request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.text(), "Three projects are active.");
        assert_eq!(response.usage.unwrap().total_tokens, 46);
        assert_eq!(response.metadata["finish_reason"], "stop");
    }

    #[tokio::test]
    async fn test_chat_rate_limited() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .chat(ChatRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert!(err.is_rate_limit());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_chat_empty_choices() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"model":"gpt-4o-mini","choices":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .chat(ChatRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        let config = RemoteLlmConfig::new("", "http://127.0.0.1:9", "gpt-4o-mini");
        let err = OpenAiClient::new(config)
            .unwrap()
            .chat(ChatRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ApiKeyNotFound(_)));
    }
}
