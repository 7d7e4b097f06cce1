//! Provider-neutral chat types and the [`ChatModel`] trait.

use crate::error::Result;
use crate::provider::ProviderKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Parse a stored role string. Anything unrecognised is treated as the
    /// assistant side of the conversation.
    pub fn from_str_lossy(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "system" => MessageRole::System,
            "user" | "human" => MessageRole::User,
            _ => MessageRole::Assistant,
        }
    }
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Sampling parameters sent with a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Sampling temperature. Lower is more deterministic.
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,

    /// Nucleus sampling cutoff.
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff (Gemini only).
    pub top_k: Option<u32>,

    /// Sequences that stop generation when encountered.
    pub stop_sequences: Vec<String>,
}

/// A chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub config: ChatConfig,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.config.top_k = Some(top_k);
        self
    }

    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.config.stop_sequences.push(stop.into());
        self
    }

    /// The system message, if the request carries one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl UsageMetadata {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A completed chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<UsageMetadata>,
    /// Provider-specific extras such as `model` and `finish_reason`.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatResponse {
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// A hosted chat model the router can send requests to.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a request and wait for the complete response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Which provider backs this model.
    fn provider(&self) -> ProviderKind;

    /// The configured model identifier.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = ChatRequest::new(vec![Message::system("sys"), Message::user("hi")])
            .with_temperature(0.3)
            .with_max_tokens(500)
            .with_top_p(0.95)
            .with_top_k(40)
            .with_stop_sequence("END");

        assert_eq!(request.config.temperature, Some(0.3));
        assert_eq!(request.config.max_tokens, Some(500));
        assert_eq!(request.config.top_p, Some(0.95));
        assert_eq!(request.config.top_k, Some(40));
        assert_eq!(request.config.stop_sequences, vec!["END".to_string()]);
        assert_eq!(request.system_prompt(), Some("sys"));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(MessageRole::from_str_lossy("user"), MessageRole::User);
        assert_eq!(MessageRole::from_str_lossy("SYSTEM"), MessageRole::System);
        assert_eq!(MessageRole::from_str_lossy("model"), MessageRole::Assistant);
        assert_eq!(MessageRole::from_str_lossy("assistant"), MessageRole::Assistant);
    }

    #[test]
    fn test_usage_total() {
        let usage = UsageMetadata::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::user("hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }
}
