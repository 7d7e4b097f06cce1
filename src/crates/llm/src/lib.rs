//! Chat model providers for project-chat.
//!
//! This crate defines the [`ChatModel`] trait that the orchestration layer
//! talks to, plus HTTP clients for the two hosted providers the chatbot can
//! route between:
//! - **OpenAI** - chat completions API (`gpt-4o-mini` by default)
//! - **Gemini** - Google Generative Language API (`gemini-2.5-flash` by default)
//!
//! Both clients map provider failures onto [`LlmError`], whose classification
//! helpers (`is_retryable`, `is_auth_error`, `is_rate_limit`) drive the retry
//! and fallback decisions made by callers.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::{ChatModel, ChatRequest, Message, RemoteLlmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteLlmConfig::from_env(
//!         "OPENAI_API_KEY",
//!         "https://api.openai.com/v1",
//!         "gpt-4o-mini",
//!     )?;
//!     let client = OpenAiClient::new(config)?;
//!
//!     let request = ChatRequest::new(vec![
//!         Message::system("You answer questions about project data."),
//!         Message::user("Which projects are over budget?"),
//!     ])
//!     .with_temperature(0.3)
//!     .with_max_tokens(500);
//!
//!     let response = client.chat(request).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod provider_utils;
pub mod remote;

pub use config::{RemoteLlmConfig, GEMINI_BASE_URL, OPENAI_BASE_URL};
pub use error::{LlmError, Result};
pub use model::{
    ChatConfig, ChatModel, ChatRequest, ChatResponse, Message, MessageRole, UsageMetadata,
};
pub use provider::ProviderKind;
pub use provider_utils::{ModelInfo, ProviderUtils};
