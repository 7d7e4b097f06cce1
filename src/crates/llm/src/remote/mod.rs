//! Hosted provider implementations.
//!
//! # Providers
//!
//! - **OpenAI** - chat completions endpoint with bearer authentication
//! - **Gemini** - `generateContent` endpoint with key query parameter

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
