//! Project data chatbot.
//!
//! Answers natural-language questions about project data held in Google
//! Sheets or a SQL database by routing each prompt to a preferred chat
//! provider (OpenAI or Gemini). Failed calls are retried with exponential
//! backoff and then handed to the alternate provider, and every reply is
//! attributed to the provider that actually produced it.
//!
//! Layers, bottom-up:
//! - [`executor`] - retry policy and the dual-provider [`executor::ModelRouter`]
//! - [`intent`], [`prompt`] - prompt classification and prompt construction
//! - [`datasource`], [`search`] - Sheets/SQL data and Google Custom Search
//! - [`service`] - the chat pipeline tying the above together
//! - [`db`], [`analytics`], [`dashboard`] - persistence and reporting
//! - [`api`] - axum HTTP and WebSocket surface

pub mod analytics;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod datasource;
pub mod db;
pub mod executor;
pub mod intent;
pub mod prompt;
pub mod search;
pub mod service;
pub mod version;

use thiserror::Error;

/// Errors surfaced by the chatbot services.
#[derive(Debug, Error)]
pub enum ChatbotError {
    /// Provider call failed
    #[error(transparent)]
    Llm(#[from] llm::LlmError),

    /// Application database failure
    #[error(transparent)]
    Database(#[from] db::DatabaseError),

    /// Google Sheets failure
    #[error(transparent)]
    Sheets(#[from] datasource::SheetsError),

    /// SQL data source failure
    #[error(transparent)]
    Sql(#[from] datasource::SqlClientError),

    /// Web search failure
    #[error(transparent)]
    Search(#[from] search::SearchError),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Misconfiguration detected at runtime
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for chatbot operations
pub type Result<T> = std::result::Result<T, ChatbotError>;
