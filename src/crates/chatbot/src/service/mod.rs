//! Chat turn orchestration.

pub mod chatbot;

pub use chatbot::{ChatQuery, ChatReply, ChatbotService};
