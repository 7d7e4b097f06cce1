use llm::MessageRole;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored chat message. `model` holds the response source label for
/// assistant messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub model: Option<String>,
    pub is_starred: bool,
}

impl ChatMessage {
    pub fn role(&self) -> MessageRole {
        MessageRole::from_str_lossy(&self.role)
    }

    /// Convert to a provider message for conversation history.
    pub fn to_llm_message(&self) -> llm::Message {
        llm::Message::new(self.role(), self.content.clone())
    }
}
