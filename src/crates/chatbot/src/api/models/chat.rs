use llm::{Message, MessageRole, ProviderKind};
use serde::{Deserialize, Serialize};

/// A prior turn supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn to_message(&self) -> Message {
        Message::new(MessageRole::from_str_lossy(&self.role), self.content.clone())
    }
}

/// Body of `POST /api/v1/chat` and of inbound WebSocket frames.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurnRequest {
    pub message: String,
    /// Prior turns, oldest first. The session's stored history is used
    /// when absent.
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub preferred_model: Option<ProviderKind>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub use_cache: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnResponse {
    pub response: String,
    /// Source label, e.g. `gemini`, `openai-fallback`, `sql-query`
    pub source: String,
    pub session_id: i64,
    pub message_id: i64,
    pub sheet_name: Option<String>,
    pub error: Option<String>,
}
