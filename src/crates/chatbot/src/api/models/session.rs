use serde::{Deserialize, Serialize};

use crate::db::models::{ChatMessage, ChatSession, UserPreference};

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_active: bool,
    pub message_count: i64,
}

impl SessionSummary {
    pub fn new(session: &ChatSession, first_user_message: Option<&str>, message_count: i64) -> Self {
        Self {
            id: session.id,
            title: session.display_title(first_user_message),
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
            is_active: session.is_active,
            message_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionSummary,
    pub messages: Vec<ChatMessage>,
}

/// Downloadable copy of a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTranscript {
    pub session_id: i64,
    pub title: String,
    pub created_at: String,
    pub exported_at: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchSessionRequest {
    pub session_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetSessionResponse {
    pub session_id: i64,
    pub deleted_messages: u64,
}

/// Everything the chat page needs on load.
#[derive(Debug, Clone, Serialize)]
pub struct AppIndexResponse {
    pub sheet_names: Vec<String>,
    pub data_source: String,
    pub active_session: SessionDetail,
    pub previous_sessions: Vec<SessionSummary>,
    pub preferences: UserPreference,
}
