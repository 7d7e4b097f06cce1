//! Chat session model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const TITLE_PREVIEW_CHARS: usize = 30;

/// A conversation owned by one user. At most one session per user is
/// active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_active: bool,
}

impl ChatSession {
    /// The explicit title, else the first user message cut to 30
    /// characters, else `Chat {id}`.
    pub fn display_title(&self, first_user_message: Option<&str>) -> String {
        display_title(self.id, self.title.as_deref(), first_user_message)
    }
}

pub fn display_title(id: i64, title: Option<&str>, first_user_message: Option<&str>) -> String {
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    match first_user_message {
        Some(message) => {
            let mut title: String = message.chars().take(TITLE_PREVIEW_CHARS).collect();
            if message.chars().count() > TITLE_PREVIEW_CHARS {
                title.push_str("...");
            }
            title
        }
        None => format!("Chat {}", id),
    }
}
