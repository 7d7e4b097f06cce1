use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user, per-day message counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatAnalytics {
    pub id: i64,
    pub user_id: i64,
    /// `YYYY-MM-DD`
    pub date: String,
    pub messages_sent: i64,
    pub gemini_requests: i64,
    pub openai_requests: i64,
}
