//! Daily chat analytics repository.

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{today_date, ChatAnalytics};

pub struct ChatAnalyticsRepository;

impl ChatAnalyticsRepository {
    /// Count one message for today. Sources starting with `gemini` or
    /// `openai` also bump that provider's request counter.
    pub async fn record_message(pool: &DatabasePool, user_id: i64, source: &str) -> DbResult<ChatAnalytics> {
        let gemini = i64::from(source.starts_with("gemini"));
        let openai = i64::from(source.starts_with("openai"));

        Ok(sqlx::query_as::<_, ChatAnalytics>(
            "INSERT INTO chat_analytics (user_id, date, messages_sent, gemini_requests, openai_requests)
             VALUES (?, ?, 1, ?, ?)
             ON CONFLICT (user_id, date) DO UPDATE SET
                 messages_sent = messages_sent + 1,
                 gemini_requests = gemini_requests + excluded.gemini_requests,
                 openai_requests = openai_requests + excluded.openai_requests
             RETURNING *",
        )
        .bind(user_id)
        .bind(today_date())
        .bind(gemini)
        .bind(openai)
        .fetch_one(pool)
        .await?)
    }

    /// Rows on or after `since` (`YYYY-MM-DD`), oldest first.
    pub async fn list_since(pool: &DatabasePool, user_id: i64, since: &str) -> DbResult<Vec<ChatAnalytics>> {
        Ok(sqlx::query_as::<_, ChatAnalytics>(
            "SELECT * FROM chat_analytics WHERE user_id = ? AND date >= ? ORDER BY date",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await?)
    }
}
