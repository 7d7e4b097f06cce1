//! Chat message repository.

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{now_timestamp, ChatMessage};
use llm::MessageRole;
use serde::Serialize;
use sqlx::FromRow;

/// Assistant replies grouped by source label.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ModelCount {
    pub model: Option<String>,
    pub count: i64,
}

/// Messages per `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

pub struct ChatMessageRepository;

impl ChatMessageRepository {
    pub async fn create(
        pool: &DatabasePool,
        session_id: i64,
        role: MessageRole,
        content: &str,
        model: Option<&str>,
    ) -> DbResult<ChatMessage> {
        let message = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages (session_id, role, content, timestamp, model, is_starred)
             VALUES (?, ?, ?, ?, ?, 0)
             RETURNING *",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(now_timestamp())
        .bind(model)
        .fetch_one(pool)
        .await?;
        Ok(message)
    }

    /// Messages of a session in chronological order.
    pub async fn list_for_session(pool: &DatabasePool, session_id: i64) -> DbResult<Vec<ChatMessage>> {
        Ok(sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY timestamp, id",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?)
    }

    /// The last `limit` messages of a session, oldest first.
    pub async fn recent_history(
        pool: &DatabasePool,
        session_id: i64,
        limit: i64,
    ) -> DbResult<Vec<ChatMessage>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE session_id = ?
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn delete_for_session(pool: &DatabasePool, session_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn first_user_message(pool: &DatabasePool, session_id: i64) -> DbResult<Option<String>> {
        Ok(sqlx::query_scalar(
            "SELECT content FROM chat_messages WHERE session_id = ? AND role = 'user'
             ORDER BY timestamp, id LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?)
    }

    /// All messages of a user's sessions since `since` (a date or timestamp).
    pub async fn count_since(pool: &DatabasePool, user_id: i64, since: &str) -> DbResult<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_messages m
             JOIN chat_sessions s ON s.id = m.session_id
             WHERE s.user_id = ? AND m.timestamp >= ?",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await?)
    }

    /// Assistant replies since `since` grouped by source label.
    pub async fn model_usage(pool: &DatabasePool, user_id: i64, since: &str) -> DbResult<Vec<ModelCount>> {
        Ok(sqlx::query_as::<_, ModelCount>(
            "SELECT m.model AS model, COUNT(m.id) AS count FROM chat_messages m
             JOIN chat_sessions s ON s.id = m.session_id
             WHERE s.user_id = ? AND m.role = 'assistant' AND m.timestamp >= ?
             GROUP BY m.model
             ORDER BY count DESC, m.model",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await?)
    }

    /// Message counts per day since `since`, oldest first.
    pub async fn daily_activity(pool: &DatabasePool, user_id: i64, since: &str) -> DbResult<Vec<DailyCount>> {
        Ok(sqlx::query_as::<_, DailyCount>(
            "SELECT substr(m.timestamp, 1, 10) AS date, COUNT(m.id) AS count FROM chat_messages m
             JOIN chat_sessions s ON s.id = m.session_id
             WHERE s.user_id = ? AND m.timestamp >= ?
             GROUP BY date
             ORDER BY date",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::today_date;
    use crate::db::repositories::ChatSessionRepository;
    use crate::db::test_support::{database, user};

    #[tokio::test]
    async fn test_history_and_first_user_message() {
        let db = database().await;
        let ada = user(&db, "ada").await;
        let session = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();

        assert!(ChatMessageRepository::first_user_message(db.pool(), session.id)
            .await
            .unwrap()
            .is_none());

        for (role, content) in [
            (MessageRole::User, "first"),
            (MessageRole::Assistant, "reply one"),
            (MessageRole::User, "second"),
            (MessageRole::Assistant, "reply two"),
        ] {
            ChatMessageRepository::create(db.pool(), session.id, role, content, Some("gemini"))
                .await
                .unwrap();
        }

        let recent = ChatMessageRepository::recent_history(db.pool(), session.id, 2)
            .await
            .unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "reply two"]);
        assert_eq!(
            ChatMessageRepository::first_user_message(db.pool(), session.id)
                .await
                .unwrap()
                .as_deref(),
            Some("first")
        );

        assert_eq!(
            ChatMessageRepository::delete_for_session(db.pool(), session.id).await.unwrap(),
            4
        );
        assert!(ChatMessageRepository::list_for_session(db.pool(), session.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_usage_queries() {
        let db = database().await;
        let ada = user(&db, "ada").await;
        let bob = user(&db, "bob").await;
        let session = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();
        let other = ChatSessionRepository::create(db.pool(), bob.id).await.unwrap();

        for model in ["gemini", "gemini", "openai-fallback"] {
            ChatMessageRepository::create(db.pool(), session.id, MessageRole::User, "q", None)
                .await
                .unwrap();
            ChatMessageRepository::create(db.pool(), session.id, MessageRole::Assistant, "a", Some(model))
                .await
                .unwrap();
        }
        ChatMessageRepository::create(db.pool(), other.id, MessageRole::Assistant, "a", Some("openai"))
            .await
            .unwrap();

        let usage = ChatMessageRepository::model_usage(db.pool(), ada.id, "2000-01-01")
            .await
            .unwrap();
        assert_eq!(
            usage,
            vec![
                ModelCount { model: Some("gemini".into()), count: 2 },
                ModelCount { model: Some("openai-fallback".into()), count: 1 },
            ]
        );

        assert_eq!(ChatMessageRepository::count_since(db.pool(), ada.id, "2000-01-01").await.unwrap(), 6);
        let daily = ChatMessageRepository::daily_activity(db.pool(), ada.id, "2000-01-01")
            .await
            .unwrap();
        assert_eq!(daily, vec![DailyCount { date: today_date(), count: 6 }]);
    }
}
