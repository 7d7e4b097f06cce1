//! Chat session repository.

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{now_timestamp, ChatSession};
use serde::Serialize;
use sqlx::FromRow;

/// A session with its message count.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SessionActivity {
    pub id: i64,
    pub title: Option<String>,
    pub created_at: String,
    pub message_count: i64,
}

pub struct ChatSessionRepository;

impl ChatSessionRepository {
    /// Create an active session.
    pub async fn create(pool: &DatabasePool, user_id: i64) -> DbResult<ChatSession> {
        let now = now_timestamp();
        let session = sqlx::query_as::<_, ChatSession>(
            "INSERT INTO chat_sessions (user_id, title, created_at, updated_at, is_active)
             VALUES (?, NULL, ?, ?, 1)
             RETURNING *",
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await?;
        Ok(session)
    }

    /// A session owned by `user_id`.
    pub async fn get(pool: &DatabasePool, id: i64, user_id: i64) -> DbResult<Option<ChatSession>> {
        Ok(sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
    }

    /// All sessions of a user, most recently updated first.
    pub async fn list_for_user(
        pool: &DatabasePool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<ChatSession>> {
        Ok(sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE user_id = ?
             ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?)
    }

    pub async fn count_for_user(pool: &DatabasePool, user_id: i64) -> DbResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await?,
        )
    }

    pub async fn count_created_since(pool: &DatabasePool, user_id: i64, since: &str) -> DbResult<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_sessions WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await?)
    }

    /// Inactive sessions, most recently updated first.
    pub async fn list_previous(
        pool: &DatabasePool,
        user_id: i64,
        limit: i64,
    ) -> DbResult<Vec<ChatSession>> {
        Ok(sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE user_id = ? AND is_active = 0
             ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?)
    }

    pub async fn active_session(pool: &DatabasePool, user_id: i64) -> DbResult<Option<ChatSession>> {
        Ok(sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE user_id = ? AND is_active = 1
             ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
    }

    /// The active session, created when there is none.
    pub async fn get_or_create_active(pool: &DatabasePool, user_id: i64) -> DbResult<ChatSession> {
        match Self::active_session(pool, user_id).await? {
            Some(session) => Ok(session),
            None => Self::create(pool, user_id).await,
        }
    }

    /// Deactivate every active session of a user except `keep`.
    pub async fn deactivate_others(
        pool: &DatabasePool,
        user_id: i64,
        keep: Option<i64>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE chat_sessions SET is_active = 0
             WHERE user_id = ? AND is_active = 1 AND id != ?",
        )
        .bind(user_id)
        .bind(keep.unwrap_or(-1))
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Make `id` the only active session of its owner.
    pub async fn activate(pool: &DatabasePool, id: i64, user_id: i64) -> DbResult<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE chat_sessions SET is_active = 0 WHERE user_id = ? AND id != ?")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE chat_sessions SET is_active = 1, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(now_timestamp())
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Bump `updated_at`.
    pub async fn touch(pool: &DatabasePool, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_title(pool: &DatabasePool, id: i64, title: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE chat_sessions SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(now_timestamp())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete a session and its messages. Returns whether it existed.
    pub async fn delete(pool: &DatabasePool, id: i64, user_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn message_count(pool: &DatabasePool, id: i64) -> DbResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE session_id = ?")
                .bind(id)
                .fetch_one(pool)
                .await?,
        )
    }

    /// Sessions created since `since`, ordered by message count.
    pub async fn most_active(
        pool: &DatabasePool,
        user_id: i64,
        since: &str,
        limit: i64,
    ) -> DbResult<Vec<SessionActivity>> {
        Ok(sqlx::query_as::<_, SessionActivity>(
            "SELECT s.id, s.title, s.created_at, COUNT(m.id) AS message_count
             FROM chat_sessions s
             LEFT JOIN chat_messages m ON m.session_id = s.id
             WHERE s.user_id = ? AND s.created_at >= ?
             GROUP BY s.id
             ORDER BY message_count DESC, s.id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::ChatMessageRepository;
    use crate::db::test_support::{database, user};
    use llm::MessageRole;

    #[tokio::test]
    async fn test_get_or_create_active() {
        let db = database().await;
        let ada = user(&db, "ada").await;

        let first = ChatSessionRepository::get_or_create_active(db.pool(), ada.id).await.unwrap();
        let again = ChatSessionRepository::get_or_create_active(db.pool(), ada.id).await.unwrap();
        assert_eq!(first.id, again.id);
        assert!(first.is_active);
    }

    #[tokio::test]
    async fn test_activate_leaves_single_active_session() {
        let db = database().await;
        let ada = user(&db, "ada").await;

        let a = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();
        ChatSessionRepository::deactivate_others(db.pool(), ada.id, None).await.unwrap();
        let b = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();
        assert_eq!(
            ChatSessionRepository::active_session(db.pool(), ada.id).await.unwrap().unwrap().id,
            b.id
        );

        ChatSessionRepository::activate(db.pool(), a.id, ada.id).await.unwrap();
        let active = ChatSessionRepository::active_session(db.pool(), ada.id).await.unwrap().unwrap();
        assert_eq!(active.id, a.id);
        let previous = ChatSessionRepository::list_previous(db.pool(), ada.id, 10).await.unwrap();
        assert_eq!(previous.iter().map(|s| s.id).collect::<Vec<_>>(), vec![b.id]);
    }

    #[tokio::test]
    async fn test_sessions_are_scoped_to_owner() {
        let db = database().await;
        let ada = user(&db, "ada").await;
        let bob = user(&db, "bob").await;
        let session = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();

        assert!(ChatSessionRepository::get(db.pool(), session.id, bob.id).await.unwrap().is_none());
        assert!(!ChatSessionRepository::delete(db.pool(), session.id, bob.id).await.unwrap());
        assert!(ChatSessionRepository::delete(db.pool(), session.id, ada.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_and_most_active() {
        let db = database().await;
        let ada = user(&db, "ada").await;
        let quiet = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();
        let busy = ChatSessionRepository::create(db.pool(), ada.id).await.unwrap();
        for _ in 0..3 {
            ChatMessageRepository::create(db.pool(), busy.id, MessageRole::User, "hi", None)
                .await
                .unwrap();
        }

        let ranked = ChatSessionRepository::most_active(db.pool(), ada.id, "2000-01-01", 5)
            .await
            .unwrap();
        assert_eq!(ranked[0].id, busy.id);
        assert_eq!(ranked[0].message_count, 3);
        assert_eq!(ranked[1].id, quiet.id);
        assert_eq!(ranked[1].message_count, 0);

        ChatSessionRepository::delete(db.pool(), busy.id, ada.id).await.unwrap();
        assert_eq!(ChatSessionRepository::message_count(db.pool(), busy.id).await.unwrap(), 0);
    }
}
