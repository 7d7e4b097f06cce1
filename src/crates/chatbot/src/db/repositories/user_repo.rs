//! User repository.

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{now_timestamp, User};

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &DatabasePool,
        username: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, is_admin, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(is_admin)
        .bind(now_timestamp())
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    pub async fn get_by_id(pool: &DatabasePool, id: i64) -> DbResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    pub async fn get_by_username(pool: &DatabasePool, username: &str) -> DbResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?)
    }

    pub async fn exists(pool: &DatabasePool, username: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::database;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = database().await;
        let user = UserRepository::create(db.pool(), "ada", "ada@example.com", "hash", true)
            .await
            .unwrap();
        assert!(user.is_admin);

        let found = UserRepository::get_by_username(db.pool(), "ada").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(UserRepository::exists(db.pool(), "ada").await.unwrap());
        assert!(UserRepository::get_by_id(db.pool(), 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_constraint_violation() {
        let db = database().await;
        UserRepository::create(db.pool(), "ada", "", "hash", false).await.unwrap();
        let err = UserRepository::create(db.pool(), "ada", "", "hash", false)
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
