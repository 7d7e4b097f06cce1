//! User preference repository.

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{Theme, UserPreference};
use llm::ProviderKind;

pub struct UserPreferenceRepository;

impl UserPreferenceRepository {
    /// Preferences for a user, inserting the defaults on first access.
    pub async fn get_or_create(pool: &DatabasePool, user_id: i64) -> DbResult<UserPreference> {
        sqlx::query("INSERT OR IGNORE INTO user_preferences (user_id) VALUES (?)")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(
            sqlx::query_as::<_, UserPreference>("SELECT * FROM user_preferences WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await?,
        )
    }

    /// Update whichever fields are given.
    pub async fn update(
        pool: &DatabasePool,
        user_id: i64,
        theme: Option<Theme>,
        default_model: Option<ProviderKind>,
    ) -> DbResult<UserPreference> {
        let current = Self::get_or_create(pool, user_id).await?;
        let theme = theme.map(|t| t.as_str().to_string()).unwrap_or(current.theme);
        let default_model = default_model
            .map(|m| m.as_str().to_string())
            .unwrap_or(current.default_model);

        Ok(sqlx::query_as::<_, UserPreference>(
            "UPDATE user_preferences SET theme = ?, default_model = ? WHERE user_id = ? RETURNING *",
        )
        .bind(theme)
        .bind(default_model)
        .bind(user_id)
        .fetch_one(pool)
        .await?)
    }
}
