//! User preferences.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use llm::ProviderKind;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::UpdatePreferencesRequest;
use crate::api::{response, routes::AppState};
use crate::db::models::{Theme, User};
use crate::db::repositories::UserPreferenceRepository;

/// PUT /api/v1/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> ApiResult<impl IntoResponse> {
    let theme = payload
        .theme
        .as_deref()
        .map(str::parse::<Theme>)
        .transpose()
        .map_err(ApiError::ValidationError)?;
    let default_model = payload
        .default_model
        .as_deref()
        .map(str::parse::<ProviderKind>)
        .transpose()
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let preferences =
        UserPreferenceRepository::update(state.db.pool(), user.id, theme, default_model).await?;
    Ok(response::ok(preferences))
}
