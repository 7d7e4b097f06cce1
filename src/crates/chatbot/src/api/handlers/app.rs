//! The chat page bootstrap and data refresh.

use axum::{extract::State, response::IntoResponse, Extension};
use serde_json::json;

use super::health::integration_status;
use super::sessions::{detail, summarize};
use crate::api::error::ApiResult;
use crate::api::models::AppIndexResponse;
use crate::api::{response, routes::AppState};
use crate::db::models::User;
use crate::db::repositories::{ChatSessionRepository, UserPreferenceRepository};

const PREVIOUS_SESSIONS: i64 = 10;

/// GET /api/v1/app
///
/// Sheet names, the active session (created when missing), recent
/// sessions and preferences.
pub async fn app_index(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db.pool();
    let active = ChatSessionRepository::get_or_create_active(pool, user.id).await?;

    let mut previous_sessions = Vec::new();
    for session in ChatSessionRepository::list_previous(pool, user.id, PREVIOUS_SESSIONS).await? {
        previous_sessions.push(summarize(pool, &session).await?);
    }

    Ok(response::ok(AppIndexResponse {
        sheet_names: state.chatbot.sheets().available_sheet_names(),
        data_source: integration_status(&state).data_source,
        active_session: detail(pool, &active).await?,
        previous_sessions,
        preferences: UserPreferenceRepository::get_or_create(pool, user.id).await?,
    }))
}

/// POST /api/v1/data/refresh
pub async fn refresh_data(State(state): State<AppState>) -> impl IntoResponse {
    state.chatbot.clear_cache();
    response::ok(json!({ "message": "Data caches cleared" }))
}
