//! Registration, login and the current user.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde_json::json;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{LoginRequest, RegisterRequest, TokenResponse};
use crate::api::{response, routes::AppState};
use crate::auth::{hash_password, validate_registration, verify_password, AuthError};
use crate::db::models::User;
use crate::db::repositories::{UserPreferenceRepository, UserRepository};

fn token_response(state: &AppState, user: User) -> ApiResult<TokenResponse> {
    let token = state.auth.issue_token(user.id, &user.username)?;
    Ok(TokenResponse::bearer(
        token,
        state.auth.expires_in().as_secs(),
        user,
    ))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = payload.username.trim();
    validate_registration(username, &payload.password).map_err(ApiError::ValidationError)?;

    let pool = state.db.pool();
    if UserRepository::exists(pool, username).await? {
        return Err(ApiError::Conflict(format!("Username '{}' is already taken", username)));
    }

    let password_hash = hash_password(&payload.password)?;
    let email = payload.email.as_deref().unwrap_or("").trim();
    let user = UserRepository::create(pool, username, email, &password_hash, false).await?;
    UserPreferenceRepository::update(pool, user.id, None, Some(state.chat.default_model)).await?;

    info!(user_id = user.id, username = %user.username, "Registered user");
    Ok(response::created(token_response(&state, user)?))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = UserRepository::get_by_username(state.db.pool(), payload.username.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&payload.password, &user.password_hash)?;

    info!(user_id = user.id, "User logged in");
    Ok(response::ok(token_response(&state, user)?))
}

/// POST /api/v1/auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(Extension(user): Extension<User>) -> impl IntoResponse {
    info!(user_id = user.id, "User logged out");
    response::ok(json!({ "message": "Logged out" }))
}

/// GET /api/v1/auth/me
pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    response::ok(user)
}
