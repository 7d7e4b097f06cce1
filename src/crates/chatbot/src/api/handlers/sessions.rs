//! Chat session management.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::middleware::normalize_pagination;
use crate::api::models::{
    ResetSessionResponse, SessionDetail, SessionListQuery, SessionSummary, SessionTranscript,
    SwitchSessionRequest,
};
use crate::api::response::{self, PaginatedResponse};
use crate::api::routes::AppState;
use crate::db::models::{now_timestamp, ChatSession, User};
use crate::db::repositories::{ChatMessageRepository, ChatSessionRepository};
use crate::db::{DatabasePool, DbResult};

pub(crate) async fn summarize(pool: &DatabasePool, session: &ChatSession) -> DbResult<SessionSummary> {
    let first = ChatMessageRepository::first_user_message(pool, session.id).await?;
    let count = ChatSessionRepository::message_count(pool, session.id).await?;
    Ok(SessionSummary::new(session, first.as_deref(), count))
}

pub(crate) async fn detail(pool: &DatabasePool, session: &ChatSession) -> DbResult<SessionDetail> {
    Ok(SessionDetail {
        session: summarize(pool, session).await?,
        messages: ChatMessageRepository::list_for_session(pool, session.id).await?,
    })
}

async fn owned_session(state: &AppState, user: &User, id: i64) -> ApiResult<ChatSession> {
    ChatSessionRepository::get(state.db.pool(), id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Chat session {} not found", id)))
}

/// GET /api/v1/sessions?page=&per_page=
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, per_page) = normalize_pagination(query.page, query.per_page)?;
    let pool = state.db.pool();
    let offset = i64::from(page - 1) * i64::from(per_page);

    let sessions = ChatSessionRepository::list_for_user(pool, user.id, i64::from(per_page), offset).await?;
    let total = ChatSessionRepository::count_for_user(pool, user.id).await?;

    let mut summaries = Vec::with_capacity(sessions.len());
    for session in &sessions {
        summaries.push(summarize(pool, session).await?);
    }
    Ok(Json(PaginatedResponse::new(
        summaries,
        page,
        per_page,
        total.max(0) as u64,
    )))
}

/// POST /api/v1/sessions
///
/// Starts a fresh conversation and deactivates every other session.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db.pool();
    let session = ChatSessionRepository::create(pool, user.id).await?;
    ChatSessionRepository::deactivate_others(pool, user.id, Some(session.id)).await?;
    info!(user_id = user.id, session_id = session.id, "Created chat session");
    Ok(response::created(summarize(pool, &session).await?))
}

/// POST /api/v1/sessions/switch
pub async fn switch_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<SwitchSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = owned_session(&state, &user, payload.session_id).await?;
    let pool = state.db.pool();
    ChatSessionRepository::activate(pool, session.id, user.id).await?;
    let session = owned_session(&state, &user, session.id).await?;
    Ok(response::ok(detail(pool, &session).await?))
}

/// POST /api/v1/sessions/reset
///
/// Clears the active conversation in place.
pub async fn reset_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db.pool();
    let session = ChatSessionRepository::get_or_create_active(pool, user.id).await?;
    let deleted_messages = ChatMessageRepository::delete_for_session(pool, session.id).await?;
    ChatSessionRepository::set_title(pool, session.id, None).await?;
    info!(session_id = session.id, deleted_messages, "Reset chat session");
    Ok(response::ok(ResetSessionResponse {
        session_id: session.id,
        deleted_messages,
    }))
}

/// GET /api/v1/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = owned_session(&state, &user, id).await?;
    Ok(response::ok(detail(state.db.pool(), &session).await?))
}

/// DELETE /api/v1/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if !ChatSessionRepository::delete(state.db.pool(), id, user.id).await? {
        return Err(ApiError::NotFound(format!("Chat session {} not found", id)));
    }
    info!(user_id = user.id, session_id = id, "Deleted chat session");
    Ok(response::no_content())
}

/// GET /api/v1/sessions/:id/messages
pub async fn session_messages(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = owned_session(&state, &user, id).await?;
    let messages = ChatMessageRepository::list_for_session(state.db.pool(), session.id).await?;
    Ok(response::ok(messages))
}

/// GET /api/v1/sessions/:id/export
///
/// The transcript as a JSON attachment.
pub async fn export_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = owned_session(&state, &user, id).await?;
    let detail = detail(state.db.pool(), &session).await?;
    let transcript = SessionTranscript {
        session_id: session.id,
        title: detail.session.title,
        created_at: session.created_at.clone(),
        exported_at: now_timestamp(),
        messages: detail.messages,
    };
    let disposition = format!("attachment; filename=\"chat_session_{}.json\"", session.id);
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(transcript)))
}
