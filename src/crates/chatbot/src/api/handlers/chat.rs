//! The chat turn.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use llm::{Message, MessageRole};
use tracing::{info, warn};

use crate::api::error::ApiResult;
use crate::api::middleware::validate_not_empty;
use crate::api::models::{ChatTurnRequest, ChatTurnResponse};
use crate::api::{response, routes::AppState};
use crate::db::models::User;
use crate::db::repositories::{
    ChatAnalyticsRepository, ChatMessageRepository, ChatSessionRepository, UserPreferenceRepository,
};
use crate::service::ChatQuery;

/// Persist the prompt, answer it, persist the answer and count it.
///
/// Shared by `POST /api/v1/chat` and the WebSocket chat.
pub(crate) async fn run_chat_turn(
    state: &AppState,
    user: &User,
    request: ChatTurnRequest,
) -> ApiResult<ChatTurnResponse> {
    validate_not_empty(&request.message, "Message")?;
    let pool = state.db.pool();
    let limit = state.chat.history_limit;

    let session = ChatSessionRepository::get_or_create_active(pool, user.id).await?;

    let history: Vec<Message> = match &request.history {
        Some(entries) => {
            let skip = entries.len().saturating_sub(limit);
            entries[skip..].iter().map(|e| e.to_message()).collect()
        }
        None => ChatMessageRepository::recent_history(pool, session.id, limit as i64)
            .await?
            .iter()
            .map(|m| m.to_llm_message())
            .collect(),
    };

    ChatMessageRepository::create(pool, session.id, MessageRole::User, &request.message, None).await?;

    let preferred_model = match request.preferred_model {
        Some(model) => model,
        None => UserPreferenceRepository::get_or_create(pool, user.id)
            .await?
            .default_provider(),
    };

    let mut query = ChatQuery::new(request.message.trim(), preferred_model)
        .with_history(history)
        .with_sheet(request.sheet_name.clone())
        .with_cache(request.use_cache.unwrap_or(true));
    if let Some(context) = request.context.clone() {
        query = query.with_context(context);
    }

    let reply = state.chatbot.get_response(query).await;
    let source = reply.source.label();
    if let Some(error) = &reply.error {
        warn!(session_id = session.id, source = %source, error = %error, "Chat turn answered with an error");
    }

    let stored = ChatMessageRepository::create(
        pool,
        session.id,
        MessageRole::Assistant,
        &reply.response,
        Some(&source),
    )
    .await?;
    ChatSessionRepository::touch(pool, session.id).await?;
    ChatAnalyticsRepository::record_message(pool, user.id, &source).await?;

    info!(
        user_id = user.id,
        session_id = session.id,
        source = %source,
        "Chat turn complete"
    );

    Ok(ChatTurnResponse {
        response: reply.response,
        source,
        session_id: session.id,
        message_id: stored.id,
        sheet_name: reply.sheet_name,
        error: reply.error,
    })
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ChatTurnRequest>,
) -> ApiResult<impl IntoResponse> {
    let turn = run_chat_turn(&state, &user, request).await?;
    Ok(response::ok(turn))
}
