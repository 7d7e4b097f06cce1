//! WebSocket chat handler

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::rooms::{ChatRooms, RoomEvent};
use crate::api::error::ApiResult;
use crate::api::handlers::chat::run_chat_turn;
use crate::api::middleware::auth::authenticate;
use crate::api::models::ChatTurnRequest;
use crate::api::routes::AppState;
use crate::auth::AuthError;
use crate::db::models::User;

#[derive(Debug, Default, Deserialize)]
pub struct SocketAuth {
    pub token: Option<String>,
}

/// GET /ws/chat/:room?token=
///
/// Browsers cannot set headers on WebSocket requests, so the token travels
/// in the query string. Invalid tokens are rejected before the upgrade.
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(auth): Query<SocketAuth>,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let token = auth
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthorized)?;
    let user = authenticate(&state, token).await?;
    let group = ChatRooms::group_name(&room);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user, group)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User, group: String) {
    let (mut sender, mut receiver) = socket.split();
    let room = state.rooms.join(&group);
    let mut events = room.subscribe();
    info!(group = %group, user_id = user.id, "WebSocket client joined");

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let turn_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_frame(&turn_state, &user, &room, &text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "WebSocket receive failed");
                    break;
                }
            }
        }
    });

    // The aborted task is awaited so its receiver is dropped before leaving.
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    state.rooms.leave(&group);
    info!(group = %group, "WebSocket client left");
}

/// One inbound chat message: typing on, answer, typing off.
async fn handle_frame(
    state: &AppState,
    user: &User,
    room: &broadcast::Sender<RoomEvent>,
    text: &str,
) {
    let _ = room.send(RoomEvent::typing(true));

    let event = match serde_json::from_str::<ChatTurnRequest>(text) {
        Ok(request) => match run_chat_turn(state, user, request).await {
            Ok(turn) => RoomEvent::Message {
                sender: "assistant".to_string(),
                message: turn.response,
                source: turn.source,
                message_id: Some(turn.message_id),
                sheet_name: turn.sheet_name,
            },
            Err(e) => {
                warn!(error = %e, "WebSocket chat turn failed");
                RoomEvent::error(e)
            }
        },
        Err(e) => RoomEvent::error(format!("invalid message: {}", e)),
    };

    let _ = room.send(event);
    let _ = room.send(RoomEvent::typing(false));
}
