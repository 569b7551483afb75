//! Socket endpoint: presence on connect/disconnect and channel joins.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::api::middleware::{authenticate, AuthUser};
use crate::api::state::AppState;
use crate::db::GroupRepository;
use crate::error::AppError;
use crate::hub::{Channel, ConnectionId};

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: String,
}

/// Requests a client may send once connected.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinUser {
        #[serde(rename = "userId")]
        user_id: i64,
    },
    JoinGroup {
        #[serde(rename = "groupId")]
        group_id: i64,
    },
}

impl ClientMessage {
    pub fn channel(&self) -> Channel {
        match self {
            ClientMessage::JoinUser { user_id } => Channel::User(*user_id),
            ClientMessage::JoinGroup { group_id } => Channel::Group(*group_id),
        }
    }
}

/// GET /api/socket?token=<session token>
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &query.token).await?;
    Ok(ws.on_upgrade(move |socket| socket_connection(socket, state, user)))
}

async fn socket_connection(mut socket: WebSocket, state: AppState, AuthUser(user_id): AuthUser) {
    let (connection, mut events) = state.hub.connect(user_id).await;

    if let Err(e) = state.presence.connected(user_id).await {
        tracing::error!("❌ Failed to mark user {} online: {}", user_id, e);
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(json) => {
                        if socket.send(WsMessage::Text(json)).await.is_err() {
                            break; // client disconnected
                        }
                    }
                    // Hub shut down
                    None => {
                        let _ = socket.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_text(&state, connection, user_id, &text).await;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = socket.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Socket of user {} errored: {}", user_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.hub.disconnect(connection).await;
    if let Err(e) = state.presence.disconnected(user_id).await {
        tracing::error!("❌ Failed to mark user {} offline: {}", user_id, e);
    }
}

async fn handle_client_text(state: &AppState, connection: ConnectionId, user_id: i64, text: &str) {
    let request = match serde_json::from_str::<ClientMessage>(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("Ignoring malformed socket request {:?}: {}", text, e);
            return;
        }
    };

    match may_join(state, user_id, &request).await {
        Ok(true) => {
            state.hub.join(connection, request.channel()).await;
        }
        Ok(false) => {
            tracing::warn!("⚠️ User {} may not join {}", user_id, request.channel());
        }
        Err(e) => {
            tracing::error!("❌ Could not authorize join of {} for user {}: {}", request.channel(), user_id, e);
        }
    }
}

/// Group channels carry message payloads, so only members may join them.
/// User channels only carry presence for anyone but their owner.
async fn may_join(state: &AppState, user_id: i64, request: &ClientMessage) -> Result<bool, AppError> {
    match request {
        ClientMessage::JoinUser { .. } => Ok(true),
        ClientMessage::JoinGroup { group_id } => {
            GroupRepository::is_member(&state.db, *group_id, user_id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_requests() {
        let user: ClientMessage = serde_json::from_str(r#"{"type":"join_user","userId":7}"#).unwrap();
        assert_eq!(user.channel(), Channel::User(7));

        let group: ClientMessage =
            serde_json::from_str(r#"{"type":"join_group","groupId":5}"#).unwrap();
        assert_eq!(group.channel(), Channel::Group(5));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"leave","userId":7}"#).is_err());
    }
}
