use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::registry::{ConnectionId, OutboundEvent, PresenceRegistry};
use crate::{auth::CurrentUser, state::AppState};

/// Frames a client may send.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    Register(String),
}

pub fn parse_client_frame(text: &str) -> Option<ClientEvent> {
    match serde_json::from_str(text) {
        Ok(ev) => Some(ev),
        Err(e) => {
            debug!(error = %e, "ignoring unrecognised client frame");
            None
        }
    }
}

/// GET /ws
///
/// The handshake carries the same credential as the REST routes; a socket
/// may only register the user it authenticated as.
pub async fn ws_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let presence = state.presence.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, presence, user.id))
}

async fn handle_socket(socket: WebSocket, presence: Arc<dyn PresenceRegistry>, owner: Uuid) {
    let connection_id: ConnectionId = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEvent>();

    let _ = tx.send(OutboundEvent::connected());
    presence.attach(connection_id, tx).await;
    info!(%connection_id, user_id = %owner, "socket connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "failed to encode outbound event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_client_frame(presence.as_ref(), connection_id, owner, &text).await
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%connection_id, error = %e, "socket read error");
                break;
            }
        }
    }

    presence.unregister(connection_id).await;
    writer.abort();
    info!(%connection_id, "socket disconnected");
}

async fn handle_client_frame(
    presence: &dyn PresenceRegistry,
    connection_id: ConnectionId,
    owner: Uuid,
    text: &str,
) {
    let Some(ClientEvent::Register(raw)) = parse_client_frame(text) else {
        return;
    };
    match Uuid::parse_str(raw.trim()) {
        Ok(user_id) if user_id == owner => presence.register(user_id, connection_id).await,
        Ok(user_id) => {
            warn!(%connection_id, %owner, claimed = %user_id, "register for another user ignored")
        }
        Err(_) => warn!(%connection_id, user_id = %raw, "register with malformed user id"),
    }
}
