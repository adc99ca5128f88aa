//! Realtime delivery of chat mutations over WebSocket.
//!
//! Clients open `GET /ws`, send `{"event":"register","data":"<user id>"}`,
//! then receive `{"event":"message","data":{"action":..,"data":..}}` frames.

pub mod registry;
pub mod socket;

use crate::state::AppState;
use axum::{routing::get, Router};

pub use registry::{notify_users, DispatchAction, InMemoryPresence, PresenceRegistry};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(socket::ws_handler))
}
