use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier of one live socket.
pub type ConnectionId = Uuid;

/// Name of the event carrying chat mutations.
pub const MESSAGE_EVENT: &str = "message";

/// A frame queued for a single connection's writer task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    pub event: String,
    pub data: Value,
}

impl OutboundEvent {
    pub fn connected() -> Self {
        Self {
            event: "connected".into(),
            data: json!({ "message": "Connection established" }),
        }
    }
}

/// Mutation kind carried in the `{action, data}` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchAction {
    Post,
    Put,
    Delete,
}

/// Maps users to their live connection and pushes events to them.
///
/// One connection per user: the latest `register` wins. Delivery is best
/// effort; nothing is queued for users who are not connected.
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Makes a freshly opened socket reachable under `connection_id`.
    async fn attach(&self, connection_id: ConnectionId, tx: UnboundedSender<OutboundEvent>);

    async fn register(&self, user_id: Uuid, connection_id: ConnectionId);

    /// Drops the connection and whichever user entry points at it.
    async fn unregister(&self, connection_id: ConnectionId);

    async fn dispatch(&self, user_id: Uuid, event: &str, action: DispatchAction, payload: Value);
}

/// Process-local registry. Not shared between instances.
#[derive(Default)]
pub struct InMemoryPresence {
    users: DashMap<Uuid, ConnectionId>,
    connections: DashMap<ConnectionId, UnboundedSender<OutboundEvent>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn online_users(&self) -> usize {
        self.users.len()
    }

    #[cfg(test)]
    pub fn connection_of(&self, user_id: Uuid) -> Option<ConnectionId> {
        self.users.get(&user_id).map(|e| *e.value())
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresence {
    async fn attach(&self, connection_id: ConnectionId, tx: UnboundedSender<OutboundEvent>) {
        self.connections.insert(connection_id, tx);
        debug!(%connection_id, "connection attached");
    }

    async fn register(&self, user_id: Uuid, connection_id: ConnectionId) {
        if let Some(previous) = self.users.insert(user_id, connection_id) {
            if previous != connection_id {
                debug!(%user_id, %previous, %connection_id, "registration replaced");
            }
        }
        debug!(%user_id, %connection_id, "user registered");
    }

    async fn unregister(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        let owner = self
            .users
            .iter()
            .find(|entry| *entry.value() == connection_id)
            .map(|entry| *entry.key());
        if let Some(user_id) = owner {
            // Only remove if the entry was not re-registered meanwhile.
            self.users.remove_if(&user_id, |_, c| *c == connection_id);
            debug!(%user_id, %connection_id, "user unregistered");
        }
    }

    async fn dispatch(&self, user_id: Uuid, event: &str, action: DispatchAction, payload: Value) {
        let Some(connection_id) = self.users.get(&user_id).map(|e| *e.value()) else {
            debug!(%user_id, event, "recipient offline, dropping event");
            return;
        };
        let Some(tx) = self.connections.get(&connection_id).map(|e| e.value().clone()) else {
            debug!(%user_id, %connection_id, "connection gone, dropping event");
            return;
        };

        let frame = OutboundEvent {
            event: event.to_string(),
            data: json!({ "action": action, "data": payload }),
        };
        if tx.send(frame).is_err() {
            debug!(%user_id, %connection_id, "connection closed before delivery");
        }
    }
}

/// Serialises `payload` and dispatches a `message` event to each recipient.
pub async fn notify_users<T: Serialize>(
    presence: &dyn PresenceRegistry,
    recipients: impl IntoIterator<Item = Uuid>,
    action: DispatchAction,
    payload: &T,
) {
    let value = match serde_json::to_value(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to serialise realtime payload");
            return;
        }
    };
    for user_id in recipients {
        presence
            .dispatch(user_id, MESSAGE_EVENT, action, value.clone())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn connect(
        registry: &InMemoryPresence,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.attach(id, tx).await;
        (id, rx)
    }

    #[tokio::test]
    async fn dispatch_reaches_registered_user() {
        let registry = InMemoryPresence::new();
        let user = Uuid::new_v4();
        let (conn, mut rx) = connect(&registry).await;
        registry.register(user, conn).await;

        registry
            .dispatch(user, MESSAGE_EVENT, DispatchAction::Post, json!({ "content": "hi" }))
            .await;

        let frame = rx.try_recv().expect("event delivered");
        assert_eq!(frame.event, "message");
        assert_eq!(frame.data["action"], "POST");
        assert_eq!(frame.data["data"]["content"], "hi");
    }

    #[tokio::test]
    async fn dispatch_to_unknown_user_is_noop() {
        let registry = InMemoryPresence::new();
        let (_conn, mut rx) = connect(&registry).await;

        registry
            .dispatch(Uuid::new_v4(), MESSAGE_EVENT, DispatchAction::Put, json!(null))
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_removes_only_matching_connection() {
        let registry = InMemoryPresence::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (conn_a, _rx_a) = connect(&registry).await;
        let (conn_b, mut rx_b) = connect(&registry).await;
        registry.register(alice, conn_a).await;
        registry.register(bob, conn_b).await;

        registry.unregister(conn_a).await;

        assert_eq!(registry.connection_of(alice), None);
        assert_eq!(registry.connection_of(bob), Some(conn_b));
        assert_eq!(registry.online_users(), 1);

        registry
            .dispatch(bob, MESSAGE_EVENT, DispatchAction::Delete, json!({}))
            .await;
        assert_eq!(rx_b.try_recv().unwrap().data["action"], "DELETE");
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = InMemoryPresence::new();
        let user = Uuid::new_v4();
        let (old, mut old_rx) = connect(&registry).await;
        let (new, mut new_rx) = connect(&registry).await;
        registry.register(user, old).await;
        registry.register(user, new).await;

        registry
            .dispatch(user, MESSAGE_EVENT, DispatchAction::Post, json!(1))
            .await;

        assert!(old_rx.try_recv().is_err());
        assert!(new_rx.try_recv().is_ok());

        // Closing the superseded socket must not evict the newer registration.
        registry.unregister(old).await;
        assert_eq!(registry.connection_of(user), Some(new));
    }

    #[tokio::test]
    async fn dispatch_after_receiver_dropped_does_not_panic() {
        let registry = InMemoryPresence::new();
        let user = Uuid::new_v4();
        let (conn, rx) = connect(&registry).await;
        registry.register(user, conn).await;
        drop(rx);

        registry
            .dispatch(user, MESSAGE_EVENT, DispatchAction::Post, json!({}))
            .await;
    }

    #[tokio::test]
    async fn notify_users_fans_out() {
        let registry = InMemoryPresence::new();
        let (u1, u2, offline) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (c1, mut rx1) = connect(&registry).await;
        let (c2, mut rx2) = connect(&registry).await;
        registry.register(u1, c1).await;
        registry.register(u2, c2).await;

        notify_users(&registry, [u1, u2, offline], DispatchAction::Post, &json!({ "n": 7 })).await;

        assert_eq!(rx1.try_recv().unwrap().data["data"]["n"], 7);
        assert_eq!(rx2.try_recv().unwrap().data["data"]["n"], 7);
    }

    #[test]
    fn action_serialises_uppercase() {
        assert_eq!(serde_json::to_value(DispatchAction::Delete).unwrap(), "DELETE");
    }
}
