use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::repo_types::{Addressee, ChatMessage};
use crate::{
    error::AppError,
    groups,
    realtime::{notify_users, DispatchAction},
    state::AppState,
};

/// Users to notify about a change to `msg`: the receiver of a direct
/// message, or every member and the coach of its group.
pub async fn recipients(db: &PgPool, msg: &ChatMessage) -> anyhow::Result<Vec<Uuid>> {
    match msg.addressee() {
        Some(Addressee::User(id)) => Ok(vec![id]),
        Some(Addressee::Group(id)) => Ok(groups::repo::find(db, id)
            .await?
            .map(|g| g.recipients())
            .unwrap_or_default()),
        None => {
            warn!(message_id = %msg.id, "message without addressee");
            Ok(Vec::new())
        }
    }
}

/// Pushes `msg` to everyone concerned. Lookup failures are logged, not returned.
pub async fn broadcast(state: &AppState, msg: &ChatMessage, action: DispatchAction) {
    match recipients(&state.db, msg).await {
        Ok(to) => notify_users(state.presence.as_ref(), to, action, msg).await,
        Err(e) => warn!(error = %e, message_id = %msg.id, "could not resolve recipients"),
    }
}

/// Rejects a body `sender` that is not the caller.
pub fn check_claimed_sender(claimed: Option<&str>, caller: Uuid) -> Result<(), AppError> {
    match claimed.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(()),
        Some(raw) if Uuid::parse_str(raw).ok() == Some(caller) => Ok(()),
        Some(_) => Err(AppError::forbidden("You can only send messages as yourself")),
    }
}

/// Trimmed, non-empty content.
pub fn require_content(content: Option<&str>) -> Result<&str, AppError> {
    content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Content is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{InMemoryPresence, PresenceRegistry};
    use time::OffsetDateTime;
    use tokio::sync::mpsc;

    #[test]
    fn claimed_sender_must_match_caller() {
        let me = Uuid::new_v4();
        assert!(check_claimed_sender(None, me).is_ok());
        assert!(check_claimed_sender(Some(""), me).is_ok());
        assert!(check_claimed_sender(Some(&me.to_string()), me).is_ok());
        let err = check_claimed_sender(Some(&Uuid::new_v4().to_string()), me).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(check_claimed_sender(Some("garbage"), me).is_err());
    }

    #[test]
    fn content_is_trimmed_and_required() {
        assert_eq!(require_content(Some("  hey ")).unwrap(), "hey");
        assert!(require_content(Some("   ")).is_err());
        assert!(require_content(None).is_err());
    }

    #[tokio::test]
    async fn direct_message_reaches_only_receiver() {
        let presence = InMemoryPresence::new();
        let receiver = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        let (tx_r, mut rx_r) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (cr, cb) = (Uuid::new_v4(), Uuid::new_v4());
        presence.attach(cr, tx_r).await;
        presence.attach(cb, tx_b).await;
        presence.register(receiver, cr).await;
        presence.register(bystander, cb).await;

        let state = AppState::fake();
        let msg = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Some(receiver),
            group_id: None,
            content: "hello".into(),
            image_key: None,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        };
        let to = recipients(&state.db, &msg).await.unwrap();
        notify_users(&presence, to, DispatchAction::Put, &msg).await;

        let got = rx_r.try_recv().unwrap();
        assert_eq!(got.event, "message");
        assert_eq!(got.data["action"], "PUT");
        assert_eq!(got.data["data"]["content"], "hello");
        assert!(rx_b.try_recv().is_err());
    }
}
