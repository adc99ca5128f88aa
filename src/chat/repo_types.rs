use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A direct or group message. Exactly one of `receiver_id` and `group_id` is set.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "sender")]
    pub sender_id: Uuid,
    #[serde(rename = "receiver")]
    pub receiver_id: Option<Uuid>,
    #[serde(rename = "groupId")]
    pub group_id: Option<Uuid>,
    pub content: String,
    #[serde(rename = "imageKey", skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Where a message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressee {
    User(Uuid),
    Group(Uuid),
}

impl ChatMessage {
    pub fn addressee(&self) -> Option<Addressee> {
        match (self.receiver_id, self.group_id) {
            (Some(r), None) => Some(Addressee::User(r)),
            (None, Some(g)) => Some(Addressee::Group(g)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub sender_id: Uuid,
    pub to: Addressee,
    pub content: &'a str,
    pub image_key: Option<&'a str>,
}
