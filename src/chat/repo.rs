use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Addressee, ChatMessage, NewMessage};

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, group_id, content, image_key, timestamp";

pub async fn insert(db: &PgPool, new: NewMessage<'_>) -> anyhow::Result<ChatMessage> {
    let (receiver_id, group_id) = match new.to {
        Addressee::User(id) => (Some(id), None),
        Addressee::Group(id) => (None, Some(id)),
    };
    let msg = sqlx::query_as::<_, ChatMessage>(&format!(
        r#"
        INSERT INTO chat_messages (id, sender_id, receiver_id, group_id, content, image_key, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, now())
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.sender_id)
    .bind(receiver_id)
    .bind(group_id)
    .bind(new.content)
    .bind(new.image_key)
    .fetch_one(db)
    .await?;
    Ok(msg)
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<ChatMessage>> {
    let msg = sqlx::query_as::<_, ChatMessage>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(msg)
}

pub async fn update_content(db: &PgPool, id: Uuid, content: &str) -> anyhow::Result<Option<ChatMessage>> {
    let msg = sqlx::query_as::<_, ChatMessage>(&format!(
        "UPDATE chat_messages SET content = $2 WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(id)
    .bind(content)
    .fetch_optional(db)
    .await?;
    Ok(msg)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Direct messages exchanged between two users, oldest first.
pub async fn conversation(db: &PgPool, a: Uuid, b: Uuid) -> anyhow::Result<Vec<ChatMessage>> {
    let rows = sqlx::query_as::<_, ChatMessage>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS} FROM chat_messages
        WHERE (sender_id = $1 AND receiver_id = $2)
           OR (sender_id = $2 AND receiver_id = $1)
        ORDER BY timestamp ASC
        "#
    ))
    .bind(a)
    .bind(b)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn group_messages(db: &PgPool, group_id: Uuid) -> anyhow::Result<Vec<ChatMessage>> {
    let rows = sqlx::query_as::<_, ChatMessage>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE group_id = $1 ORDER BY timestamp ASC"
    ))
    .bind(group_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
