use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{EditMessageRequest, SendMessageRequest},
    repo,
    repo_types::{Addressee, ChatMessage, NewMessage},
    services::{broadcast, check_claimed_sender, recipients, require_content},
};
use crate::{
    auth::{repo_types::User, CurrentUser},
    error::{parse_id, AppError, JsonBody},
    images::services::{
        ext_from_mime, presign_image, require_storage, upload_chat_image, UploadItem,
        MAX_IMAGE_BYTES,
    },
    realtime::DispatchAction,
    state::AppState,
    storage::StorageClient,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/send", post(send_message))
        .route("/chat/edit/:id", put(edit_message))
        .route("/chat/delete/:id", delete(delete_message))
        .route("/chat/conversation/:user1/:user2", get(conversation))
        .route("/chat/image/:id", get(get_image))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/image", post(send_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
}

async fn require_receiver(state: &AppState, raw: Option<&str>) -> Result<Uuid, AppError> {
    let raw = raw
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Receiver is required"))?;
    let receiver = parse_id(raw, "Invalid user ID")?;
    if User::find_by_id(&state.db, receiver).await?.is_none() {
        return Err(AppError::bad_request("Both users must exist"));
    }
    Ok(receiver)
}

fn bad_field(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::bad_request(format!("Invalid multipart body: {e}"))
}

/// Removes an uploaded image whose message could not be stored.
async fn discard_upload(storage: &dyn StorageClient, key: &str) {
    match storage.delete_object(key).await {
        Ok(()) => info!(key, "orphaned chat image removed"),
        Err(e) => warn!(error = %e, key, "failed to remove orphaned chat image"),
    }
}

/// Loads a message the caller is allowed to change.
async fn owned_message(state: &AppState, raw_id: &str, caller: Uuid) -> Result<ChatMessage, AppError> {
    let id = parse_id(raw_id, "Invalid message ID")?;
    let msg = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))?;
    if msg.sender_id != caller {
        warn!(message_id = %id, "caller is not the sender");
        return Err(AppError::forbidden("You can only modify your own messages"));
    }
    Ok(msg)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    check_claimed_sender(body.sender.as_deref(), user.id)?;
    let content = require_content(body.content.as_deref())?;
    let receiver = require_receiver(&state, body.receiver.as_deref()).await?;

    let msg = repo::insert(
        &state.db,
        NewMessage {
            sender_id: user.id,
            to: Addressee::User(receiver),
            content,
            image_key: None,
        },
    )
    .await?;

    info!(message_id = %msg.id, %receiver, "direct message sent");
    broadcast(&state, &msg, DispatchAction::Post).await;
    Ok((StatusCode::CREATED, Json(msg)))
}

/// POST /chat/image (multipart: receiver, content?, file)
#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn send_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let storage = require_storage(&state)?;

    let mut receiver: Option<String> = None;
    let mut content = String::new();
    let mut file: Option<(Bytes, String)> = None;
    while let Some(field) = mp.next_field().await.map_err(bad_field)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("receiver") => receiver = Some(field.text().await.map_err(bad_field)?),
            Some("content") => content = field.text().await.map_err(bad_field)?,
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field.bytes().await.map_err(bad_field)?;
                file = Some((data, content_type));
            }
            _ => {}
        }
    }

    let (data, content_type) = file.ok_or_else(|| AppError::bad_request("file is required"))?;
    if data.is_empty() {
        return Err(AppError::bad_request("file is empty"));
    }
    if ext_from_mime(&content_type).is_none() {
        return Err(AppError::bad_request("Unsupported image type"));
    }
    let receiver = require_receiver(&state, receiver.as_deref()).await?;

    let key = upload_chat_image(
        storage,
        user.id,
        UploadItem {
            body: data,
            content_type: &content_type,
        },
    )
    .await?;

    let inserted = repo::insert(
        &state.db,
        NewMessage {
            sender_id: user.id,
            to: Addressee::User(receiver),
            content: content.trim(),
            image_key: Some(&key),
        },
    )
    .await;
    let msg = match inserted {
        Ok(msg) => msg,
        Err(e) => {
            discard_upload(storage, &key).await;
            return Err(e.into());
        }
    };

    info!(message_id = %msg.id, %receiver, key = %key, "image message sent");
    broadcast(&state, &msg, DispatchAction::Post).await;
    Ok((StatusCode::CREATED, Json(msg)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn edit_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<EditMessageRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    let content = require_content(body.content.as_deref())?;
    let msg = owned_message(&state, &id, user.id).await?;

    let updated = repo::update_content(&state.db, msg.id, content)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))?;

    info!(message_id = %updated.id, "message edited");
    broadcast(&state, &updated, DispatchAction::Put).await;
    Ok(Json(updated))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let msg = owned_message(&state, &id, user.id).await?;

    if !repo::delete(&state.db, msg.id).await? {
        return Err(AppError::not_found("Message not found"));
    }

    if let (Some(key), Some(storage)) = (msg.image_key.as_deref(), state.storage.as_deref()) {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = %e, key, "failed to delete chat image");
        }
    }

    info!(message_id = %msg.id, "message deleted");
    broadcast(&state, &msg, DispatchAction::Delete).await;
    Ok(Json(json!({ "message": "Message deleted successfully" })))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((user1, user2)): Path<(String, String)>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let a = parse_id(&user1, "Invalid user ID")?;
    let b = parse_id(&user2, "Invalid user ID")?;
    if !(user.id == a || user.id == b || user.is_admin()) {
        return Err(AppError::forbidden("You are not part of this conversation"));
    }
    Ok(Json(repo::conversation(&state.db, a, b).await?))
}

/// 307 to a short-lived link for the message's image.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let storage = require_storage(&state)?;
    let id = parse_id(&id, "Invalid message ID")?;
    let msg = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))?;

    let allowed = msg.sender_id == user.id
        || user.is_admin()
        || recipients(&state.db, &msg).await?.contains(&user.id);
    if !allowed {
        return Err(AppError::forbidden("You are not part of this conversation"));
    }

    let key = msg
        .image_key
        .as_deref()
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    let url = presign_image(storage, key).await?;
    Ok(Redirect::temporary(&url).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{body::Body, extract::FromRef, http::{header, Request}};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .merge(routes())
            .merge(upload_routes())
            .with_state(AppState::fake())
    }

    #[tokio::test]
    async fn send_without_token_is_401() {
        let res = app()
            .oneshot(
                Request::post("/chat/send")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"receiver":"x","content":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_cannot_delete() {
        let state = AppState::fake();
        let refresh = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        let res = app()
            .oneshot(
                Request::delete(format!("/chat/delete/{}", Uuid::new_v4()))
                    .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failed_message_insert_discards_the_upload() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingStorage {
            deleted: Mutex<Vec<String>>,
        }

        #[async_trait::async_trait]
        impl StorageClient for RecordingStorage {
            async fn put_object(&self, _k: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn delete_object(&self, k: &str) -> anyhow::Result<()> {
                self.deleted.lock().unwrap().push(k.to_string());
                Ok(())
            }
            async fn presign_get(&self, k: &str, _s: u64) -> anyhow::Result<String> {
                Ok(k.to_string())
            }
        }

        let storage = RecordingStorage::default();
        discard_upload(&storage, "chat/u/1.png").await;
        assert_eq!(*storage.deleted.lock().unwrap(), vec!["chat/u/1.png".to_string()]);
    }
}
