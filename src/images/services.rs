use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use crate::{error::AppError, state::AppState, storage::StorageClient};

/// Lifetime of presigned download links.
pub const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

/// The configured object store, or 404 when uploads are disabled.
pub fn require_storage(st: &AppState) -> Result<&dyn StorageClient, AppError> {
    st.storage
        .as_deref()
        .ok_or_else(|| AppError::not_found("Image storage is not configured"))
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub fn chat_image_key(sender: Uuid, image_id: Uuid, ext: &str) -> String {
    format!("chat/{}/{}.{}", sender, image_id, ext)
}

/// Stores a chat attachment and returns its object key.
pub async fn upload_chat_image(
    storage: &dyn StorageClient,
    sender: Uuid,
    img: UploadItem<'_>,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(img.content_type)
        .with_context(|| format!("unsupported image type {}", img.content_type))?;
    let key = chat_image_key(sender, Uuid::new_v4(), ext);
    storage
        .put_object(&key, img.body, img.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

pub async fn presign_image(storage: &dyn StorageClient, key: &str) -> anyhow::Result<String> {
    storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for key {}", key))
}
