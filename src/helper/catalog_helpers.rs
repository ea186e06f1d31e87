use std::collections::BTreeMap;

use chrono::Utc;
use rand::RngCore;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::helper::sanitization_helpers;
use crate::models::db_operations::{media_db_operations, users_db_operations};
use crate::models::{MediaAsset, MediaSlot, POINTER_MIME};
use crate::notify::ChangeHub;
use crate::storage::ObjectStore;
use crate::DbPool;

const DEFAULT_MAX_UPLOAD_MB: u64 = 10;

/// Securely maps a validated MIME type to a safe file extension. Client
/// file names are never trusted as storage keys; this mapping plus a random
/// token is all a storage path is built from.
fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("application/pdf", "pdf"),
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/svg+xml", "svg"),
        ("image/webp", "webp"),
        ("video/mp4", "mp4"),
        ("video/quicktime", "mov"),
        ("video/webm", "webm"),
    ]
    .iter()
    .cloned()
    .collect();

    map.get(mime_type).cloned()
}

fn storage_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One file lifted out of a multipart request, fully buffered.
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Max upload size in bytes, from the admin-tunable setting.
pub fn max_upload_bytes(pool: &DbPool) -> ServiceResult<u64> {
    let conn = pool.get()?;
    let mb = users_db_operations::read_setting(&conn, "max_file_upload_size_mb")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_UPLOAD_MB);
    Ok(mb * 1024 * 1024)
}

/// All assets in a slot, newest first. An empty list is a valid result
/// meaning "no asset configured"; callers render their fallback.
pub fn list_by_slot(pool: &DbPool, slot: MediaSlot) -> ServiceResult<Vec<MediaAsset>> {
    let conn = pool.get()?;
    Ok(media_db_operations::read_media_by_slot(&conn, slot)?)
}

/// Stores one uploaded file: object-store put first, record insert second.
/// A failed put leaves no record behind. A failed insert after a successful
/// put leaves an orphaned object, which is logged and not compensated.
pub fn store_asset(
    pool: &DbPool,
    store: &dyn ObjectStore,
    events: &ChangeHub,
    slot: MediaSlot,
    file: UploadedFile,
    caption: Option<&str>,
) -> ServiceResult<MediaAsset> {
    if slot.is_url_only() {
        return Err(ServiceError::Validation(format!(
            "Slot '{}' takes video URLs, not file uploads.",
            slot
        )));
    }
    if file.bytes.is_empty() {
        return Err(ServiceError::Validation("The uploaded file is empty.".to_string()));
    }
    if !slot.accepts_mime(&file.mime_type) {
        return Err(ServiceError::Validation(format!(
            "Unsupported file type '{}' for slot '{}'.",
            file.mime_type, slot
        )));
    }
    let extension = mime_to_safe_extension(&file.mime_type).ok_or_else(|| {
        ServiceError::Validation(format!(
            "File type '{}' has no safe extension mapping.",
            file.mime_type
        ))
    })?;

    let path = format!("{}/{}.{}", slot.as_str(), storage_token(), extension);
    let url = store.put(&path, &file.bytes)?;

    let asset = MediaAsset {
        id: Uuid::new_v4().to_string(),
        slot,
        url,
        caption: sanitization_helpers::clean_optional_text(caption),
        file_name: sanitization_helpers::strip_all_html(&file.file_name),
        mime_type: file.mime_type,
        file_size: file.bytes.len() as i64,
        created_at: Utc::now(),
    };

    let conn = pool.get()?;
    if let Err(e) = media_db_operations::insert_media(&conn, &asset) {
        log::error!(
            "Catalog insert failed after object '{}' was stored; the object is now orphaned: {}",
            path,
            e
        );
        return Err(e.into());
    }

    events.publish_media(slot);
    Ok(asset)
}

/// Stores several files sequentially. A failure partway through leaves the
/// earlier uploads committed; there is no cross-file transaction.
pub fn store_assets(
    pool: &DbPool,
    store: &dyn ObjectStore,
    events: &ChangeHub,
    slot: MediaSlot,
    files: Vec<UploadedFile>,
    caption: Option<&str>,
) -> ServiceResult<Vec<MediaAsset>> {
    if files.is_empty() {
        return Err(ServiceError::Validation("No file was uploaded.".to_string()));
    }
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        stored.push(store_asset(pool, store, events, slot, file, caption)?);
    }
    Ok(stored)
}

/// Inserts a pointer record for a URL-backed slot; no object is stored.
pub fn link_url(
    pool: &DbPool,
    events: &ChangeHub,
    slot: MediaSlot,
    url: &str,
    caption: Option<&str>,
) -> ServiceResult<MediaAsset> {
    if !slot.is_url_only() {
        return Err(ServiceError::Validation(format!(
            "Slot '{}' stores uploaded files; use the upload endpoint.",
            slot
        )));
    }
    let url = url.trim();
    if url.is_empty() {
        return Err(ServiceError::Validation("Please enter a video URL.".to_string()));
    }
    url::Url::parse(url)
        .map_err(|_| ServiceError::Validation(format!("'{}' is not a valid URL.", url)))?;

    let asset = MediaAsset {
        id: Uuid::new_v4().to_string(),
        slot,
        url: url.to_string(),
        caption: sanitization_helpers::clean_optional_text(caption),
        file_name: format!("{}_{}", slot.as_str(), Utc::now().timestamp_millis()),
        mime_type: POINTER_MIME.to_string(),
        file_size: 0,
        created_at: Utc::now(),
    };

    let conn = pool.get()?;
    media_db_operations::insert_media(&conn, &asset)?;

    events.publish_media(slot);
    Ok(asset)
}

/// Deletes an asset: the stored object first (when the URL maps into the
/// object store), then the record. A failed object removal leaves the
/// record intact so the operation can be retried instead of silently losing
/// the pointer.
pub fn delete_asset(
    pool: &DbPool,
    store: &dyn ObjectStore,
    events: &ChangeHub,
    asset_id: &str,
) -> ServiceResult<()> {
    let conn = pool.get()?;
    let asset = media_db_operations::read_media_by_id(&conn, asset_id)?
        .ok_or_else(|| ServiceError::NotFound("media asset".to_string()))?;

    if let Some(path) = store.object_path(&asset.url) {
        store.remove(&path)?;
    }

    if media_db_operations::delete_media(&conn, asset_id)? == 0 {
        return Err(ServiceError::NotFound("media asset".to_string()));
    }

    events.publish_media(asset.slot);
    Ok(())
}
