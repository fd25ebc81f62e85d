//! Upload pipeline: validate → normalize → store.
//!
//! Validation is delegated to [`UploadValidator`]. Featured uploads go through
//! the WebP normalizer on a blocking thread; everything else is stored as
//! received. Nothing is written to storage unless every earlier step passed.

use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Instant;

use stowage_storage::{generate_storage_key, generate_storage_key_with_extension, Storage};

use super::types::{ReplacedUpload, StoredUpload, UploadRequest};
use crate::image::normalize_image;
use crate::validator::UploadValidator;

const MAX_FILENAME_LENGTH: usize = 255;

/// Reduce a client-supplied filename to a safe display name.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim_matches('_').is_empty() || s.len() < 3 {
        "file".to_string()
    } else {
        s
    }
}

/// Validate, optionally normalize, and store one upload.
pub async fn store_upload(
    storage: &dyn Storage,
    validator: &UploadValidator,
    request: UploadRequest,
) -> Result<StoredUpload> {
    let start = Instant::now();
    let UploadRequest {
        original_filename,
        data,
        featured,
    } = request;

    validator
        .validate_all(&original_filename, data.len())
        .context("Validation failed")?;

    let (storage_key, payload) = if featured {
        let normalized = tokio::task::spawn_blocking(move || {
            normalize_image(&mut Cursor::new(data))
        })
        .await
        .context("Normalizer task failed")?
        .with_context(|| format!("Failed to normalize {}", original_filename))?;

        (
            generate_storage_key_with_extension(normalized.extension),
            normalized.into_bytes(),
        )
    } else {
        (generate_storage_key(&original_filename), data)
    };

    let size_bytes = payload.len() as u64;
    let locator = storage
        .save_bytes(&storage_key, payload)
        .await
        .map_err(anyhow::Error::from)
        .context("Storage save failed")?;
    let url = storage.url_for(&storage_key);

    tracing::info!(
        key = %storage_key,
        backend = %storage.backend_type(),
        size_bytes = size_bytes,
        normalized = featured,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Upload stored"
    );

    Ok(StoredUpload {
        storage_key,
        original_filename: sanitize_filename(&original_filename),
        locator,
        url,
        size_bytes,
        normalized: featured,
    })
}

/// Store a new upload and then remove the one it replaces.
///
/// The new object is written first so a failure never leaves the caller with
/// neither file. Removing the previous object is best-effort.
pub async fn replace_upload(
    storage: &dyn Storage,
    validator: &UploadValidator,
    previous_key: &str,
    request: UploadRequest,
) -> Result<ReplacedUpload> {
    let upload = store_upload(storage, validator, request).await?;

    let previous_deleted = match storage.delete(previous_key).await {
        Ok(deleted) => deleted,
        Err(e) => {
            tracing::warn!(
                key = %previous_key,
                error = %e,
                "Failed to delete replaced upload"
            );
            false
        }
    };

    Ok(ReplacedUpload {
        upload,
        previous_deleted,
    })
}
