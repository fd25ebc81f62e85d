//! Types for the upload pipeline.

use serde::Serialize;

/// Raw upload as received from the caller.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub original_filename: String,
    pub data: Vec<u8>,
    /// Featured uploads are images shown inline and are normalized to WebP
    pub featured: bool,
}

impl UploadRequest {
    pub fn new(original_filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            original_filename: original_filename.into(),
            data,
            featured: false,
        }
    }

    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }
}

/// Where an upload ended up.
#[derive(Clone, Debug, Serialize)]
pub struct StoredUpload {
    pub storage_key: String,
    /// Sanitized original filename
    pub original_filename: String,
    /// Backend locator returned by `save`
    pub locator: String,
    pub url: String,
    pub size_bytes: u64,
    pub normalized: bool,
}

/// Result of replacing an existing upload.
#[derive(Clone, Debug, Serialize)]
pub struct ReplacedUpload {
    pub upload: StoredUpload,
    /// `false` when the previous object could not be removed
    pub previous_deleted: bool,
}
