//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::io::Cursor;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Access mode for [`Storage::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Stream returned by [`Storage::open`]
///
/// Writers must be shut down (`AsyncWriteExt::shutdown`) for the object to be
/// committed on the object store backend.
pub enum ObjectHandle {
    Reader(Pin<Box<dyn AsyncRead + Send>>),
    Writer(Pin<Box<dyn AsyncWrite + Send>>),
}

impl ObjectHandle {
    pub fn into_reader(self) -> Option<Pin<Box<dyn AsyncRead + Send>>> {
        match self {
            ObjectHandle::Reader(reader) => Some(reader),
            ObjectHandle::Writer(_) => None,
        }
    }

    pub fn into_writer(self) -> Option<Pin<Box<dyn AsyncWrite + Send>>> {
        match self {
            ObjectHandle::Writer(writer) => Some(writer),
            ObjectHandle::Reader(_) => None,
        }
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectHandle::Reader(_) => f.write_str("ObjectHandle::Reader"),
            ObjectHandle::Writer(_) => f.write_str("ObjectHandle::Writer"),
        }
    }
}

/// Storage abstraction trait
///
/// Both substrate drivers (local filesystem, S3-compatible object store)
/// implement this trait, so callers work with any backend without coupling to
/// its implementation details. The driver is selected once, at construction,
/// from the configured storage locator.
///
/// Every operation that takes a key validates it first and fails with
/// [`StorageError::InvalidKey`] before any I/O is attempted.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write the full content of `reader` under `storage_key`.
    ///
    /// The write is verified (existence and size) before returning. Returns a
    /// fully qualified locator (`file://<absolute-path>` or
    /// `s3://<bucket>/<path>`) meant for diagnostics; callers persist the key.
    async fn save(
        &self,
        storage_key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String>;

    /// Save an in-memory payload under `storage_key`.
    async fn save_bytes(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<String> {
        self.save(storage_key, Box::pin(Cursor::new(data))).await
    }

    /// Open an object for reading or writing.
    ///
    /// Fails with [`StorageError::NotFound`] when reading a missing key.
    async fn open(&self, storage_key: &str, mode: OpenMode) -> StorageResult<ObjectHandle>;

    /// Read a whole object into memory.
    async fn read(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let mut reader = self
            .open(storage_key, OpenMode::Read)
            .await?
            .into_reader()
            .ok_or_else(|| StorageError::ReadFailed(storage_key.to_string()))?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::ReadFailed(format!("{}: {}", storage_key, e)))?;
        Ok(data)
    }

    /// Delete an object.
    ///
    /// Idempotent: a missing key counts as deleted. Substrate failures are
    /// logged and reported as `Ok(false)` so best-effort cleanup can carry on;
    /// the only error is [`StorageError::InvalidKey`].
    async fn delete(&self, storage_key: &str) -> StorageResult<bool>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Public URL for an object. Never fails.
    fn url_for(&self, storage_key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
