use crate::keys::validate_storage_key;
use crate::traits::{ObjectHandle, OpenMode, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    canonical_base: PathBuf,
    url_prefix: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/stowage/uploads")
    /// * `url_prefix` - Application-relative prefix for serving files (e.g., "/uploads")
    pub async fn new(base_path: impl Into<PathBuf>, url_prefix: impl Into<String>) -> StorageResult<Self> {
        let base_path = std::path::absolute(base_path.into()).map_err(|e| {
            StorageError::ConfigError(format!("Failed to resolve storage directory: {}", e))
        })?;

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let canonical_base = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalStorage {
            base_path,
            canonical_base,
            url_prefix: url_prefix.into(),
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Besides the lexical key checks, the deepest existing ancestor of the
    /// target is canonicalized so a symlink inside the storage directory
    /// cannot redirect writes outside of it.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_storage_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        let mut existing = path.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }

        if let Ok(canonical) = existing.canonicalize() {
            if canonical.strip_prefix(&self.canonical_base).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Sibling path a save writes to before it is renamed over `path`.
    fn temp_path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
    }

    async fn write_temp(
        &self,
        temp_path: &Path,
        reader: &mut Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(temp_path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        let bytes_copied = tokio::io::copy(reader, &mut file).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to write stream to file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", temp_path.display(), e))
        })?;
        drop(file);

        self.verify_write(temp_path, bytes_copied).await?;
        Ok(bytes_copied)
    }

    async fn verify_write(&self, path: &Path, expected_size: u64) -> StorageResult<()> {
        let meta = fs::metadata(path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "File {} missing after write: {}",
                path.display(),
                e
            ))
        })?;

        if meta.len() != expected_size {
            return Err(StorageError::WriteFailed(format!(
                "Size mismatch for {}: wrote {} bytes, found {}",
                path.display(),
                expected_size,
                meta.len()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(
        &self,
        storage_key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create parent directory for {}: {}",
                path.display(),
                e
            ))
        })?;

        // The object only appears under its key once it is complete, so a
        // failed save never truncates or replaces an existing object.
        let temp_path = Self::temp_path_for(&path);
        let result = match self.write_temp(&temp_path, &mut reader).await {
            Ok(bytes_copied) => fs::rename(&temp_path, &path)
                .await
                .map(|()| bytes_copied)
                .map_err(|e| {
                    StorageError::WriteFailed(format!(
                        "Failed to move {} into place: {}",
                        path.display(),
                        e
                    ))
                }),
            Err(e) => Err(e),
        };

        let bytes_copied = match result {
            Ok(bytes_copied) => bytes_copied,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            error = %cleanup,
                            path = %temp_path.display(),
                            "Failed to remove temporary upload file"
                        );
                    }
                }
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %storage_key,
                    "Local storage save failed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(format!("file://{}", path.display()))
    }

    async fn open(&self, storage_key: &str, mode: OpenMode) -> StorageResult<ObjectHandle> {
        let path = self.key_to_path(storage_key)?;

        match mode {
            OpenMode::Read => {
                let file = fs::File::open(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        StorageError::NotFound(storage_key.to_string())
                    } else {
                        StorageError::ReadFailed(format!(
                            "Failed to open file {}: {}",
                            path.display(),
                            e
                        ))
                    }
                })?;
                Ok(ObjectHandle::Reader(Box::pin(file)))
            }
            OpenMode::Write => {
                self.ensure_parent_dir(&path).await?;
                let file = fs::File::create(&path).await.map_err(|e| {
                    StorageError::WriteFailed(format!(
                        "Failed to create file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(ObjectHandle::Writer(Box::pin(file)))
            }
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    key = %storage_key,
                    "Local storage delete failed"
                );
                return Ok(false);
            }
        }

        match fs::try_exists(&path).await {
            Ok(false) => {
                tracing::info!(
                    path = %path.display(),
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(true)
            }
            Ok(true) => {
                tracing::warn!(
                    path = %path.display(),
                    key = %storage_key,
                    "File still present after delete"
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    key = %storage_key,
                    "Failed to verify local storage delete"
                );
                Ok(false)
            }
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }

    fn url_for(&self, storage_key: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn storage_in(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "/uploads").await.unwrap()
    }

    /// Yields `remaining` bytes, then fails like a dropped client connection.
    struct BrokenReader {
        remaining: usize,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.remaining == 0 {
                return std::task::Poll::Ready(Err(std::io::Error::other("client disconnected")));
            }
            let n = self.remaining.min(buf.remaining());
            buf.put_slice(&vec![0xAB; n]);
            self.remaining -= n;
            std::task::Poll::Ready(Ok(()))
        }
    }

    fn broken_reader(remaining: usize) -> Pin<Box<dyn AsyncRead + Send + Unpin>> {
        Box::pin(BrokenReader { remaining })
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_failed_overwrite_keeps_previous_object() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let original = vec![7u8; 1000];
        storage.save_bytes("asset.bin", original.clone()).await.unwrap();

        let err = storage.save("asset.bin", broken_reader(64)).await.unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed(_)), "got {:?}", err);

        assert_eq!(storage.read("asset.bin").await.unwrap(), original);
        assert_eq!(dir_entries(dir.path()), vec!["asset.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_object() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let err = storage
            .save("nested/fresh.bin", broken_reader(64))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed(_)), "got {:?}", err);

        assert!(!storage.exists("nested/fresh.bin").await.unwrap());
        assert!(dir_entries(&dir.path().join("nested")).is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_object() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        storage.save_bytes("asset.bin", vec![1u8; 1000]).await.unwrap();
        storage.save_bytes("asset.bin", vec![2u8; 10]).await.unwrap();

        assert_eq!(storage.read("asset.bin").await.unwrap(), vec![2u8; 10]);
        assert_eq!(dir_entries(dir.path()), vec!["asset.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_local_storage_save_read() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let data = b"test data".to_vec();
        let locator = storage.save_bytes("test.txt", data.clone()).await.unwrap();

        assert!(locator.starts_with("file://"));
        assert!(locator.ends_with("test.txt"));
        assert!(storage.exists("test.txt").await.unwrap());
        assert_eq!(storage.read("test.txt").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_save_into_data_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data");
        let storage = storage_in(&root).await;

        let payload: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let locator = storage.save_bytes("abc123.webp", payload.clone()).await.unwrap();

        let expected = root.join("abc123.webp");
        assert_eq!(locator, format!("file://{}", expected.display()));
        assert_eq!(std::fs::read(&expected).unwrap(), payload);
        assert!(storage.exists("abc123.webp").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        storage
            .save_bytes("a/b/c/nested.bin", vec![1, 2, 3])
            .await
            .unwrap();

        assert!(dir.path().join("a/b/c/nested.bin").is_file());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let result = storage.save_bytes("../escape.txt", vec![1]).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());

        let result = storage.open("../../../etc/passwd", OpenMode::Read).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let result = storage.save_bytes("link/evil.txt", vec![1]).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!outside.path().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let deleted = storage.delete("nonexistent/file.txt").await.unwrap();
        assert!(deleted);
        assert!(!dir.path().join("nonexistent").exists());
    }

    #[tokio::test]
    async fn test_delete_finality() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        storage.save_bytes("gone.txt", b"bye".to_vec()).await.unwrap();
        assert!(storage.delete("gone.txt").await.unwrap());
        assert!(!storage.exists("gone.txt").await.unwrap());

        let result = storage.open("gone.txt", OpenMode::Read).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        // Retrying a delete is still a success
        assert!(storage.delete("gone.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        std::fs::create_dir_all(dir.path().join("occupied")).unwrap();

        let deleted = storage.delete("occupied").await.unwrap();
        assert!(!deleted);
        assert!(dir.path().join("occupied").is_dir());
    }

    #[tokio::test]
    async fn test_open_write_then_read() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let mut writer = storage
            .open("streamed/file.bin", OpenMode::Write)
            .await
            .unwrap()
            .into_writer()
            .unwrap();
        writer.write_all(b"stream test data").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        let mut reader = storage
            .open("streamed/file.bin", OpenMode::Read)
            .await
            .unwrap()
            .into_reader()
            .unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"stream test data");
    }

    #[tokio::test]
    async fn test_open_missing_for_read() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let result = storage.open("missing.bin", OpenMode::Read).await;
        assert!(matches!(result, Err(StorageError::NotFound(key)) if key == "missing.bin"));
    }

    #[tokio::test]
    async fn test_url_for() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads/").await.unwrap();

        assert_eq!(storage.url_for("x.webp"), "/uploads/x.webp");
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
