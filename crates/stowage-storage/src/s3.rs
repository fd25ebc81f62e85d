use crate::keys::validate_storage_key;
use crate::traits::{ObjectHandle, OpenMode, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::pin::Pin;
use std::sync::Arc;
use stowage_core::S3Settings;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn object_store::ObjectStore>,
    bucket: String,
    prefix: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    public_url: Option<String>,   // CDN / custom domain for public buckets
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Key prefix inside the bucket (may be empty)
    /// * `settings` - Credentials, region and optional endpoint/public URLs
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(bucket: String, prefix: String, settings: &S3Settings) -> StorageResult<Self> {
        let (access_key, secret_key) = settings
            .credentials()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket.clone())
            .with_region(settings.region.clone())
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);

        if let Some(ref endpoint) = settings.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::with_store(
            Arc::new(store),
            bucket,
            prefix,
            settings.endpoint_url.clone(),
            settings.public_url.clone(),
        ))
    }

    /// Build an S3Storage on top of an existing object store client.
    pub fn with_store(
        store: Arc<dyn object_store::ObjectStore>,
        bucket: String,
        prefix: String,
        endpoint_url: Option<String>,
        public_url: Option<String>,
    ) -> Self {
        S3Storage {
            store,
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
            endpoint_url,
            public_url,
        }
    }

    /// Bucket-relative object path for a key: `{prefix}/{key}`
    fn object_path(&self, storage_key: &str) -> String {
        if self.prefix.is_empty() {
            storage_key.to_string()
        } else {
            format!("{}/{}", self.prefix, storage_key)
        }
    }

    fn location(&self, storage_key: &str) -> StorageResult<Path> {
        validate_storage_key(storage_key)?;
        Ok(Path::from(self.object_path(storage_key)))
    }

    async fn head_size(&self, location: &Path) -> ObjectResult<Option<u64>> {
        match self.store.head(location).await {
            Ok(meta) => Ok(Some(meta.size as u64)),
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn save(
        &self,
        storage_key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String> {
        let location = self.location(storage_key)?;
        let start = std::time::Instant::now();

        // The whole payload is buffered and sent in a single put.
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to read from stream: {}", e))
        })?;

        let size = buffer.len() as u64;
        let result: ObjectResult<_> = self
            .store
            .put(&location, PutPayload::from(Bytes::from(buffer)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 save failed"
            );
            StorageError::WriteFailed(e.to_string())
        })?;

        match self.head_size(&location).await {
            Ok(Some(stored)) if stored == size => {}
            Ok(Some(stored)) => {
                return Err(StorageError::WriteFailed(format!(
                    "Size mismatch for {}: wrote {} bytes, found {}",
                    location, size, stored
                )));
            }
            Ok(None) => {
                return Err(StorageError::WriteFailed(format!(
                    "Object {} missing after write",
                    location
                )));
            }
            Err(e) => {
                return Err(StorageError::WriteFailed(format!(
                    "Failed to verify {}: {}",
                    location, e
                )));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 save successful"
        );

        Ok(format!("s3://{}/{}", self.bucket, location))
    }

    async fn open(&self, storage_key: &str, mode: OpenMode) -> StorageResult<ObjectHandle> {
        let location = self.location(storage_key)?;

        match mode {
            OpenMode::Read => {
                let result: ObjectResult<_> = self.store.get(&location).await;
                let result = result.map_err(|e| match e {
                    ObjectStoreError::NotFound { .. } => {
                        StorageError::NotFound(storage_key.to_string())
                    }
                    other => StorageError::ReadFailed(other.to_string()),
                })?;

                let stream = result
                    .into_stream()
                    .map(|chunk| chunk.map_err(std::io::Error::other));
                Ok(ObjectHandle::Reader(Box::pin(StreamReader::new(stream))))
            }
            OpenMode::Write => {
                let writer = BufWriter::new(Arc::clone(&self.store), location);
                Ok(ObjectHandle::Writer(Box::pin(writer)))
            }
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<bool> {
        let location = self.location(storage_key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;
        match result {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Ok(false);
            }
        }

        match self.head_size(&location).await {
            Ok(None) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete successful"
                );
                Ok(true)
            }
            Ok(Some(_)) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %storage_key,
                    "Object still present after delete"
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "Failed to verify S3 delete"
                );
                Ok(false)
            }
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = self.location(storage_key)?;
        self.head_size(&location)
            .await
            .map(|size| size.is_some())
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }

    /// Public URL for an object.
    ///
    /// Resolution order: public URL override, then path-style URL on the
    /// custom endpoint, then the non-fetchable `s3://` form.
    fn url_for(&self, storage_key: &str) -> String {
        let path = self.object_path(storage_key);
        if let Some(ref public_url) = self.public_url {
            format!("{}/{}", public_url.trim_end_matches('/'), path)
        } else if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, path)
        } else {
            format!("s3://{}/{}", self.bucket, path)
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
