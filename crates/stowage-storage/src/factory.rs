#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageError, StorageResult};
use std::sync::Arc;
use stowage_core::{StorageConfig, StorageLocator};

/// Create a storage backend based on configuration
///
/// The locator is parsed once here; the returned driver never re-reads
/// configuration.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let locator = config
        .locator()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    tracing::debug!(locator = %locator, "Creating storage backend");

    match locator {
        #[cfg(feature = "storage-s3")]
        StorageLocator::S3 { bucket, prefix } => {
            let storage = S3Storage::new(bucket, prefix, &config.s3).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageLocator::S3 { .. } => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageLocator::File { base_path } => {
            let storage = LocalStorage::new(base_path, config.local_url_prefix.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageLocator::File { .. } => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
