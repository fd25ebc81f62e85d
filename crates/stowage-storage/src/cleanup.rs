//! Best-effort deletion of every object that belongs to one entity.

use crate::traits::{Storage, StorageError};

/// Outcome of [`delete_all`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every key, continuing past failures.
///
/// Keys that fail validation are reported as failed like any other key; the
/// caller decides whether a partial cleanup is worth a warning.
pub async fn delete_all<I, K>(storage: &dyn Storage, keys: I) -> DeleteReport
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut report = DeleteReport::default();

    for key in keys {
        let key = key.as_ref();
        match storage.delete(key).await {
            Ok(true) => report.deleted.push(key.to_string()),
            Ok(false) => report.failed.push(key.to_string()),
            Err(StorageError::InvalidKey(reason)) => {
                tracing::warn!(key = %key, reason = %reason, "Skipping delete of invalid key");
                report.failed.push(key.to_string());
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Delete failed");
                report.failed.push(key.to_string());
            }
        }
    }

    if !report.is_complete() {
        tracing::warn!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Partial cleanup"
        );
    }

    report
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::LocalStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_delete_all_aggregates_failures() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads").await.unwrap();

        storage.save_bytes("cover.webp", vec![1]).await.unwrap();
        storage.save_bytes("model.fbx", vec![2]).await.unwrap();
        std::fs::create_dir_all(dir.path().join("stuck")).unwrap();

        let report = delete_all(
            &storage,
            ["cover.webp", "../outside", "stuck", "model.fbx", "never-saved.zip"],
        )
        .await;

        assert_eq!(
            report.deleted,
            vec!["cover.webp", "model.fbx", "never-saved.zip"]
        );
        assert_eq!(report.failed, vec!["../outside", "stuck"]);
        assert!(!report.is_complete());
        assert!(!dir.path().join("cover.webp").exists());
        assert!(!dir.path().join("model.fbx").exists());
    }

    #[tokio::test]
    async fn test_delete_all_empty() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads").await.unwrap();

        let report = delete_all(&storage, Vec::<String>::new()).await;
        assert!(report.is_complete());
        assert!(report.deleted.is_empty());
    }
}
