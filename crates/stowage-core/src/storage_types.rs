use std::fmt::{Display, Formatter, Result as FmtResult};

/// Storage backend types
///
/// Exactly one backend is active per storage instance. It is selected from the
/// scheme of the configured storage locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

impl StorageBackend {
    /// URL scheme used by locators for this backend.
    pub fn scheme(self) -> &'static str {
        match self {
            StorageBackend::S3 => "s3",
            StorageBackend::Local => "file",
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme() {
        assert_eq!(StorageBackend::S3.scheme(), "s3");
        assert_eq!(StorageBackend::Local.scheme(), "file");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(StorageBackend::Local.to_string(), "local");
        assert_eq!(StorageBackend::S3.to_string(), "s3");
    }
}
