//! Storage locator parsing
//!
//! A storage locator is the single URL that names the storage substrate:
//!
//! - `file:///var/lib/stowage` or a bare path selects the local filesystem.
//!   Relative paths are resolved against the application root by the caller.
//! - `s3://bucket/prefix` selects an S3-compatible object store. Credentials
//!   are never part of the locator; they come from [`crate::S3Settings`].

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::storage_types::StorageBackend;

/// Errors raised while parsing a storage locator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    #[error("Storage locator is empty")]
    Empty,

    #[error("Unsupported storage scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Malformed storage locator {locator}: {reason}")]
    Malformed { locator: String, reason: String },
}

/// Parsed storage locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocator {
    /// Local filesystem rooted at `base_path`
    File { base_path: PathBuf },
    /// Object store bucket with an optional key prefix (no leading/trailing `/`)
    S3 { bucket: String, prefix: String },
}

impl StorageLocator {
    pub fn backend(&self) -> StorageBackend {
        match self {
            StorageLocator::File { .. } => StorageBackend::Local,
            StorageLocator::S3 { .. } => StorageBackend::S3,
        }
    }

    /// Resolve a filesystem base path against `app_root` when it is relative.
    ///
    /// Object store locators are returned unchanged.
    pub fn resolve(self, app_root: &Path) -> Self {
        match self {
            StorageLocator::File { base_path } if base_path.is_relative() => StorageLocator::File {
                base_path: app_root.join(base_path),
            },
            other => other,
        }
    }

    fn parse_file(locator: &str, path: &str) -> Result<Self, LocatorError> {
        if path.is_empty() {
            return Err(malformed(locator, "missing filesystem path"));
        }
        Ok(StorageLocator::File {
            base_path: PathBuf::from(path),
        })
    }

    fn parse_s3(locator: &str, rest: &str) -> Result<Self, LocatorError> {
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(malformed(locator, "missing bucket name"));
        }
        if !is_valid_bucket_name(bucket) {
            return Err(malformed(locator, "invalid bucket name"));
        }

        let prefix = prefix.trim_matches('/');
        if prefix.split('/').any(|segment| segment == "..") {
            return Err(malformed(locator, "prefix must not contain '..'"));
        }

        Ok(StorageLocator::S3 {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

impl FromStr for StorageLocator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let locator = s.trim();
        if locator.is_empty() {
            return Err(LocatorError::Empty);
        }
        if locator.contains('?') || locator.contains('#') {
            return Err(malformed(locator, "query and fragment components are not allowed"));
        }

        match locator.split_once("://") {
            Some((scheme, rest)) => match scheme.to_lowercase().as_str() {
                "file" => Self::parse_file(locator, rest),
                "s3" => Self::parse_s3(locator, rest),
                other => Err(LocatorError::UnsupportedScheme(other.to_string())),
            },
            None => Self::parse_file(locator, locator),
        }
    }
}

impl Display for StorageLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let scheme = self.backend().scheme();
        match self {
            StorageLocator::File { base_path } => write!(f, "{}://{}", scheme, base_path.display()),
            StorageLocator::S3 { bucket, prefix } if prefix.is_empty() => {
                write!(f, "{}://{}", scheme, bucket)
            }
            StorageLocator::S3 { bucket, prefix } => {
                write!(f, "{}://{}/{}", scheme, bucket, prefix)
            }
        }
    }
}

fn malformed(locator: &str, reason: &str) -> LocatorError {
    LocatorError::Malformed {
        locator: locator.to_string(),
        reason: reason.to_string(),
    }
}

/// S3 bucket naming rules: 3-63 chars of lowercase letters, digits, `-` and `.`,
/// starting and ending with a letter or digit.
fn is_valid_bucket_name(bucket: &str) -> bool {
    let len_ok = (3..=63).contains(&bucket.len());
    let chars_ok = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let edges_ok = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);
    len_ok && chars_ok && edges_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_absolute() {
        let locator: StorageLocator = "file:///data".parse().unwrap();
        assert_eq!(
            locator,
            StorageLocator::File {
                base_path: PathBuf::from("/data")
            }
        );
        assert_eq!(locator.backend(), StorageBackend::Local);
        assert_eq!(locator.to_string(), "file:///data");
    }

    #[test]
    fn test_parse_bare_path() {
        let locator: StorageLocator = "static/uploads".parse().unwrap();
        assert_eq!(
            locator,
            StorageLocator::File {
                base_path: PathBuf::from("static/uploads")
            }
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        let locator: StorageLocator = "file://uploads".parse().unwrap();
        let resolved = locator.resolve(Path::new("/srv/app"));
        assert_eq!(
            resolved,
            StorageLocator::File {
                base_path: PathBuf::from("/srv/app/uploads")
            }
        );

        let absolute: StorageLocator = "/data".parse().unwrap();
        assert_eq!(absolute.clone().resolve(Path::new("/srv/app")), absolute);
    }

    #[test]
    fn test_parse_s3() {
        let locator: StorageLocator = "s3://my-bucket/assets/".parse().unwrap();
        assert_eq!(
            locator,
            StorageLocator::S3 {
                bucket: "my-bucket".to_string(),
                prefix: "assets".to_string()
            }
        );
        assert_eq!(locator.backend(), StorageBackend::S3);
        assert_eq!(locator.to_string(), "s3://my-bucket/assets");

        let no_prefix: StorageLocator = "s3://my-bucket".parse().unwrap();
        assert_eq!(no_prefix.to_string(), "s3://my-bucket");
    }

    #[test]
    fn test_reject_malformed() {
        assert_eq!("".parse::<StorageLocator>(), Err(LocatorError::Empty));
        assert!(matches!(
            "ftp://host/path".parse::<StorageLocator>(),
            Err(LocatorError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            "s3:///prefix".parse::<StorageLocator>(),
            Err(LocatorError::Malformed { .. })
        ));
        assert!(matches!(
            "s3://Bad_Bucket/x".parse::<StorageLocator>(),
            Err(LocatorError::Malformed { .. })
        ));
        assert!(matches!(
            "file://".parse::<StorageLocator>(),
            Err(LocatorError::Malformed { .. })
        ));
        assert!(matches!(
            "s3://bucket/x?versionId=1".parse::<StorageLocator>(),
            Err(LocatorError::Malformed { .. })
        ));
        assert!(matches!(
            "s3://bucket/../escape".parse::<StorageLocator>(),
            Err(LocatorError::Malformed { .. })
        ));
    }
}
