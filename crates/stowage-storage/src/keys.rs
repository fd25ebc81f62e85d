//! Shared key validation and generation for storage backends.

use crate::traits::{StorageError, StorageResult};
use std::path::Path;
use uuid::Uuid;

/// Reject keys that are empty or could escape the storage root.
///
/// All backends call this before any substrate access.
pub fn validate_storage_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.trim().is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }

    if storage_key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Storage key contains a NUL byte".to_string(),
        ));
    }

    if storage_key.starts_with('/') || storage_key.starts_with('\\') || has_drive_prefix(storage_key)
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            storage_key
        )));
    }

    if storage_key.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains a path traversal sequence: {}",
            storage_key
        )));
    }

    Ok(())
}

fn has_drive_prefix(storage_key: &str) -> bool {
    let bytes = storage_key.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Generate a collision-resistant key that keeps the original extension.
///
/// `photo.PNG` becomes `<32 hex chars>.png`; names without an extension get
/// the bare token.
pub fn generate_storage_key(original_filename: &str) -> String {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    generate_storage_key_with_extension(extension)
}

/// Generate a key with an explicit extension, given with or without the dot.
pub fn generate_storage_key_with_extension(extension: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    match extension.trim_start_matches('.') {
        "" => token,
        ext => format!("{}.{}", token, ext.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_storage_key("abc123.webp").is_ok());
        assert!(validate_storage_key("nested/dir/file.bin").is_ok());
    }

    #[test]
    fn test_rejected_keys() {
        for key in [
            "",
            "   ",
            "../etc/passwd",
            "a/../../b",
            "..",
            "/etc/passwd",
            "\\windows\\system32",
            "C:evil",
            "bad\0key",
        ] {
            assert!(
                matches!(validate_storage_key(key), Err(StorageError::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_generate_key_keeps_extension() {
        let key = generate_storage_key("Photo.PNG");
        assert!(key.ends_with(".png"));
        assert_eq!(key.len(), 32 + ".png".len());
        assert!(validate_storage_key(&key).is_ok());
    }

    #[test]
    fn test_generate_key_without_extension() {
        let key = generate_storage_key("README");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_key_with_extension() {
        assert!(generate_storage_key_with_extension(".webp").ends_with(".webp"));
        assert!(generate_storage_key_with_extension("WEBP").ends_with(".webp"));
        assert_eq!(generate_storage_key_with_extension("").len(), 32);
    }

    #[test]
    fn test_generated_keys_are_unique() {
        assert_ne!(generate_storage_key("a.zip"), generate_storage_key("a.zip"));
    }
}
