use stowage_core::UploadConfig;

/// Upload validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Upload validator
///
/// Checks size and extension before anything is decoded or stored.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_extensions.clone(),
        )
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate file extension (case insensitive)
    ///
    /// The extension is whatever follows the last dot, so a bare `.png` counts.
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty() && !ext.contains(['/', '\\']))
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    pub fn validate_all(&self, filename: &str, file_size: usize) -> Result<(), ValidationError> {
        self.validate_file_size(file_size)?;
        self.validate_extension(filename)?;
        Ok(())
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> UploadValidator {
        UploadValidator::new(
            1024 * 1024, // 1MB
            vec!["jpg".to_string(), ".PNG".to_string()],
        )
    }

    #[test]
    fn test_validate_file_size() {
        let validator = test_validator();
        assert!(validator.validate_file_size(512 * 1024).is_ok());
        assert!(validator.validate_file_size(1024 * 1024).is_ok());
        assert!(matches!(
            validator.validate_file_size(1024 * 1024 + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
        assert!(matches!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_validate_extension() {
        let validator = test_validator();
        assert!(validator.validate_extension("test.jpg").is_ok());
        assert!(validator.validate_extension("test.png").is_ok());
        assert!(validator.validate_extension("TEST.JPG").is_ok());
        assert!(matches!(
            validator.validate_extension("test.gif"),
            Err(ValidationError::InvalidExtension { .. })
        ));
        assert!(matches!(
            validator.validate_extension("noextension"),
            Err(ValidationError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_validate_all() {
        let validator = test_validator();
        assert!(validator.validate_all("a.jpg", 10).is_ok());
        assert!(validator.validate_all("a.jpg", 0).is_err());
        assert!(validator.validate_all("a.exe", 10).is_err());
    }

    #[test]
    fn test_default_allow_list() {
        let validator = UploadValidator::default();
        for name in ["a.png", "b.blend", "c.unitypackage", "d.spp", "e.webp", "f.fbx"] {
            assert!(validator.validate_extension(name).is_ok(), "{}", name);
        }
        assert!(validator.validate_extension("g.exe").is_err());
        assert!(validator.validate_file_size(100 * 1024 * 1024).is_ok());
        assert!(validator.validate_file_size(100 * 1024 * 1024 + 1).is_err());
    }

    #[test]
    fn test_dotfile_style_names_use_last_segment() {
        let validator = test_validator();
        assert!(validator.validate_extension(".png").is_ok());
        assert!(validator.validate_extension(".JPG").is_ok());
        assert!(validator.validate_extension("archive.tar.png").is_ok());
        assert!(matches!(
            validator.validate_extension(".gitignore"),
            Err(ValidationError::InvalidExtension { .. })
        ));
        assert!(matches!(
            validator.validate_extension("trailing."),
            Err(ValidationError::InvalidFilename(_))
        ));
        assert!(matches!(
            validator.validate_extension("dir.png/file"),
            Err(ValidationError::InvalidFilename(_))
        ));
    }
}
