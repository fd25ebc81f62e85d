//! Configuration module
//!
//! Process-wide configuration is read once, from the environment (and an
//! optional `.env` file), into explicit structs that are passed to the storage
//! factory and the upload pipeline. Nothing downstream reads the environment.

use std::env;
use std::path::PathBuf;

use crate::locator::StorageLocator;

// Common constants
const DEFAULT_STORAGE_URL: &str = "file://uploads";
const DEFAULT_LOCAL_URL_PREFIX: &str = "/uploads";
const DEFAULT_S3_REGION: &str = "us-east-1";
const MAX_FILE_SIZE_MB: usize = 100;
const DEFAULT_ALLOWED_EXTENSIONS: &str =
    "png,jpg,jpeg,gif,pdf,zip,spp,unitypackage,fbx,blend,webp";

/// Object store connection settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct S3Settings {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub endpoint_url: Option<String>,
    /// Public base URL (CDN or custom domain) used when building object URLs
    pub public_url: Option<String>,
    pub region: String,
}

impl S3Settings {
    /// Return the configured (access key, secret key) pair.
    pub fn credentials(&self) -> Result<(&str, &str), anyhow::Error> {
        let access_key = self
            .access_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("S3_ACCESS_KEY not configured"))?;
        let secret_key = self
            .secret_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("S3_SECRET_KEY not configured"))?;
        Ok((access_key, secret_key))
    }
}

/// Storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Storage locator URL (`file://...`, bare path or `s3://bucket/prefix`)
    pub storage_url: String,
    /// Base directory for relative filesystem locators
    pub app_root: PathBuf,
    /// Path prefix returned by `url_for` on the local filesystem backend
    pub local_url_prefix: String,
    pub s3: S3Settings,
}

impl StorageConfig {
    /// Local filesystem configuration rooted at `base_path`.
    pub fn local(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            storage_url: format!("file://{}", base_path.display()),
            app_root: PathBuf::from("."),
            local_url_prefix: DEFAULT_LOCAL_URL_PREFIX.to_string(),
            s3: S3Settings {
                region: DEFAULT_S3_REGION.to_string(),
                ..S3Settings::default()
            },
        }
    }

    /// Parse the storage locator and resolve relative filesystem paths
    /// against the application root.
    pub fn locator(&self) -> Result<StorageLocator, anyhow::Error> {
        let locator: StorageLocator = self.storage_url.parse()?;
        Ok(locator.resolve(&self.app_root))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let StorageLocator::S3 { .. } = self.locator()? {
            self.s3.credentials()?;
        }
        Ok(())
    }

    fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_root = match var("APP_ROOT") {
            Some(root) => PathBuf::from(root),
            None => env::current_dir()
                .map_err(|e| anyhow::anyhow!("Failed to determine current directory: {}", e))?,
        };

        Ok(Self {
            storage_url: var("STORAGE_URL").unwrap_or_else(|| DEFAULT_STORAGE_URL.to_string()),
            app_root,
            local_url_prefix: var("LOCAL_STORAGE_URL_PREFIX")
                .unwrap_or_else(|| DEFAULT_LOCAL_URL_PREFIX.to_string()),
            s3: S3Settings {
                access_key: var("S3_ACCESS_KEY"),
                secret_key: var("S3_SECRET_KEY"),
                endpoint_url: var("S3_ENDPOINT_URL").filter(|s| !s.is_empty()),
                public_url: var("S3_PUBLIC_URL").filter(|s| !s.is_empty()),
                region: var("S3_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            },
        })
    }
}

/// Upload validation configuration
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: usize,
    /// Lower-cased extensions without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: parse_list(DEFAULT_ALLOWED_EXTENSIONS),
        }
    }
}

impl UploadConfig {
    fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_file_size_mb = match var("MAX_FILE_SIZE_MB") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                anyhow::anyhow!("MAX_FILE_SIZE_MB must be a whole number, got {:?}: {}", raw, e)
            })?,
            None => MAX_FILE_SIZE_MB,
        };
        let max_file_size_bytes = max_file_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", max_file_size_mb)
            })?;

        let allowed_extensions = parse_list(
            &var("ALLOWED_EXTENSIONS").unwrap_or_else(|| DEFAULT_ALLOWED_EXTENSIONS.to_string()),
        );

        Ok(Self {
            max_file_size_bytes,
            allowed_extensions,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be at least 1"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS must not be empty"));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            storage: StorageConfig::from_vars(&var)?,
            upload: UploadConfig::from_vars(&var)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.storage.validate()?;
        self.upload.validate()
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
