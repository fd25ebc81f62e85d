//! Stowage Core Library
//!
//! This crate provides the configuration, storage locator parsing and shared
//! storage types used by every Stowage component.

pub mod config;
pub mod locator;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, S3Settings, StorageConfig, UploadConfig};
pub use locator::{LocatorError, StorageLocator};
pub use storage_types::StorageBackend;
