//! Stowage Storage Library
//!
//! This crate provides the storage abstraction and its substrate drivers.
//! It includes the [`Storage`] trait and implementations for the local
//! filesystem and S3-compatible object stores.
//!
//! # Storage key format
//!
//! Keys are opaque, caller-generated names such as `3f2a…9c.webp`. The
//! filesystem driver stores them under the base directory, the object store
//! driver under the locator prefix (`<prefix>/<key>`).
//!
//! Keys must not be empty, contain a `..` segment, or start with `/`, `\` or a
//! drive letter. Validation lives in the `keys` module so every backend
//! rejects the same keys before touching the substrate.

pub mod cleanup;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use cleanup::{delete_all, DeleteReport};
pub use factory::create_storage;
pub use keys::{generate_storage_key, generate_storage_key_with_extension, validate_storage_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use stowage_core::StorageBackend;
pub use traits::{ObjectHandle, OpenMode, Storage, StorageError, StorageResult};
