//! Stowage Processing Library
//!
//! Media normalization and the upload pipeline:
//!
//! - [`image`]: the animation probe and the WebP normalizer. It works on any
//!   `Read + Seek` stream and has no dependency on storage.
//! - [`upload`]: validate → normalize (featured images only) → store, built on
//!   top of `stowage-storage`.

#[cfg(feature = "image")]
pub mod compression;
pub mod error;
#[cfg(feature = "image")]
pub mod image;
#[cfg(feature = "image")]
pub mod upload;
pub mod validator;

pub use error::ProcessingError;
#[cfg(feature = "image")]
pub use self::image::{is_animated, normalize_image, CursorGuard, ImageKind, NormalizedImage};
#[cfg(feature = "image")]
pub use upload::{replace_upload, store_upload, ReplacedUpload, StoredUpload, UploadRequest};
pub use validator::{UploadValidator, ValidationError};
