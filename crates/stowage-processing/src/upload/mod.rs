//! Upload pipeline: validate → normalize → store.

pub mod pipeline;
pub mod types;

pub use pipeline::{replace_upload, sanitize_filename, store_upload};
pub use types::{ReplacedUpload, StoredUpload, UploadRequest};
