//! Image normalization module
//!
//! This module provides:
//! - Stream cursor preservation (cursor)
//! - Static/animated classification (probe)
//! - WebP normalization (normalizer)

pub mod cursor;
pub mod normalizer;
pub mod probe;

pub use cursor::CursorGuard;
pub use normalizer::{flatten_to_rgb, normalize_image, NormalizedImage, WEBP_EXTENSION};
pub use probe::{classify, is_animated, ImageKind};
