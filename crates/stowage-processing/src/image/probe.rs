//! Animation probe
//!
//! Classifies an encoded image as static or animated by trying to reach its
//! second frame. The probe is a best-effort heuristic: any decode failure
//! classifies the input as static and is never reported to the caller.
//! Whether the image is decodable at all is decided later by the normalizer.

use ::image::codecs::gif::GifDecoder;
use ::image::codecs::png::PngDecoder;
use ::image::codecs::webp::WebPDecoder;
use ::image::{AnimationDecoder, ImageError, ImageFormat};
use std::io::{Cursor, Read, Seek};

use super::cursor::CursorGuard;

/// Static or animated image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Static,
    Animated,
}

impl ImageKind {
    pub fn is_animated(self) -> bool {
        self == ImageKind::Animated
    }
}

/// Check whether the image in `stream` has more than one frame.
///
/// The stream is read from the start; its position is restored before
/// returning, whatever the outcome.
pub fn is_animated<R: Read + Seek + ?Sized>(stream: &mut R) -> bool {
    let mut guard = match CursorGuard::new(stream) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::debug!(error = %e, "Animation probe could not read stream position");
            return false;
        }
    };

    match guard.read_from_start() {
        Ok(data) => classify(&data).is_animated(),
        Err(e) => {
            tracing::debug!(error = %e, "Animation probe could not read stream");
            false
        }
    }
}

/// Classify encoded image bytes, failing open to [`ImageKind::Static`].
pub fn classify(data: &[u8]) -> ImageKind {
    match has_second_frame(data) {
        Ok(true) => ImageKind::Animated,
        Ok(false) => ImageKind::Static,
        Err(e) => {
            tracing::debug!(error = %e, "Animation probe failed, treating image as static");
            ImageKind::Static
        }
    }
}

fn has_second_frame(data: &[u8]) -> Result<bool, ImageError> {
    let mut frames = match ::image::guess_format(data)? {
        ImageFormat::Gif => GifDecoder::new(Cursor::new(data))?.into_frames(),
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(data))?;
            if !decoder.is_apng()? {
                return Ok(false);
            }
            decoder.apng()?.into_frames()
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(data))?;
            if !decoder.has_animation() {
                return Ok(false);
            }
            decoder.into_frames()
        }
        _ => return Ok(false),
    };

    match frames.nth(1) {
        Some(Ok(_)) => Ok(true),
        // End of data before a second frame
        None => Ok(false),
        Some(Err(e)) => Err(e),
    }
}
