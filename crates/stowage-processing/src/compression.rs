//! WebP encoding
//!
//! Two encoder profiles cover every normalized output:
//!
//! - [`WebPProfile::Photo`]: lossy, high quality, exact colors (static images)
//! - [`WebPProfile::Graphic`]: lossless with the graphics hint (animations)
//!
//! Both run at the slowest, best-compressing method.

use ::image::{RgbImage, RgbaImage};
use libwebp_sys::{WebPConfig, WebPImageHint};

use crate::error::ProcessingError;

/// Quality used for lossy static images (0-100)
pub const STATIC_WEBP_QUALITY: f32 = 90.0;

/// libwebp method: 0 = fastest, 6 = best compression
const MAX_METHOD: i32 = 6;

/// Loop count 0 means the animation repeats forever
const INFINITE_LOOP: i32 = 0;

/// Encoder settings for normalized WebP output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WebPProfile {
    Photo { quality: f32 },
    Graphic,
}

impl Default for WebPProfile {
    fn default() -> Self {
        WebPProfile::Photo {
            quality: STATIC_WEBP_QUALITY,
        }
    }
}

impl WebPProfile {
    /// Build the libwebp configuration for this profile
    pub fn config(self) -> Result<WebPConfig, ProcessingError> {
        let mut config = WebPConfig::new().map_err(|_| {
            ProcessingError::EncodeFailed("Failed to initialise WebP encoder config".to_string())
        })?;

        config.method = MAX_METHOD;

        match self {
            WebPProfile::Photo { quality } => {
                config.lossless = 0;
                config.quality = quality.clamp(0.0, 100.0);
                config.exact = 1;
            }
            WebPProfile::Graphic => {
                config.lossless = 1;
                // In lossless mode quality is the effort spent compressing
                config.quality = 100.0;
                config.image_hint = WebPImageHint::WEBP_HINT_GRAPH;
            }
        }

        Ok(config)
    }
}

/// One decoded animation frame on the full canvas
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub buffer: RgbaImage,
    /// Start time of the frame in milliseconds
    pub timestamp_ms: i32,
}

/// Encode an opaque RGB image as lossy WebP
pub fn encode_static_webp(img: &RgbImage, profile: WebPProfile) -> Result<Vec<u8>, ProcessingError> {
    let (width, height) = img.dimensions();
    let config = profile.config()?;

    let encoder = webp::Encoder::from_rgb(img.as_raw(), width, height);
    let webp_data = encoder.encode_advanced(&config).map_err(|e| {
        ProcessingError::EncodeFailed(format!("WebP encoding failed: {:?}", e))
    })?;

    Ok(webp_data.to_vec())
}

/// Encode frames as an infinitely looping lossless animated WebP
pub fn encode_animated_webp(
    frames: &[AnimationFrame],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, ProcessingError> {
    if frames.is_empty() {
        return Err(ProcessingError::EncodeFailed(
            "Animation has no frames".to_string(),
        ));
    }

    let config = WebPProfile::Graphic.config()?;
    let mut encoder = webp::AnimEncoder::new(width, height, &config);
    encoder.set_loop_count(INFINITE_LOOP);

    for frame in frames {
        encoder.add_frame(webp::AnimFrame::from_rgba(
            frame.buffer.as_raw(),
            width,
            height,
            frame.timestamp_ms,
        ));
    }

    let webp_data = encoder.try_encode().map_err(|e| {
        ProcessingError::EncodeFailed(format!("Animated WebP encoding failed: {:?}", e))
    })?;

    Ok(webp_data.to_vec())
}
