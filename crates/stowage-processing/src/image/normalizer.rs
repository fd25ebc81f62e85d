//! WebP normalizer
//!
//! Converts any decodable image to WebP. Animated inputs keep every frame and
//! their timing; static inputs are flattened onto white and encoded lossy.
//! A damaged animation keeps the frames that decode before the damage, and
//! drops to a still image when fewer than two survive.

use ::image::codecs::gif::GifDecoder;
use ::image::codecs::png::PngDecoder;
use ::image::codecs::webp::WebPDecoder;
use ::image::{
    imageops, AnimationDecoder, DynamicImage, Frame, Frames, ImageFormat, ImageReader,
    ImageResult, RgbImage, RgbaImage,
};
use std::io::{Cursor, Read, Seek};
use std::time::Instant;

use super::cursor::CursorGuard;
use super::probe::{classify, ImageKind};
use crate::compression::{encode_animated_webp, encode_static_webp, AnimationFrame, WebPProfile};
use crate::error::ProcessingError;

/// Extension (with dot) of every normalized image
pub const WEBP_EXTENSION: &str = ".webp";

/// Frames without a delay are shown for this long
const DEFAULT_FRAME_DELAY_MS: i32 = 100;

/// Output of [`normalize_image`]
#[derive(Debug)]
pub struct NormalizedImage {
    /// WebP bytes, positioned at 0
    pub data: Cursor<Vec<u8>>,
    pub extension: &'static str,
    pub kind: ImageKind,
}

impl NormalizedImage {
    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

/// Normalize the image in `stream` to WebP.
///
/// The whole stream is read from the start regardless of its current
/// position, and that position is restored before returning, on success and
/// on error alike.
pub fn normalize_image<R: Read + Seek + ?Sized>(
    stream: &mut R,
) -> Result<NormalizedImage, ProcessingError> {
    let start = Instant::now();
    let mut guard = CursorGuard::new(stream)?;
    let data = guard.read_from_start()?;

    let (kind, encoded) = match classify(&data) {
        ImageKind::Animated => match transcode_animated(&data)? {
            Some(encoded) => (ImageKind::Animated, encoded),
            None => (ImageKind::Static, transcode_static(&data)?),
        },
        ImageKind::Static => (ImageKind::Static, transcode_static(&data)?),
    };

    tracing::info!(
        kind = ?kind,
        input_bytes = data.len(),
        size_bytes = encoded.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Image normalized to WebP"
    );

    Ok(NormalizedImage {
        data: Cursor::new(encoded),
        extension: WEBP_EXTENSION,
        kind,
    })
}

fn transcode_static(data: &[u8]) -> Result<Vec<u8>, ProcessingError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .map_err(|e| ProcessingError::UnsupportedImage(e.to_string()))?;

    encode_static_webp(&flatten_to_rgb(&img), WebPProfile::default())
}

/// Encode the decodable frames of an animation.
///
/// Returns `None` when fewer than two frames decode.
fn transcode_animated(data: &[u8]) -> Result<Option<Vec<u8>>, ProcessingError> {
    let frames = decode_frames(data);
    if frames.len() < 2 {
        tracing::debug!(
            frames = frames.len(),
            "Too few decodable frames, encoding as a still image"
        );
        return Ok(None);
    }

    let (width, height) = frames[0].buffer().dimensions();

    let mut timestamp_ms = 0i32;
    let mut encoded_frames = Vec::with_capacity(frames.len());
    for frame in frames {
        let delay_ms = frame_delay_ms(&frame);
        let buffer = fit_to_canvas(frame, width, height);
        encoded_frames.push(AnimationFrame {
            buffer,
            timestamp_ms,
        });
        timestamp_ms = timestamp_ms.saturating_add(delay_ms);
    }

    encode_animated_webp(&encoded_frames, width, height).map(Some)
}

/// Decode frames up to the first one that fails.
fn decode_frames(data: &[u8]) -> Vec<Frame> {
    let frames = match animation_frames(data) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::debug!(error = %e, "Animation decoder rejected input");
            return Vec::new();
        }
    };

    let mut decoded = Vec::new();
    for frame in frames {
        match frame {
            Ok(frame) => decoded.push(frame),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    frames = decoded.len(),
                    "Animation is truncated, keeping frames decoded so far"
                );
                break;
            }
        }
    }
    decoded
}

fn animation_frames(data: &[u8]) -> ImageResult<Frames<'_>> {
    match ::image::guess_format(data)? {
        ImageFormat::Gif => Ok(GifDecoder::new(Cursor::new(data))?.into_frames()),
        ImageFormat::Png => Ok(PngDecoder::new(Cursor::new(data))?.apng()?.into_frames()),
        ImageFormat::WebP => Ok(WebPDecoder::new(Cursor::new(data))?.into_frames()),
        format => Err(::image::ImageError::Unsupported(
            ::image::error::UnsupportedError::from_format_and_kind(
                format.into(),
                ::image::error::UnsupportedErrorKind::GenericFeature(
                    "animation".to_string(),
                ),
            ),
        )),
    }
}

fn frame_delay_ms(frame: &Frame) -> i32 {
    let (numer, denom) = frame.delay().numer_denom_ms();
    let ms = if denom == 0 { 0 } else { numer / denom };
    match i32::try_from(ms) {
        Ok(0) => DEFAULT_FRAME_DELAY_MS,
        Ok(ms) => ms,
        Err(_) => i32::MAX,
    }
}

/// Place a frame on a canvas of the animation's size.
fn fit_to_canvas(frame: Frame, width: u32, height: u32) -> RgbaImage {
    let (left, top) = (frame.left(), frame.top());
    let buffer = frame.into_buffer();
    if buffer.dimensions() == (width, height) && left == 0 && top == 0 {
        return buffer;
    }

    let mut canvas = RgbaImage::new(width, height);
    imageops::overlay(&mut canvas, &buffer, i64::from(left), i64::from(top));
    canvas
}

/// Drop alpha by compositing onto opaque white.
pub fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        ::image::Rgb([blend_white(r, a), blend_white(g, a), blend_white(b, a)])
    })
}

fn blend_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u16::from(channel), u16::from(alpha));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
