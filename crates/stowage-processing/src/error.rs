use thiserror::Error;

/// Media processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The input cannot be decoded as an image at all
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
