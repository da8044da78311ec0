//! Error types for iblenv-rs.

use thiserror::Error;

/// The main error type for iblenv-rs operations.
#[derive(Error, Debug)]
pub enum IblError {
    /// The container does not start with the `.iblenv` magic number.
    #[error("environment header is corrupt")]
    CorruptHeader,

    /// The container declares a schema version this build cannot read.
    #[error("environment version {0} unsupported")]
    UnsupportedVersion(u32),

    /// The container declares an unknown compression id.
    #[error("environment compression id {0} unsupported")]
    UnsupportedCompression(u32),

    /// A source image or environment has no texels.
    #[error("input has zero size")]
    ZeroSizeInput,

    /// The stream ended before the expected number of bytes was read.
    #[error("input truncated: expected {expected} bytes, got {actual}")]
    DecodeTruncated { expected: usize, actual: usize },

    /// Compression was configured more than once on the same encoder.
    #[error("compression already configured")]
    EncodeConfigConflict,

    /// An accelerated backend could not be created.
    #[error("backend initialization failed: {0}")]
    BackendInitFailed(String),

    /// An accelerated backend failed while computing.
    #[error("backend computation failed: {0}")]
    BackendComputeFailed(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Only 3 (RGB) and 4 (RGBA) channel pixels are supported.
    #[error("unsupported channel count {0}, expected 3 or 4")]
    InvalidChannels(usize),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image decoding error.
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl IblError {
    /// Returns true if the caller can recover by switching to the software backend.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BackendInitFailed(_))
    }
}

/// A specialized Result type for iblenv-rs operations.
pub type Result<T> = std::result::Result<T, IblError>;
