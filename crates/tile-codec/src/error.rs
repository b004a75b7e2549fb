//! Error types for tile encoding and decoding.

use raster_common::{Compression, RasterError};
use thiserror::Error;

/// Errors raised while encoding or decoding tile blobs.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The blob is truncated or its header is inconsistent.
    #[error("malformed tile blob: {0}")]
    Malformed(String),

    /// The stored CRC does not match the blob contents.
    #[error("tile blob checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// A compression backend reported an error.
    #[error("{codec} backend failed: {message}")]
    Backend { codec: Compression, message: String },

    /// No backend is registered for this compression.
    #[error("no codec backend registered for {0}")]
    Unavailable(Compression),

    /// The codec cannot decode at a reduced scale.
    #[error("{codec} tiles cannot be decoded at scale 1:{factor}")]
    UnsupportedScale { codec: Compression, factor: u32 },

    /// Data model validation failed.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl CodecError {
    /// Create a Malformed error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create a Backend error.
    pub fn backend(codec: Compression, msg: impl std::fmt::Display) -> Self {
        Self::Backend {
            codec,
            message: msg.to_string(),
        }
    }
}

impl From<CodecError> for RasterError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Raster(inner) => inner,
            other => RasterError::Codec(other.to_string()),
        }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
