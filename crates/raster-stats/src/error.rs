//! Error types for raster statistics.

use raster_common::RasterError;
use thiserror::Error;

/// Errors raised while computing, merging or decoding statistics.
#[derive(Error, Debug)]
pub enum StatsError {
    /// Serialized statistics are truncated or inconsistent.
    #[error("malformed statistics blob: {0}")]
    Malformed(String),

    /// The stored CRC does not match the blob contents.
    #[error("statistics checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Two statistics objects describe different sample types or band counts.
    #[error("incompatible statistics: {0}")]
    Incompatible(String),

    /// Data model validation failed.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl StatsError {
    /// Create a Malformed error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<StatsError> for RasterError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::Raster(inner) => inner,
            StatsError::Incompatible(msg) => RasterError::mismatch(msg),
            other => RasterError::consistency(other.to_string()),
        }
    }
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;
