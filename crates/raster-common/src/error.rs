//! Error types for the raster data model.

use thiserror::Error;

use crate::sample::{Compression, PixelType, SampleType};

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// Broad classification of a [`RasterError`].
///
/// Callers use this to tell a bad request apart from corrupt data without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    FormatMismatch,
    UnsupportedCombination,
    CodecFailure,
    ConsistencyViolation,
}

/// Primary error type for pixel, palette, raster and coverage operations.
#[derive(Debug, Error)]
pub enum RasterError {
    // === Argument Errors ===
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Band index {band} out of range (raster has {bands} bands)")]
    BandOutOfRange { band: usize, bands: usize },

    #[error("Sample value {value} exceeds the {sample_type} maximum of {max}")]
    SampleOutOfRange {
        sample_type: SampleType,
        value: u32,
        max: u32,
    },

    #[error("Operation not defined on the \"none\" pixel")]
    NonePixel,

    // === Format Errors ===
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    #[error("Sample accessor {requested} used on a {actual} pixel")]
    SampleTypeMismatch {
        requested: SampleType,
        actual: SampleType,
    },

    #[error("Unsupported combination: {sample_type} {pixel_type} with {bands} band(s) and {compression} compression")]
    UnsupportedCombination {
        sample_type: SampleType,
        pixel_type: PixelType,
        bands: u8,
        compression: Compression,
    },

    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    // === Codec Errors ===
    #[error("Codec failure: {0}")]
    Codec(String),

    // === Consistency Errors ===
    #[error("Consistency violation: {0}")]
    Consistency(String),
}

impl RasterError {
    /// Classify this error into the taxonomy callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RasterError::InvalidArgument(_)
            | RasterError::BandOutOfRange { .. }
            | RasterError::SampleOutOfRange { .. }
            | RasterError::NonePixel => ErrorKind::InvalidArgument,

            RasterError::FormatMismatch(_) | RasterError::SampleTypeMismatch { .. } => {
                ErrorKind::FormatMismatch
            }

            RasterError::UnsupportedCombination { .. } | RasterError::UnsupportedFormat(_) => {
                ErrorKind::UnsupportedCombination
            }

            RasterError::Codec(_) => ErrorKind::CodecFailure,
            RasterError::Consistency(_) => ErrorKind::ConsistencyViolation,
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a FormatMismatch error.
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch(msg.into())
    }

    /// Create a Consistency error.
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }
}

impl From<serde_json::Error> for RasterError {
    fn from(err: serde_json::Error) -> Self {
        RasterError::Consistency(format!("JSON error: {}", err))
    }
}
