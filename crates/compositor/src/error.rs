//! Error types for compositing and image output.

use raster_common::{PixelType, RasterError, SampleType};
use thiserror::Error;

use crate::output::OutputFormat;

/// Errors raised while compositing rasters or encoding output images.
#[derive(Error, Debug)]
pub enum CompositeError {
    /// The conversion is not defined for this pixel format.
    #[error("cannot {operation} a {sample_type} {pixel_type} raster")]
    Unsupported {
        operation: &'static str,
        sample_type: SampleType,
        pixel_type: PixelType,
    },

    /// The output image format is recognised but cannot be produced.
    #[error("output format {0} is not supported")]
    UnsupportedOutput(OutputFormat),

    /// An image encoder failed.
    #[error("{format} encoding failed: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },

    /// Data model validation failed.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl CompositeError {
    pub(crate) fn unsupported(operation: &'static str, sample_type: SampleType, pixel_type: PixelType) -> Self {
        Self::Unsupported {
            operation,
            sample_type,
            pixel_type,
        }
    }

    pub(crate) fn encode(format: OutputFormat, msg: impl std::fmt::Display) -> Self {
        Self::Encode {
            format,
            message: msg.to_string(),
        }
    }
}

impl From<CompositeError> for RasterError {
    fn from(err: CompositeError) -> Self {
        match err {
            CompositeError::Raster(inner) => inner,
            CompositeError::Unsupported { .. } => RasterError::mismatch(err.to_string()),
            CompositeError::UnsupportedOutput(_) => RasterError::invalid(err.to_string()),
            CompositeError::Encode { .. } => RasterError::Codec(err.to_string()),
        }
    }
}

/// Result type for compositor operations.
pub type Result<T> = std::result::Result<T, CompositeError>;
