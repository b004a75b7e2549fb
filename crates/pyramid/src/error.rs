//! Error types for pyramid resolution and building.

use raster_common::RasterError;
use thiserror::Error;

/// Errors raised while resolving or building pyramid levels.
#[derive(Error, Debug)]
pub enum PyramidError {
    /// The coverage (or section) has no resolution rows at all.
    #[error("no pyramid levels stored for {0}")]
    NoLevels(String),

    /// A requested resolution is not a positive finite number.
    #[error("invalid requested resolution {x_res} x {y_res}")]
    InvalidResolution { x_res: f64, y_res: f64 },

    /// Data model validation failed.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl From<PyramidError> for RasterError {
    fn from(err: PyramidError) -> Self {
        match err {
            PyramidError::Raster(inner) => inner,
            PyramidError::NoLevels(_) => RasterError::consistency(err.to_string()),
            PyramidError::InvalidResolution { .. } => RasterError::invalid(err.to_string()),
        }
    }
}

/// Result type for pyramid operations.
pub type Result<T> = std::result::Result<T, PyramidError>;
