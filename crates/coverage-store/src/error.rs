//! Error types for the coverage store.

use compositor::{CompositeError, OutputFormat};
use pyramid::PyramidError;
use raster_common::{ErrorKind, RasterError};
use raster_stats::StatsError;
use thiserror::Error;
use tile_codec::CodecError;

/// Result type alias using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by store operations.
///
/// Request errors mean the caller asked for something invalid; data errors
/// mean the stored tiles or metadata cannot be trusted.
#[derive(Error, Debug)]
pub enum StoreError {
    // === Request Errors ===
    #[error("Coverage not found: {0}")]
    CoverageNotFound(String),

    #[error("Coverage already exists: {0}")]
    CoverageExists(String),

    #[error("Section {section_id} not found in coverage {coverage}")]
    SectionNotFound { coverage: String, section_id: i64 },

    #[error("Unsupported output format: {0}")]
    UnsupportedOutputFormat(OutputFormat),

    /// The requested window would need more pixels than the configured ceiling,
    /// usually because no pyramid level is coarse enough.
    #[error("Requested raster of {width}x{height} exceeds the limit of {limit} pixels")]
    RasterTooLarge { width: u64, height: u64, limit: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // === Data Errors ===
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// Data model error; classified by its [`ErrorKind`].
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Tile codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Create an InvalidRequest error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a Corrupt error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// The caller asked for something that cannot be served.
    pub fn is_request_error(&self) -> bool {
        match self {
            StoreError::CoverageNotFound(_)
            | StoreError::CoverageExists(_)
            | StoreError::SectionNotFound { .. }
            | StoreError::UnsupportedOutputFormat(_)
            | StoreError::RasterTooLarge { .. }
            | StoreError::InvalidRequest(_)
            | StoreError::Config(_) => true,
            StoreError::Raster(e) => raster_request_kind(e.kind()),
            StoreError::Codec(CodecError::Raster(e)) => raster_request_kind(e.kind()),
            StoreError::Codec(CodecError::Unavailable(_)) => true,
            StoreError::Codec(CodecError::UnsupportedScale { .. }) => true,
            _ => false,
        }
    }

    /// Stored data or the database failed.
    pub fn is_data_error(&self) -> bool {
        match self {
            StoreError::Corrupt(_) | StoreError::Database(_) | StoreError::Encode(_) => true,
            StoreError::Raster(_) | StoreError::Codec(_) => !self.is_request_error(),
            _ => false,
        }
    }
}

fn raster_request_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidArgument | ErrorKind::FormatMismatch | ErrorKind::UnsupportedCombination
    )
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<StatsError> for StoreError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::Raster(inner) => StoreError::Raster(inner),
            other => StoreError::Corrupt(other.to_string()),
        }
    }
}

impl From<PyramidError> for StoreError {
    fn from(err: PyramidError) -> Self {
        match err {
            PyramidError::NoLevels(what) => StoreError::Corrupt(format!("no pyramid levels stored for {}", what)),
            e @ PyramidError::InvalidResolution { .. } => StoreError::InvalidRequest(e.to_string()),
            PyramidError::Raster(inner) => StoreError::Raster(inner),
        }
    }
}

impl From<CompositeError> for StoreError {
    fn from(err: CompositeError) -> Self {
        match err {
            CompositeError::UnsupportedOutput(format) => StoreError::UnsupportedOutputFormat(format),
            e @ CompositeError::Unsupported { .. } => StoreError::InvalidRequest(e.to_string()),
            e @ CompositeError::Encode { .. } => StoreError::Encode(e.to_string()),
            CompositeError::Raster(inner) => StoreError::Raster(inner),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::Compression;

    #[test]
    fn test_request_vs_data() {
        assert!(StoreError::CoverageNotFound("dem".into()).is_request_error());
        assert!(StoreError::UnsupportedOutputFormat(OutputFormat::Pdf).is_request_error());
        assert!(StoreError::RasterTooLarge { width: 1, height: 1, limit: 0 }.is_request_error());
        assert!(StoreError::Corrupt("bad".into()).is_data_error());
        assert!(!StoreError::Corrupt("bad".into()).is_request_error());
    }

    #[test]
    fn test_wrapped_errors_follow_kind() {
        let mismatch: StoreError = RasterError::mismatch("int16 vs uint8").into();
        assert!(mismatch.is_request_error());
        let broken: StoreError = RasterError::consistency("unmapped enum").into();
        assert!(broken.is_data_error());
        let crc: StoreError = CodecError::ChecksumMismatch { stored: 1, computed: 2 }.into();
        assert!(crc.is_data_error());
        let missing: StoreError = CodecError::Unavailable(Compression::Lzma).into();
        assert!(missing.is_request_error());
    }

    #[test]
    fn test_conversions() {
        let err: StoreError = PyramidError::NoLevels("dem".into()).into();
        assert!(matches!(err, StoreError::Corrupt(_)));
        let err: StoreError = CompositeError::UnsupportedOutput(OutputFormat::Pdf).into();
        assert!(matches!(err, StoreError::UnsupportedOutputFormat(OutputFormat::Pdf)));
        let err: StoreError = StatsError::malformed("short").into();
        assert!(err.is_data_error());
    }
}
