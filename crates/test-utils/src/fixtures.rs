//! Common fixtures: coverages, extents and scratch databases.

use std::path::PathBuf;

use raster_common::{Compression, Coverage, Pixel, PixelFormat};
use tempfile::TempDir;

/// Common bounding box definitions for testing.
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// A small projected extent (metres)
    pub const SMALL_UTM: (f64, f64, f64, f64) = (500_000.0, 4_000_000.0, 501_024.0, 4_001_024.0);
}

/// Common SRIDs.
pub mod srid {
    pub const WGS84: i32 = 4326;
    pub const WEB_MERCATOR: i32 = 3857;
    pub const UTM_32N: i32 = 32632;
}

/// A georeferenced coverage with 256x256 tiles.
pub fn test_coverage(
    name: &str,
    format: PixelFormat,
    compression: Compression,
    res: f64,
    no_data: Option<Pixel>,
) -> Coverage {
    let mut coverage = Coverage::create(
        name,
        format.sample_type,
        format.pixel_type,
        format.bands,
        compression,
        80,
        256,
        256,
        no_data,
    )
    .expect("fixture coverage is valid");
    coverage
        .set_georeference(srid::UTM_32N, res, res)
        .expect("fixture resolution is valid");
    coverage
}

/// A fresh temporary directory and a database path inside it.
///
/// Keep the `TempDir` alive for as long as the database is in use.
pub fn temp_db_path(file_name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(file_name);
    (dir, path)
}
