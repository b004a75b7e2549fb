//! Tiled raster coverages persisted in SQLite.
//!
//! A coverage is a named family of tables holding sections (ingested
//! rasters), their encoded tiles and the resolution of each pyramid level.
//!
//! Implements:
//! - Coverage creation and loading
//! - Section ingestion with per-tile encoding and statistics
//! - Region queries at the closest stored resolution, with optional
//!   compositing into PNG/JPEG/TIFF
//! - Per-section pyramid generation
//! - Section deletion with statistics recomputation

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod region;
pub mod store;

pub use cache::{CacheStats, TileCache};
pub use catalog::{CoverageTables, RasterCatalog, SectionInfo, StoredCoverage, TileInfo};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use region::{RegionRequest, RegionResult};
pub use store::CoverageStore;
