//! Raster statistics: per-band min/max/mean/variance and histograms.
//!
//! Statistics are computed per tile and merged with
//! [`RasterStatistics::aggregate`], which is order independent, so tiles
//! may be processed in parallel and combined in any grouping.

pub mod blob;
pub mod error;
pub mod stats;

pub use error::{Result, StatsError};
pub use stats::{BandStatistics, BandSummary, RasterStatistics};
