//! Multi-resolution support for raster coverages.
//!
//! - [`resolver`]: picks the stored level and decode scale that best serve a
//!   requested ground resolution.
//! - [`downsample`]: halves rasters to build coarser pyramid levels.

pub mod downsample;
pub mod error;
pub mod resolver;

pub use downsample::{downsample_2x, generate_pyramid, DownsampleMethod, PyramidLevel};
pub use error::{PyramidError, Result};
pub use resolver::{find_best_level, resolution_ladder, LevelRow, ResolutionLevel};
