//! Compositing of decoded rasters into displayable canvases.
//!
//! Implements:
//! - Fixed mappings for monochrome, palette, grayscale and RGB data
//! - Histogram contrast stretch for wide DataGrid/MultiBand samples
//! - NoData and mask transparency
//! - Typed single-band extraction
//! - PNG/JPEG/TIFF output

pub mod composite;
pub mod error;
pub mod extract;
pub mod layout;
pub mod output;
pub mod png;
pub mod stretch;

pub use composite::{bands_to_rgb, composite, BandSelection, CompositeOptions};
pub use error::{CompositeError, Result};
pub use extract::{band_as, band_as_sub_byte, raster_data_as};
pub use layout::{Canvas, ImageLayout};
pub use output::{encode_canvas, OutputFormat};
pub use stretch::{ContrastEnhancement, Stretch};
