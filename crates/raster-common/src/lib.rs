//! Data model shared by the raster tiling crates: pixels, palettes, raster
//! buffers, coverages and sections, plus the format compatibility table.

pub mod bbox;
pub mod coverage;
pub mod endian;
pub mod error;
pub mod format;
pub mod histogram;
pub mod palette;
pub mod pixel;
pub mod raster;
pub mod sample;
pub mod scale;
pub mod section;

pub use bbox::{BoundingBox, Georeference};
pub use coverage::{Coverage, CoverageGeoreference, CoveragePolicies};
pub use endian::Endian;
pub use error::{ErrorKind, RasterError, RasterResult};
pub use format::{is_legal_combination, FormatContext, PixelFormat};
pub use histogram::LinearBuckets;
pub use palette::{Palette, PaletteEntry, PaletteKind};
pub use pixel::{Pixel, Sample};
pub use raster::{Mask, Raster};
pub use sample::{ByteCodec, Compression, PixelType, SampleType, SampleValue};
pub use scale::Scale;
pub use section::{Section, TileSize};
