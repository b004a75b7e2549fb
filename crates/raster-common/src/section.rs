//! Sections: one ingested raster bound for a coverage.

use serde::{Deserialize, Serialize};

use crate::coverage::check_tile_size;
use crate::error::{RasterError, RasterResult};
use crate::format::FormatContext;
use crate::raster::Raster;
use crate::sample::Compression;

/// Tiling of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileSize {
    Fixed { width: u32, height: u32 },
    /// Store the whole raster as a single tile.
    Undefined,
}

/// A named raster plus the parameters it is tiled with.
#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    compression: Compression,
    tile_size: TileSize,
    raster: Raster,
}

impl Section {
    /// Bind a raster; the compression must be legal for its format.
    pub fn new(
        name: &str,
        compression: Compression,
        tile_size: TileSize,
        raster: Raster,
    ) -> RasterResult<Self> {
        if name.is_empty() {
            return Err(RasterError::invalid("section name must not be empty"));
        }
        if let TileSize::Fixed { width, height } = tile_size {
            check_tile_size(width)?;
            check_tile_size(height)?;
        }
        raster
            .format()
            .check_compression(compression, FormatContext::Raster)?;
        Ok(Self {
            name: name.to_string(),
            compression,
            tile_size,
            raster,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn into_raster(self) -> Raster {
        self.raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PixelFormat;
    use crate::sample::{PixelType, SampleType};

    fn mono() -> Raster {
        let format = PixelFormat::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        Raster::new(4, 1, format, vec![0, 1, 1, 0], None).unwrap()
    }

    #[test]
    fn test_section_checks_codec() {
        assert!(Section::new("s", Compression::Fax4, TileSize::Undefined, mono()).is_ok());
        assert!(Section::new("s", Compression::Jpeg, TileSize::Undefined, mono()).is_err());
        assert!(Section::new("", Compression::None, TileSize::Undefined, mono()).is_err());
    }

    #[test]
    fn test_section_checks_tile_size() {
        let fixed = TileSize::Fixed { width: 256, height: 512 };
        let section = Section::new("s", Compression::Png, fixed, mono()).unwrap();
        assert_eq!(section.tile_size(), fixed);
        assert_eq!(section.into_raster().width(), 4);
        let bad = TileSize::Fixed { width: 100, height: 256 };
        assert!(Section::new("s", Compression::Png, bad, mono()).is_err());
    }
}
