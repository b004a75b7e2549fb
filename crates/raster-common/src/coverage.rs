//! Coverage descriptors: the persistent definition of a raster dataset.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};
use crate::format::{FormatContext, PixelFormat};
use crate::pixel::{normalize_no_data, Pixel};
use crate::raster::Raster;
use crate::sample::{Compression, PixelType, SampleType};

/// Smallest allowed tile edge.
pub const MIN_TILE_SIZE: u32 = 256;
/// Largest allowed tile edge.
pub const MAX_TILE_SIZE: u32 = 1024;
/// Tile edges must be a multiple of this.
pub const TILE_SIZE_STEP: u32 = 16;

/// Validate one tile edge.
pub fn check_tile_size(size: u32) -> RasterResult<()> {
    if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&size) || size % TILE_SIZE_STEP != 0 {
        return Err(RasterError::invalid(format!(
            "tile size {} must be in [{}, {}] and a multiple of {}",
            size, MIN_TILE_SIZE, MAX_TILE_SIZE, TILE_SIZE_STEP
        )));
    }
    Ok(())
}

/// Row-level policies of a coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveragePolicies {
    /// Sections must match the coverage resolution exactly.
    pub strict_resolution: bool,
    /// Sections may have their own resolutions; pyramids are per section.
    pub mixed_resolutions: bool,
    /// Store the source path of each section.
    pub section_paths: bool,
    /// Store an MD5 checksum of each section's pixels.
    pub section_md5: bool,
    /// Store a JSON summary of each section.
    pub section_summary: bool,
}

/// Spatial reference and native resolution of a coverage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageGeoreference {
    pub srid: i32,
    pub x_res: f64,
    pub y_res: f64,
}

/// A named raster dataset definition.
#[derive(Debug, Clone)]
pub struct Coverage {
    db_prefix: Option<String>,
    name: String,
    format: PixelFormat,
    compression: Compression,
    quality: u8,
    tile_width: u32,
    tile_height: u32,
    georeference: Option<CoverageGeoreference>,
    no_data: Option<Pixel>,
    policies: CoveragePolicies,
}

impl Coverage {
    /// Create a coverage, validating the whole definition.
    ///
    /// A "none" NoData pixel is accepted and treated as no NoData.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        name: &str,
        sample_type: SampleType,
        pixel_type: PixelType,
        bands: u8,
        compression: Compression,
        quality: u8,
        tile_width: u32,
        tile_height: u32,
        no_data: Option<Pixel>,
    ) -> RasterResult<Self> {
        check_coverage_name(name)?;
        let format =
            PixelFormat::validated(sample_type, pixel_type, bands, FormatContext::Coverage)?;
        format.check_compression(compression, FormatContext::Coverage)?;
        if quality > 100 {
            return Err(RasterError::invalid(format!(
                "quality {} must be in [0, 100]",
                quality
            )));
        }
        check_tile_size(tile_width)?;
        check_tile_size(tile_height)?;
        let no_data = normalize_no_data(no_data, &format)?;

        Ok(Self {
            db_prefix: None,
            name: name.to_string(),
            format,
            compression,
            quality,
            tile_width,
            tile_height,
            georeference: None,
            no_data,
            policies: CoveragePolicies::default(),
        })
    }

    /// Attach the coverage to an attached database schema.
    pub fn with_db_prefix(mut self, prefix: impl Into<String>) -> RasterResult<Self> {
        let prefix = prefix.into();
        check_coverage_name(&prefix)?;
        self.db_prefix = Some(prefix);
        Ok(self)
    }

    pub fn set_georeference(&mut self, srid: i32, x_res: f64, y_res: f64) -> RasterResult<()> {
        if !(x_res > 0.0 && y_res > 0.0 && x_res.is_finite() && y_res.is_finite()) {
            return Err(RasterError::invalid(format!(
                "resolution must be positive, got {} x {}",
                x_res, y_res
            )));
        }
        self.georeference = Some(CoverageGeoreference { srid, x_res, y_res });
        Ok(())
    }

    pub fn set_policies(&mut self, policies: CoveragePolicies) {
        self.policies = policies;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_prefix(&self) -> Option<&str> {
        self.db_prefix.as_deref()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn georeference(&self) -> Option<&CoverageGeoreference> {
        self.georeference.as_ref()
    }

    pub fn no_data(&self) -> Option<&Pixel> {
        self.no_data.as_ref()
    }

    pub fn policies(&self) -> CoveragePolicies {
        self.policies
    }

    /// A raster must share the coverage's exact pixel format.
    pub fn check_raster(&self, raster: &Raster) -> RasterResult<()> {
        if raster.format() != self.format {
            return Err(RasterError::mismatch(format!(
                "raster is {} but coverage '{}' is {}",
                raster.format(),
                self.name,
                self.format
            )));
        }
        Ok(())
    }
}

/// Coverage names become SQL table-name prefixes: ASCII letters, digits and
/// underscores, not starting with a digit.
pub fn check_coverage_name(name: &str) -> RasterResult<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return Err(RasterError::invalid(format!("invalid coverage name '{}'", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(compression: Compression, no_data: Option<Pixel>) -> RasterResult<Coverage> {
        Coverage::create(
            "ortho",
            SampleType::Uint8,
            PixelType::Rgb,
            3,
            compression,
            80,
            512,
            512,
            no_data,
        )
    }

    #[test]
    fn test_create_valid() {
        let cov = rgb(Compression::Jpeg, None).unwrap();
        assert_eq!(cov.name(), "ortho");
        assert_eq!(cov.tile_width(), 512);
        assert!(cov.no_data().is_none());
        assert!(!cov.policies().mixed_resolutions);
    }

    #[test]
    fn test_tile_size_rules() {
        assert!(check_tile_size(256).is_ok());
        assert!(check_tile_size(1024).is_ok());
        assert!(check_tile_size(240).is_err());
        assert!(check_tile_size(1040).is_err());
        assert!(check_tile_size(500).is_err());
    }

    #[test]
    fn test_name_and_quality() {
        assert!(Coverage::create("", SampleType::Uint8, PixelType::Grayscale, 1, Compression::None, 100, 256, 256, None).is_err());
        assert!(Coverage::create("a\"b", SampleType::Uint8, PixelType::Grayscale, 1, Compression::None, 100, 256, 256, None).is_err());
        assert!(Coverage::create("dem", SampleType::Uint8, PixelType::Grayscale, 1, Compression::None, 101, 256, 256, None).is_err());
    }

    #[test]
    fn test_no_data_must_match() {
        let good = Pixel::new(SampleType::Uint8, PixelType::Rgb, 3).unwrap();
        assert!(rgb(Compression::Png, Some(good)).unwrap().no_data().is_some());

        let bad = Pixel::new(SampleType::Uint16, PixelType::Rgb, 3).unwrap();
        assert!(matches!(
            rgb(Compression::Png, Some(bad)),
            Err(RasterError::FormatMismatch(_))
        ));

        let cov = rgb(Compression::Png, Some(Pixel::none())).unwrap();
        assert!(cov.no_data().is_none());
    }

    #[test]
    fn test_rejects_gray16_and_bad_codec() {
        assert!(Coverage::create("g", SampleType::Uint16, PixelType::Grayscale, 1, Compression::None, 100, 256, 256, None).is_err());
        assert!(matches!(
            rgb(Compression::Gif, None),
            Err(RasterError::UnsupportedCombination { .. })
        ));
    }

    #[test]
    fn test_setters() {
        let mut cov = rgb(Compression::Png, None).unwrap();
        assert!(cov.set_georeference(3857, 0.0, 1.0).is_err());
        cov.set_georeference(3857, 0.5, 0.5).unwrap();
        assert_eq!(cov.georeference().unwrap().srid, 3857);
        cov.set_policies(CoveragePolicies {
            mixed_resolutions: true,
            ..Default::default()
        });
        assert!(cov.policies().mixed_resolutions);
        assert!(cov.clone().with_db_prefix("main").is_ok());
    }
}
