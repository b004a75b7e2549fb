//! Region queries: request/result types and tile stitching.

use compositor::{CompositeOptions, OutputFormat};
use pyramid::ResolutionLevel;
use raster_common::sample::{read_sample_f64, same_sample, write_sample_f64};
use raster_common::{BoundingBox, Georeference, Mask, Palette, Pixel, PixelFormat, Raster};

use crate::error::Result;

/// A window of a coverage at a requested ground resolution.
#[derive(Debug, Clone)]
pub struct RegionRequest {
    pub bbox: BoundingBox,
    pub x_res: f64,
    pub y_res: f64,
    /// Restrict to one section; required for mixed-resolution coverages.
    pub section_id: Option<i64>,
    /// Also composite and encode the result.
    pub output: Option<OutputFormat>,
    /// JPEG quality; the store default when unset.
    pub quality: Option<u8>,
    pub composite: CompositeOptions,
}

impl RegionRequest {
    pub fn new(bbox: BoundingBox, x_res: f64, y_res: f64) -> Self {
        Self {
            bbox,
            x_res,
            y_res,
            section_id: None,
            output: None,
            quality: None,
            composite: CompositeOptions::default(),
        }
    }

    pub fn with_section(mut self, section_id: i64) -> Self {
        self.section_id = Some(section_id);
        self
    }

    pub fn with_output(mut self, format: OutputFormat) -> Self {
        self.output = Some(format);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_composite(mut self, options: CompositeOptions) -> Self {
        self.composite = options;
        self
    }
}

/// The stitched raster of a region query.
#[derive(Debug, Clone)]
pub struct RegionResult {
    /// Raw samples at the resolved resolution, georeferenced to the window.
    pub raster: Raster,
    /// Level and decode scale that served the request.
    pub level: ResolutionLevel,
    /// Number of tiles that contributed.
    pub tiles: usize,
    /// Encoded image when an output format was requested.
    pub image: Option<Vec<u8>>,
}

/// Pixel size of a window at a resolution, rounding partial pixels up.
pub(crate) fn window_size(bbox: &BoundingBox, x_res: f64, y_res: f64) -> (u64, u64) {
    let cols = (bbox.width() / x_res - 1e-9).ceil().max(1.0);
    let rows = (bbox.height() / y_res - 1e-9).ceil().max(1.0);
    (cols as u64, rows as u64)
}

/// Destination buffer that decoded tiles are pasted into.
///
/// Uncovered pixels hold the NoData value when there is one and zero
/// otherwise; either way they end up transparent. Transparent and NoData
/// tile pixels are never pasted, so abutting tiles cannot overwrite each
/// other's data and the paste order does not matter.
pub(crate) struct Mosaic {
    width: usize,
    height: usize,
    format: PixelFormat,
    georeference: Georeference,
    pixels: Vec<u8>,
    alpha: Vec<u8>,
    no_data: Option<Vec<f64>>,
    saw_mask: bool,
    saw_partial_alpha: bool,
}

impl Mosaic {
    pub(crate) fn new(format: PixelFormat, georeference: Georeference, width: u32, height: u32, no_data: Option<&Pixel>) -> Result<Self> {
        let pixel_bytes = format.pixel_bytes();
        let count = width as usize * height as usize;
        let values = match no_data {
            Some(pixel) => {
                pixel.check_format(&format)?;
                Some((0..format.bands as usize).map(|band| pixel.sample_f64(band)).collect::<std::result::Result<Vec<_>, _>>()?)
            }
            None => None,
        };
        let template = values.as_ref().map(|values| {
            let mut template = vec![0u8; pixel_bytes];
            for (band, v) in values.iter().enumerate() {
                write_sample_f64(&mut template, format.sample_type, band, *v);
            }
            template
        });
        let pixels = match &template {
            Some(t) => t.repeat(count),
            None => vec![0u8; count * pixel_bytes],
        };
        Ok(Self {
            width: width as usize,
            height: height as usize,
            format,
            georeference,
            pixels,
            alpha: vec![0u8; count],
            no_data: values,
            saw_mask: false,
            saw_partial_alpha: false,
        })
    }

    /// Copy the part of `tile` that falls inside the window.
    pub(crate) fn paste(&mut self, tile: &Raster, tile_bbox: &BoundingBox) {
        let geo = &self.georeference;
        let dx = ((tile_bbox.min_x - geo.bbox.min_x) / geo.x_res).round() as i64;
        let dy = ((geo.bbox.max_y - tile_bbox.max_y) / geo.y_res).round() as i64;
        let x0 = dx.max(0);
        let x1 = (dx + tile.width() as i64).min(self.width as i64);
        let y0 = dy.max(0);
        let y1 = (dy + tile.height() as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let pb = self.format.pixel_bytes();
        let tile_width = tile.width() as usize;
        let span = (x1 - x0) as usize;
        let mask = tile.mask();
        if let Some(m) = mask {
            self.saw_mask = true;
            if matches!(m, Mask::Alpha(_)) {
                self.saw_partial_alpha = true;
            }
        }

        for y in y0..y1 {
            let src_row = (y - dy) as usize * tile_width + (x0 - dx) as usize;
            let dst_row = y as usize * self.width + x0 as usize;
            for i in 0..span {
                let src = src_row + i;
                let alpha = mask.map(|m| m.alpha(src)).unwrap_or(255);
                if alpha == 0 {
                    continue;
                }
                if self.is_no_data(tile.pixels(), src) {
                    continue;
                }
                let sample = &tile.pixels()[src * pb..(src + 1) * pb];
                let dst = dst_row + i;
                self.pixels[dst * pb..(dst + 1) * pb].copy_from_slice(sample);
                self.alpha[dst] = alpha;
            }
        }
    }

    fn is_no_data(&self, pixels: &[u8], index: usize) -> bool {
        let bands = self.format.bands as usize;
        self.no_data.as_ref().is_some_and(|values| {
            values
                .iter()
                .enumerate()
                .all(|(band, v)| same_sample(read_sample_f64(pixels, self.format.sample_type, index * bands + band), *v))
        })
    }

    /// Build the raster, attaching a mask only when one is needed.
    pub(crate) fn finish(self, palette: Option<Palette>, no_data: Option<&Pixel>) -> Result<Raster> {
        let all_opaque = self.alpha.iter().all(|&a| a == 255);
        let mask = if all_opaque || (self.no_data.is_some() && !self.saw_mask) {
            None
        } else if self.saw_partial_alpha {
            Some(Mask::Alpha(self.alpha))
        } else {
            Some(Mask::Transparency(self.alpha.into_iter().map(|a| (a != 0) as u8).collect()))
        };

        let mut raster = Raster::new(self.width as u32, self.height as u32, self.format, self.pixels, palette)?
            .with_georeference(self.georeference);
        if let Some(mask) = mask {
            raster = raster.with_mask(mask)?;
        }
        if let Some(pixel) = no_data {
            raster = raster.with_no_data(pixel.try_clone()?)?;
        }
        Ok(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::sample::write_sample;
    use raster_common::{PixelType, SampleType};

    fn gray(width: u32, height: u32, value: u8) -> Raster {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        Raster::new(width, height, format, vec![value; (width * height) as usize], None).unwrap()
    }

    fn window(width: u32, height: u32) -> Georeference {
        Georeference::from_origin(0, 0.0, height as f64, width, height, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_window_size() {
        let bbox = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(window_size(&bbox, 1.0, 1.0), (100, 50));
        assert_eq!(window_size(&bbox, 3.0, 3.0), (34, 17));
        assert_eq!(window_size(&bbox, 1000.0, 1000.0), (1, 1));
    }

    #[test]
    fn test_paste_clips_and_positions() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut mosaic = Mosaic::new(format, window(4, 4), 4, 4, None).unwrap();
        // 3x3 tile whose upper-left corner sits at pixel (2, 1)
        mosaic.paste(&gray(3, 3, 9), &BoundingBox::new(2.0, 0.0, 5.0, 3.0));
        let raster = mosaic.finish(None, None).unwrap();
        let expected: Vec<u8> = vec![
            0, 0, 0, 0, //
            0, 0, 9, 9, //
            0, 0, 9, 9, //
            0, 0, 9, 9,
        ];
        assert_eq!(raster.pixels(), expected.as_slice());
        let mask = raster.mask().unwrap();
        assert!(mask.is_transparent(0));
        assert!(!mask.is_transparent(6));
    }

    #[test]
    fn test_full_cover_drops_mask() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut mosaic = Mosaic::new(format, window(2, 2), 2, 2, None).unwrap();
        mosaic.paste(&gray(1, 2, 1), &BoundingBox::new(0.0, 0.0, 1.0, 2.0));
        mosaic.paste(&gray(1, 2, 2), &BoundingBox::new(1.0, 0.0, 2.0, 2.0));
        let raster = mosaic.finish(None, None).unwrap();
        assert!(raster.mask().is_none());
        assert_eq!(raster.pixels(), &[1, 2, 1, 2]);
    }

    #[test]
    fn test_no_data_fill_and_skip() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut no_data = Pixel::with_format(format);
        no_data.set_u8(0, 255).unwrap();

        let mut mosaic = Mosaic::new(format, window(2, 1), 2, 1, Some(&no_data)).unwrap();
        mosaic.paste(&gray(1, 1, 5), &BoundingBox::new(1.0, 0.0, 2.0, 1.0));
        // A NoData tile pixel must not overwrite existing data.
        mosaic.paste(&gray(1, 1, 255), &BoundingBox::new(1.0, 0.0, 2.0, 1.0));
        let raster = mosaic.finish(None, Some(&no_data)).unwrap();
        assert_eq!(raster.pixels(), &[255, 5]);
        assert!(raster.mask().is_none());
        assert!(raster.matches_no_data(0));
    }

    #[test]
    fn test_nan_no_data_skipped_whatever_the_payload() {
        let format = PixelFormat::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        let mut no_data = Pixel::with_format(format);
        no_data.set_f32(0, f32::NAN).unwrap();
        let float_tile = |v: f32| {
            let mut pixels = vec![0u8; 4];
            write_sample(&mut pixels, 0, v);
            Raster::new(1, 1, format, pixels, None).unwrap()
        };

        let mut mosaic = Mosaic::new(format, window(1, 1), 1, 1, Some(&no_data)).unwrap();
        let cell = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        mosaic.paste(&float_tile(4.0), &cell);
        // Sign-flipped NaN has different bytes but is still NoData.
        mosaic.paste(&float_tile(-f32::NAN), &cell);
        let raster = mosaic.finish(None, Some(&no_data)).unwrap();
        assert_eq!(read_sample_f64(raster.pixels(), SampleType::Float32, 0), 4.0);
    }
}
