//! Downsampling functions for generating pyramid levels.
//!
//! Rasters are halved on both axes (odd edges round up). Pixels that are
//! masked out or equal to NoData never contribute to a coarser pixel; a
//! coarser pixel with no valid contributors becomes NoData, or is masked
//! out when the raster has no NoData.

use raster_common::sample::{read_sample_f64, write_sample_f64};
use raster_common::{Georeference, Mask, PixelType, Raster, RasterResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Method used to combine each 2x2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMethod {
    /// Per-band average of the valid pixels of the block
    #[default]
    Mean,
    /// First valid pixel of the block in row order; keeps palette indices exact
    Nearest,
}

impl DownsampleMethod {
    /// Mean for continuous data, Nearest for indexed and bilevel data.
    pub fn for_pixel_type(pixel_type: PixelType) -> Self {
        match pixel_type {
            PixelType::Palette | PixelType::Monochrome => DownsampleMethod::Nearest,
            PixelType::Grayscale | PixelType::Rgb | PixelType::MultiBand | PixelType::DataGrid => {
                DownsampleMethod::Mean
            }
        }
    }
}

/// Halve `raster` on both axes.
///
/// The output keeps the palette and NoData of the input; its georeference
/// (if any) is anchored on the same upper-left corner with doubled
/// resolution.
pub fn downsample_2x(raster: &Raster, method: DownsampleMethod) -> RasterResult<Raster> {
    let format = raster.format();
    let sample_type = format.sample_type;
    let bands = format.bands as usize;
    let (width, height) = (raster.width() as usize, raster.height() as usize);
    let new_width = width.div_ceil(2);
    let new_height = height.div_ceil(2);

    let src = raster.pixels();
    let mut pixels = vec![0u8; new_width * new_height * format.pixel_bytes()];
    let mut valid_out = vec![true; new_width * new_height];
    let mut sums = vec![0f64; bands];

    for out_y in 0..new_height {
        for out_x in 0..new_width {
            let out_index = out_y * new_width + out_x;
            let block = [(0, 0), (1, 0), (0, 1), (1, 1)]
                .into_iter()
                .map(|(dx, dy)| (out_x * 2 + dx, out_y * 2 + dy))
                .filter(|&(x, y)| x < width && y < height)
                .map(|(x, y)| y * width + x)
                .filter(|&index| !raster.is_transparent(index));

            match method {
                DownsampleMethod::Nearest => match block.take(1).next() {
                    Some(index) => {
                        for band in 0..bands {
                            let v = read_sample_f64(src, sample_type, index * bands + band);
                            write_sample_f64(&mut pixels, sample_type, out_index * bands + band, v);
                        }
                    }
                    None => valid_out[out_index] = false,
                },
                DownsampleMethod::Mean => {
                    sums.iter_mut().for_each(|s| *s = 0.0);
                    let mut count = 0usize;
                    for index in block {
                        for (band, sum) in sums.iter_mut().enumerate() {
                            *sum += read_sample_f64(src, sample_type, index * bands + band);
                        }
                        count += 1;
                    }
                    if count == 0 {
                        valid_out[out_index] = false;
                        continue;
                    }
                    for (band, sum) in sums.iter().enumerate() {
                        write_sample_f64(&mut pixels, sample_type, out_index * bands + band, sum / count as f64);
                    }
                }
            }
        }
    }

    let invalid = valid_out.iter().filter(|v| !**v).count();
    let mut out = Raster::new(
        new_width as u32,
        new_height as u32,
        format,
        pixels,
        raster.palette().cloned(),
    )?;
    if let Some(no_data) = raster.no_data() {
        if invalid > 0 {
            let fill = Raster::filled(1, 1, format, raster.palette().cloned(), Some(no_data))?;
            let mut buf = out.pixels().to_vec();
            let pb = format.pixel_bytes();
            for (i, _) in valid_out.iter().enumerate().filter(|(_, v)| !**v) {
                buf[i * pb..(i + 1) * pb].copy_from_slice(fill.pixels());
            }
            out = Raster::new(out.width(), out.height(), format, buf, raster.palette().cloned())?;
        }
        out = out.with_no_data(no_data.clone())?;
    } else if invalid > 0 || raster.mask().is_some() {
        let mask = valid_out.iter().map(|v| u8::from(*v)).collect();
        out = out.with_mask(Mask::Transparency(mask))?;
    }

    if let Some(geo) = raster.georeference() {
        let halved = Georeference::from_origin(
            geo.srid,
            geo.bbox.min_x,
            geo.bbox.max_y,
            out.width(),
            out.height(),
            geo.x_res * 2.0,
            geo.y_res * 2.0,
        )?;
        out.set_georeference(Some(halved));
    }
    Ok(out)
}

/// One downsampled level of a pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Level index (1 = first halving)
    pub level: u32,
    /// Reduction relative to the source (2, 4, 8, ...)
    pub factor: u32,
    pub raster: Raster,
}

/// Halve repeatedly until the raster fits in one `tile_width` x `tile_height` tile.
///
/// Level 0 (the source itself) is not included.
pub fn generate_pyramid(
    raster: &Raster,
    tile_width: u32,
    tile_height: u32,
    method: DownsampleMethod,
) -> RasterResult<Vec<PyramidLevel>> {
    let mut levels = Vec::new();
    let mut current_width = raster.width();
    let mut current_height = raster.height();
    let mut factor = 1u32;

    while current_width > tile_width.max(1) || current_height > tile_height.max(1) {
        let source = levels.last().map(|l: &PyramidLevel| &l.raster).unwrap_or(raster);
        let next = downsample_2x(source, method)?;
        factor *= 2;
        current_width = next.width();
        current_height = next.height();
        debug!(
            level = levels.len() + 1,
            width = current_width,
            height = current_height,
            "Built pyramid level"
        );
        levels.push(PyramidLevel {
            level: levels.len() as u32 + 1,
            factor,
            raster: next,
        });
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{Pixel, PixelFormat, SampleType};

    fn gray8(width: u32, height: u32, pixels: Vec<u8>) -> Raster {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        Raster::new(width, height, format, pixels, None).unwrap()
    }

    #[test]
    fn test_downsample_2x_mean() {
        let raster = gray8(4, 4, (1..=16).collect());
        let out = downsample_2x(&raster, DownsampleMethod::Mean).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));
        // 1,2,5,6 -> 3.5 rounds to 4; 3,4,7,8 -> 5.5 rounds to 6
        assert_eq!(out.pixels(), &[4, 6, 12, 14]);
        assert!(out.mask().is_none());
    }

    #[test]
    fn test_downsample_2x_nearest() {
        let raster = gray8(4, 4, (1..=16).collect());
        let out = downsample_2x(&raster, DownsampleMethod::Nearest).unwrap();
        assert_eq!(out.pixels(), &[1, 3, 9, 11]);
    }

    #[test]
    fn test_odd_edges_round_up() {
        let raster = gray8(3, 3, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
        let out = downsample_2x(&raster, DownsampleMethod::Mean).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.pixels(), &[30, 45, 75, 90]);
    }

    #[test]
    fn test_no_data_excluded_from_mean() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut nd = Pixel::with_format(format);
        nd.set_u8(0, 0).unwrap();
        let raster = gray8(4, 2, vec![0, 10, 0, 0, 20, 30, 0, 0])
            .with_no_data(nd)
            .unwrap();
        let out = downsample_2x(&raster, DownsampleMethod::Mean).unwrap();
        assert_eq!(out.pixels(), &[20, 0]);
        assert!(out.matches_no_data(1));
        assert!(!out.matches_no_data(0));
    }

    #[test]
    fn test_masked_block_stays_masked() {
        let raster = gray8(2, 2, vec![5, 5, 5, 5])
            .with_mask(Mask::Transparency(vec![0, 0, 0, 0]))
            .unwrap();
        let out = downsample_2x(&raster, DownsampleMethod::Mean).unwrap();
        assert!(out.is_transparent(0));
    }

    #[test]
    fn test_generate_pyramid_until_single_tile() {
        let raster = gray8(16, 10, vec![7; 160]);
        let levels = generate_pyramid(&raster, 4, 4, DownsampleMethod::Mean).unwrap();
        let dims: Vec<_> = levels.iter().map(|l| (l.level, l.factor, l.raster.width(), l.raster.height())).collect();
        assert_eq!(dims, vec![(1, 2, 8, 5), (2, 4, 4, 3)]);
        assert!(levels.iter().all(|l| l.raster.pixels().iter().all(|p| *p == 7)));
    }

    #[test]
    fn test_method_for_pixel_type() {
        assert_eq!(DownsampleMethod::for_pixel_type(PixelType::Palette), DownsampleMethod::Nearest);
        assert_eq!(DownsampleMethod::for_pixel_type(PixelType::Monochrome), DownsampleMethod::Nearest);
        assert_eq!(DownsampleMethod::for_pixel_type(PixelType::DataGrid), DownsampleMethod::Mean);
    }
}
