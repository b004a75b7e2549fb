//! Raster to canvas conversion.
//!
//! Every pixel format maps to RGBA in one of three ways:
//! - fixed mappings (monochrome, palette, sub-byte gray, 8-bit data)
//! - a high-byte shift for 16-bit grayscale and RGB
//! - an independent contrast stretch per band for wide DataGrid and
//!   MultiBand samples
//!
//! Alpha comes from the raster's mask first, then from an exact NoData
//! match.

use rayon::prelude::*;
use raster_common::sample::{read_sample_f64, same_sample};
use raster_common::{PaletteEntry, PixelType, Raster, RasterError, SampleType};
use tracing::debug;

use crate::error::{CompositeError, Result};
use crate::layout::{Canvas, ImageLayout};
use crate::stretch::{ContrastEnhancement, Stretch};

/// Bands feeding the output colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandSelection {
    /// RGB bands 0/1/2 when there are at least three, otherwise gray from band 0.
    #[default]
    Auto,
    /// One band replicated into red, green and blue.
    Gray(usize),
    /// Three bands mapped to red, green and blue.
    Rgb { red: usize, green: usize, blue: usize },
}

/// Compositing parameters.
#[derive(Debug, Clone, Default)]
pub struct CompositeOptions {
    pub enhancement: ContrastEnhancement,
    pub bands: BandSelection,
    /// Colour written under transparent pixels.
    pub background: Option<[u8; 3]>,
}

/// How one band's samples become gray levels.
#[derive(Debug, Clone, Copy)]
enum ChannelMap {
    /// 1-bit: 0 is white, 1 is black
    Monochrome,
    /// Sub-byte gray: value times the type's gray step
    Widen(u8),
    Direct,
    /// int8 shifted into 0..=255
    Offset128,
    /// 16-bit keeps its high byte
    HighByte,
    Stretch(Stretch),
}

impl ChannelMap {
    #[inline]
    fn apply(&self, value: f64) -> u8 {
        match self {
            ChannelMap::Monochrome => {
                if value == 0.0 {
                    255
                } else {
                    0
                }
            }
            ChannelMap::Widen(factor) => (value as u8).saturating_mul(*factor),
            ChannelMap::Direct => value as u8,
            ChannelMap::Offset128 => (value as i32 + 128).clamp(0, 255) as u8,
            ChannelMap::HighByte => ((value as u32) >> 8) as u8,
            ChannelMap::Stretch(s) => s.apply(value),
        }
    }
}

/// Convert `raster` into a canvas with the given layout.
pub fn composite(raster: &Raster, layout: ImageLayout, options: &CompositeOptions) -> Result<Canvas> {
    let format = raster.format();
    let channels = select_bands(raster, options.bands)?;
    let nd_bands: Vec<usize> = match (format.pixel_type, channels) {
        (PixelType::MultiBand, Selected::Rgb(bands)) => bands.to_vec(),
        _ => (0..format.bands as usize).collect(),
    };
    let alpha = alpha_plane(raster, &nd_bands)?;

    let rgb_of: Box<dyn Fn(usize) -> [u8; 3] + Sync + '_> = if format.pixel_type == PixelType::Palette {
        palette_colours(raster)?
    } else {
        let planes = match channels {
            Selected::Gray(band) => {
                let plane = band_plane(raster, band, &alpha, options.enhancement)?;
                [plane.clone(), plane.clone(), plane]
            }
            Selected::Rgb([r, g, b]) => [
                band_plane(raster, r, &alpha, options.enhancement)?,
                band_plane(raster, g, &alpha, options.enhancement)?,
                band_plane(raster, b, &alpha, options.enhancement)?,
            ],
        };
        Box::new(move |i| [planes[0][i], planes[1][i], planes[2][i]])
    };

    let width = raster.width() as usize;
    let mut rgba = vec![0u8; raster.pixel_count() * 4];
    rgba.par_chunks_mut(width * 4).enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let i = y * width + x;
            let a = alpha[i];
            let [r, g, b] = match options.background {
                Some(bg) if a == 0 => bg,
                _ => rgb_of(i),
            };
            px.copy_from_slice(&[r, g, b, a]);
        }
    });

    debug!(
        width = raster.width(),
        height = raster.height(),
        format = %format,
        layout = ?layout,
        "Composited raster"
    );
    Ok(Canvas::from_rgba(raster.width(), raster.height(), &rgba, layout))
}

/// Compose three MultiBand bands as red, green and blue.
///
/// Each band is stretched on its own; NoData matches only consider the
/// three selected bands.
pub fn bands_to_rgb(
    raster: &Raster,
    red: usize,
    green: usize,
    blue: usize,
    layout: ImageLayout,
    options: &CompositeOptions,
) -> Result<Canvas> {
    let format = raster.format();
    if format.pixel_type != PixelType::MultiBand {
        return Err(CompositeError::unsupported(
            "select RGB bands from",
            format.sample_type,
            format.pixel_type,
        ));
    }
    let options = CompositeOptions {
        bands: BandSelection::Rgb { red, green, blue },
        ..options.clone()
    };
    composite(raster, layout, &options)
}

#[derive(Debug, Clone, Copy)]
enum Selected {
    Gray(usize),
    Rgb([usize; 3]),
}

fn select_bands(raster: &Raster, selection: BandSelection) -> Result<Selected> {
    let format = raster.format();
    let bands = format.bands as usize;
    let selected = match selection {
        BandSelection::Auto => match format.pixel_type {
            PixelType::Rgb => Selected::Rgb([0, 1, 2]),
            PixelType::MultiBand if bands >= 3 => Selected::Rgb([0, 1, 2]),
            _ => Selected::Gray(0),
        },
        BandSelection::Gray(band) => Selected::Gray(band),
        BandSelection::Rgb { red, green, blue } => {
            if !matches!(format.pixel_type, PixelType::Rgb | PixelType::MultiBand) {
                return Err(CompositeError::unsupported(
                    "select RGB bands from",
                    format.sample_type,
                    format.pixel_type,
                ));
            }
            Selected::Rgb([red, green, blue])
        }
    };
    let used: &[usize] = match &selected {
        Selected::Gray(band) => std::slice::from_ref(band),
        Selected::Rgb(b) => b,
    };
    if let Some(&band) = used.iter().find(|b| **b >= bands) {
        return Err(RasterError::BandOutOfRange { band, bands }.into());
    }
    Ok(selected)
}

/// Per-pixel alpha: mask first, then NoData on `nd_bands`.
fn alpha_plane(raster: &Raster, nd_bands: &[usize]) -> Result<Vec<u8>> {
    let format = raster.format();
    let no_data: Option<Vec<(usize, f64)>> = match raster.no_data() {
        Some(pixel) if !pixel.is_none() => Some(
            nd_bands
                .iter()
                .map(|&band| pixel.sample_f64(band).map(|v| (band, v)))
                .collect::<std::result::Result<_, _>>()?,
        ),
        _ => None,
    };
    let bands = format.bands as usize;
    let pixels = raster.pixels();
    let mask = raster.mask();

    let mut alpha = vec![255u8; raster.pixel_count()];
    alpha.par_iter_mut().enumerate().for_each(|(i, a)| {
        if let Some(mask) = mask {
            *a = mask.alpha(i);
        }
        if let Some(nd) = &no_data {
            if nd
                .iter()
                .all(|(band, v)| same_sample(read_sample_f64(pixels, format.sample_type, i * bands + band), *v))
            {
                *a = 0;
            }
        }
    });
    Ok(alpha)
}

fn channel_map(raster: &Raster, band: usize, alpha: &[u8], enhancement: ContrastEnhancement) -> Result<ChannelMap> {
    let format = raster.format();
    let st = format.sample_type;
    let unsupported = || CompositeError::unsupported("composite", st, format.pixel_type);
    let map = match (format.pixel_type, st) {
        (PixelType::Monochrome, SampleType::Bit1) => ChannelMap::Monochrome,
        (PixelType::Grayscale, SampleType::Bit2 | SampleType::Bit4) => ChannelMap::Widen(st.gray_step().ok_or_else(unsupported)?),
        (PixelType::Grayscale | PixelType::Rgb | PixelType::MultiBand | PixelType::DataGrid, SampleType::Uint8) => {
            ChannelMap::Direct
        }
        (PixelType::Grayscale | PixelType::Rgb, SampleType::Uint16) => ChannelMap::HighByte,
        (PixelType::DataGrid, SampleType::Int8) => ChannelMap::Offset128,
        (PixelType::DataGrid | PixelType::MultiBand, st) if st.is_wide() => {
            let bands = format.bands as usize;
            let pixels = raster.pixels();
            let values = (0..raster.pixel_count())
                .filter(move |i| alpha[*i] != 0)
                .map(move |i| read_sample_f64(pixels, st, i * bands + band));
            ChannelMap::Stretch(Stretch::compute(values, enhancement))
        }
        _ => return Err(unsupported()),
    };
    Ok(map)
}

fn band_plane(raster: &Raster, band: usize, alpha: &[u8], enhancement: ContrastEnhancement) -> Result<Vec<u8>> {
    let map = channel_map(raster, band, alpha, enhancement)?;
    let st = raster.format().sample_type;
    let bands = raster.format().bands as usize;
    let pixels = raster.pixels();
    Ok((0..raster.pixel_count())
        .into_par_iter()
        .map(|i| map.apply(read_sample_f64(pixels, st, i * bands + band)))
        .collect())
}

/// Palette lookup; gray palettes replicate the red component.
fn palette_colours(raster: &Raster) -> Result<Box<dyn Fn(usize) -> [u8; 3] + Sync + '_>> {
    let palette = raster.palette().ok_or_else(|| RasterError::invalid("palette raster without a palette"))?;
    let gray = palette.classify().is_gray();
    let table: Vec<[u8; 3]> = palette
        .entries()
        .iter()
        .map(|PaletteEntry { red, green, blue }| if gray { [*red; 3] } else { [*red, *green, *blue] })
        .collect();
    let pixels = raster.pixels();
    if let Some(bad) = pixels.iter().find(|p| **p as usize >= table.len()) {
        return Err(RasterError::invalid(format!(
            "palette index {} beyond {} entries",
            bad,
            table.len()
        ))
        .into());
    }
    Ok(Box::new(move |i| table[pixels[i] as usize]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{Mask, Palette, Pixel, PixelFormat};

    fn fmt(st: SampleType, pt: PixelType, bands: u8) -> PixelFormat {
        PixelFormat::new(st, pt, bands).unwrap()
    }

    #[test]
    fn test_monochrome_fixed_mapping() {
        let raster = Raster::new(2, 2, fmt(SampleType::Bit1, PixelType::Monochrome, 1), vec![0, 1, 1, 1], None)
            .unwrap();
        let canvas = composite(&raster, ImageLayout::Rgba, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.rgba_at(0, 0), [255, 255, 255, 255]);
        assert_eq!(canvas.rgba_at(1, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_sub_byte_gray_widening() {
        let raster =
            Raster::new(4, 1, fmt(SampleType::Bit2, PixelType::Grayscale, 1), vec![0, 1, 2, 3], None).unwrap();
        let canvas = composite(&raster, ImageLayout::Rgb, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.data, vec![0, 0, 0, 85, 85, 85, 170, 170, 170, 255, 255, 255]);

        let raster = Raster::new(1, 1, fmt(SampleType::Bit4, PixelType::Grayscale, 1), vec![15], None).unwrap();
        let canvas = composite(&raster, ImageLayout::Rgb, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.data, vec![255, 255, 255]);
    }

    #[test]
    fn test_sub_byte_gray_matches_palette_ramp() {
        for st in [SampleType::Bit2, SampleType::Bit4] {
            let levels: Vec<u8> = (0..=st.sub_byte_max().unwrap()).collect();
            let n = levels.len() as u32;
            let gray = Raster::new(n, 1, fmt(st, PixelType::Grayscale, 1), levels.clone(), None).unwrap();
            let ramp = Palette::gray_ramp(st).unwrap();
            let indexed = Raster::new(n, 1, fmt(st, PixelType::Palette, 1), levels, Some(ramp)).unwrap();
            let a = composite(&gray, ImageLayout::Rgb, &CompositeOptions::default()).unwrap();
            let b = composite(&indexed, ImageLayout::Rgb, &CompositeOptions::default()).unwrap();
            assert_eq!(a.data, b.data, "{st:?}");
        }
    }

    #[test]
    fn test_nan_no_data_is_transparent() {
        let format = fmt(SampleType::Float32, PixelType::DataGrid, 1);
        let mut pixels = vec![0u8; 12];
        for (i, v) in [f32::NAN, 1.0, 2.0].into_iter().enumerate() {
            raster_common::sample::write_sample(&mut pixels, i, v);
        }
        let mut nd = Pixel::with_format(format);
        nd.set_f32(0, f32::NAN).unwrap();
        let raster = Raster::new(3, 1, format, pixels, None).unwrap().with_no_data(nd).unwrap();
        let canvas = composite(&raster, ImageLayout::Rgba, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.rgba_at(0, 0)[3], 0);
        assert_eq!(canvas.rgba_at(1, 0)[3], 255);
        assert_eq!(canvas.rgba_at(2, 0)[3], 255);
    }

    #[test]
    fn test_palette_lookup() {
        let mut palette = Palette::new(2).unwrap();
        palette.set(1, PaletteEntry::new(200, 10, 20)).unwrap();
        let raster = Raster::new(2, 1, fmt(SampleType::Bit1, PixelType::Palette, 1), vec![0, 1], Some(palette))
            .unwrap();
        let canvas = composite(&raster, ImageLayout::Bgra, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.pixel(1, 0), &[20, 10, 200, 255]);
        assert_eq!(canvas.rgba_at(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_int8_offset() {
        let raster = Raster::new(2, 1, fmt(SampleType::Int8, PixelType::DataGrid, 1), vec![0x80, 0x7F], None)
            .unwrap();
        let canvas = composite(&raster, ImageLayout::Rgb, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.data, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_mask_alpha_and_background() {
        let raster = Raster::new(2, 1, fmt(SampleType::Uint8, PixelType::Grayscale, 1), vec![10, 20], None)
            .unwrap()
            .with_mask(Mask::Alpha(vec![0, 128]))
            .unwrap();
        let options = CompositeOptions {
            background: Some([1, 2, 3]),
            ..Default::default()
        };
        let canvas = composite(&raster, ImageLayout::Rgba, &options).unwrap();
        assert_eq!(canvas.rgba_at(0, 0), [1, 2, 3, 0]);
        assert_eq!(canvas.rgba_at(1, 0), [20, 20, 20, 128]);
    }

    #[test]
    fn test_rgb_selection_rules() {
        let raster = Raster::new(1, 1, fmt(SampleType::Uint8, PixelType::Grayscale, 1), vec![1], None).unwrap();
        let options = CompositeOptions {
            bands: BandSelection::Rgb { red: 0, green: 0, blue: 0 },
            ..Default::default()
        };
        assert!(composite(&raster, ImageLayout::Rgb, &options).is_err());

        let raster = Raster::new(1, 1, fmt(SampleType::Uint8, PixelType::MultiBand, 4), vec![1, 2, 3, 4], None)
            .unwrap();
        assert!(bands_to_rgb(&raster, 3, 2, 9, ImageLayout::Rgb, &CompositeOptions::default()).is_err());
        let canvas = bands_to_rgb(&raster, 3, 2, 1, ImageLayout::Rgb, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.data, vec![4, 3, 2]);
    }

    #[test]
    fn test_multiband_no_data_on_selected_bands_only() {
        let format = fmt(SampleType::Uint8, PixelType::MultiBand, 4);
        let mut nd = Pixel::with_format(format);
        for band in 0..3 {
            nd.set_u8(band, 9).unwrap();
        }
        nd.set_u8(3, 0).unwrap();
        // Band 3 differs from NoData, but only bands 0..3 are composed.
        let raster = Raster::new(1, 1, format, vec![9, 9, 9, 77], None)
            .unwrap()
            .with_no_data(nd)
            .unwrap();
        let canvas = bands_to_rgb(&raster, 0, 1, 2, ImageLayout::Rgba, &CompositeOptions::default()).unwrap();
        assert_eq!(canvas.rgba_at(0, 0)[3], 0);
    }
}
