//! Synthetic rasters with predictable, verifiable contents.

use raster_common::sample::write_sample_f64;
use raster_common::{
    Georeference, Palette, PaletteEntry, PixelFormat, PixelType, Raster, SampleType,
};

/// Simple deterministic hash for reproducible test data.
pub fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Largest value a format's samples may hold in generated data.
fn value_ceiling(format: &PixelFormat, palette_len: usize) -> f64 {
    if format.pixel_type == PixelType::Palette {
        return (palette_len.max(1) - 1) as f64;
    }
    match format.sample_type {
        SampleType::Bit1 => 1.0,
        SampleType::Bit2 => 3.0,
        SampleType::Bit4 => 15.0,
        SampleType::Int8 => 127.0,
        SampleType::Uint8 => 255.0,
        SampleType::Int16 => 32767.0,
        SampleType::Uint16 => 65535.0,
        SampleType::Int32 | SampleType::Uint32 => 1_000_000.0,
        SampleType::Float32 | SampleType::Float64 => 1000.0,
    }
}

/// A palette with `entries` distinct colours.
pub fn test_palette(entries: usize) -> Palette {
    let entries = (0..entries)
        .map(|i| PaletteEntry::new((i * 7) as u8, (255 - i) as u8, (i * 13) as u8))
        .collect();
    Palette::from_entries(entries).unwrap_or_else(|_| Palette::gray_ramp(SampleType::Uint8).unwrap())
}

/// A raster of any legal format filled with a diagonal gradient plus noise.
///
/// Every sample is valid for its type; palette rasters get a palette sized
/// to the sample depth.
pub fn gradient_raster(format: PixelFormat, width: u32, height: u32, seed: u32) -> Raster {
    let palette = (format.pixel_type == PixelType::Palette).then(|| {
        let n = match format.sample_type {
            SampleType::Bit1 => 2,
            SampleType::Bit2 => 4,
            SampleType::Bit4 => 16,
            _ => 200,
        };
        test_palette(n)
    });
    let ceiling = value_ceiling(&format, palette.as_ref().map(|p| p.len()).unwrap_or(0));
    let bands = format.bands as usize;
    let mut pixels = vec![0u8; width as usize * height as usize * format.pixel_bytes()];
    for y in 0..height {
        for x in 0..width {
            for band in 0..bands {
                let ramp = (x + y + band as u32 * 3) as f64 / (width + height) as f64;
                let noise = (simple_hash(x, y, seed + band as u32) % 8) as f64 / 8.0;
                let mut value = ((ramp * 0.9 + noise * 0.1) * ceiling).round().min(ceiling);
                if format.sample_type.is_sub_byte() || format.pixel_type == PixelType::Palette {
                    value = ((x + y + band as u32) as f64 % (ceiling + 1.0)).min(ceiling);
                }
                if format.sample_type == SampleType::Int8 || format.sample_type == SampleType::Int16 {
                    value -= ceiling / 2.0;
                }
                let index = (y as usize * width as usize + x as usize) * bands + band;
                write_sample_f64(&mut pixels, format.sample_type, index, value);
            }
        }
    }
    Raster::new(width, height, format, pixels, palette).expect("generated raster is valid")
}

/// 1-bit monochrome checkerboard with `cell`-pixel squares.
pub fn checkerboard_mono(width: u32, height: u32, cell: u32) -> Raster {
    let format = PixelFormat::new(SampleType::Bit1, PixelType::Monochrome, 1)
        .expect("monochrome format is legal");
    let cell = cell.max(1);
    let pixels = (0..height)
        .flat_map(|y| (0..width).map(move |x| (((x / cell) + (y / cell)) % 2) as u8))
        .collect();
    Raster::new(width, height, format, pixels, None).expect("generated raster is valid")
}

/// 8-bit RGB gradient: red follows x, green follows y, blue is constant.
pub fn rgb_gradient(width: u32, height: u32) -> Raster {
    let format = PixelFormat::new(SampleType::Uint8, PixelType::Rgb, 3).expect("rgb format is legal");
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128]);
        }
    }
    Raster::new(width, height, format, pixels, None).expect("generated raster is valid")
}

/// DataGrid raster whose samples come from `f(x, y)`.
pub fn datagrid_from_fn(
    sample_type: SampleType,
    width: u32,
    height: u32,
    f: impl Fn(u32, u32) -> f64,
) -> Raster {
    let format = PixelFormat::new(sample_type, PixelType::DataGrid, 1).expect("datagrid format is legal");
    let mut pixels = vec![0u8; width as usize * height as usize * format.pixel_bytes()];
    for y in 0..height {
        for x in 0..width {
            write_sample_f64(&mut pixels, sample_type, (y * width + x) as usize, f(x, y));
        }
    }
    Raster::new(width, height, format, pixels, None).expect("generated raster is valid")
}

/// Evenly spread int16 values covering `[min, max]`, in raster order.
pub fn uniform_int16_grid(width: u32, height: u32, min: i16, max: i16) -> Raster {
    let count = (width * height).max(2) as f64;
    let span = max as f64 - min as f64;
    datagrid_from_fn(SampleType::Int16, width, height, |x, y| {
        let i = (y * width + x) as f64;
        min as f64 + (i / (count - 1.0) * span).round()
    })
}

/// Attach a georeference with square pixels of size `res` anchored at (`min_x`, `max_y`).
pub fn georeferenced(raster: Raster, srid: i32, min_x: f64, max_y: f64, res: f64) -> Raster {
    let geo = Georeference::from_origin(srid, min_x, max_y, raster.width(), raster.height(), res, res)
        .expect("test georeference is valid");
    raster.with_georeference(geo)
}

/// A representative set of legal raster formats.
pub fn representative_formats() -> Vec<PixelFormat> {
    let combos: &[(SampleType, PixelType, u8)] = &[
        (SampleType::Bit1, PixelType::Monochrome, 1),
        (SampleType::Bit1, PixelType::Palette, 1),
        (SampleType::Bit2, PixelType::Palette, 1),
        (SampleType::Bit4, PixelType::Palette, 1),
        (SampleType::Uint8, PixelType::Palette, 1),
        (SampleType::Bit2, PixelType::Grayscale, 1),
        (SampleType::Bit4, PixelType::Grayscale, 1),
        (SampleType::Uint8, PixelType::Grayscale, 1),
        (SampleType::Uint16, PixelType::Grayscale, 1),
        (SampleType::Uint8, PixelType::Rgb, 3),
        (SampleType::Uint16, PixelType::Rgb, 3),
        (SampleType::Uint8, PixelType::MultiBand, 2),
        (SampleType::Uint8, PixelType::MultiBand, 3),
        (SampleType::Uint8, PixelType::MultiBand, 4),
        (SampleType::Uint16, PixelType::MultiBand, 4),
        (SampleType::Uint16, PixelType::MultiBand, 5),
        (SampleType::Int8, PixelType::DataGrid, 1),
        (SampleType::Uint8, PixelType::DataGrid, 1),
        (SampleType::Int16, PixelType::DataGrid, 1),
        (SampleType::Uint16, PixelType::DataGrid, 1),
        (SampleType::Int32, PixelType::DataGrid, 1),
        (SampleType::Uint32, PixelType::DataGrid, 1),
        (SampleType::Float32, PixelType::DataGrid, 1),
        (SampleType::Float64, PixelType::DataGrid, 1),
    ];
    combos
        .iter()
        .filter_map(|(s, p, b)| PixelFormat::new(*s, *p, *b).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_raster_valid_for_all_formats() {
        for format in representative_formats() {
            let r = gradient_raster(format, 17, 9, 1);
            assert_eq!(r.format(), format);
            assert_eq!(r.pixels().len(), 17 * 9 * format.pixel_bytes());
        }
    }

    #[test]
    fn test_checkerboard() {
        let r = checkerboard_mono(4, 4, 2);
        assert_eq!(&r.pixels()[..4], &[0, 0, 1, 1]);
        assert_eq!(&r.pixels()[8..12], &[1, 1, 0, 0]);
    }

    #[test]
    fn test_uniform_int16() {
        let r = uniform_int16_grid(10, 10, -100, 100);
        assert_eq!(r.sample_f64(0, 0, 0), -100.0);
        assert_eq!(r.sample_f64(9, 9, 0), 100.0);
    }

    #[test]
    fn test_deterministic_hash() {
        assert_eq!(simple_hash(3, 4, 42), simple_hash(3, 4, 42));
        assert_ne!(simple_hash(3, 4, 42), simple_hash(3, 4, 43));
    }
}
