//! Lossless PNG tile planes via the png crate.
//!
//! Samples are stored untransformed: palette indices and DataGrid values go
//! out as plain gray, 1/2/4-bit planes keep their bit depth and 16-bit
//! samples are written big-endian as PNG requires.

use std::io::Cursor;

use raster_common::{Compression, PixelFormat, SampleType};

use crate::backend::{ImageCodec, Plane};
use crate::error::{CodecError, Result};
use crate::pack::{pack_rows, unpack_rows};

/// PNG image codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngCodec;

fn png_layout(format: &PixelFormat) -> Result<(png::ColorType, png::BitDepth)> {
    let depth = match format.sample_type {
        SampleType::Bit1 => png::BitDepth::One,
        SampleType::Bit2 => png::BitDepth::Two,
        SampleType::Bit4 => png::BitDepth::Four,
        SampleType::Uint8 => png::BitDepth::Eight,
        SampleType::Uint16 => png::BitDepth::Sixteen,
        other => {
            return Err(CodecError::backend(
                Compression::Png,
                format!("cannot store {} samples", other),
            ))
        }
    };
    let color = match format.bands {
        1 => png::ColorType::Grayscale,
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => {
            return Err(CodecError::backend(
                Compression::Png,
                format!("cannot store {} bands", n),
            ))
        }
    };
    Ok((color, depth))
}

/// Swap 16-bit samples between native and big-endian order.
fn u16_to_big_endian(data: &mut [u8]) {
    if cfg!(target_endian = "little") {
        for pair in data.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }
}

impl ImageCodec for PngCodec {
    fn encode(&self, plane: &Plane<'_>, _quality: u8) -> Result<Vec<u8>> {
        let (color, depth) = png_layout(&plane.format)?;
        let mut data = pack_rows(&plane.format, plane.width, plane.height, plane.data);
        if plane.format.sample_type == SampleType::Uint16 {
            u16_to_big_endian(&mut data);
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, plane.width, plane.height);
            encoder.set_color(color);
            encoder.set_depth(depth);
            encoder.set_compression(png::Compression::Default);
            let mut writer = encoder
                .write_header()
                .map_err(|e| CodecError::backend(Compression::Png, e))?;
            writer
                .write_image_data(&data)
                .map_err(|e| CodecError::backend(Compression::Png, e))?;
            writer
                .finish()
                .map_err(|e| CodecError::backend(Compression::Png, e))?;
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8], format: &PixelFormat, width: u32, height: u32) -> Result<Vec<u8>> {
        let (color, depth) = png_layout(format)?;
        let mut decoder = png::Decoder::new(Cursor::new(data));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder
            .read_info()
            .map_err(|e| CodecError::backend(Compression::Png, e))?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| CodecError::backend(Compression::Png, e))?;

        if info.width != width
            || info.height != height
            || info.color_type != color
            || info.bit_depth != depth
        {
            return Err(CodecError::malformed(format!(
                "PNG is {}x{} {:?}/{:?}, tile header says {}x{} {:?}/{:?}",
                info.width, info.height, info.color_type, info.bit_depth, width, height, color, depth
            )));
        }
        buf.truncate(info.buffer_size());
        if format.sample_type == SampleType::Uint16 {
            u16_to_big_endian(&mut buf);
        }
        unpack_rows(format, width, height, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::PixelType;

    fn roundtrip(format: PixelFormat, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
        let plane = Plane {
            format,
            width,
            height,
            data,
        };
        let encoded = PngCodec.encode(&plane, 100).unwrap();
        assert_eq!(&encoded[1..4], b"PNG");
        PngCodec.decode(&encoded, &format, width, height).unwrap()
    }

    #[test]
    fn test_four_bit_gray() {
        let format = PixelFormat::new(SampleType::Bit4, PixelType::Grayscale, 1).unwrap();
        let data: Vec<u8> = (0..35).map(|i| (i % 16) as u8).collect();
        assert_eq!(roundtrip(format, 7, 5, &data), data);
    }

    #[test]
    fn test_sixteen_bit_rgb() {
        let format = PixelFormat::new(SampleType::Uint16, PixelType::Rgb, 3).unwrap();
        let data: Vec<u8> = (0..4 * 3 * 2).map(|i| (i * 31) as u8).collect();
        assert_eq!(roundtrip(format, 2, 2, &data), data);
    }

    #[test]
    fn test_mismatched_header_rejected() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let plane = Plane {
            format,
            width: 4,
            height: 4,
            data: &[9u8; 16],
        };
        let encoded = PngCodec.encode(&plane, 100).unwrap();
        assert!(PngCodec.decode(&encoded, &format, 4, 5).is_err());
        assert!(PngCodec.decode(&encoded[..20], &format, 4, 4).is_err());
    }
}
