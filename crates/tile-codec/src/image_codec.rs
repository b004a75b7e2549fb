//! Lossy photographic codecs: JPEG through `image`, WEBP through `webp`.
//!
//! Sub-byte grayscale is widened to 8 bits before encoding and requantized
//! after decoding.

use image::{GenericImageView, ImageFormat};

use raster_common::{Compression, PixelFormat, SampleType};

use crate::backend::{ImageCodec, Plane};
use crate::error::{CodecError, Result};
use crate::pack::{narrow_gray, widen_gray};

fn check_byte_plane(codec: Compression, format: &PixelFormat) -> Result<()> {
    let byte_like = format.sample_type == SampleType::Uint8 || format.sample_type.is_sub_byte();
    if !byte_like {
        return Err(CodecError::backend(
            codec,
            format!("cannot store {} samples", format.sample_type),
        ));
    }
    Ok(())
}

fn check_size(codec: Compression, data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(CodecError::malformed(format!(
            "{} decoded {} bytes, expected {}",
            codec,
            data.len(),
            expected
        )));
    }
    Ok(())
}

/// Baseline JPEG for 1-band gray and 3-band RGB planes.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn encode(&self, plane: &Plane<'_>, quality: u8) -> Result<Vec<u8>> {
        check_byte_plane(Compression::Jpeg, &plane.format)?;
        let (pixels, color) = match plane.format.bands {
            1 => (
                widen_gray(plane.format.sample_type, plane.data),
                image::ColorType::L8,
            ),
            3 => (plane.data.to_vec(), image::ColorType::Rgb8),
            n => {
                return Err(CodecError::backend(
                    Compression::Jpeg,
                    format!("cannot store {} bands", n),
                ))
            }
        };

        let mut out = Vec::new();
        {
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder
                .encode(&pixels, plane.width, plane.height, color)
                .map_err(|e| CodecError::backend(Compression::Jpeg, e))?;
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8], format: &PixelFormat, width: u32, height: u32) -> Result<Vec<u8>> {
        let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| CodecError::backend(Compression::Jpeg, e))?;
        if img.width() != width || img.height() != height {
            return Err(CodecError::malformed(format!(
                "JPEG is {}x{}, tile header says {}x{}",
                img.width(),
                img.height(),
                width,
                height
            )));
        }
        let pixels = match format.bands {
            1 => {
                let mut gray = img.to_luma8().into_raw();
                narrow_gray(format.sample_type, &mut gray);
                gray
            }
            _ => img.to_rgb8().into_raw(),
        };
        check_size(
            Compression::Jpeg,
            &pixels,
            (width * height) as usize * format.bands as usize,
        )?;
        Ok(pixels)
    }
}

/// WEBP, lossy or lossless. Gray planes travel as RGB.
#[derive(Debug, Clone, Copy)]
pub struct WebpCodec {
    pub lossless: bool,
}

impl WebpCodec {
    fn compression(&self) -> Compression {
        if self.lossless {
            Compression::LosslessWebp
        } else {
            Compression::Webp
        }
    }
}

impl ImageCodec for WebpCodec {
    fn encode(&self, plane: &Plane<'_>, quality: u8) -> Result<Vec<u8>> {
        let codec = self.compression();
        check_byte_plane(codec, &plane.format)?;
        let rgb;
        let encoder = match plane.format.bands {
            1 => {
                rgb = widen_gray(plane.format.sample_type, plane.data)
                    .into_iter()
                    .flat_map(|v| [v, v, v])
                    .collect::<Vec<u8>>();
                webp::Encoder::from_rgb(&rgb, plane.width, plane.height)
            }
            3 => webp::Encoder::from_rgb(plane.data, plane.width, plane.height),
            4 => webp::Encoder::from_rgba(plane.data, plane.width, plane.height),
            n => {
                return Err(CodecError::backend(codec, format!("cannot store {} bands", n)));
            }
        };
        let encoded = if self.lossless {
            encoder.encode_lossless()
        } else {
            encoder.encode(quality as f32)
        };
        Ok(encoded.to_vec())
    }

    fn decode(&self, data: &[u8], format: &PixelFormat, width: u32, height: u32) -> Result<Vec<u8>> {
        let codec = self.compression();
        let image = webp::Decoder::new(data)
            .decode()
            .ok_or_else(|| CodecError::backend(codec, "invalid WEBP stream"))?;
        if image.width() != width || image.height() != height {
            return Err(CodecError::malformed(format!(
                "WEBP is {}x{}, tile header says {}x{}",
                image.width(),
                image.height(),
                width,
                height
            )));
        }
        let channels = if image.is_alpha() { 4 } else { 3 };
        let raw: &[u8] = &image;
        let pixels = match format.bands {
            1 => {
                let mut gray: Vec<u8> = raw.chunks_exact(channels).map(|px| px[0]).collect();
                narrow_gray(format.sample_type, &mut gray);
                gray
            }
            3 => raw.chunks_exact(channels).flat_map(|px| [px[0], px[1], px[2]]).collect(),
            _ if channels == 4 => raw.to_vec(),
            _ => raw
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
        };
        check_size(codec, &pixels, (width * height) as usize * format.bands as usize)?;
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::PixelType;

    fn gradient_rgb(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        data
    }

    #[test]
    fn test_jpeg_keeps_dimensions() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Rgb, 3).unwrap();
        let data = gradient_rgb(32, 16);
        let plane = Plane { format, width: 32, height: 16, data: &data };
        let encoded = JpegCodec.encode(&plane, 90).unwrap();
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
        let decoded = JpegCodec.decode(&encoded, &format, 32, 16).unwrap();
        assert_eq!(decoded.len(), data.len());
        assert!(JpegCodec.decode(&encoded, &format, 16, 16).is_err());
    }

    #[test]
    fn test_jpeg_two_bit_gray_stays_in_range() {
        let format = PixelFormat::new(SampleType::Bit2, PixelType::Grayscale, 1).unwrap();
        let data: Vec<u8> = (0..64).map(|i| (i % 4) as u8).collect();
        let plane = Plane { format, width: 8, height: 8, data: &data };
        let encoded = JpegCodec.encode(&plane, 75).unwrap();
        let decoded = JpegCodec.decode(&encoded, &format, 8, 8).unwrap();
        assert!(decoded.iter().all(|v| *v <= 3));
    }

    #[test]
    fn test_webp_lossless_is_exact() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Rgb, 3).unwrap();
        let data = gradient_rgb(16, 16);
        let plane = Plane { format, width: 16, height: 16, data: &data };
        let codec = WebpCodec { lossless: true };
        let encoded = codec.encode(&plane, 100).unwrap();
        assert_eq!(&encoded[0..4], b"RIFF");
        assert_eq!(codec.decode(&encoded, &format, 16, 16).unwrap(), data);
    }

    #[test]
    fn test_webp_gray_plane() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let data: Vec<u8> = (0..256).map(|i| i as u8).collect();
        let plane = Plane { format, width: 16, height: 16, data: &data };
        let codec = WebpCodec { lossless: true };
        let encoded = codec.encode(&plane, 100).unwrap();
        assert_eq!(codec.decode(&encoded, &format, 16, 16).unwrap(), data);
    }
}
