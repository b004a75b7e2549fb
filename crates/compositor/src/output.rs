//! Encoding canvases as image files.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::ColorType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompositeError, Result};
use crate::layout::Canvas;
use crate::png::create_png_auto;

/// Image formats a region query may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Tiff,
    /// Recognised but never produced.
    Pdf,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Pdf => "application/x-pdf",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(OutputFormat::Png),
            "image/jpeg" | "image/jpg" => Some(OutputFormat::Jpeg),
            "image/tiff" => Some(OutputFormat::Tiff),
            "application/pdf" | "application/x-pdf" => Some(OutputFormat::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "PNG",
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Pdf => "PDF",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(format) = Self::from_mime_type(s) {
            return Ok(format);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Encode `canvas` as `format`.
///
/// JPEG has no alpha, so transparent areas are blended over `background`
/// (white when unset). `quality` only affects JPEG.
pub fn encode_canvas(
    canvas: &Canvas,
    format: OutputFormat,
    quality: u8,
    background: Option<[u8; 3]>,
) -> Result<Vec<u8>> {
    let bytes = match format {
        OutputFormat::Png => {
            create_png_auto(&canvas.to_rgba(), canvas.width, canvas.height).map_err(|e| CompositeError::encode(format, e))?
        }
        OutputFormat::Jpeg => {
            let rgb = canvas.to_rgb_over(background.unwrap_or([255, 255, 255]));
            let mut out = Vec::new();
            {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
                encoder
                    .encode(&rgb, canvas.width, canvas.height, ColorType::Rgb8)
                    .map_err(|e| CompositeError::encode(format, e))?;
            }
            out
        }
        OutputFormat::Tiff => {
            let rgba = canvas.to_rgba();
            let mut cursor = Cursor::new(Vec::new());
            image::codecs::tiff::TiffEncoder::new(&mut cursor)
                .encode(&rgba, canvas.width, canvas.height, ColorType::Rgba8)
                .map_err(|e| CompositeError::encode(format, e))?;
            cursor.into_inner()
        }
        OutputFormat::Pdf => return Err(CompositeError::UnsupportedOutput(format)),
    };
    debug!(format = %format, bytes = bytes.len(), "Encoded canvas");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ImageLayout;
    use image::GenericImageView;

    fn canvas() -> Canvas {
        let rgba: Vec<u8> = (0..16u32).flat_map(|i| [(i * 16) as u8, 0, 0, if i == 0 { 0 } else { 255 }]).collect();
        Canvas::from_rgba(4, 4, &rgba, ImageLayout::Rgba)
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("image/png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_mime_type("application/pdf"), Some(OutputFormat::Pdf));
        assert!("image/gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_png_and_tiff_decode_back() {
        let c = canvas();
        for format in [OutputFormat::Png, OutputFormat::Tiff] {
            let bytes = encode_canvas(&c, format, 80, None).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
            assert_eq!(decoded.into_raw(), c.to_rgba(), "{format}");
        }
    }

    #[test]
    fn test_jpeg_dimensions() {
        let bytes = encode_canvas(&canvas(), OutputFormat::Jpeg, 90, Some([0, 0, 0])).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn test_pdf_is_rejected() {
        assert!(matches!(
            encode_canvas(&canvas(), OutputFormat::Pdf, 80, None),
            Err(CompositeError::UnsupportedOutput(OutputFormat::Pdf))
        ));
    }
}
