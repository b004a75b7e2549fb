//! In-memory typed raster buffers.
//!
//! Pixels are stored band-interleaved, row-major, in native byte order.
//! 1/2/4-bit samples take one byte each; packing only happens inside the
//! tile codec.

use crate::bbox::Georeference;
use crate::error::{RasterError, RasterResult};
use crate::format::PixelFormat;
use crate::palette::Palette;
use crate::pixel::{normalize_no_data, Pixel};
use crate::sample::{read_sample_f64, same_sample, write_sample_f64, PixelType};

/// Per-pixel transparency plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mask {
    /// One byte per pixel: 0 = transparent, 1 = opaque.
    Transparency(Vec<u8>),
    /// One alpha byte per pixel: 0 = transparent, 255 = opaque.
    Alpha(Vec<u8>),
}

impl Mask {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Mask::Transparency(b) | Mask::Alpha(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    #[inline]
    pub fn is_transparent(&self, index: usize) -> bool {
        self.bytes()[index] == 0
    }

    /// Alpha value at `index` (transparency masks map to 0/255).
    #[inline]
    pub fn alpha(&self, index: usize) -> u8 {
        match self {
            Mask::Transparency(b) => {
                if b[index] == 0 {
                    0
                } else {
                    255
                }
            }
            Mask::Alpha(b) => b[index],
        }
    }
}

/// A 2D typed pixel array with its optional mask, palette, NoData and
/// georeferencing.
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    mask: Option<Mask>,
    palette: Option<Palette>,
    no_data: Option<Pixel>,
    georeference: Option<Georeference>,
}

impl Raster {
    /// Take ownership of a pixel buffer.
    ///
    /// Fails if the buffer length does not match the dimensions, if a palette
    /// is given for a non-palette format (or missing for a palette one), or if
    /// any sample is out of range for its type or palette.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
        palette: Option<Palette>,
    ) -> RasterResult<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::invalid(format!(
                "raster dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.pixel_bytes()))
            .ok_or_else(|| RasterError::invalid("raster dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(RasterError::invalid(format!(
                "pixel buffer is {} bytes, {}x{} {} needs {}",
                pixels.len(),
                width,
                height,
                format,
                expected
            )));
        }

        match (&palette, format.pixel_type) {
            (None, PixelType::Palette) => {
                return Err(RasterError::invalid("palette raster requires a palette"))
            }
            (Some(_), pt) if pt != PixelType::Palette => {
                return Err(RasterError::invalid(format!(
                    "{} raster cannot carry a palette",
                    pt
                )))
            }
            _ => {}
        }

        if let Some(max) = format.sample_type.sub_byte_max() {
            if let Some(bad) = pixels.iter().find(|v| **v > max) {
                return Err(RasterError::SampleOutOfRange {
                    sample_type: format.sample_type,
                    value: *bad as u32,
                    max: max as u32,
                });
            }
        }
        if let Some(p) = &palette {
            let entries = p.len();
            if let Some(bad) = pixels.iter().find(|v| **v as usize >= entries) {
                return Err(RasterError::invalid(format!(
                    "palette index {} exceeds {} entries",
                    bad, entries
                )));
            }
        }

        Ok(Self {
            width,
            height,
            format,
            pixels,
            mask: None,
            palette,
            no_data: None,
            georeference: None,
        })
    }

    /// A raster with every pixel set to `fill` (or zero).
    pub fn filled(
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Option<Palette>,
        fill: Option<&Pixel>,
    ) -> RasterResult<Self> {
        let len = (width as usize) * (height as usize) * format.pixel_bytes();
        let mut raster = Self::new(width, height, format, vec![0u8; len], palette)?;
        if let Some(fill) = fill {
            fill.check_format(&format)?;
            let mut template = vec![0u8; format.pixel_bytes()];
            for band in 0..format.bands as usize {
                write_sample_f64(
                    &mut template,
                    format.sample_type,
                    band,
                    fill.sample_f64(band)?,
                );
            }
            for chunk in raster.pixels.chunks_exact_mut(template.len()) {
                chunk.copy_from_slice(&template);
            }
        }
        Ok(raster)
    }

    /// Attach a mask of `width * height` bytes.
    pub fn with_mask(mut self, mask: Mask) -> RasterResult<Self> {
        if mask.len() != self.pixel_count() {
            return Err(RasterError::invalid(format!(
                "mask has {} bytes, raster has {} pixels",
                mask.len(),
                self.pixel_count()
            )));
        }
        if let Mask::Transparency(bytes) = &mask {
            if bytes.iter().any(|v| *v > 1) {
                return Err(RasterError::invalid("transparency mask values must be 0 or 1"));
            }
        }
        self.mask = Some(mask);
        Ok(self)
    }

    /// Attach a NoData pixel; it must match the raster format exactly.
    ///
    /// The "none" pixel clears any NoData.
    pub fn with_no_data(mut self, no_data: Pixel) -> RasterResult<Self> {
        self.no_data = normalize_no_data(Some(no_data), &self.format)?;
        Ok(self)
    }

    pub fn with_georeference(mut self, georeference: Georeference) -> Self {
        self.georeference = Some(georeference);
        self
    }

    pub fn set_georeference(&mut self, georeference: Option<Georeference>) {
        self.georeference = georeference;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn no_data(&self) -> Option<&Pixel> {
        self.no_data.as_ref()
    }

    pub fn georeference(&self) -> Option<&Georeference> {
        self.georeference.as_ref()
    }

    /// Release the pixel buffer and mask.
    pub fn into_parts(self) -> (Vec<u8>, Option<Mask>, Option<Palette>) {
        (self.pixels, self.mask, self.palette)
    }

    /// Sample index (in units of samples, not bytes) of (`x`, `y`, `band`).
    #[inline]
    pub fn sample_index(&self, x: u32, y: u32, band: usize) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bands as usize + band
    }

    /// Read one sample widened to `f64`. Panics on out-of-range coordinates.
    #[inline]
    pub fn sample_f64(&self, x: u32, y: u32, band: usize) -> f64 {
        read_sample_f64(
            &self.pixels,
            self.format.sample_type,
            self.sample_index(x, y, band),
        )
    }

    fn check_coords(&self, x: u32, y: u32) -> RasterResult<()> {
        if x >= self.width || y >= self.height {
            return Err(RasterError::invalid(format!(
                "pixel ({}, {}) outside {}x{} raster",
                x, y, self.width, self.height
            )));
        }
        Ok(())
    }

    /// Copy out one pixel. The transparency flag reflects the mask.
    pub fn get_pixel(&self, x: u32, y: u32) -> RasterResult<Pixel> {
        self.check_coords(x, y)?;
        let mut pixel = Pixel::with_format(self.format);
        for band in 0..self.format.bands as usize {
            pixel.set_sample_f64(band, self.sample_f64(x, y, band))?;
        }
        let index = y as usize * self.width as usize + x as usize;
        if let Some(mask) = &self.mask {
            pixel.set_transparent(mask.is_transparent(index))?;
        }
        Ok(pixel)
    }

    /// Overwrite one pixel; its format must match.
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: &Pixel) -> RasterResult<()> {
        self.check_coords(x, y)?;
        pixel.check_format(&self.format)?;
        if let Some(palette) = &self.palette {
            let index = pixel.sample_f64(0)? as usize;
            if index >= palette.len() {
                return Err(RasterError::invalid(format!(
                    "palette index {} exceeds {} entries",
                    index,
                    palette.len()
                )));
            }
        }
        for band in 0..self.format.bands as usize {
            let at = self.sample_index(x, y, band);
            write_sample_f64(&mut self.pixels, self.format.sample_type, at, pixel.sample_f64(band)?);
        }
        Ok(())
    }

    /// Whether the pixel at linear index `index` equals the NoData pixel on every band.
    #[inline]
    pub fn matches_no_data(&self, index: usize) -> bool {
        let Some(no_data) = &self.no_data else {
            return false;
        };
        let bands = self.format.bands as usize;
        (0..bands).all(|band| {
            let value = read_sample_f64(&self.pixels, self.format.sample_type, index * bands + band);
            matches!(no_data.sample_f64(band), Ok(nd) if same_sample(nd, value))
        })
    }

    /// Mask says transparent, or the pixel is NoData.
    #[inline]
    pub fn is_transparent(&self, index: usize) -> bool {
        self.mask.as_ref().map(|m| m.is_transparent(index)).unwrap_or(false)
            || self.matches_no_data(index)
    }

    /// Copy a `width` x `height` block starting at (`x0`, `y0`).
    ///
    /// Parts falling outside the raster are filled with NoData when the
    /// raster has one, otherwise zero-filled and masked out.
    pub fn extract_block(&self, x0: u32, y0: u32, width: u32, height: u32) -> RasterResult<Raster> {
        let mut block = Raster::filled(
            width,
            height,
            self.format,
            self.palette.clone(),
            self.no_data.as_ref(),
        )?;
        block.no_data = self.no_data.clone();

        let pixel_bytes = self.format.pixel_bytes();
        let copy_w = self.width.saturating_sub(x0).min(width) as usize;
        let copy_h = self.height.saturating_sub(y0).min(height) as usize;
        let padded = copy_w < width as usize || copy_h < height as usize;

        let mut mask = match (&self.mask, padded && self.no_data.is_none()) {
            (Some(Mask::Alpha(_)), _) => Some(Mask::Alpha(vec![0u8; (width * height) as usize])),
            (Some(Mask::Transparency(_)), _) | (None, true) => {
                Some(Mask::Transparency(vec![0u8; (width * height) as usize]))
            }
            (None, false) => None,
        };

        for row in 0..copy_h {
            let src_start = ((y0 as usize + row) * self.width as usize + x0 as usize) * pixel_bytes;
            let dst_start = row * width as usize * pixel_bytes;
            let len = copy_w * pixel_bytes;
            block.pixels[dst_start..dst_start + len]
                .copy_from_slice(&self.pixels[src_start..src_start + len]);

            if let Some(dst_mask) = &mut mask {
                let dst = match dst_mask {
                    Mask::Transparency(b) | Mask::Alpha(b) => b,
                };
                let dst_row = row * width as usize;
                match &self.mask {
                    Some(src_mask) => {
                        let src_row = (y0 as usize + row) * self.width as usize + x0 as usize;
                        dst[dst_row..dst_row + copy_w]
                            .copy_from_slice(&src_mask.bytes()[src_row..src_row + copy_w]);
                    }
                    None => dst[dst_row..dst_row + copy_w].fill(1),
                }
            }
        }
        block.mask = mask;

        if let Some(geo) = &self.georeference {
            block.georeference = Some(Georeference {
                bbox: geo.block_bbox(x0, y0, width, height),
                ..*geo
            });
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PaletteEntry;
    use crate::sample::{write_sample, SampleType};

    fn gray8(width: u32, height: u32, pixels: Vec<u8>) -> Raster {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        Raster::new(width, height, format, pixels, None).unwrap()
    }

    #[test]
    fn test_buffer_length_is_checked() {
        let format = PixelFormat::new(SampleType::Uint16, PixelType::Rgb, 3).unwrap();
        assert!(Raster::new(2, 2, format, vec![0; 24], None).is_ok());
        assert!(Raster::new(2, 2, format, vec![0; 23], None).is_err());
        assert!(Raster::new(0, 2, format, vec![], None).is_err());
    }

    #[test]
    fn test_palette_rules() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Palette, 1).unwrap();
        assert!(Raster::new(2, 1, format, vec![0, 1], None).is_err());

        let palette = Palette::from_entries(vec![PaletteEntry::gray(0), PaletteEntry::gray(9)]).unwrap();
        assert!(Raster::new(2, 1, format, vec![0, 1], Some(palette.clone())).is_ok());
        assert!(Raster::new(2, 1, format, vec![0, 2], Some(palette.clone())).is_err());

        let gray = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        assert!(Raster::new(2, 1, gray, vec![0, 1], Some(palette)).is_err());
    }

    #[test]
    fn test_sub_byte_range() {
        let format = PixelFormat::new(SampleType::Bit4, PixelType::Grayscale, 1).unwrap();
        assert!(Raster::new(2, 1, format, vec![15, 0], None).is_ok());
        assert!(matches!(
            Raster::new(2, 1, format, vec![16, 0], None),
            Err(RasterError::SampleOutOfRange { .. })
        ));
    }

    #[test]
    fn test_mask_validation() {
        let r = gray8(2, 1, vec![1, 2]);
        assert!(r.clone().with_mask(Mask::Transparency(vec![0, 1])).is_ok());
        assert!(r.clone().with_mask(Mask::Transparency(vec![0, 2])).is_err());
        assert!(r.clone().with_mask(Mask::Alpha(vec![0, 200])).is_ok());
        assert!(r.with_mask(Mask::Alpha(vec![0])).is_err());
    }

    #[test]
    fn test_no_data_matching() {
        let format = PixelFormat::new(SampleType::Uint16, PixelType::DataGrid, 1).unwrap();
        let mut pixels = vec![0u8; 6];
        write_sample(&mut pixels, 0, 7u16);
        write_sample(&mut pixels, 1, 9999u16);
        write_sample(&mut pixels, 2, 8u16);
        let mut nd = Pixel::with_format(format);
        nd.set_u16(0, 9999).unwrap();
        let r = Raster::new(3, 1, format, pixels, None)
            .unwrap()
            .with_no_data(nd)
            .unwrap();
        assert!(!r.matches_no_data(0));
        assert!(r.matches_no_data(1));
        assert!(r.is_transparent(1));

        let wrong = Pixel::new(SampleType::Uint8, PixelType::DataGrid, 1).unwrap();
        assert!(r.clone().with_no_data(wrong).is_err());
        let cleared = r.with_no_data(Pixel::none()).unwrap();
        assert!(cleared.no_data().is_none());
    }

    #[test]
    fn test_nan_no_data_matching() {
        let format = PixelFormat::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        let mut pixels = vec![0u8; 8];
        write_sample(&mut pixels, 0, f32::NAN);
        write_sample(&mut pixels, 1, 2.5f32);
        let mut nd = Pixel::with_format(format);
        nd.set_f32(0, f32::NAN).unwrap();
        let r = Raster::new(2, 1, format, pixels, None)
            .unwrap()
            .with_no_data(nd)
            .unwrap();
        assert!(r.matches_no_data(0));
        assert!(!r.matches_no_data(1));
        assert!(r.is_transparent(0));
    }

    #[test]
    fn test_pixel_get_set() {
        let mut r = gray8(2, 2, vec![0, 1, 2, 3]);
        let p = r.get_pixel(1, 1).unwrap();
        assert_eq!(p.get_u8(0).unwrap(), 3);
        let mut q = p.try_clone().unwrap();
        q.set_u8(0, 200).unwrap();
        r.set_pixel(0, 0, &q).unwrap();
        assert_eq!(r.pixels()[0], 200);
        assert!(r.get_pixel(2, 0).is_err());
    }

    #[test]
    fn test_extract_block_pads_with_mask() {
        let r = gray8(3, 3, (1..=9).collect());
        let block = r.extract_block(2, 2, 2, 2).unwrap();
        assert_eq!(block.pixels(), &[9, 0, 0, 0]);
        assert_eq!(block.mask().unwrap().bytes(), &[1, 0, 0, 0]);

        let inner = r.extract_block(0, 0, 2, 2).unwrap();
        assert_eq!(inner.pixels(), &[1, 2, 4, 5]);
        assert!(inner.mask().is_none());
    }

    #[test]
    fn test_extract_block_pads_with_no_data() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut nd = Pixel::with_format(format);
        nd.set_u8(0, 77).unwrap();
        let r = gray8(1, 1, vec![5]).with_no_data(nd).unwrap();
        let block = r.extract_block(0, 0, 2, 1).unwrap();
        assert_eq!(block.pixels(), &[5, 77]);
        assert!(block.mask().is_none());
        assert!(block.matches_no_data(1));
    }
}
