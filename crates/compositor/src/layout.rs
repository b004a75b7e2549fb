//! Output pixel layouts and the canvas that holds them.

use serde::{Deserialize, Serialize};

/// Byte order of a composited pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageLayout {
    Rgb,
    Rgba,
    Argb,
    Bgr,
    Bgra,
}

impl ImageLayout {
    pub fn channels(&self) -> usize {
        match self {
            ImageLayout::Rgb | ImageLayout::Bgr => 3,
            ImageLayout::Rgba | ImageLayout::Argb | ImageLayout::Bgra => 4,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.channels() == 4
    }

    /// Write one RGBA pixel into `out` in this layout.
    #[inline]
    pub fn pack(&self, [r, g, b, a]: [u8; 4], out: &mut [u8]) {
        match self {
            ImageLayout::Rgb => out[..3].copy_from_slice(&[r, g, b]),
            ImageLayout::Rgba => out[..4].copy_from_slice(&[r, g, b, a]),
            ImageLayout::Argb => out[..4].copy_from_slice(&[a, r, g, b]),
            ImageLayout::Bgr => out[..3].copy_from_slice(&[b, g, r]),
            ImageLayout::Bgra => out[..4].copy_from_slice(&[b, g, r, a]),
        }
    }

    /// Read one pixel in this layout back as RGBA (opaque when there is no alpha).
    #[inline]
    pub fn unpack(&self, px: &[u8]) -> [u8; 4] {
        match self {
            ImageLayout::Rgb => [px[0], px[1], px[2], 255],
            ImageLayout::Rgba => [px[0], px[1], px[2], px[3]],
            ImageLayout::Argb => [px[1], px[2], px[3], px[0]],
            ImageLayout::Bgr => [px[2], px[1], px[0], 255],
            ImageLayout::Bgra => [px[2], px[1], px[0], px[3]],
        }
    }
}

/// A composited image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub layout: ImageLayout,
    pub data: Vec<u8>,
}

impl Canvas {
    /// Repack an RGBA buffer into `layout`.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8], layout: ImageLayout) -> Self {
        if layout == ImageLayout::Rgba {
            return Self {
                width,
                height,
                layout,
                data: rgba.to_vec(),
            };
        }
        let channels = layout.channels();
        let mut data = vec![0u8; width as usize * height as usize * channels];
        for (src, dst) in rgba.chunks_exact(4).zip(data.chunks_exact_mut(channels)) {
            layout.pack([src[0], src[1], src[2], src[3]], dst);
        }
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Bytes of the pixel at (`x`, `y`).
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.layout.channels();
        let at = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[at..at + channels]
    }

    /// The pixel at (`x`, `y`) as RGBA.
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        self.layout.unpack(self.pixel(x, y))
    }

    /// The whole canvas as RGBA.
    pub fn to_rgba(&self) -> Vec<u8> {
        if self.layout == ImageLayout::Rgba {
            return self.data.clone();
        }
        self.data
            .chunks_exact(self.layout.channels())
            .flat_map(|px| self.layout.unpack(px))
            .collect()
    }

    /// Whole canvas as RGB, with transparent areas blended over `background`.
    pub fn to_rgb_over(&self, background: [u8; 3]) -> Vec<u8> {
        self.data
            .chunks_exact(self.layout.channels())
            .flat_map(|px| {
                let [r, g, b, a] = self.layout.unpack(px);
                let alpha = a as u32;
                let blend = |c: u8, bg: u8| ((c as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8;
                [blend(r, background[0]), blend(g, background[1]), blend(b, background[2])]
            })
            .collect()
    }
}
