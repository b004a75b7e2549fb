//! Pixel format legality and the compression compatibility table.
//!
//! Every rule lives in the static tables below so the full matrix can be
//! enumerated and checked mechanically.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RasterError, RasterResult};
use crate::sample::{Compression, PixelType, SampleType};

/// Where a format is being validated.
///
/// Rasters held in memory accept a few formats (16-bit grayscale) that a
/// persisted coverage does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatContext {
    Raster,
    Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandRule {
    Exactly(u8),
    AtLeast(u8),
}

impl BandRule {
    fn accepts(&self, bands: u8) -> bool {
        match *self {
            BandRule::Exactly(n) => bands == n,
            BandRule::AtLeast(n) => bands >= n,
        }
    }
}

struct FormatRule {
    pixel_type: PixelType,
    bands: BandRule,
    samples: &'static [SampleType],
    raster_only_samples: &'static [SampleType],
}

// ============================================================================
// Compatibility tables
// ============================================================================

const FORMAT_RULES: [FormatRule; 6] = [
    FormatRule {
        pixel_type: PixelType::Monochrome,
        bands: BandRule::Exactly(1),
        samples: &[SampleType::Bit1],
        raster_only_samples: &[],
    },
    FormatRule {
        pixel_type: PixelType::Palette,
        bands: BandRule::Exactly(1),
        samples: &[
            SampleType::Bit1,
            SampleType::Bit2,
            SampleType::Bit4,
            SampleType::Uint8,
        ],
        raster_only_samples: &[],
    },
    FormatRule {
        pixel_type: PixelType::Grayscale,
        bands: BandRule::Exactly(1),
        samples: &[SampleType::Bit2, SampleType::Bit4, SampleType::Uint8],
        raster_only_samples: &[SampleType::Uint16],
    },
    FormatRule {
        pixel_type: PixelType::Rgb,
        bands: BandRule::Exactly(3),
        samples: &[SampleType::Uint8, SampleType::Uint16],
        raster_only_samples: &[],
    },
    FormatRule {
        pixel_type: PixelType::MultiBand,
        bands: BandRule::AtLeast(2),
        samples: &[SampleType::Uint8, SampleType::Uint16],
        raster_only_samples: &[],
    },
    FormatRule {
        pixel_type: PixelType::DataGrid,
        bands: BandRule::Exactly(1),
        samples: &[
            SampleType::Int8,
            SampleType::Uint8,
            SampleType::Int16,
            SampleType::Uint16,
            SampleType::Int32,
            SampleType::Uint32,
            SampleType::Float32,
            SampleType::Float64,
        ],
        raster_only_samples: &[],
    },
];

/// Lossless byte-stream codecs legal for every format.
const GENERIC: &[Compression] = &[
    Compression::None,
    Compression::Deflate,
    Compression::DeflateNoDelta,
    Compression::Lzma,
    Compression::LzmaNoDelta,
    Compression::Lz4,
    Compression::Lz4NoDelta,
    Compression::Zstd,
    Compression::ZstdNoDelta,
];

const MONOCHROME: &[Compression] = &[
    Compression::None,
    Compression::Deflate,
    Compression::DeflateNoDelta,
    Compression::Lzma,
    Compression::LzmaNoDelta,
    Compression::Lz4,
    Compression::Lz4NoDelta,
    Compression::Zstd,
    Compression::ZstdNoDelta,
    Compression::Png,
    Compression::Fax4,
];

const PALETTE: &[Compression] = &[
    Compression::None,
    Compression::Deflate,
    Compression::DeflateNoDelta,
    Compression::Lzma,
    Compression::LzmaNoDelta,
    Compression::Lz4,
    Compression::Lz4NoDelta,
    Compression::Zstd,
    Compression::ZstdNoDelta,
    Compression::Png,
    Compression::Gif,
];

/// 8-bit photographic set.
const PHOTO: &[Compression] = &[
    Compression::None,
    Compression::Deflate,
    Compression::DeflateNoDelta,
    Compression::Lzma,
    Compression::LzmaNoDelta,
    Compression::Lz4,
    Compression::Lz4NoDelta,
    Compression::Zstd,
    Compression::ZstdNoDelta,
    Compression::Png,
    Compression::Jpeg,
    Compression::Webp,
    Compression::LosslessWebp,
    Compression::CharLs,
    Compression::Jp2,
    Compression::LosslessJp2,
];

/// 8-bit multiband (3 or 4 bands): photographic minus JPEG.
const PHOTO_NO_JPEG: &[Compression] = &[
    Compression::None,
    Compression::Deflate,
    Compression::DeflateNoDelta,
    Compression::Lzma,
    Compression::LzmaNoDelta,
    Compression::Lz4,
    Compression::Lz4NoDelta,
    Compression::Zstd,
    Compression::ZstdNoDelta,
    Compression::Png,
    Compression::Webp,
    Compression::LosslessWebp,
    Compression::CharLs,
    Compression::Jp2,
    Compression::LosslessJp2,
];

/// 16-bit capable image codecs.
const WIDE: &[Compression] = &[
    Compression::None,
    Compression::Deflate,
    Compression::DeflateNoDelta,
    Compression::Lzma,
    Compression::LzmaNoDelta,
    Compression::Lz4,
    Compression::Lz4NoDelta,
    Compression::Zstd,
    Compression::ZstdNoDelta,
    Compression::Png,
    Compression::CharLs,
    Compression::Jp2,
    Compression::LosslessJp2,
];

fn rule_for(pixel_type: PixelType) -> &'static FormatRule {
    // FORMAT_RULES has one entry per PixelType, in declaration order
    match pixel_type {
        PixelType::Monochrome => &FORMAT_RULES[0],
        PixelType::Palette => &FORMAT_RULES[1],
        PixelType::Grayscale => &FORMAT_RULES[2],
        PixelType::Rgb => &FORMAT_RULES[3],
        PixelType::MultiBand => &FORMAT_RULES[4],
        PixelType::DataGrid => &FORMAT_RULES[5],
    }
}

/// Whether (sample type, pixel type, bands) is a legal pixel format.
pub fn is_legal_format(
    sample_type: SampleType,
    pixel_type: PixelType,
    bands: u8,
    context: FormatContext,
) -> bool {
    let rule = rule_for(pixel_type);
    if !rule.bands.accepts(bands) {
        return false;
    }
    rule.samples.contains(&sample_type)
        || (context == FormatContext::Raster && rule.raster_only_samples.contains(&sample_type))
}

/// Compressions permitted for a legal pixel format.
pub fn legal_compressions(
    sample_type: SampleType,
    pixel_type: PixelType,
    bands: u8,
) -> &'static [Compression] {
    match (pixel_type, sample_type) {
        (PixelType::Monochrome, _) => MONOCHROME,
        (PixelType::Palette, _) => PALETTE,
        (PixelType::Grayscale, SampleType::Uint16) => WIDE,
        (PixelType::Grayscale, _) => PHOTO,
        (PixelType::Rgb, SampleType::Uint8) => PHOTO,
        (PixelType::Rgb, _) => WIDE,
        (PixelType::MultiBand, SampleType::Uint8) if bands == 3 || bands == 4 => PHOTO_NO_JPEG,
        (PixelType::MultiBand, SampleType::Uint16) if bands == 3 || bands == 4 => WIDE,
        (PixelType::MultiBand, _) => GENERIC,
        (PixelType::DataGrid, SampleType::Uint8 | SampleType::Uint16) => WIDE,
        (PixelType::DataGrid, _) => GENERIC,
    }
}

/// The full compatibility predicate.
pub fn is_legal_combination(
    sample_type: SampleType,
    pixel_type: PixelType,
    bands: u8,
    compression: Compression,
    context: FormatContext,
) -> bool {
    is_legal_format(sample_type, pixel_type, bands, context)
        && legal_compressions(sample_type, pixel_type, bands).contains(&compression)
}

// ============================================================================
// PixelFormat
// ============================================================================

/// A validated (sample type, pixel type, band count) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    pub sample_type: SampleType,
    pub pixel_type: PixelType,
    pub bands: u8,
}

impl PixelFormat {
    /// Validate a raster format.
    pub fn new(sample_type: SampleType, pixel_type: PixelType, bands: u8) -> RasterResult<Self> {
        Self::validated(sample_type, pixel_type, bands, FormatContext::Raster)
    }

    /// Validate a format in the given context.
    pub fn validated(
        sample_type: SampleType,
        pixel_type: PixelType,
        bands: u8,
        context: FormatContext,
    ) -> RasterResult<Self> {
        if !pixel_type.accepts_bands(bands) {
            return Err(RasterError::invalid(format!(
                "{} pixels cannot have {} band(s)",
                pixel_type, bands
            )));
        }
        if !is_legal_format(sample_type, pixel_type, bands, context) {
            return Err(RasterError::UnsupportedFormat(format!(
                "{} {} x{} ({:?})",
                sample_type, pixel_type, bands, context
            )));
        }
        Ok(Self {
            sample_type,
            pixel_type,
            bands,
        })
    }

    /// Bytes per pixel in an unpacked buffer.
    pub fn pixel_bytes(&self) -> usize {
        self.bands as usize * self.sample_type.byte_width()
    }

    /// Reject a compression this format may not use.
    pub fn check_compression(
        &self,
        compression: Compression,
        context: FormatContext,
    ) -> RasterResult<()> {
        if is_legal_combination(
            self.sample_type,
            self.pixel_type,
            self.bands,
            compression,
            context,
        ) {
            Ok(())
        } else {
            Err(RasterError::UnsupportedCombination {
                sample_type: self.sample_type,
                pixel_type: self.pixel_type,
                bands: self.bands,
                compression,
            })
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} x{}", self.sample_type, self.pixel_type, self.bands)
    }
}
