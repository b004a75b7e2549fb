//! Sample, pixel and compression type enumerations.
//!
//! Each enum maps 1:1 to the strings stored in the `raster_coverages` table
//! and to a one-byte code used inside serialized blobs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RasterError, RasterResult};

/// Storage type of a single band sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Bit1,
    Bit2,
    Bit4,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl SampleType {
    pub const ALL: [SampleType; 11] = [
        SampleType::Bit1,
        SampleType::Bit2,
        SampleType::Bit4,
        SampleType::Int8,
        SampleType::Uint8,
        SampleType::Int16,
        SampleType::Uint16,
        SampleType::Int32,
        SampleType::Uint32,
        SampleType::Float32,
        SampleType::Float64,
    ];

    /// Bytes used to hold one sample in a pixel buffer.
    ///
    /// Sub-byte samples are widened to a full byte in memory.
    pub fn byte_width(&self) -> usize {
        match self {
            SampleType::Bit1
            | SampleType::Bit2
            | SampleType::Bit4
            | SampleType::Int8
            | SampleType::Uint8 => 1,
            SampleType::Int16 | SampleType::Uint16 => 2,
            SampleType::Int32 | SampleType::Uint32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
        }
    }

    /// Significant bits per sample.
    pub fn bits(&self) -> u32 {
        match self {
            SampleType::Bit1 => 1,
            SampleType::Bit2 => 2,
            SampleType::Bit4 => 4,
            other => other.byte_width() as u32 * 8,
        }
    }

    /// True for the 1/2/4-bit types.
    pub fn is_sub_byte(&self) -> bool {
        matches!(self, SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4)
    }

    /// Largest value a sub-byte sample may hold.
    pub fn sub_byte_max(&self) -> Option<u8> {
        match self {
            SampleType::Bit1 => Some(1),
            SampleType::Bit2 => Some(3),
            SampleType::Bit4 => Some(15),
            _ => None,
        }
    }

    /// Sample types that need contrast stretching to become visible.
    pub fn is_wide(&self) -> bool {
        matches!(
            self,
            SampleType::Int16
                | SampleType::Uint16
                | SampleType::Int32
                | SampleType::Uint32
                | SampleType::Float32
                | SampleType::Float64
        )
    }

    /// Gray level spacing of a grayscale type: level `v` displays as `v * step`.
    pub fn gray_step(&self) -> Option<u8> {
        match self {
            SampleType::Bit1 => Some(255),
            SampleType::Bit2 => Some(85),
            SampleType::Bit4 => Some(17),
            SampleType::Uint8 => Some(1),
            _ => None,
        }
    }

    /// Number of histogram buckets kept by raster statistics.
    pub fn histogram_buckets(&self) -> usize {
        match self {
            SampleType::Bit1 => 2,
            SampleType::Bit2 => 4,
            SampleType::Bit4 => 16,
            _ => 256,
        }
    }

    pub fn as_sql_str(&self) -> &'static str {
        match self {
            SampleType::Bit1 => "1-BIT",
            SampleType::Bit2 => "2-BIT",
            SampleType::Bit4 => "4-BIT",
            SampleType::Int8 => "INT8",
            SampleType::Uint8 => "UINT8",
            SampleType::Int16 => "INT16",
            SampleType::Uint16 => "UINT16",
            SampleType::Int32 => "INT32",
            SampleType::Uint32 => "UINT32",
            SampleType::Float32 => "FLOAT",
            SampleType::Float64 => "DOUBLE",
        }
    }

    /// Parse the `raster_coverages.sample_type` column value.
    pub fn from_sql_str(s: &str) -> RasterResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_sql_str() == s)
            .ok_or_else(|| RasterError::consistency(format!("unknown sample type '{}'", s)))
    }

    pub fn code(&self) -> u8 {
        match self {
            SampleType::Bit1 => 0xA1,
            SampleType::Bit2 => 0xA2,
            SampleType::Bit4 => 0xA3,
            SampleType::Int8 => 0xA4,
            SampleType::Uint8 => 0xA5,
            SampleType::Int16 => 0xA6,
            SampleType::Uint16 => 0xA7,
            SampleType::Int32 => 0xA8,
            SampleType::Uint32 => 0xA9,
            SampleType::Float32 => 0xAA,
            SampleType::Float64 => 0xAB,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql_str())
    }
}

/// How the bands of a pixel are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    Monochrome,
    Palette,
    Grayscale,
    Rgb,
    MultiBand,
    DataGrid,
}

impl PixelType {
    pub const ALL: [PixelType; 6] = [
        PixelType::Monochrome,
        PixelType::Palette,
        PixelType::Grayscale,
        PixelType::Rgb,
        PixelType::MultiBand,
        PixelType::DataGrid,
    ];

    /// Check a band count against the fixed per-type rule.
    pub fn accepts_bands(&self, bands: u8) -> bool {
        match self {
            PixelType::Monochrome
            | PixelType::Palette
            | PixelType::Grayscale
            | PixelType::DataGrid => bands == 1,
            PixelType::Rgb => bands == 3,
            PixelType::MultiBand => bands >= 2,
        }
    }

    pub fn as_sql_str(&self) -> &'static str {
        match self {
            PixelType::Monochrome => "MONOCHROME",
            PixelType::Palette => "PALETTE",
            PixelType::Grayscale => "GRAYSCALE",
            PixelType::Rgb => "RGB",
            PixelType::MultiBand => "MULTIBAND",
            PixelType::DataGrid => "DATAGRID",
        }
    }

    /// Parse the `raster_coverages.pixel_type` column value.
    pub fn from_sql_str(s: &str) -> RasterResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_sql_str() == s)
            .ok_or_else(|| RasterError::consistency(format!("unknown pixel type '{}'", s)))
    }

    pub fn code(&self) -> u8 {
        match self {
            PixelType::Monochrome => 0x11,
            PixelType::Palette => 0x12,
            PixelType::Grayscale => 0x13,
            PixelType::Rgb => 0x14,
            PixelType::MultiBand => 0x15,
            PixelType::DataGrid => 0x16,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql_str())
    }
}

/// Tile compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    None,
    Deflate,
    DeflateNoDelta,
    Lzma,
    LzmaNoDelta,
    Lz4,
    Lz4NoDelta,
    Zstd,
    ZstdNoDelta,
    Png,
    Jpeg,
    Fax4,
    Gif,
    Webp,
    LosslessWebp,
    CharLs,
    Jp2,
    LosslessJp2,
}

/// General-purpose byte compressors used for raw pixel planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteCodec {
    Deflate,
    Lzma,
    Lz4,
    Zstd,
}

impl Compression {
    pub const ALL: [Compression; 18] = [
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
        Compression::Fax4,
        Compression::Gif,
        Compression::Webp,
        Compression::LosslessWebp,
        Compression::CharLs,
        Compression::Jp2,
        Compression::LosslessJp2,
    ];

    /// Lossy codecs cannot round-trip pixel values exactly.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Compression::Jpeg | Compression::Webp | Compression::Jp2)
    }

    /// The byte compressor and delta-filter flag behind a raw-plane compression.
    pub fn byte_codec(&self) -> Option<(ByteCodec, bool)> {
        match self {
            Compression::Deflate => Some((ByteCodec::Deflate, true)),
            Compression::DeflateNoDelta => Some((ByteCodec::Deflate, false)),
            Compression::Lzma => Some((ByteCodec::Lzma, true)),
            Compression::LzmaNoDelta => Some((ByteCodec::Lzma, false)),
            Compression::Lz4 => Some((ByteCodec::Lz4, true)),
            Compression::Lz4NoDelta => Some((ByteCodec::Lz4, false)),
            Compression::Zstd => Some((ByteCodec::Zstd, true)),
            Compression::ZstdNoDelta => Some((ByteCodec::Zstd, false)),
            _ => None,
        }
    }

    /// True for codecs that understand image structure (PNG, JPEG, ...).
    pub fn is_image_codec(&self) -> bool {
        !matches!(self, Compression::None) && self.byte_codec().is_none()
    }

    pub fn as_sql_str(&self) -> &'static str {
        match self {
            Compression::None => "NONE",
            Compression::Deflate => "DEFLATE",
            Compression::DeflateNoDelta => "DEFLATE_NO",
            Compression::Lzma => "LZMA",
            Compression::LzmaNoDelta => "LZMA_NO",
            Compression::Lz4 => "LZ4",
            Compression::Lz4NoDelta => "LZ4_NO",
            Compression::Zstd => "ZSTD",
            Compression::ZstdNoDelta => "ZSTD_NO",
            Compression::Png => "PNG",
            Compression::Jpeg => "JPEG",
            Compression::Fax4 => "FAX4",
            Compression::Gif => "GIF",
            Compression::Webp => "WEBP",
            Compression::LosslessWebp => "LL_WEBP",
            Compression::CharLs => "CHARLS",
            Compression::Jp2 => "JP2",
            Compression::LosslessJp2 => "LL_JP2",
        }
    }

    /// Parse the `raster_coverages.compression` column value.
    pub fn from_sql_str(s: &str) -> RasterResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_sql_str() == s)
            .ok_or_else(|| RasterError::consistency(format!("unknown compression '{}'", s)))
    }

    pub fn code(&self) -> u8 {
        match self {
            Compression::None => 0x21,
            Compression::Deflate => 0x22,
            Compression::Lzma => 0x23,
            Compression::Gif => 0x24,
            Compression::Png => 0x25,
            Compression::Jpeg => 0x26,
            Compression::Webp => 0x27,
            Compression::LosslessWebp => 0x28,
            Compression::Fax4 => 0x30,
            Compression::LosslessJp2 => 0x33,
            Compression::Jp2 => 0x34,
            Compression::CharLs => 0x35,
            Compression::DeflateNoDelta => 0xD2,
            Compression::LzmaNoDelta => 0xD3,
            Compression::Lz4 => 0xD4,
            Compression::Lz4NoDelta => 0xD5,
            Compression::Zstd => 0xD6,
            Compression::ZstdNoDelta => 0xD7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql_str())
    }
}

// ============================================================================
// Typed sample access
// ============================================================================

/// A primitive that can be stored in a pixel buffer.
pub trait SampleValue: bytemuck::Pod + PartialEq + Send + Sync + 'static {
    const SAMPLE_TYPE: SampleType;

    fn to_f64(self) -> f64;

    /// Convert with rounding and saturation for integer targets.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_int_sample {
    ($t:ty, $st:expr) => {
        impl SampleValue for $t {
            const SAMPLE_TYPE: SampleType = $st;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                // `as` saturates and maps NaN to zero
                value.round() as $t
            }
        }
    };
}

impl_int_sample!(i8, SampleType::Int8);
impl_int_sample!(u8, SampleType::Uint8);
impl_int_sample!(i16, SampleType::Int16);
impl_int_sample!(u16, SampleType::Uint16);
impl_int_sample!(i32, SampleType::Int32);
impl_int_sample!(u32, SampleType::Uint32);

impl SampleValue for f32 {
    const SAMPLE_TYPE: SampleType = SampleType::Float32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl SampleValue for f64 {
    const SAMPLE_TYPE: SampleType = SampleType::Float64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Read the `index`-th sample of type `T` from a native-endian buffer.
#[inline]
pub fn read_sample<T: SampleValue>(buf: &[u8], index: usize) -> T {
    let size = std::mem::size_of::<T>();
    bytemuck::pod_read_unaligned(&buf[index * size..(index + 1) * size])
}

/// Write the `index`-th sample of type `T` into a native-endian buffer.
#[inline]
pub fn write_sample<T: SampleValue>(buf: &mut [u8], index: usize, value: T) {
    let size = std::mem::size_of::<T>();
    buf[index * size..(index + 1) * size].copy_from_slice(bytemuck::bytes_of(&value));
}

/// Sample equality for NoData matching: NaN equals NaN.
#[inline]
pub fn same_sample(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Read any sample as `f64`, dispatching on the runtime sample type.
#[inline]
pub fn read_sample_f64(buf: &[u8], sample_type: SampleType, index: usize) -> f64 {
    match sample_type {
        SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4 | SampleType::Uint8 => {
            buf[index] as f64
        }
        SampleType::Int8 => buf[index] as i8 as f64,
        SampleType::Int16 => read_sample::<i16>(buf, index) as f64,
        SampleType::Uint16 => read_sample::<u16>(buf, index) as f64,
        SampleType::Int32 => read_sample::<i32>(buf, index) as f64,
        SampleType::Uint32 => read_sample::<u32>(buf, index) as f64,
        SampleType::Float32 => read_sample::<f32>(buf, index) as f64,
        SampleType::Float64 => read_sample::<f64>(buf, index),
    }
}

/// Write an `f64` into a buffer as the given sample type (rounded, saturated).
#[inline]
pub fn write_sample_f64(buf: &mut [u8], sample_type: SampleType, index: usize, value: f64) {
    match sample_type {
        SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4 => {
            let max = sample_type.sub_byte_max().unwrap_or(u8::MAX) as f64;
            buf[index] = value.round().clamp(0.0, max) as u8;
        }
        SampleType::Uint8 => buf[index] = u8::from_f64(value),
        SampleType::Int8 => buf[index] = i8::from_f64(value) as u8,
        SampleType::Int16 => write_sample(buf, index, i16::from_f64(value)),
        SampleType::Uint16 => write_sample(buf, index, u16::from_f64(value)),
        SampleType::Int32 => write_sample(buf, index, i32::from_f64(value)),
        SampleType::Uint32 => write_sample(buf, index, u32::from_f64(value)),
        SampleType::Float32 => write_sample(buf, index, value as f32),
        SampleType::Float64 => write_sample(buf, index, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_strings_roundtrip() {
        for t in SampleType::ALL {
            assert_eq!(SampleType::from_sql_str(t.as_sql_str()).unwrap(), t);
        }
        for t in PixelType::ALL {
            assert_eq!(PixelType::from_sql_str(t.as_sql_str()).unwrap(), t);
        }
        for c in Compression::ALL {
            assert_eq!(Compression::from_sql_str(c.as_sql_str()).unwrap(), c);
        }
    }

    #[test]
    fn test_sql_string_literals() {
        assert_eq!(SampleType::from_sql_str("1-BIT").unwrap(), SampleType::Bit1);
        assert_eq!(SampleType::from_sql_str("DOUBLE").unwrap(), SampleType::Float64);
        assert_eq!(PixelType::from_sql_str("DATAGRID").unwrap(), PixelType::DataGrid);
        assert_eq!(
            Compression::from_sql_str("DEFLATE_NO").unwrap(),
            Compression::DeflateNoDelta
        );
        assert_eq!(
            Compression::from_sql_str("LL_WEBP").unwrap(),
            Compression::LosslessWebp
        );
    }

    #[test]
    fn test_unknown_sql_string_is_consistency_error() {
        let err = SampleType::from_sql_str("uint8").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConsistencyViolation);
        assert!(Compression::from_sql_str("BZIP2").is_err());
        assert!(PixelType::from_sql_str("").is_err());
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<u8> = Compression::ALL.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), Compression::ALL.len());
        for c in Compression::ALL {
            assert_eq!(Compression::from_code(c.code()), Some(c));
        }
    }

    #[test]
    fn test_gray_step_reaches_white() {
        for st in [SampleType::Bit1, SampleType::Bit2, SampleType::Bit4, SampleType::Uint8] {
            let step = st.gray_step().unwrap() as u32;
            let top = st.sub_byte_max().unwrap_or(u8::MAX) as u32;
            assert_eq!(step * top, 255);
        }
        assert_eq!(SampleType::Int16.gray_step(), None);
    }

    #[test]
    fn test_histogram_buckets() {
        assert_eq!(SampleType::Bit1.histogram_buckets(), 2);
        assert_eq!(SampleType::Bit2.histogram_buckets(), 4);
        assert_eq!(SampleType::Bit4.histogram_buckets(), 16);
        assert_eq!(SampleType::Uint8.histogram_buckets(), 256);
        assert_eq!(SampleType::Float64.histogram_buckets(), 256);
    }

    #[test]
    fn test_sample_buffer_access() {
        let mut buf = vec![0u8; 3 * 4];
        write_sample::<f32>(&mut buf, 1, -2.5);
        assert_eq!(read_sample::<f32>(&buf, 1), -2.5);
        write_sample_f64(&mut buf, SampleType::Int16, 0, -300.4);
        assert_eq!(read_sample::<i16>(&buf, 0), -300);
        assert_eq!(read_sample_f64(&buf, SampleType::Int16, 0), -300.0);
    }
}
