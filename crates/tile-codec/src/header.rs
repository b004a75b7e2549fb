//! Tile blob framing.
//!
//! ```text
//! 0      start (0x00)
//! 1      marker (0xFA odd, 0xDB even)
//! 2      payload endianness (1 = little)
//! 3      compression code
//! 4      sample type code
//! 5      pixel type code
//! 6      bands
//! 7..11  width  (u32 LE)
//! 11..15 height (u32 LE)
//! 15     mask kind (0 none, 1 transparency, 2 alpha)
//! 16..20 uncompressed payload size (u32 LE)
//! 20..24 compressed payload size   (u32 LE)
//! 24     payload start (0xC8)
//! ..     payload
//!        payload end (0xC9)
//!        CRC32 of everything above (u32 LE)
//!        end (0xD9)
//! ```

use raster_common::{Compression, Endian, PixelFormat, PixelType, SampleType};

use crate::error::{CodecError, Result};

pub const BLOB_START: u8 = 0x00;
pub const ODD_MARKER: u8 = 0xFA;
pub const EVEN_MARKER: u8 = 0xDB;
const PAYLOAD_START: u8 = 0xC8;
const PAYLOAD_END: u8 = 0xC9;
const BLOB_END: u8 = 0xD9;

pub const HEADER_LEN: usize = 25;
const TRAILER_LEN: usize = 6;

/// Which plane a blob carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Odd,
    Even,
}

impl BlobKind {
    fn marker(self) -> u8 {
        match self {
            BlobKind::Odd => ODD_MARKER,
            BlobKind::Even => EVEN_MARKER,
        }
    }
}

/// Kind of transparency plane paired with an odd blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    None,
    Transparency,
    Alpha,
}

impl MaskKind {
    fn code(self) -> u8 {
        match self {
            MaskKind::None => 0,
            MaskKind::Transparency => 1,
            MaskKind::Alpha => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MaskKind::None),
            1 => Some(MaskKind::Transparency),
            2 => Some(MaskKind::Alpha),
            _ => None,
        }
    }
}

/// Parsed header of a tile blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    pub kind: BlobKind,
    pub endian: Endian,
    pub compression: Compression,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mask: MaskKind,
    pub uncompressed_size: u32,
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Frame a payload.
pub fn write_blob(header: &BlobHeader, payload: &[u8]) -> Result<Vec<u8>> {
    let compressed_size = u32::try_from(payload.len())
        .map_err(|_| CodecError::malformed("payload exceeds 4 GiB"))?;
    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    blob.push(BLOB_START);
    blob.push(header.kind.marker());
    blob.push(header.endian.as_flag());
    blob.push(header.compression.code());
    blob.push(header.format.sample_type.code());
    blob.push(header.format.pixel_type.code());
    blob.push(header.format.bands);
    blob.extend_from_slice(&header.width.to_le_bytes());
    blob.extend_from_slice(&header.height.to_le_bytes());
    blob.push(header.mask.code());
    blob.extend_from_slice(&header.uncompressed_size.to_le_bytes());
    blob.extend_from_slice(&compressed_size.to_le_bytes());
    blob.push(PAYLOAD_START);
    blob.extend_from_slice(payload);
    blob.push(PAYLOAD_END);
    let crc = crc32fast::hash(&blob);
    blob.extend_from_slice(&crc.to_le_bytes());
    blob.push(BLOB_END);
    Ok(blob)
}

/// Validate framing and checksum, returning the header and payload.
pub fn read_blob(blob: &[u8], expected: BlobKind) -> Result<(BlobHeader, &[u8])> {
    if blob.len() < HEADER_LEN + TRAILER_LEN {
        return Err(CodecError::malformed(format!(
            "blob of {} bytes is shorter than the minimum {}",
            blob.len(),
            HEADER_LEN + TRAILER_LEN
        )));
    }
    if blob[0] != BLOB_START {
        return Err(CodecError::malformed("bad start marker"));
    }
    if blob[1] != expected.marker() {
        return Err(CodecError::malformed(format!(
            "expected {:?} blob, found marker {:#04x}",
            expected, blob[1]
        )));
    }
    if blob[HEADER_LEN - 1] != PAYLOAD_START {
        return Err(CodecError::malformed("bad payload start marker"));
    }

    let compressed_size = read_u32(blob, 20) as usize;
    if blob.len() != HEADER_LEN + compressed_size + TRAILER_LEN {
        return Err(CodecError::malformed(format!(
            "declared payload of {} bytes does not fit a {} byte blob",
            compressed_size,
            blob.len()
        )));
    }
    let payload_end = HEADER_LEN + compressed_size;
    if blob[payload_end] != PAYLOAD_END || blob[blob.len() - 1] != BLOB_END {
        return Err(CodecError::malformed("bad end markers"));
    }
    let stored = read_u32(blob, payload_end + 1);
    let computed = crc32fast::hash(&blob[..=payload_end]);
    if stored != computed {
        return Err(CodecError::ChecksumMismatch { stored, computed });
    }

    let endian = Endian::from_flag(blob[2])
        .ok_or_else(|| CodecError::malformed("bad endianness flag"))?;
    let compression = Compression::from_code(blob[3])
        .ok_or_else(|| CodecError::malformed(format!("unknown compression {:#04x}", blob[3])))?;
    let sample_type = SampleType::from_code(blob[4])
        .ok_or_else(|| CodecError::malformed(format!("unknown sample type {:#04x}", blob[4])))?;
    let pixel_type = PixelType::from_code(blob[5])
        .ok_or_else(|| CodecError::malformed(format!("unknown pixel type {:#04x}", blob[5])))?;
    let format = PixelFormat::new(sample_type, pixel_type, blob[6])
        .map_err(|e| CodecError::malformed(e.to_string()))?;
    let width = read_u32(blob, 7);
    let height = read_u32(blob, 11);
    if width == 0 || height == 0 {
        return Err(CodecError::malformed("zero tile dimension"));
    }
    let mask = MaskKind::from_code(blob[15])
        .ok_or_else(|| CodecError::malformed(format!("unknown mask kind {}", blob[15])))?;

    let header = BlobHeader {
        kind: expected,
        endian,
        compression,
        format,
        width,
        height,
        mask,
        uncompressed_size: read_u32(blob, 16),
    };
    Ok((header, &blob[HEADER_LEN..payload_end]))
}
