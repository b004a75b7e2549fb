//! Raster ⇄ odd/even blob pair.

use tracing::debug;

use raster_common::endian::swap_samples;
use raster_common::{
    Compression, Endian, FormatContext, Mask, Palette, PixelFormat, PixelType, Raster,
    RasterError, SampleType, Scale,
};

use crate::backend::{CodecRegistry, Plane};
use crate::error::{CodecError, Result};
use crate::header::{read_blob, write_blob, BlobHeader, BlobKind, MaskKind};
use crate::pack::{delta_decode, delta_distance, delta_encode, pack_rows, packed_row_len, unpack_rows};

/// An encoded tile: the pixel plane and the optional mask plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    pub odd: Vec<u8>,
    pub even: Option<Vec<u8>>,
}

impl EncodedTile {
    /// Total stored bytes.
    pub fn len(&self) -> usize {
        self.odd.len() + self.even.as_ref().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoder/decoder for tile blobs, backed by a [`CodecRegistry`].
#[derive(Debug, Clone)]
pub struct TileCodec {
    registry: CodecRegistry,
    endian: Endian,
}

impl Default for TileCodec {
    fn default() -> Self {
        Self::new(CodecRegistry::default())
    }
}

fn mask_format(kind: MaskKind) -> Option<PixelFormat> {
    let (sample_type, pixel_type) = match kind {
        MaskKind::None => return None,
        MaskKind::Transparency => (SampleType::Bit1, PixelType::Monochrome),
        MaskKind::Alpha => (SampleType::Uint8, PixelType::Grayscale),
    };
    Some(PixelFormat {
        sample_type,
        pixel_type,
        bands: 1,
    })
}

/// Compression used for the mask plane of a tile.
fn mask_compression(compression: Compression) -> Compression {
    if compression == Compression::None || compression.byte_codec().is_some() {
        compression
    } else if compression == Compression::Png {
        Compression::Png
    } else {
        Compression::Deflate
    }
}

/// Keep the top-left pixel of every `factor` x `factor` block.
fn subsample(data: &[u8], width: u32, height: u32, pixel_bytes: usize, scale: Scale) -> Vec<u8> {
    let factor = scale.factor() as usize;
    let out_w = scale.reduce(width) as usize;
    let out_h = scale.reduce(height) as usize;
    let mut out = Vec::with_capacity(out_w * out_h * pixel_bytes);
    for y in 0..out_h {
        let row = y * factor * width as usize;
        for x in 0..out_w {
            let at = (row + x * factor) * pixel_bytes;
            out.extend_from_slice(&data[at..at + pixel_bytes]);
        }
    }
    out
}

impl TileCodec {
    pub fn new(registry: CodecRegistry) -> Self {
        Self {
            registry,
            endian: Endian::native(),
        }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Encode a raster as one tile.
    ///
    /// Fails if `compression` is not legal for the raster's format or no
    /// backend is registered for it.
    pub fn encode(&self, raster: &Raster, compression: Compression, quality: u8) -> Result<EncodedTile> {
        let format = raster.format();
        format.check_compression(compression, FormatContext::Raster)?;

        let (mask_kind, mask_bytes) = match raster.mask() {
            None => (MaskKind::None, None),
            Some(Mask::Transparency(b)) => (MaskKind::Transparency, Some(b.as_slice())),
            Some(Mask::Alpha(b)) => (MaskKind::Alpha, Some(b.as_slice())),
        };

        let plane = Plane {
            format,
            width: raster.width(),
            height: raster.height(),
            data: raster.pixels(),
        };
        let odd = self.encode_plane(&plane, compression, quality, BlobKind::Odd, mask_kind)?;

        let even = match (mask_format(mask_kind), mask_bytes) {
            (Some(mask_format), Some(bytes)) => {
                let plane = Plane {
                    format: mask_format,
                    width: raster.width(),
                    height: raster.height(),
                    data: bytes,
                };
                Some(self.encode_plane(
                    &plane,
                    mask_compression(compression),
                    100,
                    BlobKind::Even,
                    mask_kind,
                )?)
            }
            _ => None,
        };

        debug!(
            compression = %compression,
            width = raster.width(),
            height = raster.height(),
            odd_bytes = odd.len(),
            even_bytes = even.as_ref().map(|e| e.len()).unwrap_or(0),
            "Encoded tile"
        );
        Ok(EncodedTile { odd, even })
    }

    fn encode_plane(
        &self,
        plane: &Plane<'_>,
        compression: Compression,
        quality: u8,
        kind: BlobKind,
        mask: MaskKind,
    ) -> Result<Vec<u8>> {
        let row_len = packed_row_len(&plane.format, plane.width);
        let raw_len = row_len * plane.height as usize;
        let payload = match compression.byte_codec() {
            _ if compression == Compression::None => {
                pack_rows(&plane.format, plane.width, plane.height, plane.data)
            }
            Some((codec, delta)) => {
                let mut raw = pack_rows(&plane.format, plane.width, plane.height, plane.data);
                if delta {
                    delta_encode(&mut raw, row_len, delta_distance(&plane.format));
                }
                self.registry.byte(compression, codec)?.compress(&raw)?
            }
            None => self.registry.image(compression)?.encode(plane, quality)?,
        };

        let header = BlobHeader {
            kind,
            endian: self.endian,
            compression,
            format: plane.format,
            width: plane.width,
            height: plane.height,
            mask,
            uncompressed_size: u32::try_from(raw_len)
                .map_err(|_| CodecError::malformed("tile exceeds 4 GiB"))?,
        };
        write_blob(&header, &payload)
    }

    fn decode_plane(&self, header: &BlobHeader, payload: &[u8]) -> Result<Vec<u8>> {
        let format = header.format;
        let row_len = packed_row_len(&format, header.width);
        let raw_len = row_len * header.height as usize;
        let compression = header.compression;

        let mut plane = match compression.byte_codec() {
            _ if compression == Compression::None => unpack_rows(&format, header.width, header.height, payload)?,
            Some((codec, delta)) => {
                if header.uncompressed_size as usize != raw_len {
                    return Err(CodecError::malformed(format!(
                        "recorded plane size {} does not match {}",
                        header.uncompressed_size, raw_len
                    )));
                }
                let mut raw = self.registry.byte(compression, codec)?.decompress(payload, raw_len)?;
                if raw.len() != raw_len {
                    return Err(CodecError::malformed(format!(
                        "decompressed {} bytes, expected {}",
                        raw.len(),
                        raw_len
                    )));
                }
                if delta {
                    delta_decode(&mut raw, row_len, delta_distance(&format));
                }
                unpack_rows(&format, header.width, header.height, &raw)?
            }
            None => {
                let plane = self
                    .registry
                    .image(compression)?
                    .decode(payload, &format, header.width, header.height)?;
                let expected = header.width as usize * header.height as usize * format.pixel_bytes();
                if plane.len() != expected {
                    return Err(CodecError::malformed(format!(
                        "{} plane has {} bytes, expected {}",
                        compression,
                        plane.len(),
                        expected
                    )));
                }
                // image codecs always hand back native order
                return Ok(plane);
            }
        };

        if header.endian != self.endian && !format.sample_type.is_sub_byte() {
            swap_samples(&mut plane, format.sample_type.byte_width());
        }
        Ok(plane)
    }

    /// Decode a tile at the given scale.
    ///
    /// `palette` is required for palette tiles and ignored otherwise. The
    /// even blob must be present exactly when the odd blob declares a mask.
    pub fn decode(
        &self,
        scale: Scale,
        odd: &[u8],
        even: Option<&[u8]>,
        palette: Option<&Palette>,
    ) -> Result<Raster> {
        let (header, payload) = read_blob(odd, BlobKind::Odd)?;
        let format = header.format;

        if scale != Scale::X1 && matches!(header.compression, Compression::Fax4 | Compression::CharLs) {
            return Err(CodecError::UnsupportedScale {
                codec: header.compression,
                factor: scale.factor(),
            });
        }

        let pixels = self.decode_plane(&header, payload)?;

        let mask = match (mask_format(header.mask), even) {
            (None, None) => None,
            (Some(expected), Some(even)) => {
                let (mask_header, mask_payload) = read_blob(even, BlobKind::Even)?;
                if mask_header.width != header.width
                    || mask_header.height != header.height
                    || mask_header.format != expected
                    || mask_header.mask != header.mask
                {
                    return Err(CodecError::malformed("even blob does not match odd blob"));
                }
                Some(self.decode_plane(&mask_header, mask_payload)?)
            }
            (None, Some(_)) => return Err(CodecError::malformed("unexpected even blob")),
            (Some(_), None) => return Err(CodecError::malformed("missing even blob")),
        };

        let palette = match (format.pixel_type, palette) {
            (PixelType::Palette, Some(p)) => Some(p.clone()),
            (PixelType::Palette, None) => {
                return Err(RasterError::invalid("palette tile decoded without a palette").into())
            }
            _ => None,
        };

        let (width, height) = (scale.reduce(header.width), scale.reduce(header.height));
        let (pixels, mask) = if scale == Scale::X1 {
            (pixels, mask)
        } else {
            (
                subsample(&pixels, header.width, header.height, format.pixel_bytes(), scale),
                mask.map(|m| subsample(&m, header.width, header.height, 1, scale)),
            )
        };

        let mut raster = Raster::new(width, height, format, pixels, palette)?;
        if let Some(bytes) = mask {
            let mask = match header.mask {
                MaskKind::Alpha => Mask::Alpha(bytes),
                _ => Mask::Transparency(bytes),
            };
            raster = raster.with_mask(mask)?;
        }
        debug!(
            compression = %header.compression,
            scale = %scale,
            width,
            height,
            "Decoded tile"
        );
        Ok(raster)
    }

    /// Parse just the odd blob header.
    pub fn peek(&self, odd: &[u8]) -> Result<BlobHeader> {
        read_blob(odd, BlobKind::Odd).map(|(h, _)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32) -> Raster {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let pixels = (0..width * height).map(|i| (i % 251) as u8).collect();
        Raster::new(width, height, format, pixels, None).unwrap()
    }

    #[test]
    fn test_illegal_compression_rejected() {
        let format = PixelFormat::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        let mono = Raster::new(2, 2, format, vec![0, 1, 1, 0], None).unwrap();
        let codec = TileCodec::default();
        for c in [Compression::Jpeg, Compression::Webp, Compression::Gif] {
            assert!(matches!(
                codec.encode(&mono, c, 80),
                Err(CodecError::Raster(RasterError::UnsupportedCombination { .. }))
            ));
        }
    }

    #[test]
    fn test_unavailable_backend() {
        let codec = TileCodec::default();
        assert!(matches!(
            codec.encode(&gray(4, 4), Compression::Lzma, 100),
            Err(CodecError::Unavailable(Compression::Lzma))
        ));
    }

    #[test]
    fn test_scaled_decode_subsamples() {
        let codec = TileCodec::default();
        let raster = gray(8, 8);
        let tile = codec.encode(&raster, Compression::Deflate, 100).unwrap();
        let half = codec.decode(Scale::X2, &tile.odd, None, None).unwrap();
        assert_eq!((half.width(), half.height()), (4, 4));
        assert_eq!(half.pixels()[1], raster.pixels()[2]);
        assert_eq!(half.pixels()[4], raster.pixels()[16]);
        let eighth = codec.decode(Scale::X8, &tile.odd, None, None).unwrap();
        assert_eq!(eighth.pixels(), &[0]);
    }

    #[test]
    fn test_mask_pairing_enforced() {
        let codec = TileCodec::default();
        let masked = gray(4, 4)
            .with_mask(Mask::Transparency(vec![1, 0, 1, 0, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1]))
            .unwrap();
        let tile = codec.encode(&masked, Compression::Png, 100).unwrap();
        let even = tile.even.as_deref().unwrap();
        assert!(codec.decode(Scale::X1, &tile.odd, None, None).is_err());
        let back = codec.decode(Scale::X1, &tile.odd, Some(even), None).unwrap();
        assert_eq!(back.mask(), masked.mask());

        let plain = codec.encode(&gray(4, 4), Compression::Png, 100).unwrap();
        assert!(codec.decode(Scale::X1, &plain.odd, Some(even), None).is_err());
    }

    #[test]
    fn test_foreign_endian_payload_is_swapped() {
        let format = PixelFormat::new(SampleType::Uint16, PixelType::DataGrid, 1).unwrap();
        let mut pixels = Vec::new();
        for v in [1u16, 258, 65535, 4096] {
            pixels.extend_from_slice(&v.to_ne_bytes());
        }
        let raster = Raster::new(2, 2, format, pixels.clone(), None).unwrap();
        let foreign = match Endian::native() {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        };
        let writer = TileCodec {
            registry: CodecRegistry::default(),
            endian: foreign,
        };
        let mut swapped = raster.pixels().to_vec();
        swap_samples(&mut swapped, 2);
        let foreign_raster = Raster::new(2, 2, format, swapped, None).unwrap();
        let tile = writer.encode(&foreign_raster, Compression::DeflateNoDelta, 100).unwrap();

        let back = TileCodec::default().decode(Scale::X1, &tile.odd, None, None).unwrap();
        assert_eq!(back.pixels(), pixels.as_slice());
    }
}
