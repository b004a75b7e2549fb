//! Pluggable compression backends.
//!
//! Byte compressors handle raw pixel planes; image codecs understand pixel
//! structure. Backends for LZMA, LZ4, CCITT FAX4, GIF, CharLS and JPEG 2000
//! are not built in and must be registered by the caller.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use raster_common::{ByteCodec, Compression, PixelFormat};

use crate::error::{CodecError, Result};

/// A raw pixel plane: one byte per sub-byte sample, native-endian otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

/// General-purpose byte stream compressor.
pub trait ByteCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress; `expected_len` is the recorded uncompressed size.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// Codec that encodes a whole pixel plane.
pub trait ImageCodec: Send + Sync {
    fn encode(&self, plane: &Plane<'_>, quality: u8) -> Result<Vec<u8>>;

    /// Decode into a raw plane of exactly `width * height` pixels of `format`.
    fn decode(&self, data: &[u8], format: &PixelFormat, width: u32, height: u32) -> Result<Vec<u8>>;
}

// ============================================================================
// Built-in byte compressors
// ============================================================================

/// zlib-framed DEFLATE via flate2.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateCompressor;

impl ByteCompressor for DeflateCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| CodecError::backend(Compression::Deflate, e))?;
        encoder
            .finish()
            .map_err(|e| CodecError::backend(Compression::Deflate, e))
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut out = Vec::with_capacity(expected_len);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CodecError::backend(Compression::Deflate, e))?;
        Ok(out)
    }
}

/// Zstandard via the zstd crate.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    pub level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ByteCompressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::encode_all(data, self.level)
            .map_err(|e| CodecError::backend(Compression::Zstd, e))
    }

    fn decompress(&self, data: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
        zstd::stream::decode_all(data).map_err(|e| CodecError::backend(Compression::Zstd, e))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Lookup table from compression to backend.
#[derive(Clone)]
pub struct CodecRegistry {
    byte: HashMap<ByteCodec, Arc<dyn ByteCompressor>>,
    image: HashMap<Compression, Arc<dyn ImageCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("byte", &self.byte.keys().collect::<Vec<_>>())
            .field("image", &self.image.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CodecRegistry {
    /// A registry with no backends at all.
    pub fn empty() -> Self {
        Self {
            byte: HashMap::new(),
            image: HashMap::new(),
        }
    }

    /// DEFLATE, ZSTD, PNG, JPEG and WEBP.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_byte(ByteCodec::Deflate, Arc::new(DeflateCompressor));
        registry.register_byte(ByteCodec::Zstd, Arc::new(ZstdCompressor::default()));
        registry.register_image(Compression::Png, Arc::new(crate::png_codec::PngCodec));
        registry.register_image(Compression::Jpeg, Arc::new(crate::image_codec::JpegCodec));
        registry.register_image(
            Compression::Webp,
            Arc::new(crate::image_codec::WebpCodec { lossless: false }),
        );
        registry.register_image(
            Compression::LosslessWebp,
            Arc::new(crate::image_codec::WebpCodec { lossless: true }),
        );
        registry
    }

    pub fn register_byte(&mut self, codec: ByteCodec, backend: Arc<dyn ByteCompressor>) {
        self.byte.insert(codec, backend);
    }

    pub fn register_image(&mut self, compression: Compression, backend: Arc<dyn ImageCodec>) {
        self.image.insert(compression, backend);
    }

    /// Byte compressor behind `compression`.
    pub fn byte(&self, compression: Compression, codec: ByteCodec) -> Result<&dyn ByteCompressor> {
        self.byte
            .get(&codec)
            .map(|b| b.as_ref())
            .ok_or(CodecError::Unavailable(compression))
    }

    pub fn image(&self, compression: Compression) -> Result<&dyn ImageCodec> {
        self.image
            .get(&compression)
            .map(|b| b.as_ref())
            .ok_or(CodecError::Unavailable(compression))
    }

    /// Whether encode/decode of `compression` can succeed.
    pub fn is_available(&self, compression: Compression) -> bool {
        match compression.byte_codec() {
            Some((codec, _)) => self.byte.contains_key(&codec),
            None if compression == Compression::None => true,
            None => self.image.contains_key(&compression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_availability() {
        let registry = CodecRegistry::default();
        for c in [
            Compression::None,
            Compression::Deflate,
            Compression::DeflateNoDelta,
            Compression::Zstd,
            Compression::Png,
            Compression::Jpeg,
            Compression::Webp,
            Compression::LosslessWebp,
        ] {
            assert!(registry.is_available(c), "{}", c);
        }
        for c in [
            Compression::Lzma,
            Compression::Lz4NoDelta,
            Compression::Fax4,
            Compression::Gif,
            Compression::CharLs,
            Compression::Jp2,
        ] {
            assert!(!registry.is_available(c), "{}", c);
            assert!(matches!(registry.image(c), Err(CodecError::Unavailable(_))));
        }
    }

    #[test]
    fn test_byte_compressors_roundtrip() {
        let data: Vec<u8> = (0..4096).map(|i| (i % 17) as u8).collect();
        let backends: [&dyn ByteCompressor; 2] = [&DeflateCompressor, &ZstdCompressor::default()];
        for backend in backends {
            let packed = backend.compress(&data).unwrap();
            assert!(packed.len() < data.len());
            assert_eq!(backend.decompress(&packed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn test_garbage_fails_cleanly() {
        assert!(DeflateCompressor.decompress(&[1, 2, 3, 4], 10).is_err());
        assert!(ZstdCompressor::default().decompress(&[1, 2, 3, 4], 10).is_err());
    }
}
