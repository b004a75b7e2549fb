//! Encode/decode properties over every representative format and every
//! compression with a registered backend.

use raster_common::format::legal_compressions;
use raster_common::{Compression, Mask, RasterError, Scale};
use test_utils::{checkerboard_mono, gradient_raster, representative_formats, rgb_gradient};
use tile_codec::{CodecError, TileCodec};

#[test]
fn test_lossless_codecs_reproduce_pixels() {
    let codec = TileCodec::default();
    for format in representative_formats() {
        let raster = gradient_raster(format, 37, 21, 7);
        for &compression in legal_compressions(format.sample_type, format.pixel_type, format.bands) {
            if compression.is_lossy() || !codec.registry().is_available(compression) {
                continue;
            }
            let tile = codec
                .encode(&raster, compression, 100)
                .unwrap_or_else(|e| panic!("{} {}: {}", format, compression, e));
            assert!(tile.even.is_none());
            let back = codec
                .decode(Scale::X1, &tile.odd, None, raster.palette())
                .unwrap_or_else(|e| panic!("{} {}: {}", format, compression, e));
            assert_eq!(back.format(), format);
            assert_eq!(back.pixels(), raster.pixels(), "{} {}", format, compression);
        }
    }
}

#[test]
fn test_lossy_codecs_keep_shape() {
    let codec = TileCodec::default();
    for format in representative_formats() {
        let raster = gradient_raster(format, 32, 24, 3);
        for &compression in legal_compressions(format.sample_type, format.pixel_type, format.bands) {
            if !compression.is_lossy() || !codec.registry().is_available(compression) {
                continue;
            }
            let tile = codec.encode(&raster, compression, 70).unwrap();
            let back = codec.decode(Scale::X1, &tile.odd, None, None).unwrap();
            assert_eq!((back.width(), back.height()), (32, 24));
            assert_eq!(back.format(), format);
        }
    }
}

#[test]
fn test_masks_travel_in_even_blob() {
    let codec = TileCodec::default();
    let alpha: Vec<u8> = (0..16 * 16).map(|i| (i % 256) as u8).collect();
    let raster = rgb_gradient(16, 16).with_mask(Mask::Alpha(alpha)).unwrap();
    for compression in [Compression::None, Compression::Zstd, Compression::Png, Compression::Jpeg] {
        let tile = codec.encode(&raster, compression, 80).unwrap();
        let even = tile.even.as_deref().expect("masked tile has an even blob");
        let back = codec.decode(Scale::X1, &tile.odd, Some(even), None).unwrap();
        assert_eq!(back.mask(), raster.mask(), "{}", compression);
    }
}

#[test]
fn test_monochrome_rejects_photographic_codecs() {
    let codec = TileCodec::default();
    let mono = checkerboard_mono(16, 16, 4);
    for compression in [Compression::Jpeg, Compression::Webp, Compression::Gif, Compression::CharLs] {
        let err = codec.encode(&mono, compression, 80).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Raster(RasterError::UnsupportedCombination { .. })
        ));
    }
}

#[test]
fn test_scaled_decode_of_lossless_tile() {
    let codec = TileCodec::default();
    let raster = checkerboard_mono(64, 64, 8);
    let tile = codec.encode(&raster, Compression::Png, 100).unwrap();
    let quarter = codec.decode(Scale::X4, &tile.odd, None, None).unwrap();
    assert_eq!((quarter.width(), quarter.height()), (16, 16));
    // cells of 8 pixels become cells of 2
    assert_eq!(&quarter.pixels()[..4], &[0, 0, 1, 1]);
}

#[test]
fn test_truncated_and_corrupt_blobs_fail_cleanly() {
    let codec = TileCodec::default();
    let raster = rgb_gradient(16, 16);
    let tile = codec.encode(&raster, Compression::Deflate, 100).unwrap();
    for len in 0..tile.odd.len() {
        assert!(codec.decode(Scale::X1, &tile.odd[..len], None, None).is_err());
    }
    let mut corrupt = tile.odd.clone();
    let middle = corrupt.len() / 2;
    corrupt[middle] ^= 0x55;
    assert!(codec.decode(Scale::X1, &corrupt, None, None).is_err());
}
