//! PNG encoding for composited canvases.
//!
//! Two modes:
//! - **Indexed PNG (color type 3)** when the canvas has at most 256 distinct
//!   RGBA colours; palette alpha goes into a tRNS chunk.
//! - **RGBA PNG (color type 6)** otherwise.

use std::collections::HashMap;
use std::io::Write;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;

/// Encode RGBA pixels, choosing indexed output when the colours fit.
pub fn create_png_auto(rgba: &[u8], width: u32, height: u32) -> std::io::Result<Vec<u8>> {
    match extract_palette(rgba) {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png_rgba(rgba, width, height),
    }
}

/// Distinct colours and per-pixel indices, or `None` past 256 colours.
fn extract_palette(rgba: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(rgba.len() / 4);

    for px in rgba.chunks_exact(4) {
        let colour = [px[0], px[1], px[2], px[3]];
        let index = match lookup.get(&colour) {
            Some(&index) => index,
            None => {
                if palette.len() == MAX_PALETTE_SIZE {
                    return None;
                }
                let index = palette.len() as u8;
                palette.push(colour);
                lookup.insert(colour, index);
                index
            }
        };
        indices.push(index);
    }
    Some((palette, indices))
}

/// Indexed PNG from a palette and one index byte per pixel.
pub fn create_png_indexed(
    width: u32,
    height: u32,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> std::io::Result<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width as usize, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Truecolour-with-alpha PNG.
pub fn create_png_rgba(rgba: &[u8], width: u32, height: u32) -> std::io::Result<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));
    let idat = deflate_scanlines(rgba, width as usize * 4, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn ihdr(width: u32, height: u32, colour_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    // bit depth, colour type, compression, filter, interlace
    data.extend_from_slice(&[8, colour_type, 0, 0, 0]);
    data
}

/// Zlib-compress rows of `row_bytes`, each prefixed with filter type 0.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    encoder.finish()
}

/// Length, type, data and CRC of one chunk.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colour_type(png: &[u8]) -> u8 {
        // signature (8) + length (4) + "IHDR" (4) + width (4) + height (4) + depth (1)
        png[25]
    }

    #[test]
    fn test_extract_palette_dedups() {
        let pixels = [255, 0, 0, 255, 0, 255, 0, 255, 255, 0, 0, 255];
        let (palette, indices) = extract_palette(&pixels).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_few_colours_use_indexed() {
        let pixels: Vec<u8> = (0..16).flat_map(|i| [(i % 2) as u8 * 255, 0, 0, 255]).collect();
        let png = create_png_auto(&pixels, 4, 4).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
        assert_eq!(colour_type(&png), 3);
    }

    #[test]
    fn test_many_colours_use_rgba() {
        let pixels: Vec<u8> = (0..300u32).flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 0, 255]).collect();
        let png = create_png_auto(&pixels, 20, 15).unwrap();
        assert_eq!(colour_type(&png), 6);
    }

    #[test]
    fn test_transparent_palette_has_trns() {
        let pixels = [0, 0, 0, 0, 9, 9, 9, 255];
        let png = create_png_auto(&pixels, 2, 1).unwrap();
        assert!(png.windows(4).any(|w| w == b"tRNS"));
    }

    #[test]
    fn test_decodes_with_image_crate() {
        let pixels: Vec<u8> = (0..64u32).flat_map(|i| [i as u8, 0, 255 - i as u8, 255]).collect();
        let png = create_png_auto(&pixels, 8, 8).unwrap();
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.into_raw(), pixels);
    }
}
