//! Plane packing: sub-byte rows and the byte delta filter.

use raster_common::{PixelFormat, SampleType};

use crate::error::{CodecError, Result};

/// Bytes in one packed row of `width` pixels.
pub fn packed_row_len(format: &PixelFormat, width: u32) -> usize {
    match format.sample_type.bits() {
        bits @ (1 | 2 | 4) => (width as usize * bits as usize).div_ceil(8),
        _ => width as usize * format.pixel_bytes(),
    }
}

/// Pack one-byte-per-sample 1/2/4-bit rows MSB first. Wider types pass through.
pub fn pack_rows(format: &PixelFormat, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
    let bits = format.sample_type.bits() as usize;
    if !format.sample_type.is_sub_byte() {
        return data.to_vec();
    }
    let row_len = packed_row_len(format, width);
    let per_byte = 8 / bits;
    let mut out = vec![0u8; row_len * height as usize];
    for (src, dst) in data
        .chunks_exact(width as usize)
        .zip(out.chunks_exact_mut(row_len))
    {
        for (x, value) in src.iter().enumerate() {
            let shift = 8 - bits * (x % per_byte + 1);
            dst[x / per_byte] |= *value << shift;
        }
    }
    out
}

/// Reverse of [`pack_rows`].
pub fn unpack_rows(
    format: &PixelFormat,
    width: u32,
    height: u32,
    packed: &[u8],
) -> Result<Vec<u8>> {
    let row_len = packed_row_len(format, width);
    if packed.len() != row_len * height as usize {
        return Err(CodecError::malformed(format!(
            "plane of {} bytes, expected {}",
            packed.len(),
            row_len * height as usize
        )));
    }
    if !format.sample_type.is_sub_byte() {
        return Ok(packed.to_vec());
    }
    let bits = format.sample_type.bits() as usize;
    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    let mut out = vec![0u8; width as usize * height as usize];
    for (src, dst) in packed
        .chunks_exact(row_len)
        .zip(out.chunks_exact_mut(width as usize))
    {
        for (x, value) in dst.iter_mut().enumerate() {
            let shift = 8 - bits * (x % per_byte + 1);
            *value = (src[x / per_byte] >> shift) & mask;
        }
    }
    Ok(out)
}

/// Byte distance of the delta filter for a format.
pub fn delta_distance(format: &PixelFormat) -> usize {
    if format.sample_type.is_sub_byte() {
        1
    } else {
        format.pixel_bytes()
    }
}

/// Replace each byte of every row with its difference to the byte `distance` before it.
pub fn delta_encode(data: &mut [u8], row_len: usize, distance: usize) {
    if row_len == 0 {
        return;
    }
    for row in data.chunks_exact_mut(row_len) {
        for i in (distance..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - distance]);
        }
    }
}

/// Undo [`delta_encode`].
pub fn delta_decode(data: &mut [u8], row_len: usize, distance: usize) {
    if row_len == 0 {
        return;
    }
    for row in data.chunks_exact_mut(row_len) {
        for i in distance..row.len() {
            row[i] = row[i].wrapping_add(row[i - distance]);
        }
    }
}

/// Widen 2/4-bit gray to 8 bits for codecs that only take bytes.
pub fn widen_gray(sample_type: SampleType, data: &[u8]) -> Vec<u8> {
    match sample_type.gray_step() {
        Some(step) if sample_type.is_sub_byte() => data.iter().map(|v| v * step).collect(),
        _ => data.to_vec(),
    }
}

/// Requantize 8-bit gray back to a sub-byte depth.
pub fn narrow_gray(sample_type: SampleType, data: &mut [u8]) {
    let step = match sample_type.gray_step() {
        Some(step) if sample_type.is_sub_byte() => step as f32,
        _ => return,
    };
    for v in data.iter_mut() {
        *v = (*v as f32 / step).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::PixelType;

    #[test]
    fn test_pack_two_bit() {
        let format = PixelFormat::new(SampleType::Bit2, PixelType::Grayscale, 1).unwrap();
        let data = [3, 0, 1, 2, 3];
        let packed = pack_rows(&format, 5, 1, &data);
        assert_eq!(packed, vec![0b1100_0110, 0b1100_0000]);
        assert_eq!(unpack_rows(&format, 5, 1, &packed).unwrap(), data);
    }

    #[test]
    fn test_pack_one_bit_rows_are_byte_aligned() {
        let format = PixelFormat::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        let data = [1, 0, 1, 1, 0, 0, 0, 0, 0, 0, 1, 0, 1, 1, 0, 0, 0, 0];
        let packed = pack_rows(&format, 9, 2, &data);
        assert_eq!(packed.len(), 4);
        assert_eq!(packed[0], 0b1011_0000);
        assert_eq!(packed[1], 0b0000_0000);
        assert_eq!(packed[2], 0b0101_1000);
        assert_eq!(unpack_rows(&format, 9, 2, &packed).unwrap(), data);
    }

    #[test]
    fn test_delta_roundtrip() {
        let original: Vec<u8> = (0..24).map(|v| (v * 37 % 251) as u8).collect();
        let mut data = original.clone();
        delta_encode(&mut data, 12, 3);
        assert_ne!(data, original);
        assert_eq!(&data[..3], &original[..3]);
        delta_decode(&mut data, 12, 3);
        assert_eq!(data, original);
    }

    #[test]
    fn test_gray_widening() {
        let mut wide = widen_gray(SampleType::Bit4, &[0, 7, 15]);
        assert_eq!(wide, vec![0, 119, 255]);
        wide[1] = 121;
        narrow_gray(SampleType::Bit4, &mut wide);
        assert_eq!(wide, vec![0, 7, 15]);
    }
}
