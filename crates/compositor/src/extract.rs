//! Typed extraction of raw samples.
//!
//! The requested Rust type must match the raster's sample type exactly;
//! nothing is converted.

use raster_common::sample::{read_sample, SampleValue};
use raster_common::{Raster, RasterError, SampleType};

use crate::error::{CompositeError, Result};

fn check_type(raster: &Raster, wanted: SampleType, operation: &'static str) -> Result<()> {
    let format = raster.format();
    if format.sample_type != wanted {
        return Err(CompositeError::unsupported(operation, format.sample_type, format.pixel_type));
    }
    Ok(())
}

fn check_band(raster: &Raster, band: usize) -> Result<()> {
    let bands = raster.format().bands as usize;
    if band >= bands {
        return Err(RasterError::BandOutOfRange { band, bands }.into());
    }
    Ok(())
}

/// All samples, band-interleaved, as `T`.
pub fn raster_data_as<T: SampleValue>(raster: &Raster) -> Result<Vec<T>> {
    check_type(raster, T::SAMPLE_TYPE, "extract typed samples from")?;
    let count = raster.pixel_count() * raster.format().bands as usize;
    Ok((0..count).map(|i| read_sample::<T>(raster.pixels(), i)).collect())
}

/// One band as `T`.
pub fn band_as<T: SampleValue>(raster: &Raster, band: usize) -> Result<Vec<T>> {
    check_type(raster, T::SAMPLE_TYPE, "extract a typed band from")?;
    check_band(raster, band)?;
    let bands = raster.format().bands as usize;
    Ok((0..raster.pixel_count())
        .map(|i| read_sample::<T>(raster.pixels(), i * bands + band))
        .collect())
}

/// One band of a 1, 2 or 4-bit raster, one sample per byte.
pub fn band_as_sub_byte(raster: &Raster, band: usize, sample_type: SampleType) -> Result<Vec<u8>> {
    if !sample_type.is_sub_byte() {
        return Err(RasterError::invalid(format!("{sample_type} is not a sub-byte sample type")).into());
    }
    check_type(raster, sample_type, "extract a sub-byte band from")?;
    check_band(raster, band)?;
    let bands = raster.format().bands as usize;
    Ok(raster.pixels().iter().skip(band).step_by(bands).copied().collect())
}
