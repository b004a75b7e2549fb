//! Single pixel values, used mainly as NoData sentinels.

use crate::error::{RasterError, RasterResult};
use crate::format::PixelFormat;
use crate::sample::{same_sample, PixelType, SampleType, SampleValue};

/// One band value, tagged with its storage type.
///
/// 1/2/4-bit samples are held as `U8` and range-checked on write.
/// Float samples compare equal when both are NaN.
#[derive(Debug, Clone, Copy)]
pub enum Sample {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
}

impl Sample {
    fn zero(sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::Bit1
            | SampleType::Bit2
            | SampleType::Bit4
            | SampleType::Uint8 => Sample::U8(0),
            SampleType::Int8 => Sample::I8(0),
            SampleType::Uint16 => Sample::U16(0),
            SampleType::Int16 => Sample::I16(0),
            SampleType::Uint32 => Sample::U32(0),
            SampleType::Int32 => Sample::I32(0),
            SampleType::Float32 => Sample::F32(0.0),
            SampleType::Float64 => Sample::F64(0.0),
        }
    }

    /// Widen to `f64`; exact for every storage type.
    pub fn to_f64(self) -> f64 {
        match self {
            Sample::U8(v) => v as f64,
            Sample::I8(v) => v as f64,
            Sample::U16(v) => v as f64,
            Sample::I16(v) => v as f64,
            Sample::U32(v) => v as f64,
            Sample::I32(v) => v as f64,
            Sample::F32(v) => v as f64,
            Sample::F64(v) => v,
        }
    }

    fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Sample::U8(v) => vec![v],
            Sample::I8(v) => vec![v as u8],
            Sample::U16(v) => v.to_le_bytes().to_vec(),
            Sample::I16(v) => v.to_le_bytes().to_vec(),
            Sample::U32(v) => v.to_le_bytes().to_vec(),
            Sample::I32(v) => v.to_le_bytes().to_vec(),
            Sample::F32(v) => v.to_le_bytes().to_vec(),
            Sample::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    fn from_le_bytes(sample_type: SampleType, b: &[u8]) -> Self {
        match sample_type {
            SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4 | SampleType::Uint8 => {
                Sample::U8(b[0])
            }
            SampleType::Int8 => Sample::I8(b[0] as i8),
            SampleType::Uint16 => Sample::U16(u16::from_le_bytes([b[0], b[1]])),
            SampleType::Int16 => Sample::I16(i16::from_le_bytes([b[0], b[1]])),
            SampleType::Uint32 => Sample::U32(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            SampleType::Int32 => Sample::I32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            SampleType::Float32 => Sample::F32(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            SampleType::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&b[..8]);
                Sample::F64(f64::from_le_bytes(raw))
            }
        }
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Sample::U8(a), Sample::U8(b)) => a == b,
            (Sample::I8(a), Sample::I8(b)) => a == b,
            (Sample::U16(a), Sample::U16(b)) => a == b,
            (Sample::I16(a), Sample::I16(b)) => a == b,
            (Sample::U32(a), Sample::U32(b)) => a == b,
            (Sample::I32(a), Sample::I32(b)) => a == b,
            (Sample::F32(a), Sample::F32(b)) => same_sample(a as f64, b as f64),
            (Sample::F64(a), Sample::F64(b)) => same_sample(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct PixelData {
    format: PixelFormat,
    samples: Vec<Sample>,
    transparent: bool,
}

/// A pixel: one sample per band plus a transparency flag.
///
/// The distinguished "none" pixel ([`Pixel::none`]) means "no NoData
/// configured". It has no format, and every read, write, comparison or
/// transparency query on it fails with [`RasterError::NonePixel`].
#[derive(Debug, Clone)]
pub struct Pixel {
    data: Option<PixelData>,
}

const PIXEL_START: u8 = 0x00;
const PIXEL_MARKER: u8 = 0x03;
const SAMPLE_MARKER: u8 = 0x06;
const PIXEL_END: u8 = 0x23;

macro_rules! sample_accessors {
    ($get:ident, $set:ident, $t:ty, $variant:ident, $st:expr) => {
        #[doc = concat!("Read band `band` of a `", stringify!($t), "` pixel.")]
        pub fn $get(&self, band: usize) -> RasterResult<$t> {
            match self.sample_slot(band, $st)? {
                Sample::$variant(v) => Ok(*v),
                _ => Err(RasterError::SampleTypeMismatch {
                    requested: $st,
                    actual: self.sample_type()?,
                }),
            }
        }

        #[doc = concat!("Write band `band` of a `", stringify!($t), "` pixel.")]
        pub fn $set(&mut self, band: usize, value: $t) -> RasterResult<()> {
            *self.sample_slot_mut(band, $st)? = Sample::$variant(value);
            Ok(())
        }
    };
}

macro_rules! sub_byte_accessors {
    ($get:ident, $set:ident, $st:expr) => {
        #[doc = concat!("Read a ", stringify!($st), " sample.")]
        pub fn $get(&self, band: usize) -> RasterResult<u8> {
            match self.sample_slot(band, $st)? {
                Sample::U8(v) => Ok(*v),
                _ => Err(RasterError::SampleTypeMismatch {
                    requested: $st,
                    actual: self.sample_type()?,
                }),
            }
        }

        #[doc = concat!("Write a ", stringify!($st), " sample, rejecting out-of-range values.")]
        pub fn $set(&mut self, band: usize, value: u8) -> RasterResult<()> {
            let max = $st.sub_byte_max().unwrap_or(u8::MAX);
            if value > max {
                return Err(RasterError::SampleOutOfRange {
                    sample_type: $st,
                    value: value as u32,
                    max: max as u32,
                });
            }
            *self.sample_slot_mut(band, $st)? = Sample::U8(value);
            Ok(())
        }
    };
}

impl Pixel {
    /// Create a zero-valued pixel. Fails for any format the compatibility
    /// table does not list for rasters.
    pub fn new(sample_type: SampleType, pixel_type: PixelType, bands: u8) -> RasterResult<Self> {
        let format = PixelFormat::new(sample_type, pixel_type, bands)?;
        Ok(Self::with_format(format))
    }

    /// Create a zero-valued pixel for an already validated format.
    pub fn with_format(format: PixelFormat) -> Self {
        Self {
            data: Some(PixelData {
                format,
                samples: vec![Sample::zero(format.sample_type); format.bands as usize],
                transparent: false,
            }),
        }
    }

    /// The distinguished "no NoData configured" pixel.
    pub fn none() -> Self {
        Self { data: None }
    }

    pub fn is_none(&self) -> bool {
        self.data.is_none()
    }

    fn data(&self) -> RasterResult<&PixelData> {
        self.data.as_ref().ok_or(RasterError::NonePixel)
    }

    fn data_mut(&mut self) -> RasterResult<&mut PixelData> {
        self.data.as_mut().ok_or(RasterError::NonePixel)
    }

    pub fn format(&self) -> RasterResult<PixelFormat> {
        Ok(self.data()?.format)
    }

    pub fn sample_type(&self) -> RasterResult<SampleType> {
        Ok(self.data()?.format.sample_type)
    }

    pub fn pixel_type(&self) -> RasterResult<PixelType> {
        Ok(self.data()?.format.pixel_type)
    }

    pub fn bands(&self) -> RasterResult<u8> {
        Ok(self.data()?.format.bands)
    }

    /// Deep copy; undefined for the "none" pixel.
    pub fn try_clone(&self) -> RasterResult<Pixel> {
        self.data()?;
        Ok(self.clone())
    }

    fn check_slot(data: &PixelData, band: usize, requested: SampleType) -> RasterResult<()> {
        if data.format.sample_type != requested {
            return Err(RasterError::SampleTypeMismatch {
                requested,
                actual: data.format.sample_type,
            });
        }
        if band >= data.samples.len() {
            return Err(RasterError::BandOutOfRange {
                band,
                bands: data.samples.len(),
            });
        }
        Ok(())
    }

    fn sample_slot(&self, band: usize, requested: SampleType) -> RasterResult<&Sample> {
        let data = self.data()?;
        Self::check_slot(data, band, requested)?;
        Ok(&data.samples[band])
    }

    fn sample_slot_mut(&mut self, band: usize, requested: SampleType) -> RasterResult<&mut Sample> {
        let data = self.data_mut()?;
        Self::check_slot(data, band, requested)?;
        Ok(&mut data.samples[band])
    }

    sub_byte_accessors!(get_bit1, set_bit1, SampleType::Bit1);
    sub_byte_accessors!(get_bit2, set_bit2, SampleType::Bit2);
    sub_byte_accessors!(get_bit4, set_bit4, SampleType::Bit4);
    sample_accessors!(get_i8, set_i8, i8, I8, SampleType::Int8);
    sample_accessors!(get_u8, set_u8, u8, U8, SampleType::Uint8);
    sample_accessors!(get_i16, set_i16, i16, I16, SampleType::Int16);
    sample_accessors!(get_u16, set_u16, u16, U16, SampleType::Uint16);
    sample_accessors!(get_i32, set_i32, i32, I32, SampleType::Int32);
    sample_accessors!(get_u32, set_u32, u32, U32, SampleType::Uint32);
    sample_accessors!(get_f32, set_f32, f32, F32, SampleType::Float32);
    sample_accessors!(get_f64, set_f64, f64, F64, SampleType::Float64);

    /// Read any band widened to `f64`.
    pub fn sample_f64(&self, band: usize) -> RasterResult<f64> {
        let data = self.data()?;
        data.samples
            .get(band)
            .map(|s| s.to_f64())
            .ok_or(RasterError::BandOutOfRange {
                band,
                bands: data.samples.len(),
            })
    }

    /// Write any band from an `f64`, converting to the pixel's sample type.
    ///
    /// Integer types round and saturate; sub-byte values above the type
    /// maximum are rejected.
    pub fn set_sample_f64(&mut self, band: usize, value: f64) -> RasterResult<()> {
        let data = self.data_mut()?;
        let sample_type = data.format.sample_type;
        let bands = data.samples.len();
        let slot = data
            .samples
            .get_mut(band)
            .ok_or(RasterError::BandOutOfRange { band, bands })?;
        *slot = match sample_type {
            SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4 => {
                let max = sample_type.sub_byte_max().unwrap_or(u8::MAX);
                if !(0.0..=max as f64).contains(&value) {
                    return Err(RasterError::SampleOutOfRange {
                        sample_type,
                        value: value.max(0.0) as u32,
                        max: max as u32,
                    });
                }
                Sample::U8(value.round() as u8)
            }
            SampleType::Uint8 => Sample::U8(u8::from_f64(value)),
            SampleType::Int8 => Sample::I8(i8::from_f64(value)),
            SampleType::Uint16 => Sample::U16(u16::from_f64(value)),
            SampleType::Int16 => Sample::I16(i16::from_f64(value)),
            SampleType::Uint32 => Sample::U32(u32::from_f64(value)),
            SampleType::Int32 => Sample::I32(i32::from_f64(value)),
            SampleType::Float32 => Sample::F32(value as f32),
            SampleType::Float64 => Sample::F64(value),
        };
        Ok(())
    }

    /// Borrow the raw samples.
    pub fn samples(&self) -> RasterResult<&[Sample]> {
        Ok(&self.data()?.samples)
    }

    pub fn is_transparent(&self) -> RasterResult<bool> {
        Ok(self.data()?.transparent)
    }

    pub fn set_transparent(&mut self, transparent: bool) -> RasterResult<()> {
        self.data_mut()?.transparent = transparent;
        Ok(())
    }

    /// Compare two pixels: `Ok(true)` when every band and the transparency
    /// flag are identical.
    ///
    /// Fails when either side is the "none" pixel or the formats differ.
    pub fn compare(&self, other: &Pixel) -> RasterResult<bool> {
        let a = self.data()?;
        let b = other.data()?;
        if a.format != b.format {
            return Err(RasterError::mismatch(format!(
                "cannot compare {} with {}",
                a.format, b.format
            )));
        }
        let same_samples = a
            .samples
            .iter()
            .zip(b.samples.iter())
            .all(|(x, y)| x == y);
        Ok(same_samples && a.transparent == b.transparent)
    }

    /// Check that this pixel matches a format exactly.
    pub fn check_format(&self, format: &PixelFormat) -> RasterResult<()> {
        let own = self.format()?;
        if own != *format {
            return Err(RasterError::mismatch(format!(
                "pixel is {} but {} was expected",
                own, format
            )));
        }
        Ok(())
    }

    /// Serialize to the NoData blob layout (little-endian).
    pub fn to_blob(&self) -> RasterResult<Vec<u8>> {
        let data = self.data()?;
        let mut blob = vec![
            PIXEL_START,
            PIXEL_MARKER,
            data.format.sample_type.code(),
            data.format.pixel_type.code(),
            data.format.bands,
            data.transparent as u8,
        ];
        for sample in &data.samples {
            blob.push(SAMPLE_MARKER);
            blob.extend_from_slice(&sample.to_le_bytes());
        }
        blob.push(PIXEL_END);
        Ok(blob)
    }

    /// Parse a NoData blob written by [`Pixel::to_blob`].
    pub fn from_blob(blob: &[u8]) -> RasterResult<Pixel> {
        let bad = |msg: &str| RasterError::Codec(format!("invalid pixel blob: {}", msg));
        if blob.len() < 7 || blob[0] != PIXEL_START || blob[1] != PIXEL_MARKER {
            return Err(bad("header"));
        }
        let sample_type = SampleType::from_code(blob[2]).ok_or_else(|| bad("sample type"))?;
        let pixel_type = PixelType::from_code(blob[3]).ok_or_else(|| bad("pixel type"))?;
        let bands = blob[4];
        let transparent = match blob[5] {
            0 => false,
            1 => true,
            _ => return Err(bad("transparency flag")),
        };
        let width = sample_type.byte_width();
        let expected = 6 + bands as usize * (1 + width) + 1;
        if blob.len() != expected || blob[expected - 1] != PIXEL_END {
            return Err(bad("length"));
        }

        let mut pixel = Pixel::new(sample_type, pixel_type, bands)?;
        let data = pixel.data_mut()?;
        let mut offset = 6;
        for band in 0..bands as usize {
            if blob[offset] != SAMPLE_MARKER {
                return Err(bad("sample marker"));
            }
            let sample = Sample::from_le_bytes(sample_type, &blob[offset + 1..offset + 1 + width]);
            if let (Sample::U8(v), Some(max)) = (sample, sample_type.sub_byte_max()) {
                if v > max {
                    return Err(bad("sub-byte sample out of range"));
                }
            }
            data.samples[band] = sample;
            offset += 1 + width;
        }
        data.transparent = transparent;
        Ok(pixel)
    }
}

/// Validate an optional NoData pixel against a format.
///
/// The "none" pixel is always accepted and normalised to `None`.
pub fn normalize_no_data(
    no_data: Option<Pixel>,
    format: &PixelFormat,
) -> RasterResult<Option<Pixel>> {
    match no_data {
        None => Ok(None),
        Some(p) if p.is_none() => Ok(None),
        Some(p) => {
            p.check_format(format)?;
            Ok(Some(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_count_rules() {
        assert!(Pixel::new(SampleType::Uint8, PixelType::Rgb, 3).is_ok());
        assert!(Pixel::new(SampleType::Uint8, PixelType::Rgb, 4).is_err());
        assert!(Pixel::new(SampleType::Uint8, PixelType::MultiBand, 1).is_err());
        assert!(Pixel::new(SampleType::Uint16, PixelType::MultiBand, 7).is_ok());
        assert!(Pixel::new(SampleType::Float32, PixelType::DataGrid, 2).is_err());
        assert!(Pixel::new(SampleType::Bit1, PixelType::Monochrome, 1).is_ok());
    }

    #[test]
    fn test_typed_roundtrip() {
        let mut p = Pixel::new(SampleType::Int32, PixelType::DataGrid, 1).unwrap();
        p.set_i32(0, i32::MIN).unwrap();
        assert_eq!(p.get_i32(0).unwrap(), i32::MIN);

        let mut p = Pixel::new(SampleType::Float64, PixelType::DataGrid, 1).unwrap();
        p.set_f64(0, 1.0e-300).unwrap();
        assert_eq!(p.get_f64(0).unwrap(), 1.0e-300);

        let mut p = Pixel::new(SampleType::Uint16, PixelType::Rgb, 3).unwrap();
        p.set_u16(2, 65535).unwrap();
        assert_eq!(p.get_u16(2).unwrap(), 65535);
    }

    #[test]
    fn test_accessor_mismatch_and_range() {
        let mut p = Pixel::new(SampleType::Uint8, PixelType::Rgb, 3).unwrap();
        assert!(matches!(
            p.set_u16(0, 1),
            Err(RasterError::SampleTypeMismatch { .. })
        ));
        assert!(matches!(
            p.set_u8(3, 1),
            Err(RasterError::BandOutOfRange { band: 3, bands: 3 })
        ));
        assert!(p.get_i8(0).is_err());
    }

    #[test]
    fn test_sub_byte_limits() {
        let mut p = Pixel::new(SampleType::Bit2, PixelType::Palette, 1).unwrap();
        assert!(p.set_bit2(0, 3).is_ok());
        assert!(matches!(
            p.set_bit2(0, 4),
            Err(RasterError::SampleOutOfRange { max: 3, .. })
        ));
        assert_eq!(p.get_bit2(0).unwrap(), 3);

        let mut p = Pixel::new(SampleType::Bit4, PixelType::Grayscale, 1).unwrap();
        assert!(p.set_bit4(0, 15).is_ok());
        assert!(p.set_bit4(0, 16).is_err());
        assert!(p.set_bit1(0, 1).is_err());

        let mut p = Pixel::new(SampleType::Bit1, PixelType::Monochrome, 1).unwrap();
        assert!(p.set_bit1(0, 2).is_err());
    }

    #[test]
    fn test_compare() {
        let mut a = Pixel::new(SampleType::Uint8, PixelType::Rgb, 3).unwrap();
        a.set_u8(2, 255).unwrap();
        assert!(a.compare(&a).unwrap());

        let mut b = a.try_clone().unwrap();
        assert!(a.compare(&b).unwrap());
        b.set_u8(0, 1).unwrap();
        assert!(!a.compare(&b).unwrap());

        let mut c = a.try_clone().unwrap();
        c.set_transparent(true).unwrap();
        assert!(!a.compare(&c).unwrap());

        let gray = Pixel::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        assert!(a.compare(&gray).is_err());
    }

    #[test]
    fn test_none_pixel_rejects_everything() {
        let mut none = Pixel::none();
        let p = Pixel::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        assert!(none.is_none());
        assert!(matches!(none.compare(&p), Err(RasterError::NonePixel)));
        assert!(matches!(p.compare(&none), Err(RasterError::NonePixel)));
        assert!(none.compare(&Pixel::none()).is_err());
        assert!(none.try_clone().is_err());
        assert!(none.is_transparent().is_err());
        assert!(none.set_transparent(true).is_err());
        assert!(none.get_u8(0).is_err());
        assert!(none.to_blob().is_err());
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut p = Pixel::new(SampleType::Uint16, PixelType::MultiBand, 4).unwrap();
        p.set_u16(0, 5).unwrap();
        p.set_u16(3, 12000).unwrap();
        p.set_transparent(true).unwrap();
        let blob = p.to_blob().unwrap();
        let back = Pixel::from_blob(&blob).unwrap();
        assert!(p.compare(&back).unwrap());
    }

    #[test]
    fn test_blob_roundtrip_every_legal_format() {
        let mut seen = 0;
        for sample_type in SampleType::ALL {
            for pixel_type in PixelType::ALL {
                for bands in 1..=4u8 {
                    let Ok(mut p) = Pixel::new(sample_type, pixel_type, bands) else {
                        continue;
                    };
                    let top = sample_type.sub_byte_max().map(f64::from).unwrap_or(100.0);
                    for band in 0..bands as usize {
                        p.set_sample_f64(band, top - band as f64 % (top + 1.0)).unwrap();
                    }
                    p.set_transparent(bands % 2 == 0).unwrap();
                    let back = Pixel::from_blob(&p.to_blob().unwrap()).unwrap();
                    assert!(p.compare(&back).unwrap(), "{sample_type:?} {pixel_type:?} {bands}");
                    seen += 1;
                }
            }
        }
        assert!(seen > 20);
    }

    #[test]
    fn test_compare_nan_samples() {
        let mut a = Pixel::new(SampleType::Float32, PixelType::DataGrid, 1).unwrap();
        a.set_f32(0, f32::NAN).unwrap();
        assert!(a.compare(&a).unwrap());
        let b = a.try_clone().unwrap();
        assert!(a.compare(&b).unwrap());

        let mut c = a.try_clone().unwrap();
        c.set_f32(0, 0.0).unwrap();
        assert!(!a.compare(&c).unwrap());

        let mut d = Pixel::new(SampleType::Float64, PixelType::DataGrid, 1).unwrap();
        d.set_f64(0, f64::NAN).unwrap();
        assert!(d.compare(&d.try_clone().unwrap()).unwrap());
    }

    #[test]
    fn test_blob_rejects_garbage() {
        assert!(Pixel::from_blob(&[]).is_err());
        assert!(Pixel::from_blob(&[0, 3, 0xA5, 0x13, 1, 0, 6]).is_err());
        let p = Pixel::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut blob = p.to_blob().unwrap();
        blob.pop();
        assert!(Pixel::from_blob(&blob).is_err());
    }
}
