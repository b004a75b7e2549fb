//! Linear histogram bucket mapping shared by statistics and contrast stretch.

use crate::sample::SampleType;

/// Bucket count of the intermediate contrast-stretch histogram.
pub const STRETCH_BUCKETS: usize = 1024;

/// Maps values in `[min, max]` onto `count` equal-width buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBuckets {
    pub min: f64,
    pub max: f64,
    pub count: usize,
    tic: f64,
}

impl LinearBuckets {
    pub fn new(min: f64, max: f64, count: usize) -> Self {
        let count = count.max(1);
        Self {
            min,
            max,
            count,
            tic: (max - min) / count as f64,
        }
    }

    /// Width of one bucket.
    pub fn tic(&self) -> f64 {
        self.tic
    }

    /// Bucket of `value`, clamped to the valid range.
    #[inline]
    pub fn index(&self, value: f64) -> usize {
        if !(self.tic > 0.0) {
            return 0;
        }
        let i = ((value - self.min) / self.tic).floor();
        if i <= 0.0 {
            0
        } else {
            (i as usize).min(self.count - 1)
        }
    }

    /// Lower edge of bucket `i`.
    pub fn lower(&self, i: usize) -> f64 {
        self.min + i as f64 * self.tic
    }

    /// Upper edge of bucket `i`.
    pub fn upper(&self, i: usize) -> f64 {
        self.min + (i + 1) as f64 * self.tic
    }
}

/// Direct bucket for byte and sub-byte samples; `None` for wider types.
#[inline]
pub fn direct_bucket(sample_type: SampleType, value: f64) -> Option<usize> {
    match sample_type {
        SampleType::Bit1 | SampleType::Bit2 | SampleType::Bit4 | SampleType::Uint8 => {
            Some(value as usize)
        }
        SampleType::Int8 => Some((value as i32 + 128) as usize),
        _ => None,
    }
}

/// Fixed statistics-histogram mapping for a wide sample type.
///
/// The domain is the type's value range and never depends on the data, so
/// histograms from any two tiles line up bucket for bucket. Floats span the
/// finite `f32` range. `None` for byte and sub-byte types.
pub fn wide_buckets(sample_type: SampleType, count: usize) -> Option<LinearBuckets> {
    let (min, max) = match sample_type {
        SampleType::Int16 => (i16::MIN as f64, i16::MAX as f64 + 1.0),
        SampleType::Uint16 => (0.0, u16::MAX as f64 + 1.0),
        SampleType::Int32 => (i32::MIN as f64, i32::MAX as f64 + 1.0),
        SampleType::Uint32 => (0.0, u32::MAX as f64 + 1.0),
        SampleType::Float32 | SampleType::Float64 => (f32::MIN as f64, f32::MAX as f64),
        _ => return None,
    };
    Some(LinearBuckets::new(min, max, count))
}
