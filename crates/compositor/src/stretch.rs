//! Contrast stretch for wide sample types.
//!
//! The histogram variant builds a [`STRETCH_BUCKETS`]-bucket histogram over
//! `[min, max]`, trims 2% of the samples from each tail and maps the rest
//! linearly onto 1..=255; values below the low threshold become 0 and values
//! above the high threshold 255.

use raster_common::histogram::{LinearBuckets, STRETCH_BUCKETS};
use serde::{Deserialize, Serialize};

/// Share of samples trimmed from each tail, in percent.
pub const TRIM_PERCENT: f64 = 2.0;

/// Gray level used when every sample has the same value.
pub const CONSTANT_LEVEL: u8 = 128;

/// How wide samples are brought into the 0..=255 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContrastEnhancement {
    /// Percentile-trimmed histogram stretch
    #[default]
    Histogram,
    /// Plain min/max linear stretch
    Normalize,
    /// Saturate values into 0..=255 unchanged
    None,
}

/// A value-to-gray mapping computed from one band's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stretch {
    /// All valid samples share one value (or there are none).
    Constant,
    /// Threshold stretch: below `low` is 0, above `high` is 255.
    Trimmed { low: f64, high: f64 },
    /// Linear min/max stretch onto 0..=255.
    Linear { min: f64, max: f64 },
    /// No remapping; round and saturate.
    Clamp,
}

impl Stretch {
    /// Compute the stretch for `values`; NaN samples are ignored.
    ///
    /// The iterator is walked twice, so it must be cheap to clone.
    pub fn compute<I>(values: I, enhancement: ContrastEnhancement) -> Stretch
    where
        I: Iterator<Item = f64> + Clone,
    {
        if enhancement == ContrastEnhancement::None {
            return Stretch::Clamp;
        }

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut total = 0u64;
        for v in values.clone().filter(|v| !v.is_nan()) {
            min = min.min(v);
            max = max.max(v);
            total += 1;
        }
        if total == 0 || !(max > min) {
            return Stretch::Constant;
        }
        if enhancement == ContrastEnhancement::Normalize {
            return Stretch::Linear { min, max };
        }

        let buckets = LinearBuckets::new(min, max, STRETCH_BUCKETS);
        let mut histogram = vec![0u64; STRETCH_BUCKETS];
        for v in values.filter(|v| !v.is_nan()) {
            histogram[buckets.index(v)] += 1;
        }
        let (low, high) = trim_thresholds(&histogram, &buckets, total);
        if !(high > low) {
            return Stretch::Constant;
        }
        Stretch::Trimmed { low, high }
    }

    /// Gray level of `value`.
    #[inline]
    pub fn apply(&self, value: f64) -> u8 {
        if value.is_nan() {
            return 0;
        }
        match *self {
            Stretch::Constant => CONSTANT_LEVEL,
            Stretch::Trimmed { low, high } => {
                if value < low {
                    0
                } else if value > high {
                    255
                } else {
                    let scaled = 1.0 + (value - low) / (high - low) * 254.0;
                    scaled.round().clamp(1.0, 255.0) as u8
                }
            }
            Stretch::Linear { min, max } => ((value - min) / (max - min) * 255.0).round().clamp(0.0, 255.0) as u8,
            Stretch::Clamp => value.round().clamp(0.0, 255.0) as u8,
        }
    }
}

/// Lower edge of the bucket where the low tail reaches the trim mass, and
/// upper edge of the bucket where the high tail does.
fn trim_thresholds(histogram: &[u64], buckets: &LinearBuckets, total: u64) -> (f64, f64) {
    let percentile = total as f64 / 100.0 * TRIM_PERCENT;

    let mut low = buckets.min;
    let mut sum = 0.0;
    for (i, count) in histogram.iter().enumerate() {
        sum += *count as f64;
        if sum >= percentile {
            low = buckets.lower(i);
            break;
        }
    }

    let mut high = buckets.max;
    let mut sum = 0.0;
    for (i, count) in histogram.iter().enumerate().rev() {
        sum += *count as f64;
        if sum >= percentile {
            high = buckets.upper(i);
            break;
        }
    }
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(n: usize, min: f64, max: f64) -> Vec<f64> {
        (0..n).map(|i| min + (max - min) * i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn test_constant_input() {
        let values = vec![7.0; 50];
        let s = Stretch::compute(values.iter().copied(), ContrastEnhancement::Histogram);
        assert_eq!(s, Stretch::Constant);
        assert_eq!(s.apply(7.0), 128);
    }

    #[test]
    fn test_uniform_spans_full_range() {
        let values = uniform(100, -100.0, 100.0);
        let s = Stretch::compute(values.iter().copied(), ContrastEnhancement::Histogram);
        assert!(matches!(s, Stretch::Trimmed { .. }));
        let grays: Vec<u8> = values.iter().map(|v| s.apply(*v)).collect();
        assert!(*grays.iter().min().unwrap() <= 5);
        assert!(*grays.iter().max().unwrap() >= 250);
        assert!(grays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_outliers_are_trimmed() {
        let mut values = uniform(98, -100.0, 100.0);
        values.push(-10_000.0);
        values.push(10_000.0);
        let s = Stretch::compute(values.iter().copied(), ContrastEnhancement::Histogram);
        let Stretch::Trimmed { low, high } = s else {
            panic!("expected a trimmed stretch, got {s:?}");
        };
        assert!(low > -10_000.0 && high < 10_000.0);
        assert_eq!(s.apply(-10_000.0), 0);
        assert_eq!(s.apply(10_000.0), 255);
        // Inner samples still use most of the gray range.
        assert!(s.apply(-100.0) < 40);
        assert!(s.apply(100.0) > 215);
    }

    #[test]
    fn test_normalize_and_none() {
        let values = [0.0, 50.0, 100.0];
        let s = Stretch::compute(values.iter().copied(), ContrastEnhancement::Normalize);
        assert_eq!(s.apply(0.0), 0);
        assert_eq!(s.apply(100.0), 255);
        let s = Stretch::compute(values.iter().copied(), ContrastEnhancement::None);
        assert_eq!(s.apply(300.0), 255);
        assert_eq!(s.apply(-3.0), 0);
        assert_eq!(s.apply(42.4), 42);
    }

    #[test]
    fn test_nan_ignored() {
        let values = [f64::NAN, 1.0, 2.0, 3.0];
        let s = Stretch::compute(values.iter().copied(), ContrastEnhancement::Normalize);
        assert_eq!(s, Stretch::Linear { min: 1.0, max: 3.0 });
        assert_eq!(s.apply(f64::NAN), 0);
    }
}
