//! Statistics accumulation and the pooled merge.

use raster_common::histogram::{direct_bucket, wide_buckets, LinearBuckets};
use raster_common::sample::{read_sample_f64, same_sample};
use raster_common::{Pixel, Raster, RasterError, SampleType};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, StatsError};

// ============================================================================
// Types
// ============================================================================

/// Running statistics for one band.
///
/// `sum_sq_diff` is the sum of squared deviations from `mean` (Welford's M2).
/// For wide sample types the histogram spans the type's fixed value range
/// linearly, whatever the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum_sq_diff: f64,
    pub histogram: Vec<f64>,
}

impl BandStatistics {
    fn empty(buckets: usize) -> Self {
        Self {
            min: f64::MAX,
            max: f64::MIN,
            mean: 0.0,
            sum_sq_diff: 0.0,
            histogram: vec![0.0; buckets],
        }
    }
}

/// Summary reported for one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
}

/// Statistics over a set of pixels, split per band.
///
/// `count` pixels contributed to every band; `no_data_count` pixels were
/// skipped because they were masked out or matched the NoData pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterStatistics {
    pub no_data_count: u64,
    pub count: u64,
    pub sample_type: SampleType,
    pub bands: Vec<BandStatistics>,
}

// ============================================================================
// Construction and accumulation
// ============================================================================

impl RasterStatistics {
    /// Zeroed statistics with the histogram size for `sample_type`.
    pub fn create(sample_type: SampleType, bands: u8) -> Result<Self> {
        if bands == 0 {
            return Err(RasterError::invalid("statistics need at least one band").into());
        }
        let buckets = sample_type.histogram_buckets();
        Ok(Self {
            no_data_count: 0,
            count: 0,
            sample_type,
            bands: (0..bands).map(|_| BandStatistics::empty(buckets)).collect(),
        })
    }

    /// Statistics of a single raster.
    ///
    /// A pixel is skipped when its mask marks it transparent or when it
    /// equals `no_data` (falling back to the raster's own NoData).
    pub fn from_raster(raster: &Raster, no_data: Option<&Pixel>) -> Result<Self> {
        let format = raster.format();
        let mut stats = Self::create(format.sample_type, format.bands)?;

        let no_data = match no_data.or(raster.no_data()) {
            Some(pixel) if !pixel.is_none() => {
                pixel.check_format(&format)?;
                Some(
                    (0..format.bands as usize)
                        .map(|band| pixel.sample_f64(band))
                        .collect::<std::result::Result<Vec<f64>, _>>()?,
                )
            }
            _ => None,
        };

        let sample_type = format.sample_type;
        let bands = format.bands as usize;
        let pixels = raster.pixels();
        let mask = raster.mask();
        let wide: Option<LinearBuckets> = wide_buckets(sample_type, sample_type.histogram_buckets());
        let skipped = |index: usize| -> bool {
            if mask.map(|m| m.is_transparent(index)).unwrap_or(false) {
                return true;
            }
            match &no_data {
                Some(values) => values
                    .iter()
                    .enumerate()
                    .all(|(band, nd)| same_sample(read_sample_f64(pixels, sample_type, index * bands + band), *nd)),
                None => false,
            }
        };

        for index in 0..raster.pixel_count() {
            if skipped(index) {
                stats.no_data_count += 1;
                continue;
            }
            stats.count += 1;
            let n = stats.count as f64;
            for (band, b) in stats.bands.iter_mut().enumerate() {
                let value = read_sample_f64(pixels, sample_type, index * bands + band);
                b.min = b.min.min(value);
                b.max = b.max.max(value);
                let delta = value - b.mean;
                b.mean += delta / n;
                b.sum_sq_diff += delta * (value - b.mean);
                let bucket = match &wide {
                    Some(mapping) => Some(mapping.index(value)),
                    None => direct_bucket(sample_type, value),
                };
                if let Some(slot) = bucket.and_then(|i| b.histogram.get_mut(i)) {
                    *slot += 1.0;
                }
            }
        }

        trace!(
            count = stats.count,
            no_data = stats.no_data_count,
            "Computed raster statistics"
        );
        Ok(stats)
    }

    /// Add the pixels of `raster` to these statistics.
    pub fn accumulate(&mut self, raster: &Raster, no_data: Option<&Pixel>) -> Result<()> {
        let other = Self::from_raster(raster, no_data)?;
        self.aggregate(&other)
    }

    /// Merge statistics covering a disjoint set of pixels into `self`.
    ///
    /// Means and squared deviations combine with the pooled (Chan) formula,
    /// weighted by each side's count. Histograms share a fixed bucket layout
    /// and add bucket by bucket.
    pub fn aggregate(&mut self, other: &RasterStatistics) -> Result<()> {
        if self.sample_type != other.sample_type || self.bands.len() != other.bands.len() {
            return Err(StatsError::Incompatible(format!(
                "{} x{} vs {} x{}",
                self.sample_type,
                self.bands.len(),
                other.sample_type,
                other.bands.len()
            )));
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;

        for (a, b) in self.bands.iter_mut().zip(&other.bands) {
            if other.count == 0 {
                continue;
            }
            if self.count == 0 {
                *a = b.clone();
                continue;
            }

            let delta = b.mean - a.mean;
            a.mean = (n_a * a.mean + n_b * b.mean) / n;
            a.sum_sq_diff += b.sum_sq_diff + delta * delta * n_a * n_b / n;
            a.min = a.min.min(b.min);
            a.max = a.max.max(b.max);
            for (x, y) in a.histogram.iter_mut().zip(&b.histogram) {
                *x += y;
            }
        }

        self.count += other.count;
        self.no_data_count += other.no_data_count;
        Ok(())
    }

    /// Merge an iterator of statistics; `None` when it is empty.
    pub fn aggregate_all<I>(items: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = RasterStatistics>,
    {
        let mut iter = items.into_iter();
        let Some(mut acc) = iter.next() else {
            return Ok(None);
        };
        for item in iter {
            acc.aggregate(&item)?;
        }
        Ok(Some(acc))
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Min, max, mean, variance and standard deviation of one band.
    ///
    /// Variance is the sample variance; it is zero with fewer than two
    /// pixels and never negative.
    pub fn band_summary(&self, band: usize) -> Result<BandSummary> {
        let b = self.bands.get(band).ok_or(RasterError::BandOutOfRange {
            band,
            bands: self.bands.len(),
        })?;
        let variance = if self.count > 1 {
            (b.sum_sq_diff / (self.count - 1) as f64).max(0.0)
        } else {
            0.0
        };
        Ok(BandSummary {
            min: b.min,
            max: b.max,
            mean: b.mean,
            variance,
            stddev: variance.sqrt(),
        })
    }

    /// Histogram of one band.
    pub fn histogram(&self, band: usize) -> Result<&[f64]> {
        self.bands
            .get(band)
            .map(|b| b.histogram.as_slice())
            .ok_or_else(|| {
                RasterError::BandOutOfRange {
                    band,
                    bands: self.bands.len(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{Mask, PixelFormat, PixelType};

    fn gray8(values: &[u8]) -> Raster {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        Raster::new(values.len() as u32, 1, format, values.to_vec(), None).unwrap()
    }

    #[test]
    fn test_create_bucket_counts() {
        assert_eq!(RasterStatistics::create(SampleType::Bit1, 1).unwrap().bands[0].histogram.len(), 2);
        assert_eq!(RasterStatistics::create(SampleType::Bit2, 1).unwrap().bands[0].histogram.len(), 4);
        assert_eq!(RasterStatistics::create(SampleType::Bit4, 1).unwrap().bands[0].histogram.len(), 16);
        assert_eq!(RasterStatistics::create(SampleType::Float64, 3).unwrap().bands[2].histogram.len(), 256);
        assert!(RasterStatistics::create(SampleType::Uint8, 0).is_err());
    }

    #[test]
    fn test_basic_summary() {
        let stats = RasterStatistics::from_raster(&gray8(&[2, 4, 4, 4, 5, 5, 7, 9]), None).unwrap();
        let s = stats.band_summary(0).unwrap();
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.variance - 32.0 / 7.0).abs() < 1e-12);
        assert!((s.stddev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.histogram(0).unwrap()[4], 3.0);
    }

    #[test]
    fn test_no_data_and_mask_skipped() {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let mut nd = Pixel::with_format(format);
        nd.set_u8(0, 0).unwrap();
        let raster = Raster::new(4, 1, format, vec![0, 10, 20, 30], None)
            .unwrap()
            .with_mask(Mask::Transparency(vec![1, 1, 1, 0]))
            .unwrap();
        let stats = RasterStatistics::from_raster(&raster, Some(&nd)).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.no_data_count, 2);
        let s = stats.band_summary(0).unwrap();
        assert_eq!((s.min, s.max, s.mean), (10.0, 20.0, 15.0));
    }

    #[test]
    fn test_nan_no_data_skipped() {
        let format = PixelFormat::new(SampleType::Float64, PixelType::DataGrid, 1).unwrap();
        let mut pixels = vec![0u8; 32];
        for (i, v) in [f64::NAN, 1.0, f64::NAN, 3.0].into_iter().enumerate() {
            raster_common::sample::write_sample(&mut pixels, i, v);
        }
        let mut nd = Pixel::with_format(format);
        nd.set_f64(0, f64::NAN).unwrap();
        let raster = Raster::new(4, 1, format, pixels, None).unwrap();
        let stats = RasterStatistics::from_raster(&raster, Some(&nd)).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.no_data_count, 2);
        let s = stats.band_summary(0).unwrap();
        assert_eq!((s.min, s.max, s.mean), (1.0, 3.0, 2.0));
    }

    #[test]
    fn test_single_pixel_variance_zero() {
        let stats = RasterStatistics::from_raster(&gray8(&[42]), None).unwrap();
        let s = stats.band_summary(0).unwrap();
        assert_eq!(s.variance, 0.0);
        assert_eq!(s.stddev, 0.0);
    }

    #[test]
    fn test_aggregate_matches_whole() {
        let whole = RasterStatistics::from_raster(&gray8(&[1, 2, 3, 10, 20, 30]), None).unwrap();
        let mut left = RasterStatistics::from_raster(&gray8(&[1, 2, 3]), None).unwrap();
        let right = RasterStatistics::from_raster(&gray8(&[10, 20, 30]), None).unwrap();
        left.aggregate(&right).unwrap();
        let (a, b) = (left.band_summary(0).unwrap(), whole.band_summary(0).unwrap());
        assert_eq!(left.count, whole.count);
        assert!((a.mean - b.mean).abs() < 1e-12);
        assert!((a.variance - b.variance).abs() < 1e-9);
        assert_eq!(left.bands[0].histogram, whole.bands[0].histogram);
    }

    #[test]
    fn test_aggregate_with_empty() {
        let mut empty = RasterStatistics::create(SampleType::Uint8, 1).unwrap();
        let one = RasterStatistics::from_raster(&gray8(&[5, 6]), None).unwrap();
        empty.aggregate(&one).unwrap();
        assert_eq!(empty, one);

        let mut same = one.clone();
        same.aggregate(&RasterStatistics::create(SampleType::Uint8, 1).unwrap()).unwrap();
        assert_eq!(same, one);
    }

    #[test]
    fn test_aggregate_incompatible() {
        let mut a = RasterStatistics::create(SampleType::Uint8, 1).unwrap();
        let b = RasterStatistics::create(SampleType::Uint16, 1).unwrap();
        assert!(matches!(a.aggregate(&b), Err(StatsError::Incompatible(_))));
    }

    #[test]
    fn test_band_out_of_range() {
        let stats = RasterStatistics::create(SampleType::Uint8, 1).unwrap();
        assert!(stats.band_summary(1).is_err());
    }
}
