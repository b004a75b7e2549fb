//! Binary layout of serialized statistics.
//!
//! ```text
//! 0x00 0x27 | sample code | bands u8 | no_data_count u64 | count u64 | 0x37
//! per band:
//!   0x37 | min f64 | max f64 | mean f64 | sum_sq_diff f64
//!   | buckets u16 | 0x47 | histogram f64 * buckets | 0x4A | 0x3A
//! 0x79 | crc32 u32 (over everything before it) | 0x27
//! ```
//!
//! Every multi-byte field is little-endian.

use raster_common::SampleType;

use crate::error::{Result, StatsError};
use crate::stats::{BandStatistics, RasterStatistics};

const STATS_START: u8 = 0x27;
const HEADER_END: u8 = 0x37;
const BAND_START: u8 = 0x37;
const HISTOGRAM_START: u8 = 0x47;
const HISTOGRAM_END: u8 = 0x4A;
const BAND_END: u8 = 0x3A;
const STATS_END: u8 = 0x79;

const HEADER_LEN: usize = 2 + 1 + 1 + 8 + 8 + 1;
const TRAILER_LEN: usize = 1 + 4 + 1;

impl RasterStatistics {
    /// Serialize to the stable binary layout.
    pub fn to_blob(&self) -> Vec<u8> {
        let bands_len: usize = self
            .bands
            .iter()
            .map(|b| 1 + 32 + 2 + 1 + b.histogram.len() * 8 + 2)
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + bands_len + TRAILER_LEN);
        out.push(0x00);
        out.push(STATS_START);
        out.push(self.sample_type.code());
        out.push(self.bands.len() as u8);
        out.extend_from_slice(&self.no_data_count.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.push(HEADER_END);

        for band in &self.bands {
            out.push(BAND_START);
            for v in [band.min, band.max, band.mean, band.sum_sq_diff] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.extend_from_slice(&(band.histogram.len() as u16).to_le_bytes());
            out.push(HISTOGRAM_START);
            for v in &band.histogram {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.push(HISTOGRAM_END);
            out.push(BAND_END);
        }

        out.push(STATS_END);
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out.push(STATS_START);
        out
    }

    /// Parse a blob produced by [`RasterStatistics::to_blob`].
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_LEN + TRAILER_LEN {
            return Err(StatsError::malformed(format!("{} bytes is too short", blob.len())));
        }
        let body_end = blob.len() - 5;
        if blob[0] != 0x00 || blob[1] != STATS_START || blob[blob.len() - 1] != STATS_START {
            return Err(StatsError::malformed("bad start/end markers"));
        }
        if blob[body_end - 1] != STATS_END {
            return Err(StatsError::malformed("missing trailer marker"));
        }
        let stored = u32::from_le_bytes([
            blob[body_end],
            blob[body_end + 1],
            blob[body_end + 2],
            blob[body_end + 3],
        ]);
        let computed = crc32fast::hash(&blob[..body_end]);
        if stored != computed {
            return Err(StatsError::ChecksumMismatch { stored, computed });
        }

        let mut r = Reader::new(&blob[..body_end - 1]);
        r.skip(2)?;
        let code = r.u8()?;
        let sample_type = SampleType::from_code(code)
            .ok_or_else(|| StatsError::malformed(format!("unknown sample type code {code:#04x}")))?;
        let band_count = r.u8()? as usize;
        if band_count == 0 {
            return Err(StatsError::malformed("zero bands"));
        }
        let no_data_count = r.u64()?;
        let count = r.u64()?;
        r.expect(HEADER_END, "header end")?;

        let mut bands = Vec::with_capacity(band_count);
        for _ in 0..band_count {
            r.expect(BAND_START, "band start")?;
            let min = r.f64()?;
            let max = r.f64()?;
            let mean = r.f64()?;
            let sum_sq_diff = r.f64()?;
            let buckets = r.u16()? as usize;
            if buckets != sample_type.histogram_buckets() {
                return Err(StatsError::malformed(format!(
                    "{buckets} histogram buckets for {sample_type}"
                )));
            }
            r.expect(HISTOGRAM_START, "histogram start")?;
            let histogram = (0..buckets).map(|_| r.f64()).collect::<Result<Vec<_>>>()?;
            r.expect(HISTOGRAM_END, "histogram end")?;
            r.expect(BAND_END, "band end")?;
            bands.push(BandStatistics {
                min,
                max,
                mean,
                sum_sq_diff,
                histogram,
            });
        }
        if !r.is_empty() {
            return Err(StatsError::malformed("trailing bytes after last band"));
        }

        Ok(Self {
            no_data_count,
            count,
            sample_type,
            bands,
        })
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| StatsError::malformed("truncated"))?;
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn expect(&mut self, marker: u8, what: &str) -> Result<()> {
        let got = self.u8()?;
        if got != marker {
            return Err(StatsError::malformed(format!(
                "expected {what} marker {marker:#04x}, found {got:#04x}"
            )));
        }
        Ok(())
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(buf))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RasterStatistics {
        let mut stats = RasterStatistics::create(SampleType::Int16, 2).unwrap();
        stats.count = 7;
        stats.no_data_count = 3;
        for (i, band) in stats.bands.iter_mut().enumerate() {
            band.min = -12.5 - i as f64;
            band.max = 99.25;
            band.mean = 1.0 / 3.0;
            band.sum_sq_diff = 1234.5678;
            band.histogram[0] = 3.0;
            band.histogram[255] = 4.0;
        }
        stats
    }

    #[test]
    fn test_blob_roundtrip_exact() {
        let stats = sample();
        let blob = stats.to_blob();
        let back = RasterStatistics::from_blob(&blob).unwrap();
        assert_eq!(back, stats);
        assert_eq!(back.to_blob(), blob);
    }

    #[test]
    fn test_empty_statistics_roundtrip() {
        let stats = RasterStatistics::create(SampleType::Bit1, 1).unwrap();
        assert_eq!(RasterStatistics::from_blob(&stats.to_blob()).unwrap(), stats);
    }

    #[test]
    fn test_corruption_detected() {
        let mut blob = sample().to_blob();
        blob[30] ^= 0xFF;
        assert!(matches!(
            RasterStatistics::from_blob(&blob),
            Err(StatsError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncation_detected() {
        let blob = sample().to_blob();
        for len in [0, 10, blob.len() / 2, blob.len() - 1] {
            assert!(RasterStatistics::from_blob(&blob[..len]).is_err());
        }
    }
}
