//! Indexed colour tables for Palette rasters.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};
use crate::sample::SampleType;

/// Maximum number of palette entries.
pub const MAX_PALETTE_ENTRIES: usize = 256;

const PALETTE_START: u8 = 0x00;
const PALETTE_MARKER: u8 = 0xC8;
const PALETTE_END: u8 = 0xC9;

/// One opaque RGB palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl PaletteEntry {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub const fn gray(value: u8) -> Self {
        Self::new(value, value, value)
    }

    pub fn is_gray(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }
}

/// Result of [`Palette::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKind {
    /// Exactly two entries: white then black.
    Monochrome,
    /// A canonical gray ramp for the given sub-byte or byte depth.
    Grayscale(SampleType),
    /// Arbitrary entries that are all gray.
    GenericGray,
    /// Anything else.
    GenericRgb,
}

impl PaletteKind {
    /// Whether rendering through this palette yields a single gray channel.
    pub fn is_gray(&self) -> bool {
        !matches!(self, PaletteKind::GenericRgb)
    }
}

/// Ordered list of up to 256 RGB entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Create a palette with `n` opaque black entries.
    pub fn new(n: usize) -> RasterResult<Self> {
        if n > MAX_PALETTE_ENTRIES {
            return Err(RasterError::invalid(format!(
                "palette of {} entries exceeds {}",
                n, MAX_PALETTE_ENTRIES
            )));
        }
        Ok(Self {
            entries: vec![PaletteEntry::default(); n],
        })
    }

    /// Build a palette from explicit entries.
    pub fn from_entries(entries: Vec<PaletteEntry>) -> RasterResult<Self> {
        if entries.len() > MAX_PALETTE_ENTRIES {
            return Err(RasterError::invalid(format!(
                "palette of {} entries exceeds {}",
                entries.len(),
                MAX_PALETTE_ENTRIES
            )));
        }
        Ok(Self { entries })
    }

    /// Canonical gray ramp for a grayscale sample type (2, 4, 16 or 256 entries).
    pub fn gray_ramp(sample_type: SampleType) -> RasterResult<Self> {
        let entries = match sample_type {
            SampleType::Bit1 => vec![PaletteEntry::gray(255), PaletteEntry::gray(0)],
            SampleType::Bit2 | SampleType::Bit4 | SampleType::Uint8 => {
                let step = sample_type.gray_step().unwrap_or(1);
                let top = sample_type.sub_byte_max().unwrap_or(u8::MAX);
                (0..=top).map(|v| PaletteEntry::gray(v * step)).collect()
            }
            other => {
                return Err(RasterError::invalid(format!(
                    "no gray ramp for {}",
                    other
                )))
            }
        };
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn set(&mut self, index: usize, entry: PaletteEntry) -> RasterResult<()> {
        let len = self.entries.len();
        let slot = self.entries.get_mut(index).ok_or_else(|| {
            RasterError::invalid(format!("palette index {} out of range ({})", index, len))
        })?;
        *slot = entry;
        Ok(())
    }

    pub fn get(&self, index: usize) -> RasterResult<PaletteEntry> {
        self.entries.get(index).copied().ok_or_else(|| {
            RasterError::invalid(format!(
                "palette index {} out of range ({})",
                index,
                self.entries.len()
            ))
        })
    }

    /// First index holding this colour, if any.
    pub fn index_of(&self, red: u8, green: u8, blue: u8) -> Option<usize> {
        let wanted = PaletteEntry::new(red, green, blue);
        self.entries.iter().position(|e| *e == wanted)
    }

    /// Classify against the canonical ramps, falling back to a gray test.
    pub fn classify(&self) -> PaletteKind {
        for sample_type in [
            SampleType::Bit1,
            SampleType::Bit2,
            SampleType::Bit4,
            SampleType::Uint8,
        ] {
            if let Ok(ramp) = Self::gray_ramp(sample_type) {
                if ramp.entries == self.entries {
                    return if sample_type == SampleType::Bit1 {
                        PaletteKind::Monochrome
                    } else {
                        PaletteKind::Grayscale(sample_type)
                    };
                }
            }
        }
        if !self.entries.is_empty() && self.entries.iter().all(PaletteEntry::is_gray) {
            PaletteKind::GenericGray
        } else {
            PaletteKind::GenericRgb
        }
    }

    /// Smallest sample type able to index every entry.
    pub fn min_sample_type(&self) -> SampleType {
        match self.entries.len() {
            0..=2 => SampleType::Bit1,
            3..=4 => SampleType::Bit2,
            5..=16 => SampleType::Bit4,
            _ => SampleType::Uint8,
        }
    }

    /// Serialize for the `palette` column.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(5 + self.entries.len() * 3);
        blob.push(PALETTE_START);
        blob.push(PALETTE_MARKER);
        blob.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for e in &self.entries {
            blob.extend_from_slice(&[e.red, e.green, e.blue]);
        }
        blob.push(PALETTE_END);
        blob
    }

    pub fn from_blob(blob: &[u8]) -> RasterResult<Self> {
        if blob.len() < 5 || blob[0] != PALETTE_START || blob[1] != PALETTE_MARKER {
            return Err(RasterError::Codec("invalid palette blob header".into()));
        }
        let n = u16::from_le_bytes([blob[2], blob[3]]) as usize;
        if n > MAX_PALETTE_ENTRIES || blob.len() != 5 + n * 3 || blob[blob.len() - 1] != PALETTE_END {
            return Err(RasterError::Codec("invalid palette blob length".into()));
        }
        let entries = blob[4..4 + n * 3]
            .chunks_exact(3)
            .map(|c| PaletteEntry::new(c[0], c[1], c[2]))
            .collect();
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_black_and_bounded() {
        let p = Palette::new(4).unwrap();
        assert!(p.entries().iter().all(|e| *e == PaletteEntry::new(0, 0, 0)));
        assert!(Palette::new(256).is_ok());
        assert!(Palette::new(257).is_err());
        assert!(p.get(4).is_err());
    }

    #[test]
    fn test_index_of_returns_first_match() {
        let mut p = Palette::new(3).unwrap();
        p.set(1, PaletteEntry::new(10, 20, 30)).unwrap();
        p.set(2, PaletteEntry::new(10, 20, 30)).unwrap();
        assert_eq!(p.index_of(10, 20, 30), Some(1));
        assert_eq!(p.index_of(0, 0, 0), Some(0));
        assert_eq!(p.index_of(1, 1, 1), None);
        assert!(p.set(3, PaletteEntry::gray(1)).is_err());
    }

    #[test]
    fn test_classify() {
        let mono = Palette::from_entries(vec![PaletteEntry::gray(255), PaletteEntry::gray(0)]).unwrap();
        assert_eq!(mono.classify(), PaletteKind::Monochrome);

        let reversed = Palette::from_entries(vec![PaletteEntry::gray(0), PaletteEntry::gray(255)]).unwrap();
        assert_eq!(reversed.classify(), PaletteKind::GenericGray);

        for st in [SampleType::Bit2, SampleType::Bit4, SampleType::Uint8] {
            let ramp = Palette::gray_ramp(st).unwrap();
            assert_eq!(ramp.classify(), PaletteKind::Grayscale(st));
        }

        let two_bit: Vec<u8> = Palette::gray_ramp(SampleType::Bit2).unwrap().entries().iter().map(|e| e.red).collect();
        assert_eq!(two_bit, vec![0, 85, 170, 255]);

        let mut rgb = Palette::gray_ramp(SampleType::Bit4).unwrap();
        rgb.set(3, PaletteEntry::new(255, 0, 0)).unwrap();
        assert_eq!(rgb.classify(), PaletteKind::GenericRgb);
        assert!(!rgb.classify().is_gray());
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut p = Palette::new(5).unwrap();
        p.set(4, PaletteEntry::new(1, 2, 3)).unwrap();
        let back = Palette::from_blob(&p.to_blob()).unwrap();
        assert_eq!(p, back);
        assert!(Palette::from_blob(&[0, 0xC8, 9, 0, 0xC9]).is_err());
    }
}
