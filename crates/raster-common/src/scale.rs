//! Decode scale factors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RasterError, RasterResult};

/// Reduction applied when decoding a tile: 1:1, 1:2, 1:4 or 1:8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scale {
    X1,
    X2,
    X4,
    X8,
}

impl Scale {
    pub const ALL: [Scale; 4] = [Scale::X1, Scale::X2, Scale::X4, Scale::X8];

    pub fn factor(&self) -> u32 {
        match self {
            Scale::X1 => 1,
            Scale::X2 => 2,
            Scale::X4 => 4,
            Scale::X8 => 8,
        }
    }

    pub fn from_factor(factor: u32) -> RasterResult<Self> {
        match factor {
            1 => Ok(Scale::X1),
            2 => Ok(Scale::X2),
            4 => Ok(Scale::X4),
            8 => Ok(Scale::X8),
            other => Err(RasterError::invalid(format!(
                "scale factor {} is not 1, 2, 4 or 8",
                other
            ))),
        }
    }

    /// Output length of an axis of `len` pixels decoded at this scale.
    pub fn reduce(&self, len: u32) -> u32 {
        len.div_ceil(self.factor())
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{}", self.factor())
    }
}
