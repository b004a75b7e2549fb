//! Bounding boxes and raster georeferencing.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};

/// An axis-aligned extent in the coverage SRID's units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a bbox, rejecting inverted, empty or non-finite extents.
    pub fn checked(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> RasterResult<Self> {
        let bbox = Self::new(min_x, min_y, max_x, max_y);
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> RasterResult<()> {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_x >= self.max_x || self.min_y >= self.max_y {
            return Err(RasterError::invalid(format!(
                "invalid bounding box {},{},{},{}",
                self.min_x, self.min_y, self.max_x, self.max_y
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if this bbox intersects another (touching edges do not count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Smallest bbox covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Placement of a raster on the ground.
///
/// Pixel (0, 0) is the upper-left corner at (`bbox.min_x`, `bbox.max_y`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Georeference {
    pub srid: i32,
    pub bbox: BoundingBox,
    pub x_res: f64,
    pub y_res: f64,
}

impl Georeference {
    /// Georeference a `width` x `height` raster from its upper-left corner.
    pub fn from_origin(
        srid: i32,
        min_x: f64,
        max_y: f64,
        width: u32,
        height: u32,
        x_res: f64,
        y_res: f64,
    ) -> RasterResult<Self> {
        if !(x_res > 0.0 && y_res > 0.0) {
            return Err(RasterError::invalid(format!(
                "resolution must be positive, got {} x {}",
                x_res, y_res
            )));
        }
        let bbox = BoundingBox::checked(
            min_x,
            max_y - height as f64 * y_res,
            min_x + width as f64 * x_res,
            max_y,
        )?;
        Ok(Self {
            srid,
            bbox,
            x_res,
            y_res,
        })
    }

    /// Ground extent of the pixel block at (`col`, `row`) of size `width` x `height`.
    pub fn block_bbox(&self, col: u32, row: u32, width: u32, height: u32) -> BoundingBox {
        let min_x = self.bbox.min_x + col as f64 * self.x_res;
        let max_y = self.bbox.max_y - row as f64 * self.y_res;
        BoundingBox::new(
            min_x,
            max_y - height as f64 * self.y_res,
            min_x + width as f64 * self.x_res,
            max_y,
        )
    }
}
