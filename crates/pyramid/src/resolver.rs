//! Best-level selection over stored pyramid resolutions.
//!
//! Every stored pyramid level can be decoded at 1:1, 1:2, 1:4 or 1:8, so a
//! level row at resolution `r` offers the candidates `r`, `2r`, `4r`, `8r`.

use raster_common::Scale;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PyramidError, Result};

/// Relative slack when comparing resolutions read back from the database.
const RES_EPSILON: f64 = 1e-9;

/// One row of a `_levels` / `_section_levels` table: a level's 1:1 resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRow {
    pub pyramid_level: u32,
    pub x_res: f64,
    pub y_res: f64,
}

/// A (level, scale) pair and the ground resolution it yields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLevel {
    pub pyramid_level: u32,
    pub scale: Scale,
    pub x_res: f64,
    pub y_res: f64,
    /// Reduction relative to the finest candidate (1, 2, 4, ...).
    pub real_scale: u32,
}

/// All (level, scale) candidates ordered finest first.
///
/// Candidates sharing a resolution are ordered by pyramid level. The real
/// scale starts at 1 and doubles with every coarser distinct resolution.
pub fn resolution_ladder(rows: &[LevelRow]) -> Vec<ResolutionLevel> {
    let mut ladder: Vec<ResolutionLevel> = rows
        .iter()
        .flat_map(|row| {
            Scale::ALL.into_iter().map(move |scale| ResolutionLevel {
                pyramid_level: row.pyramid_level,
                scale,
                x_res: row.x_res * scale.factor() as f64,
                y_res: row.y_res * scale.factor() as f64,
                real_scale: 1,
            })
        })
        .collect();
    ladder.sort_by(|a, b| {
        a.x_res
            .total_cmp(&b.x_res)
            .then(a.pyramid_level.cmp(&b.pyramid_level))
            .then(a.scale.cmp(&b.scale))
    });

    let mut real_scale = 1u32;
    let mut previous: Option<f64> = None;
    for entry in &mut ladder {
        if let Some(prev) = previous {
            if !same_res(prev, entry.x_res) {
                real_scale = real_scale.saturating_mul(2);
            }
        }
        entry.real_scale = real_scale;
        previous = Some(entry.x_res);
    }
    ladder
}

fn same_res(a: f64, b: f64) -> bool {
    (a - b).abs() <= RES_EPSILON * a.abs().max(b.abs())
}

fn not_coarser(actual: f64, requested: f64) -> bool {
    actual <= requested || same_res(actual, requested)
}

/// Pick the level and scale for a requested resolution.
///
/// Chooses the coarsest candidate whose resolution is still at least as fine
/// as the request on both axes, preferring the lowest pyramid level among
/// equal resolutions. When every candidate is coarser than the request the
/// finest level (level 0, scale 1:1) is returned.
pub fn find_best_level(x_res: f64, y_res: f64, rows: &[LevelRow]) -> Result<ResolutionLevel> {
    if !(x_res.is_finite() && y_res.is_finite() && x_res > 0.0 && y_res > 0.0) {
        return Err(PyramidError::InvalidResolution { x_res, y_res });
    }
    let ladder = resolution_ladder(rows);
    let Some(finest) = ladder.first().copied() else {
        return Err(PyramidError::NoLevels("coverage".to_string()));
    };

    let mut best: Option<ResolutionLevel> = None;
    for candidate in &ladder {
        if !(not_coarser(candidate.x_res, x_res) && not_coarser(candidate.y_res, y_res)) {
            continue;
        }
        best = match best {
            None => Some(*candidate),
            Some(current) if candidate.x_res > current.x_res && !same_res(candidate.x_res, current.x_res) => {
                Some(*candidate)
            }
            keep => keep,
        };
    }

    let chosen = best.unwrap_or(finest);
    debug!(
        requested_x = x_res,
        requested_y = y_res,
        level = chosen.pyramid_level,
        scale = %chosen.scale,
        "Resolved pyramid level"
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<LevelRow> {
        [(0, 1.0), (1, 2.0), (2, 4.0)]
            .into_iter()
            .map(|(pyramid_level, r)| LevelRow {
                pyramid_level,
                x_res: r,
                y_res: r,
            })
            .collect()
    }

    #[test]
    fn test_between_levels_picks_finer() {
        let best = find_best_level(1.5, 1.5, &rows()).unwrap();
        assert_eq!((best.pyramid_level, best.scale), (0, Scale::X1));
        assert_eq!(best.real_scale, 1);
    }

    #[test]
    fn test_finer_than_everything_falls_back() {
        let best = find_best_level(0.1, 0.1, &rows()).unwrap();
        assert_eq!((best.pyramid_level, best.scale), (0, Scale::X1));
        assert_eq!(best.x_res, 1.0);
    }

    #[test]
    fn test_equal_resolution_prefers_lowest_level() {
        // Level 0 at 1:2 and level 1 at 1:1 both give 2.0.
        let best = find_best_level(2.0, 2.0, &rows()).unwrap();
        assert_eq!((best.pyramid_level, best.scale), (0, Scale::X2));
        assert_eq!(best.real_scale, 2);
    }

    #[test]
    fn test_coarse_request_uses_coarsest_level() {
        let best = find_best_level(100.0, 100.0, &rows()).unwrap();
        assert_eq!((best.pyramid_level, best.scale), (2, Scale::X8));
        assert_eq!(best.x_res, 32.0);
        assert_eq!(best.real_scale, 32);
    }

    #[test]
    fn test_both_axes_must_fit() {
        let best = find_best_level(8.0, 3.0, &rows()).unwrap();
        assert_eq!(best.x_res, 2.0);
        assert_eq!(best.y_res, 2.0);
    }

    #[test]
    fn test_no_levels() {
        assert!(matches!(find_best_level(1.0, 1.0, &[]), Err(PyramidError::NoLevels(_))));
        assert!(find_best_level(0.0, 1.0, &rows()).is_err());
    }

    #[test]
    fn test_ladder_real_scales() {
        let ladder = resolution_ladder(&rows());
        assert_eq!(ladder.len(), 12);
        assert_eq!(ladder[0].real_scale, 1);
        let last = ladder.last().unwrap();
        assert_eq!((last.pyramid_level, last.scale, last.real_scale), (2, Scale::X8, 32));
    }
}
