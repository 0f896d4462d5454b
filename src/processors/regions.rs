//! Per-snapshot rectangular regions of interest.

use thiserror::Error;

use crate::config::RegionConfig;
use crate::core::transforms::{Limits, LimitsError};

/// Errors that can occur while generating regions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegionError {
    #[error("Invalid {axis} limits for snapshot {snapshot}: {source}")]
    InvalidLimits {
        axis: &'static str,
        snapshot: usize,
        #[source]
        source: LimitsError,
    },

    #[error("Expected limits for {expected} snapshots, got {found}")]
    LimitCountMismatch { expected: usize, found: usize },

    #[error("Shape mismatch: {what} has length {found}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Down-range limits for the region sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionLimits {
    /// One pair shared by every snapshot.
    Fixed([f64; 2]),
    /// One pair per snapshot.
    PerSnapshot(Vec<[f64; 2]>),
}

impl RegionLimits {
    pub fn from_config(config: &RegionConfig) -> Self {
        match &config.per_snapshot_limits {
            Some(limits) => RegionLimits::PerSnapshot(limits.clone()),
            None => RegionLimits::Fixed(config.down_range_limits),
        }
    }
}

/// Four-corner polygon: bottom-left, bottom-right, top-right, top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub corners: [(f64, f64); 4],
}

impl BoundingRegion {
    /// Axis-aligned rectangle from two corner coordinates in either order.
    ///
    /// The bounds are sorted, so the corner order holds whichever value of
    /// each pair is larger.
    pub fn from_bounds(x: [f64; 2], y: [f64; 2]) -> Self {
        let (x0, x1) = (x[0].min(x[1]), x[0].max(x[1]));
        let (y0, y1) = (y[0].min(y[1]), y[0].max(y[1]));
        Self {
            corners: [(x0, y0), (x1, y0), (x1, y1), (x0, y1)],
        }
    }

    /// Rectangle from validated cross-range and down-range limits.
    pub fn from_limits(x: Limits, y: Limits) -> Self {
        Self::from_bounds([x.min(), x.max()], [y.min(), y.max()])
    }

    /// Signed area (shoelace). Positive for counter-clockwise corners.
    pub fn area(&self) -> f64 {
        let c = &self.corners;
        let mut twice = 0.0;
        for i in 0..4 {
            let (xa, ya) = c[i];
            let (xb, yb) = c[(i + 1) % 4];
            twice += xa * yb - xb * ya;
        }
        twice / 2.0
    }

    /// Zero-area (or non-finite) regions contain nothing.
    pub fn is_degenerate(&self) -> bool {
        let area = self.area();
        !area.is_finite() || area == 0.0
    }

    /// Inclusive point-in-polygon test.
    ///
    /// Points on an edge or corner are inside. NaN coordinates are never
    /// inside, and a degenerate region contains nothing.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() || self.is_degenerate() {
            return false;
        }

        let c = &self.corners;
        let mut inside = false;
        for i in 0..4 {
            let (xa, ya) = c[i];
            let (xb, yb) = c[(i + 1) % 4];

            if on_segment(x, y, xa, ya, xb, yb) {
                return true;
            }

            // Crossing-number test on a ray toward +x
            if (ya > y) != (yb > y) {
                let x_cross = xa + (y - ya) * (xb - xa) / (yb - ya);
                if x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn on_segment(px: f64, py: f64, xa: f64, ya: f64, xb: f64, yb: f64) -> bool {
    let cross = (xb - xa) * (py - ya) - (yb - ya) * (px - xa);
    cross == 0.0
        && px >= xa.min(xb)
        && px <= xa.max(xb)
        && py >= ya.min(yb)
        && py <= ya.max(yb)
}

/// Build one region per snapshot.
///
/// Cross-range spans `[-half_width, +half_width]`; down-range comes from
/// `limits`. With [`RegionLimits::Fixed`] every region is identical.
///
/// # Errors
///
/// Limits are validated with [`Limits::new`]: non-finite or inverted
/// (`min >= max`) values are rejected, as they are by the projector. A
/// per-snapshot sequence must have exactly `snapshot_count` entries.
pub fn make_regions(
    snapshot_count: usize,
    limits: &RegionLimits,
    half_width: f64,
) -> Result<Vec<BoundingRegion>, RegionError> {
    let cross = Limits::new(-half_width, half_width).map_err(|source| RegionError::InvalidLimits {
        axis: "cross-range",
        snapshot: 0,
        source,
    })?;

    match limits {
        RegionLimits::Fixed(pair) => {
            let down = Limits::from_pair(*pair).map_err(|source| RegionError::InvalidLimits {
                axis: "down-range",
                snapshot: 0,
                source,
            })?;
            Ok(vec![BoundingRegion::from_limits(cross, down); snapshot_count])
        }
        RegionLimits::PerSnapshot(pairs) => {
            if pairs.len() != snapshot_count {
                return Err(RegionError::LimitCountMismatch {
                    expected: snapshot_count,
                    found: pairs.len(),
                });
            }
            pairs
                .iter()
                .enumerate()
                .map(|(k, pair)| {
                    Limits::from_pair(*pair)
                        .map(|down| BoundingRegion::from_limits(cross, down))
                        .map_err(|source| RegionError::InvalidLimits {
                            axis: "down-range",
                            snapshot: k + 1,
                            source,
                        })
                })
                .collect()
        }
    }
}

/// Build regions from configuration.
pub fn make_regions_from_config(
    snapshot_count: usize,
    config: &RegionConfig,
) -> Result<Vec<BoundingRegion>, RegionError> {
    make_regions(
        snapshot_count,
        &RegionLimits::from_config(config),
        config.cross_range_half_width_m,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_regions_are_identical() {
        let regions = make_regions(4, &RegionLimits::Fixed([0.0, 70.0]), 2.5).unwrap();

        assert_eq!(regions.len(), 4);
        assert!(regions.iter().all(|r| *r == regions[0]));
        assert_eq!(
            regions[0].corners,
            [(-2.5, 0.0), (2.5, 0.0), (2.5, 70.0), (-2.5, 70.0)]
        );
    }

    #[test]
    fn test_zero_snapshots() {
        let regions = make_regions(0, &RegionLimits::Fixed([0.0, 70.0]), 2.5).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_per_snapshot_regions() {
        let limits = RegionLimits::PerSnapshot(vec![[0.0, 10.0], [5.0, 20.0]]);
        let regions = make_regions(2, &limits, 2.5).unwrap();

        assert_eq!(regions[0].corners[2], (2.5, 10.0));
        assert_eq!(regions[1].corners[0], (-2.5, 5.0));
        assert_eq!(regions[1].corners[3], (-2.5, 20.0));
    }

    #[test]
    fn test_per_snapshot_count_mismatch() {
        let limits = RegionLimits::PerSnapshot(vec![[0.0, 10.0]]);
        assert_eq!(
            make_regions(3, &limits, 2.5),
            Err(RegionError::LimitCountMismatch {
                expected: 3,
                found: 1
            })
        );
    }

    #[test]
    fn test_degenerate_limits_are_rejected() {
        let err = make_regions(2, &RegionLimits::Fixed([30.0, 30.0]), 2.5).unwrap_err();
        assert!(matches!(
            err,
            RegionError::InvalidLimits {
                axis: "down-range",
                source: LimitsError::Inverted { .. },
                ..
            }
        ));

        let limits = RegionLimits::PerSnapshot(vec![[0.0, 10.0], [f64::NAN, 10.0]]);
        assert!(matches!(
            make_regions(2, &limits, 2.5),
            Err(RegionError::InvalidLimits { snapshot: 2, .. })
        ));

        assert!(make_regions(1, &RegionLimits::Fixed([0.0, 10.0]), 0.0).is_err());
    }

    #[test]
    fn test_corner_order_regardless_of_bound_order() {
        let a = BoundingRegion::from_bounds([2.5, -2.5], [70.0, 0.0]);
        let b = BoundingRegion::from_bounds([-2.5, 2.5], [0.0, 70.0]);
        assert_eq!(a, b);
        assert_eq!(a.corners[0], (-2.5, 0.0));
        assert_eq!(a.corners[1], (2.5, 0.0));
        assert_eq!(a.corners[2], (2.5, 70.0));
        assert_eq!(a.corners[3], (-2.5, 70.0));
        assert!(a.area() > 0.0);
    }

    #[test]
    fn test_contains_inclusive_boundary() {
        let region = BoundingRegion::from_bounds([-2.5, 2.5], [0.0, 70.0]);

        assert!(region.contains(0.0, 35.0));
        assert!(region.contains(-2.5, 10.0));
        assert!(region.contains(2.5, 10.0));
        assert!(region.contains(1.0, 0.0));
        assert!(region.contains(1.0, 70.0));
        assert!(region.contains(2.5, 70.0));
        assert!(region.contains(-2.5, 0.0));

        assert!(!region.contains(2.6, 10.0));
        assert!(!region.contains(0.0, -0.1));
        assert!(!region.contains(0.0, 70.1));
        assert!(!region.contains(f64::NAN, 10.0));
        assert!(!region.contains(0.0, f64::NAN));
    }

    #[test]
    fn test_degenerate_region_contains_nothing() {
        let flat = BoundingRegion::from_bounds([-2.5, 2.5], [10.0, 10.0]);
        assert!(flat.is_degenerate());
        assert!(!flat.contains(0.0, 10.0));
    }

    #[test]
    fn test_regions_from_config() {
        let config = RegionConfig::default();
        let regions = make_regions_from_config(3, &config).unwrap();
        assert_eq!(regions.len(), 3);

        let config = RegionConfig {
            per_snapshot_limits: Some(vec![[0.0, 5.0]]),
            ..RegionConfig::default()
        };
        assert!(make_regions_from_config(3, &config).is_err());
    }
}
