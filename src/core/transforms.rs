//! Scalar radar transforms shared by the processors.
//!
//! This module holds the per-detection math: picking the more probable of the
//! two angle/RCS hypotheses, converting a polar measurement to scene
//! coordinates, and normalising RCS by the resolution-cell volume to obtain a
//! reflectivity density.

use thiserror::Error;

/// Smallest range used when computing the resolution-cell volume.
pub const MIN_RANGE_M: f64 = 1e-3;

/// Floor applied to the resolution-cell volume.
pub const MIN_CELL_VOLUME: f64 = 1e-6;

/// RCS values are clamped to `[-MAX_RCS_DBSM, MAX_RCS_DBSM]` before conversion.
pub const MAX_RCS_DBSM: f64 = 5000.0;

/// Errors raised for unusable spatial limits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LimitsError {
    #[error("limits must be finite, got [{min}, {max}]")]
    NonFinite { min: f64, max: f64 },

    #[error("limits must satisfy min < max, got [{min}, {max}]")]
    Inverted { min: f64, max: f64 },
}

/// A validated closed interval `[min, max]` with `min < max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    min: f64,
    max: f64,
}

impl Limits {
    /// Validate and build an interval.
    ///
    /// Non-finite bounds and `min >= max` are rejected; degenerate limits are
    /// never passed through.
    pub fn new(min: f64, max: f64) -> Result<Self, LimitsError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(LimitsError::NonFinite { min, max });
        }
        if min >= max {
            return Err(LimitsError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Build from a `[min, max]` pair as stored in configuration.
    pub fn from_pair(pair: [f64; 2]) -> Result<Self, LimitsError> {
        Self::new(pair[0], pair[1])
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Inclusive membership test. NaN is never contained.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Which of the two reported hypotheses was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hypothesis {
    First,
    Second,
}

impl Hypothesis {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Hypothesis::First => 0,
            Hypothesis::Second => 1,
        }
    }
}

/// Pick hypothesis 0 only when it is strictly more probable.
///
/// Ties and NaN probabilities resolve to hypothesis 1.
#[inline]
pub fn select_hypothesis(prob0: f64, prob1: f64) -> Hypothesis {
    if prob0 > prob1 {
        Hypothesis::First
    } else {
        Hypothesis::Second
    }
}

/// Convert a polar measurement to scene coordinates.
///
/// Cross-range is negated to follow the sensor's mounting convention:
/// `x = -range * tan(azimuth + shift)`, `y = range`.
#[inline]
pub fn polar_to_scene(range_m: f64, azimuth_rad: f64, azimuth_shift_rad: f64) -> (f64, f64) {
    let x = -range_m * (azimuth_rad + azimuth_shift_rad).tan();
    (x, range_m)
}

/// Volume of the sensor resolution cell at a given range.
#[inline]
pub fn resolution_cell_volume(
    range_m: f64,
    azimuth_beamwidth: f64,
    elevation_beamwidth: f64,
    range_resolution: f64,
) -> f64 {
    let vol = range_m.max(MIN_RANGE_M).powi(2) * azimuth_beamwidth * elevation_beamwidth * range_resolution;
    vol.max(MIN_CELL_VOLUME)
}

/// Reflectivity density: linear RCS divided by the cell volume.
///
/// A NaN RCS or volume propagates to a NaN density; an RCS near the clamp
/// bound overflows to infinity. Both are rejected downstream by the finiteness
/// check.
#[inline]
pub fn reflectivity_density(rcs_dbsm: f64, volume: f64) -> f64 {
    let rcs = rcs_dbsm.clamp(-MAX_RCS_DBSM, MAX_RCS_DBSM);
    10f64.powf(rcs / 10.0) / volume
}
