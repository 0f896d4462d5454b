//! Hypothesis selection and projection of scan records into the scene.

use rayon::prelude::*;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::observer::{PipelineObserver, Stage};
use crate::core::records::{ScanRecord, ScanSeries};
use crate::core::transforms::{
    polar_to_scene, reflectivity_density, resolution_cell_volume, select_hypothesis, Hypothesis,
    Limits, LimitsError,
};

/// Errors that can occur when configuring the projector.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid {axis} limits: {source}")]
    InvalidLimits {
        axis: &'static str,
        #[source]
        source: LimitsError,
    },

    #[error("Sensor parameter {name} must be finite and positive, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Validated sensor and scene parameters for projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    pub azimuth_beamwidth: f64,
    pub elevation_beamwidth: f64,
    pub range_resolution: f64,
    pub x_limits: Limits,
    pub y_limits: Limits,
    pub azimuth_shift: f64,
}

fn positive(name: &'static str, value: f64) -> Result<f64, ProjectionError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ProjectionError::InvalidParameter { name, value })
    }
}

impl ProjectionParams {
    /// Validate raw parameters. Limits go through [`Limits::new`], the same
    /// rejection policy the region generator uses.
    pub fn new(
        azimuth_beamwidth: f64,
        elevation_beamwidth: f64,
        range_resolution: f64,
        x_limits: [f64; 2],
        y_limits: [f64; 2],
        azimuth_shift: f64,
    ) -> Result<Self, ProjectionError> {
        let x_limits = Limits::from_pair(x_limits)
            .map_err(|source| ProjectionError::InvalidLimits { axis: "x", source })?;
        let y_limits = Limits::from_pair(y_limits)
            .map_err(|source| ProjectionError::InvalidLimits { axis: "y", source })?;
        if !azimuth_shift.is_finite() {
            return Err(ProjectionError::InvalidParameter {
                name: "azimuth_shift",
                value: azimuth_shift,
            });
        }

        Ok(Self {
            azimuth_beamwidth: positive("azimuth_beamwidth", azimuth_beamwidth)?,
            elevation_beamwidth: positive("elevation_beamwidth", elevation_beamwidth)?,
            range_resolution: positive("range_resolution", range_resolution)?,
            x_limits,
            y_limits,
            azimuth_shift,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ProjectionError> {
        Self::new(
            config.sensor.azimuth_beamwidth_rad,
            config.sensor.elevation_beamwidth_rad,
            config.sensor.range_resolution_m,
            config.scene.x_limits,
            config.scene.y_limits,
            config.sensor.azimuth_shift_rad,
        )
    }
}

/// One projected detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionPoint {
    pub x: f64,
    pub y: f64,
    pub eta: f64,
    pub hypothesis: Hypothesis,
    pub valid: bool,
}

/// Project one record through its more probable hypothesis.
pub fn project_record(record: &ScanRecord, params: &ProjectionParams) -> DetectionPoint {
    let hypothesis = select_hypothesis(record.probability[0], record.probability[1]);
    let h = hypothesis.index();

    let (x, y) = polar_to_scene(record.range_m, record.azimuth[h], params.azimuth_shift);
    let volume = resolution_cell_volume(
        record.range_m,
        params.azimuth_beamwidth,
        params.elevation_beamwidth,
        params.range_resolution,
    );
    let eta = reflectivity_density(record.rcs_dbsm[h], volume);

    let valid = eta.is_finite() && params.x_limits.contains(x) && params.y_limits.contains(y);

    DetectionPoint {
        x,
        y,
        eta,
        hypothesis,
        valid,
    }
}

/// Projection of one snapshot.
///
/// `x`, `y` and `eta` hold only valid detections, in slot order. `valid_mask`
/// and `hypotheses` are indexed by the original slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotProjection {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub eta: Vec<f64>,
    pub valid_mask: Vec<bool>,
    pub hypotheses: Vec<Hypothesis>,
}

impl SnapshotProjection {
    /// Number of valid detections.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Original slot index of each valid detection.
    pub fn valid_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.valid_mask
            .iter()
            .enumerate()
            .filter_map(|(slot, &valid)| valid.then_some(slot))
    }
}

/// Project one snapshot's detections.
pub fn project(records: &[ScanRecord], params: &ProjectionParams) -> SnapshotProjection {
    let mut out = SnapshotProjection {
        x: Vec::with_capacity(records.len()),
        y: Vec::with_capacity(records.len()),
        eta: Vec::with_capacity(records.len()),
        valid_mask: Vec::with_capacity(records.len()),
        hypotheses: Vec::with_capacity(records.len()),
    };

    for record in records {
        let point = project_record(record, params);
        out.valid_mask.push(point.valid);
        out.hypotheses.push(point.hypothesis);
        if point.valid {
            out.x.push(point.x);
            out.y.push(point.y);
            out.eta.push(point.eta);
        }
    }

    out
}

/// Dense `[snapshot][slot]` matrices with NaN in empty or rejected slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionMatrices {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<Vec<f64>>,
    pub values: Vec<Vec<f64>>,
}

impl DetectionMatrices {
    /// All-NaN matrices of the given shape.
    pub fn sentinel(snapshots: usize, slots: usize) -> Self {
        Self {
            x: vec![vec![f64::NAN; slots]; snapshots],
            y: vec![vec![f64::NAN; slots]; snapshots],
            values: vec![vec![f64::NAN; slots]; snapshots],
        }
    }

    /// Number of snapshots.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Number of non-sentinel cells in snapshot `k`.
    pub fn valid_count(&self, k: usize) -> usize {
        self.x
            .get(k)
            .map_or(0, |row| row.iter().filter(|v| !v.is_nan()).count())
    }

    /// Number of non-sentinel cells across all snapshots.
    pub fn total_valid(&self) -> usize {
        (0..self.len()).map(|k| self.valid_count(k)).sum()
    }
}

/// Projection of a whole scan series.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedSeries {
    pub capacity: usize,
    pub snapshots: Vec<SnapshotProjection>,
}

impl ProjectedSeries {
    /// Scatter valid detections back into their original slots.
    ///
    /// Rows are `capacity` wide; slots at or past it are dropped.
    pub fn to_matrices(&self) -> DetectionMatrices {
        let mut out = DetectionMatrices::sentinel(self.snapshots.len(), self.capacity);

        for (k, snapshot) in self.snapshots.iter().enumerate() {
            let points = snapshot
                .x
                .iter()
                .zip(&snapshot.y)
                .zip(&snapshot.eta)
                .map(|((&x, &y), &eta)| (x, y, eta));
            for (slot, (x, y, eta)) in snapshot.valid_slots().zip(points) {
                if slot >= self.capacity {
                    break;
                }
                out.x[k][slot] = x;
                out.y[k][slot] = y;
                out.values[k][slot] = eta;
            }
        }

        out
    }

    pub fn total_valid(&self) -> usize {
        self.snapshots.iter().map(SnapshotProjection::len).sum()
    }
}

/// Project every snapshot of a series in parallel, assembled by index.
pub fn project_series(
    series: &ScanSeries,
    params: &ProjectionParams,
    observer: &dyn PipelineObserver,
) -> ProjectedSeries {
    observer.on_stage_start(Stage::Project, series.len());

    let snapshots = series
        .snapshots()
        .par_iter()
        .enumerate()
        .map(|(k, records)| {
            let projection = project(records, params);
            observer.on_snapshot(Stage::Project, k + 1);
            projection
        })
        .collect();

    observer.on_stage_finish(Stage::Project);

    ProjectedSeries {
        capacity: series.capacity(),
        snapshots,
    }
}
