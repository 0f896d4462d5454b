//! Parsed measurement records and the per-snapshot series built from them.

use std::collections::BTreeMap;
use std::fmt;

use super::loaders::ScanField;

/// Sensor mode a detection row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanType {
    Near,
    Far,
}

impl ScanType {
    pub const ALL: [ScanType; 2] = [ScanType::Near, ScanType::Far];

    pub fn name(self) -> &'static str {
        match self {
            ScanType::Near => "near",
            ScanType::Far => "far",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Class of a raw row, decoded from its label column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    Status,
    Detection(ScanType),
}

/// One detection row with both ambiguous angle/RCS hypotheses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRecord {
    pub snapshot: usize,
    pub timestamp_ms: f64,
    pub detection_count: f64,
    pub range_m: f64,
    pub radial_velocity: f64,
    pub azimuth: [f64; 2],
    pub elevation: f64,
    pub rcs_dbsm: [f64; 2],
    pub probability: [f64; 2],
    pub range_variance: f64,
    pub radial_velocity_variance: f64,
    pub azimuth_variance: [f64; 2],
    pub elevation_variance: f64,
    pub prob_detection: f64,
    pub snr: f64,
    pub integrated_power: f64,
}

impl ScanRecord {
    /// Value of one schema field.
    pub fn field(&self, field: ScanField) -> f64 {
        match field {
            ScanField::Timestamp => self.timestamp_ms,
            ScanField::DetectionCount => self.detection_count,
            ScanField::Range => self.range_m,
            ScanField::RadialVelocity => self.radial_velocity,
            ScanField::Azimuth0 => self.azimuth[0],
            ScanField::Azimuth1 => self.azimuth[1],
            ScanField::Elevation => self.elevation,
            ScanField::Rcs0 => self.rcs_dbsm[0],
            ScanField::Rcs1 => self.rcs_dbsm[1],
            ScanField::Prob0 => self.probability[0],
            ScanField::Prob1 => self.probability[1],
            ScanField::RangeVariance => self.range_variance,
            ScanField::RadialVelocityVariance => self.radial_velocity_variance,
            ScanField::Azimuth0Variance => self.azimuth_variance[0],
            ScanField::Azimuth1Variance => self.azimuth_variance[1],
            ScanField::ElevationVariance => self.elevation_variance,
            ScanField::ProbDetection => self.prob_detection,
            ScanField::Snr => self.snr,
            ScanField::IntegratedPower => self.integrated_power,
        }
    }
}

/// A status row. It marks the existence of a snapshot and carries its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub snapshot: usize,
    pub timestamp_ms: f64,
    pub fields: Vec<String>,
}

/// Ragged per-snapshot detections of one scan type.
///
/// `capacity` is the slot count used when the series is flattened into
/// dense `[snapshot][slot]` matrices; no snapshot holds more records than it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSeries {
    scan: ScanType,
    capacity: usize,
    snapshots: Vec<Vec<ScanRecord>>,
}

impl ScanSeries {
    /// Build a series. Snapshots longer than `capacity` are truncated to it.
    pub fn new(scan: ScanType, capacity: usize, mut snapshots: Vec<Vec<ScanRecord>>) -> Self {
        for row in &mut snapshots {
            row.truncate(capacity);
        }
        Self {
            scan,
            capacity,
            snapshots,
        }
    }

    #[inline]
    pub fn scan(&self) -> ScanType {
        self.scan
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records of every snapshot, left-aligned in slot order.
    #[inline]
    pub fn snapshots(&self) -> &[Vec<ScanRecord>] {
        &self.snapshots
    }

    /// Number of snapshots in the series.
    #[inline]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Number of populated slots in snapshot `k` (0-based).
    pub fn valid_count(&self, k: usize) -> usize {
        self.snapshots.get(k).map_or(0, Vec::len)
    }

    /// Total number of detections across the series.
    pub fn total_detections(&self) -> usize {
        self.snapshots.iter().map(Vec::len).sum()
    }

    /// Dense `[snapshot][slot]` matrix of one field, NaN in unpopulated slots.
    pub fn field_matrix(&self, field: ScanField) -> Vec<Vec<f64>> {
        self.snapshots
            .iter()
            .map(|row| {
                let mut dense = vec![f64::NAN; self.capacity];
                for (slot, record) in row.iter().enumerate() {
                    dense[slot] = record.field(field);
                }
                dense
            })
            .collect()
    }

    /// Every field matrix keyed by field name.
    pub fn field_arrays(&self) -> BTreeMap<&'static str, Vec<Vec<f64>>> {
        ScanField::ALL
            .iter()
            .map(|&field| (field.name(), self.field_matrix(field)))
            .collect()
    }
}

/// Immutable result of ingesting one raw table.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSeries {
    pub header: Vec<String>,
    pub status: Vec<StatusRecord>,
    /// Timestamp of each snapshot, NaN when no status row carries one.
    pub timestamps_ms: Vec<f64>,
    pub near: ScanSeries,
    pub far: ScanSeries,
}

impl SnapshotSeries {
    /// Number of snapshots N shared by every per-snapshot array.
    #[inline]
    pub fn snapshot_count(&self) -> usize {
        self.timestamps_ms.len()
    }

    pub fn scan(&self, scan: ScanType) -> &ScanSeries {
        match scan {
            ScanType::Near => &self.near,
            ScanType::Far => &self.far,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_record(snapshot: usize, range_m: f64, azimuth: f64) -> ScanRecord {
    ScanRecord {
        snapshot,
        timestamp_ms: 0.0,
        detection_count: 1.0,
        range_m,
        radial_velocity: 0.0,
        azimuth: [azimuth, azimuth],
        elevation: 0.0,
        rcs_dbsm: [10.0, 10.0],
        probability: [0.9, 0.1],
        range_variance: 0.0,
        radial_velocity_variance: 0.0,
        azimuth_variance: [0.0, 0.0],
        elevation_variance: 0.0,
        prob_detection: 1.0,
        snr: 20.0,
        integrated_power: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_matrix_pads_with_nan() {
        let series = ScanSeries::new(
            ScanType::Near,
            3,
            vec![
                vec![test_record(1, 5.0, 0.0), test_record(1, 6.0, 0.0)],
                vec![],
            ],
        );

        let ranges = series.field_matrix(ScanField::Range);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0][0], 5.0);
        assert_eq!(ranges[0][1], 6.0);
        assert!(ranges[0][2].is_nan());
        assert!(ranges[1].iter().all(|v| v.is_nan()));

        assert_eq!(series.valid_count(0), 2);
        assert_eq!(series.valid_count(1), 0);
        assert_eq!(series.valid_count(7), 0);
        assert_eq!(series.total_detections(), 2);
    }

    #[test]
    fn test_new_truncates_to_capacity() {
        let series = ScanSeries::new(
            ScanType::Near,
            1,
            vec![vec![test_record(1, 5.0, 0.0), test_record(1, 6.0, 0.0)]],
        );

        assert_eq!(series.capacity(), 1);
        assert_eq!(series.valid_count(0), 1);
        assert_eq!(series.snapshots()[0][0].range_m, 5.0);

        let ranges = series.field_matrix(ScanField::Range);
        assert_eq!(ranges, vec![vec![5.0]]);
    }

    #[test]
    fn test_field_arrays_keyed_by_name() {
        let series = ScanSeries::new(ScanType::Far, 1, vec![vec![test_record(1, 5.0, 0.1)]]);
        let arrays = series.field_arrays();

        assert_eq!(arrays.len(), ScanField::ALL.len());
        assert_eq!(arrays["range"][0][0], 5.0);
        assert_eq!(arrays["azimuth0"][0][0], 0.1);
        assert_eq!(arrays["prob1"][0][0], 0.1);
    }
}
