//! CSV writers for filtered detections and regions of interest.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::processors::cartesian::DetectionMatrices;
use crate::processors::regions::BoundingRegion;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Timestamps do not cover every snapshot.
    #[error("length mismatch: {snapshots} snapshots but {timestamps} timestamps")]
    LengthMismatch { snapshots: usize, timestamps: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write non-sentinel detections as `snapshot,slot,timestamp_ms,x,y,eta`.
///
/// Snapshots and slots are 1-based. Cells where `x` is NaN are skipped.
///
/// # Errors
///
/// Returns an error if `timestamps_ms` does not have one entry per snapshot
/// or the file cannot be written.
///
/// # Example
///
/// ```no_run
/// use radar_scan_pipeline::core::writers::write_detections_csv;
/// use radar_scan_pipeline::processors::cartesian::DetectionMatrices;
/// use std::path::Path;
///
/// let detections = DetectionMatrices::sentinel(2, 4);
/// write_detections_csv(Path::new("near.csv"), &detections, &[0.0, 50.0]).unwrap();
/// ```
pub fn write_detections_csv(
    path: &Path,
    detections: &DetectionMatrices,
    timestamps_ms: &[f64],
) -> Result<usize> {
    if timestamps_ms.len() != detections.len() {
        return Err(WriteError::LengthMismatch {
            snapshots: detections.len(),
            timestamps: timestamps_ms.len(),
        });
    }

    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();
    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    writer
        .write_record(["snapshot", "slot", "timestamp_ms", "x", "y", "eta"])
        .map_err(csv_err)?;

    let mut written = 0;
    for (k, row) in detections.x.iter().enumerate() {
        for (j, &x) in row.iter().enumerate() {
            if x.is_nan() {
                continue;
            }
            writer
                .write_record(&[
                    (k + 1).to_string(),
                    (j + 1).to_string(),
                    format!("{:.3}", timestamps_ms[k]),
                    format!("{:.6}", x),
                    format!("{:.6}", detections.y[k][j]),
                    format!("{:.6e}", detections.values[k][j]),
                ])
                .map_err(csv_err)?;
            written += 1;
        }
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(written)
}

/// Write one row per region corner as `snapshot,corner,x,y`.
///
/// Corners are numbered 1..=4 in bottom-left, bottom-right, top-right,
/// top-left order.
pub fn write_regions_csv(path: &Path, regions: &[BoundingRegion]) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();
    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    writer
        .write_record(["snapshot", "corner", "x", "y"])
        .map_err(csv_err)?;

    for (k, region) in regions.iter().enumerate() {
        for (c, &(x, y)) in region.corners.iter().enumerate() {
            writer
                .write_record(&[
                    (k + 1).to_string(),
                    (c + 1).to_string(),
                    format!("{:.6}", x),
                    format!("{:.6}", y),
                ])
                .map_err(csv_err)?;
        }
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(())
}
