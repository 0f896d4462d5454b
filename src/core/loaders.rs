//! Raw measurement table loading and the fixed column schema.
//!
//! A raw table is the unparsed text form of a radar log: one header row and
//! one row per measurement record. Every record carries a 1-based snapshot
//! index in column 1 and a class label (status / near / far detection) in a
//! configurable column. The numeric fields live at the fixed positions
//! described by [`ScanField`].

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

/// Minimum number of columns a measurement row must have.
pub const MIN_COLUMNS: usize = 24;

/// 1-based column holding the snapshot index.
pub const SNAPSHOT_COLUMN: usize = 1;

/// Errors that can occur while loading a raw table.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Row {row} has {found} columns, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Numeric per-detection fields and their fixed 1-based column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScanField {
    Timestamp,
    DetectionCount,
    Range,
    RadialVelocity,
    Azimuth0,
    Azimuth1,
    Elevation,
    Rcs0,
    Rcs1,
    Prob0,
    Prob1,
    RangeVariance,
    RadialVelocityVariance,
    Azimuth0Variance,
    Azimuth1Variance,
    ElevationVariance,
    ProbDetection,
    Snr,
    IntegratedPower,
}

impl ScanField {
    /// Every field in schema order.
    pub const ALL: [ScanField; 19] = [
        ScanField::Timestamp,
        ScanField::DetectionCount,
        ScanField::Range,
        ScanField::RadialVelocity,
        ScanField::Azimuth0,
        ScanField::Azimuth1,
        ScanField::Elevation,
        ScanField::Rcs0,
        ScanField::Rcs1,
        ScanField::Prob0,
        ScanField::Prob1,
        ScanField::RangeVariance,
        ScanField::RadialVelocityVariance,
        ScanField::Azimuth0Variance,
        ScanField::Azimuth1Variance,
        ScanField::ElevationVariance,
        ScanField::ProbDetection,
        ScanField::Snr,
        ScanField::IntegratedPower,
    ];

    /// 1-based column of this field in a raw row.
    pub fn column(self) -> usize {
        match self {
            ScanField::Timestamp => 4,
            ScanField::DetectionCount => 6,
            ScanField::Range => 7,
            ScanField::RadialVelocity => 8,
            ScanField::Azimuth0 => 9,
            ScanField::Azimuth1 => 10,
            ScanField::Elevation => 11,
            ScanField::Rcs0 => 12,
            ScanField::Rcs1 => 13,
            ScanField::Prob0 => 14,
            ScanField::Prob1 => 15,
            ScanField::RangeVariance => 16,
            ScanField::RadialVelocityVariance => 17,
            ScanField::Azimuth0Variance => 18,
            ScanField::Azimuth1Variance => 19,
            ScanField::ElevationVariance => 20,
            ScanField::ProbDetection => 21,
            ScanField::Snr => 22,
            ScanField::IntegratedPower => 24,
        }
    }

    /// Name used as the key of the per-field hand-off arrays.
    pub fn name(self) -> &'static str {
        match self {
            ScanField::Timestamp => "timestamp",
            ScanField::DetectionCount => "detection_count",
            ScanField::Range => "range",
            ScanField::RadialVelocity => "radial_velocity",
            ScanField::Azimuth0 => "azimuth0",
            ScanField::Azimuth1 => "azimuth1",
            ScanField::Elevation => "elevation",
            ScanField::Rcs0 => "rcs0",
            ScanField::Rcs1 => "rcs1",
            ScanField::Prob0 => "prob0",
            ScanField::Prob1 => "prob1",
            ScanField::RangeVariance => "range_variance",
            ScanField::RadialVelocityVariance => "radial_velocity_variance",
            ScanField::Azimuth0Variance => "azimuth0_variance",
            ScanField::Azimuth1Variance => "azimuth1_variance",
            ScanField::ElevationVariance => "elevation_variance",
            ScanField::ProbDetection => "prob_detection",
            ScanField::Snr => "snr",
            ScanField::IntegratedPower => "integrated_power",
        }
    }
}

/// Rectangular table of text fields: a header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Returns the number of data rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of columns declared by the header.
    #[inline]
    pub fn width(&self) -> usize {
        self.header.len()
    }
}

/// Load a raw measurement table from a CSV file.
///
/// The first row is kept as the header. Fields are trimmed but otherwise left
/// as text; numeric parsing happens during ingestion so that one bad snapshot
/// does not prevent the rest of the log from loading.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has no data rows, or a row's
/// column count differs from the header's.
pub fn load_raw_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let expected = header.len();

    let mut rows = Vec::with_capacity(4096);
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() != expected {
            return Err(LoaderError::RaggedRow {
                row: idx + 1,
                expected,
                found: record.len(),
            });
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(RawTable { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_schema_columns_are_unique_and_skip_reserved() {
        let columns: HashSet<usize> = ScanField::ALL.iter().map(|f| f.column()).collect();
        assert_eq!(columns.len(), ScanField::ALL.len());
        assert!(!columns.contains(&SNAPSHOT_COLUMN));
        assert!(!columns.contains(&5));
        assert!(!columns.contains(&23));
        assert!(columns.iter().all(|&c| c <= MIN_COLUMNS));
    }

    #[test]
    fn test_load_raw_table() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a, b ,c").unwrap();
        writeln!(file, "1, 2,3").unwrap();
        writeln!(file, "4,5 ,6").unwrap();
        file.flush().unwrap();

        let table = load_raw_table(file.path())?;
        assert_eq!(table.header, vec!["a", "b", "c"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 3);
        assert_eq!(table.rows[0], vec!["1", "2", "3"]);
        assert_eq!(table.rows[1][1], "5");

        Ok(())
    }

    #[test]
    fn test_load_raw_table_rejects_ragged_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,5").unwrap();
        file.flush().unwrap();

        let err = load_raw_table(file.path()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::RaggedRow {
                row: 2,
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_load_raw_table_header_only_is_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_raw_table(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }
}
