//! Raw table ingestion into per-snapshot near/far scan series.
//!
//! Ingestion runs in three phases:
//! 1. Structural validation and row classification. Any failure here is fatal
//!    for the whole table.
//! 2. Per-snapshot parsing of detection rows, in parallel. A bad numeric field
//!    empties that snapshot's scan row and is reported as an [`IngestIssue`].
//! 3. Capacity resolution. Each scan type gets one slot capacity for the whole
//!    series, bounded by the configured ceiling. Snapshots whose row count or
//!    reported count exceeds it are reported, and rows past it are dropped.

use std::fmt;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::{IngestConfig, LabelConfig};
use crate::core::loaders::{RawTable, ScanField, MIN_COLUMNS, SNAPSHOT_COLUMN};
use crate::core::observer::{PipelineObserver, Stage};
use crate::core::records::{
    RowClass, ScanRecord, ScanSeries, ScanType, SnapshotSeries, StatusRecord,
};

/// Fatal ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed input at row {row}: {reason}")]
    MalformedInput { row: usize, reason: String },

    #[error("Invalid ingest configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "{scan} scan, snapshot {snapshot}: {reported} detections exceed capacity ceiling {capacity}"
    )]
    CapacityOverflow {
        scan: ScanType,
        snapshot: usize,
        reported: usize,
        capacity: usize,
    },
}

/// Non-fatal conditions found while ingesting. Rows are 1-based data rows.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestIssue {
    /// A detection row had a non-numeric field; the snapshot's scan row is empty.
    ParseFailure {
        scan: ScanType,
        snapshot: usize,
        row: usize,
        column: usize,
        value: String,
    },
    /// A status row had a non-numeric timestamp; the snapshot timestamp is NaN.
    StatusParseFailure {
        snapshot: usize,
        row: usize,
        value: String,
    },
    /// More detections than the capacity ceiling allows. `dropped` rows past
    /// the capacity were removed; it is 0 when only the count field overflowed.
    CapacityOverflow {
        scan: ScanType,
        snapshot: usize,
        reported: usize,
        capacity: usize,
        dropped: usize,
    },
    /// A row references a snapshot with no matching status row; it was dropped.
    OrphanRow { row: usize, snapshot: usize },
}

impl fmt::Display for IngestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestIssue::ParseFailure {
                scan,
                snapshot,
                row,
                column,
                value,
            } => write!(
                f,
                "{} scan, snapshot {}: row {} column {} is not numeric ({:?}), snapshot emptied",
                scan, snapshot, row, column, value
            ),
            IngestIssue::StatusParseFailure {
                snapshot,
                row,
                value,
            } => write!(
                f,
                "snapshot {}: status row {} has non-numeric timestamp {:?}",
                snapshot, row, value
            ),
            IngestIssue::CapacityOverflow {
                scan,
                snapshot,
                reported,
                capacity,
                dropped,
            } => {
                write!(
                    f,
                    "{} scan, snapshot {}: {} detections exceed capacity {}",
                    scan, snapshot, reported, capacity
                )?;
                if *dropped > 0 {
                    write!(f, ", {} rows dropped", dropped)?;
                }
                Ok(())
            }
            IngestIssue::OrphanRow { row, snapshot } => write!(
                f,
                "row {} references snapshot {} outside the series, dropped",
                row, snapshot
            ),
        }
    }
}

impl IngestIssue {
    /// 1-based snapshot the issue refers to.
    pub fn snapshot(&self) -> usize {
        match *self {
            IngestIssue::ParseFailure { snapshot, .. }
            | IngestIssue::StatusParseFailure { snapshot, .. }
            | IngestIssue::CapacityOverflow { snapshot, .. }
            | IngestIssue::OrphanRow { snapshot, .. } => snapshot,
        }
    }
}

/// Ingested series plus every non-fatal issue, sorted by snapshot. Issues of
/// the same snapshot keep the order status, orphan, near, far.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub series: SnapshotSeries,
    pub issues: Vec<IngestIssue>,
}

impl IngestOutcome {
    /// Capacity overflows reported during ingestion.
    pub fn overflows(&self) -> impl Iterator<Item = &IngestIssue> {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, IngestIssue::CapacityOverflow { .. }))
    }

    pub fn has_overflow(&self) -> bool {
        self.overflows().next().is_some()
    }

    /// Return the series, or the first capacity overflow as an error.
    pub fn into_strict(self) -> Result<SnapshotSeries, IngestError> {
        let overflow = self.issues.iter().find_map(|issue| match *issue {
            IngestIssue::CapacityOverflow {
                scan,
                snapshot,
                reported,
                capacity,
                ..
            } => Some(IngestError::CapacityOverflow {
                scan,
                snapshot,
                reported,
                capacity,
            }),
            _ => None,
        });

        match overflow {
            Some(err) => Err(err),
            None => Ok(self.series),
        }
    }
}

/// Case-insensitive label lookup built from [`LabelConfig`].
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    status: Vec<String>,
    near: Vec<String>,
    far: Vec<String>,
}

impl LabelMatcher {
    pub fn new(labels: &LabelConfig) -> Self {
        Self {
            status: lowercase_tokens(&labels.status),
            near: lowercase_tokens(&labels.near),
            far: lowercase_tokens(&labels.far),
        }
    }

    pub fn classify(&self, label: &str) -> Option<RowClass> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        if self.status.contains(&label) {
            Some(RowClass::Status)
        } else if self.near.contains(&label) {
            Some(RowClass::Detection(ScanType::Near))
        } else if self.far.contains(&label) {
            Some(RowClass::Detection(ScanType::Far))
        } else {
            None
        }
    }
}

fn lowercase_tokens(tokens: &[String]) -> Vec<String> {
    tokens.iter().map(|t| t.trim().to_lowercase()).collect()
}

/// A non-numeric field: 1-based column and its text.
#[derive(Debug, Clone, PartialEq)]
struct FieldParseError {
    column: usize,
    value: String,
}

/// Classified row: 0-based table row, snapshot index and class.
#[derive(Debug, Clone, Copy)]
struct RowRef {
    row: usize,
    snapshot: usize,
    class: RowClass,
}

/// Parsed detections of one snapshot and scan type, before capacity resolution.
struct ParsedRow {
    records: Vec<ScanRecord>,
    reported: usize,
    issue: Option<IngestIssue>,
}

fn parse_field(row: &[String], column: usize) -> Result<f64, FieldParseError> {
    let text = row.get(column - 1).map(String::as_str).unwrap_or("");
    text.trim().parse::<f64>().map_err(|_| FieldParseError {
        column,
        value: text.to_string(),
    })
}

fn parse_snapshot_index(text: &str) -> Option<usize> {
    let value: f64 = text.trim().parse().ok()?;
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
        Some(value as usize)
    } else {
        None
    }
}

/// Reported detection count as a slot count; NaN or negative counts report 0.
fn reported_count(value: f64) -> usize {
    if value.is_finite() && value > 0.0 {
        value as usize
    } else {
        0
    }
}

fn parse_record(row: &[String], snapshot: usize) -> Result<ScanRecord, FieldParseError> {
    let f = |field: ScanField| parse_field(row, field.column());

    Ok(ScanRecord {
        snapshot,
        timestamp_ms: f(ScanField::Timestamp)?,
        detection_count: f(ScanField::DetectionCount)?,
        range_m: f(ScanField::Range)?,
        radial_velocity: f(ScanField::RadialVelocity)?,
        azimuth: [f(ScanField::Azimuth0)?, f(ScanField::Azimuth1)?],
        elevation: f(ScanField::Elevation)?,
        rcs_dbsm: [f(ScanField::Rcs0)?, f(ScanField::Rcs1)?],
        probability: [f(ScanField::Prob0)?, f(ScanField::Prob1)?],
        range_variance: f(ScanField::RangeVariance)?,
        radial_velocity_variance: f(ScanField::RadialVelocityVariance)?,
        azimuth_variance: [
            f(ScanField::Azimuth0Variance)?,
            f(ScanField::Azimuth1Variance)?,
        ],
        elevation_variance: f(ScanField::ElevationVariance)?,
        prob_detection: f(ScanField::ProbDetection)?,
        snr: f(ScanField::Snr)?,
        integrated_power: f(ScanField::IntegratedPower)?,
    })
}

/// Parse every detection row of one snapshot and scan type.
///
/// Rows are kept in table order (left-aligned slots). The first bad field
/// empties the whole row.
fn parse_scan_rows(table: &RawTable, rows: &[usize], scan: ScanType, snapshot: usize) -> ParsedRow {
    let mut records = Vec::with_capacity(rows.len());
    let mut reported = rows.len();

    for &row_idx in rows {
        match parse_record(&table.rows[row_idx], snapshot) {
            Ok(record) => {
                reported = reported.max(reported_count(record.detection_count));
                records.push(record);
            }
            Err(err) => {
                return ParsedRow {
                    records: Vec::new(),
                    reported: 0,
                    issue: Some(IngestIssue::ParseFailure {
                        scan,
                        snapshot,
                        row: row_idx + 1,
                        column: err.column,
                        value: err.value,
                    }),
                };
            }
        }
    }

    ParsedRow {
        records,
        reported,
        issue: None,
    }
}

fn validate_config(table: &RawTable, config: &IngestConfig) -> Result<(), IngestError> {
    if config.capacity_ceiling == 0 {
        return Err(IngestError::InvalidConfig(
            "capacity_ceiling must be at least 1".to_string(),
        ));
    }
    if config.label_column == 0 || config.label_column > table.width() {
        return Err(IngestError::InvalidConfig(format!(
            "label_column {} is outside 1..={}",
            config.label_column,
            table.width()
        )));
    }
    if config.label_column == SNAPSHOT_COLUMN
        || ScanField::ALL.iter().any(|f| f.column() == config.label_column)
    {
        return Err(IngestError::InvalidConfig(format!(
            "label_column {} overlaps a numeric column",
            config.label_column
        )));
    }
    Ok(())
}

/// Validate the table shape and classify every row.
fn classify_rows(
    table: &RawTable,
    config: &IngestConfig,
) -> Result<Vec<RowRef>, IngestError> {
    let width = table.width();
    if width < MIN_COLUMNS {
        return Err(IngestError::MalformedInput {
            row: 0,
            reason: format!("header has {} columns, at least {} required", width, MIN_COLUMNS),
        });
    }
    validate_config(table, config)?;

    let matcher = LabelMatcher::new(&config.labels);
    let label_idx = config.label_column - 1;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            if row.len() != width {
                return Err(IngestError::MalformedInput {
                    row: idx + 1,
                    reason: format!("{} columns, expected {}", row.len(), width),
                });
            }
            let class = matcher.classify(&row[label_idx]).ok_or_else(|| {
                IngestError::MalformedInput {
                    row: idx + 1,
                    reason: format!("unrecognized label {:?}", row[label_idx]),
                }
            })?;
            let snapshot = parse_snapshot_index(&row[SNAPSHOT_COLUMN - 1]).ok_or_else(|| {
                IngestError::MalformedInput {
                    row: idx + 1,
                    reason: format!("invalid snapshot index {:?}", row[SNAPSHOT_COLUMN - 1]),
                }
            })?;
            Ok(RowRef {
                row: idx,
                snapshot,
                class,
            })
        })
        .collect()
}

/// Ingest a raw table into near/far scan series.
///
/// The snapshot count N is the number of status rows. Detection rows are
/// grouped by their snapshot index and scan type and copied, left-aligned,
/// into that snapshot's row.
///
/// # Errors
///
/// Returns [`IngestError::MalformedInput`] when the table has fewer than
/// [`MIN_COLUMNS`] columns, a row's width differs from the header, a label is
/// missing or unrecognized, or a snapshot index is not a positive integer.
/// Per-snapshot problems are not errors; they are returned as issues.
pub fn ingest(
    table: &RawTable,
    config: &IngestConfig,
    observer: &dyn PipelineObserver,
) -> Result<IngestOutcome, IngestError> {
    let rows = classify_rows(table, config)?;

    let status_rows: Vec<RowRef> = rows
        .iter()
        .copied()
        .filter(|r| r.class == RowClass::Status)
        .collect();
    let n = status_rows.len();
    observer.on_stage_start(Stage::Ingest, n);

    let mut issues = Vec::new();

    // Status rows: timestamps come from the first status row of each snapshot
    let mut timestamps_ms = vec![f64::NAN; n];
    let mut timestamp_set = vec![false; n];
    let mut status = Vec::with_capacity(n);
    for r in &status_rows {
        let row = &table.rows[r.row];
        let timestamp_ms = match parse_field(row, ScanField::Timestamp.column()) {
            Ok(ts) => ts,
            Err(err) => {
                issues.push(IngestIssue::StatusParseFailure {
                    snapshot: r.snapshot,
                    row: r.row + 1,
                    value: err.value,
                });
                f64::NAN
            }
        };
        if r.snapshot > n {
            issues.push(IngestIssue::OrphanRow {
                row: r.row + 1,
                snapshot: r.snapshot,
            });
        } else if !timestamp_set[r.snapshot - 1] {
            timestamps_ms[r.snapshot - 1] = timestamp_ms;
            timestamp_set[r.snapshot - 1] = true;
        }
        status.push(StatusRecord {
            snapshot: r.snapshot,
            timestamp_ms,
            fields: row.clone(),
        });
    }

    // Bucket detection rows by scan type and snapshot
    let mut near_buckets: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut far_buckets: Vec<Vec<usize>> = vec![Vec::new(); n];
    for r in &rows {
        let buckets = match r.class {
            RowClass::Status => continue,
            RowClass::Detection(ScanType::Near) => &mut near_buckets,
            RowClass::Detection(ScanType::Far) => &mut far_buckets,
        };
        if r.snapshot > n {
            issues.push(IngestIssue::OrphanRow {
                row: r.row + 1,
                snapshot: r.snapshot,
            });
            continue;
        }
        buckets[r.snapshot - 1].push(r.row);
    }

    // Snapshots are independent; parse them in parallel and assemble by index
    let parsed: Vec<(ParsedRow, ParsedRow)> = (0..n)
        .into_par_iter()
        .map(|k| {
            let near = parse_scan_rows(table, &near_buckets[k], ScanType::Near, k + 1);
            let far = parse_scan_rows(table, &far_buckets[k], ScanType::Far, k + 1);
            observer.on_snapshot(Stage::Ingest, k + 1);
            (near, far)
        })
        .collect();

    let (near_parsed, far_parsed): (Vec<ParsedRow>, Vec<ParsedRow>) = parsed.into_iter().unzip();
    let near = resolve_capacity(ScanType::Near, near_parsed, config.capacity_ceiling, &mut issues);
    let far = resolve_capacity(ScanType::Far, far_parsed, config.capacity_ceiling, &mut issues);
    issues.sort_by_key(IngestIssue::snapshot);

    for issue in &issues {
        observer.on_issue(issue);
    }
    observer.on_stage_finish(Stage::Ingest);

    Ok(IngestOutcome {
        series: SnapshotSeries {
            header: table.header.clone(),
            status,
            timestamps_ms,
            near,
            far,
        },
        issues,
    })
}

/// Fix the series capacity and truncate snapshots that exceed the ceiling.
fn resolve_capacity(
    scan: ScanType,
    parsed: Vec<ParsedRow>,
    ceiling: usize,
    issues: &mut Vec<IngestIssue>,
) -> ScanSeries {
    let observed = parsed.iter().map(|p| p.reported).max().unwrap_or(0);
    let capacity = observed.min(ceiling);

    let snapshots = parsed
        .into_iter()
        .enumerate()
        .map(|(k, mut p)| {
            if let Some(issue) = p.issue.take() {
                issues.push(issue);
            }
            if p.reported > capacity {
                issues.push(IngestIssue::CapacityOverflow {
                    scan,
                    snapshot: k + 1,
                    reported: p.reported,
                    capacity,
                    dropped: p.records.len().saturating_sub(capacity),
                });
                p.records.truncate(capacity);
            }
            p.records
        })
        .collect();

    ScanSeries::new(scan, capacity, snapshots)
}
