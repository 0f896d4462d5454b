//! End-to-end driver: ingest, project, build regions and filter.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};
use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::core::loaders::{load_raw_table, RawTable};
use crate::core::observer::PipelineObserver;
use crate::core::records::{ScanType, SnapshotSeries};
use crate::core::writers::{write_detections_csv, write_regions_csv};
use crate::processors::cartesian::{
    project_series, DetectionMatrices, ProjectedSeries, ProjectionParams,
};
use crate::processors::filtering::filter_detections;
use crate::processors::ingest::{ingest, IngestIssue};
use crate::processors::regions::{make_regions_from_config, BoundingRegion};

/// Projection and filtering results for one scan type.
#[derive(Debug, Clone)]
pub struct ScanProducts {
    pub scan: ScanType,
    pub projected: ProjectedSeries,
    pub filtered: DetectionMatrices,
}

/// Everything the pipeline derives from one raw table.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub series: SnapshotSeries,
    pub issues: Vec<IngestIssue>,
    pub regions: Vec<BoundingRegion>,
    pub near: ScanProducts,
    pub far: ScanProducts,
}

impl PipelineOutput {
    pub fn scan(&self, scan: ScanType) -> &ScanProducts {
        match scan {
            ScanType::Near => &self.near,
            ScanType::Far => &self.far,
        }
    }
}

/// Run the whole pipeline on an in-memory table.
///
/// Projection parameters are validated before ingestion so that bad scene
/// limits fail fast. With `ingest.strict_capacity` set, any capacity overflow is an
/// error; otherwise overflowing snapshots are truncated and reported.
pub fn run_table(
    table: &RawTable,
    config: &PipelineConfig,
    observer: &dyn PipelineObserver,
) -> Result<PipelineOutput> {
    let params = ProjectionParams::from_config(config).context("Invalid projection parameters")?;

    let outcome = ingest(table, &config.ingest, observer).context("Ingestion failed")?;
    let issues = outcome.issues.clone();
    let series = if config.ingest.strict_capacity {
        outcome
            .into_strict()
            .context("Capacity overflow in strict mode")?
    } else {
        outcome.series
    };

    let regions = make_regions_from_config(series.snapshot_count(), &config.region)
        .context("Invalid region configuration")?;

    let run_scan = |scan: ScanType| -> Result<ScanProducts> {
        let projected = project_series(series.scan(scan), &params, observer);
        let filtered = filter_detections(&projected.to_matrices(), &regions, observer)
            .with_context(|| format!("Filtering {} scan failed", scan))?;
        Ok(ScanProducts {
            scan,
            projected,
            filtered,
        })
    };

    let near = run_scan(ScanType::Near)?;
    let far = run_scan(ScanType::Far)?;

    Ok(PipelineOutput {
        series,
        issues,
        regions,
        near,
        far,
    })
}

/// Summary of one processed file.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub input: PathBuf,
    pub snapshots: usize,
    pub issues: usize,
    pub near_detections: usize,
    pub far_detections: usize,
    pub outputs: Vec<PathBuf>,
}

/// Load, process and persist one raw CSV log.
///
/// Writes `<stem>_near.csv`, `<stem>_far.csv` and `<stem>_regions.csv` into
/// `output_dir`.
pub fn process_file(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    observer: &dyn PipelineObserver,
) -> Result<FileSummary> {
    let table = load_raw_table(input)
        .with_context(|| format!("Failed to load raw table: {}", input.display()))?;
    let output = run_table(&table, config, observer)
        .with_context(|| format!("Failed to process {}", input.display()))?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "scan".to_string());

    let mut outputs = Vec::with_capacity(3);
    let mut counts = [0usize; 2];
    for (i, scan) in ScanType::ALL.iter().enumerate() {
        let path = output_dir.join(format!("{}_{}.csv", stem, scan));
        counts[i] = write_detections_csv(
            &path,
            &output.scan(*scan).filtered,
            &output.series.timestamps_ms,
        )
        .with_context(|| format!("Failed to write {}", path.display()))?;
        outputs.push(path);
    }

    let regions_path = output_dir.join(format!("{}_regions.csv", stem));
    write_regions_csv(&regions_path, &output.regions)
        .with_context(|| format!("Failed to write {}", regions_path.display()))?;
    outputs.push(regions_path);

    Ok(FileSummary {
        input: input.to_path_buf(),
        snapshots: output.series.snapshot_count(),
        issues: output.issues.len(),
        near_detections: counts[0],
        far_detections: counts[1],
        outputs,
    })
}

/// List `*.csv` files in a directory, sorted.
pub fn find_inputs(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Process every CSV log in a directory in parallel.
///
/// A failing file is logged and skipped; it does not stop the batch. Returns
/// the summaries of the files that succeeded, in input order.
pub fn process_directory(
    input_dir: &Path,
    output_dir: &Path,
    limit: Option<usize>,
    config: &PipelineConfig,
    observer: &dyn PipelineObserver,
) -> Result<Vec<FileSummary>> {
    let inputs: Vec<PathBuf> = find_inputs(input_dir)?
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if inputs.is_empty() {
        warn!("No CSV files found in {}", input_dir.display());
        return Ok(Vec::new());
    }

    let results: Vec<Option<FileSummary>> = inputs
        .par_iter()
        .map(|input| match process_file(input, output_dir, config, observer) {
            Ok(summary) => {
                info!(
                    "{}: {} snapshots, {} near / {} far detections",
                    input.display(),
                    summary.snapshots,
                    summary.near_detections,
                    summary.far_detections
                );
                Some(summary)
            }
            Err(e) => {
                error!("{}: {:#}", input.display(), e);
                None
            }
        })
        .collect();

    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::ScanField;
    use crate::core::observer::NoopObserver;
    use crate::processors::ingest::tests::{detection_row, raw_row, status_row, table};
    use std::io::Write;
    use tempfile::TempDir;

    fn end_to_end_row(snapshot: usize, label: &str) -> Vec<String> {
        raw_row(
            &snapshot.to_string(),
            label,
            &[
                (ScanField::DetectionCount.column(), "1"),
                (ScanField::Range.column(), "10"),
                (ScanField::Azimuth0.column(), "0.2"),
                (ScanField::Azimuth1.column(), "0.0"),
                (ScanField::Rcs0.column(), "20"),
                (ScanField::Rcs1.column(), "5"),
                (ScanField::Prob0.column(), "0.9"),
                (ScanField::Prob1.column(), "0.1"),
            ],
        )
    }

    fn sample_table() -> RawTable {
        table(vec![
            status_row(1, 0.0),
            end_to_end_row(1, "near"),
            detection_row(1, "near", 2, 30.0, 0.0),
            detection_row(1, "far", 1, 90.0, 0.0),
            status_row(2, 50.0),
            detection_row(2, "near", 1, 20.0, 0.5),
            detection_row(2, "far", 1, 40.0, 0.0),
        ])
    }

    #[test]
    fn test_run_table_end_to_end() {
        let config = PipelineConfig::default();
        let output = run_table(&sample_table(), &config, &NoopObserver).unwrap();

        assert_eq!(output.series.snapshot_count(), 2);
        assert_eq!(output.regions.len(), 2);
        assert_eq!(output.near.filtered.len(), 2);
        assert_eq!(output.far.filtered.len(), 2);

        let projected = &output.near.projected.snapshots[0];
        assert_eq!(projected.valid_mask, vec![true, true]);
        assert!((projected.eta[0] - 400.0).abs() < 1e-9);

        let near = &output.near.filtered;
        assert!((near.x[0][0] + 2.027).abs() < 1e-3);
        assert_eq!(near.y[0][0], 10.0);
        assert!((near.values[0][0] - 400.0).abs() < 1e-9);
        assert_eq!(near.y[0][1], 30.0);
        // x = -20 tan(0.5) is inside the scene but outside the region
        assert_eq!(output.near.projected.snapshots[1].len(), 1);
        assert_eq!(near.valid_count(1), 0);

        let far = &output.far.filtered;
        assert_eq!(far.valid_count(0), 0);
        assert_eq!(far.y[1][0], 40.0);
    }

    #[test]
    fn test_run_table_narrow_region_drops_off_axis_point() {
        let mut config = PipelineConfig::default();
        config.region.cross_range_half_width_m = 1.0;
        let output = run_table(&sample_table(), &config, &NoopObserver).unwrap();

        let near = &output.near.filtered;
        assert!(near.x[0][0].is_nan());
        assert!(near.values[0][0].is_nan());
        assert_eq!(near.y[0][1], 30.0);
    }

    #[test]
    fn test_run_table_rejects_invalid_limits() {
        let mut config = PipelineConfig::default();
        config.region.down_range_limits = [30.0, 30.0];
        assert!(run_table(&sample_table(), &config, &NoopObserver).is_err());

        let mut config = PipelineConfig::default();
        config.scene.x_limits = [f64::NAN, 1.0];
        assert!(run_table(&sample_table(), &config, &NoopObserver).is_err());
    }

    #[test]
    fn test_run_table_strict_capacity() {
        let mut config = PipelineConfig::default();
        config.ingest.capacity_ceiling = 1;

        let output = run_table(&sample_table(), &config, &NoopObserver).unwrap();
        assert_eq!(output.near.projected.capacity, 1);
        assert!(!output.issues.is_empty());

        config.ingest.strict_capacity = true;
        let err = run_table(&sample_table(), &config, &NoopObserver).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("Capacity overflow in strict mode"));
        assert!(message.contains("exceed capacity ceiling 1"));
    }

    fn write_table(path: &Path, table: &RawTable) {
        let mut file = fs::File::create(path).unwrap();
        writeln!(file, "{}", table.header.join(",")).unwrap();
        for row in &table.rows {
            writeln!(file, "{}", row.join(",")).unwrap();
        }
    }

    #[test]
    fn test_process_file_writes_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("drive_01.csv");
        write_table(&input, &sample_table());
        let output_dir = temp_dir.path().join("out");

        let summary =
            process_file(&input, &output_dir, &PipelineConfig::default(), &NoopObserver).unwrap();

        assert_eq!(summary.snapshots, 2);
        assert_eq!(summary.near_detections, 2);
        assert_eq!(summary.far_detections, 1);
        assert_eq!(summary.outputs.len(), 3);
        assert!(output_dir.join("drive_01_near.csv").exists());
        assert!(output_dir.join("drive_01_far.csv").exists());
        assert!(output_dir.join("drive_01_regions.csv").exists());
    }

    #[test]
    fn test_process_directory_skips_bad_files() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("logs");
        fs::create_dir_all(&input_dir).unwrap();
        write_table(&input_dir.join("a.csv"), &sample_table());
        write_table(&input_dir.join("b.csv"), &sample_table());
        fs::write(input_dir.join("broken.csv"), "x,y\n1,2\n").unwrap();
        fs::write(input_dir.join("notes.txt"), "ignored").unwrap();

        let output_dir = temp_dir.path().join("out");
        let summaries = process_directory(
            &input_dir,
            &output_dir,
            None,
            &PipelineConfig::default(),
            &NoopObserver,
        )
        .unwrap();

        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].input.ends_with("a.csv"));
        assert!(output_dir.join("b_regions.csv").exists());

        let limited = process_directory(
            &input_dir,
            &output_dir,
            Some(1),
            &PipelineConfig::default(),
            &NoopObserver,
        )
        .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_find_inputs_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_inputs(&temp_dir.path().join("missing")).is_err());
    }
}
