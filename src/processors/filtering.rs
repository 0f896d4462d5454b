//! Spatial filtering of projected detections against per-snapshot regions.

use rayon::prelude::*;

use crate::core::observer::{PipelineObserver, Stage};
use crate::processors::cartesian::DetectionMatrices;
use crate::processors::regions::{BoundingRegion, RegionError};

/// Filter one snapshot's row. Cells outside the region become NaN.
fn filter_row(
    x: &[f64],
    y: &[f64],
    values: &[f64],
    region: &BoundingRegion,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut xf = vec![f64::NAN; x.len()];
    let mut yf = vec![f64::NAN; x.len()];
    let mut vf = vec![f64::NAN; x.len()];

    if region.is_degenerate() {
        return (xf, yf, vf);
    }

    for j in 0..x.len() {
        if region.contains(x[j], y[j]) {
            xf[j] = x[j];
            yf[j] = y[j];
            vf[j] = values[j];
        }
    }

    (xf, yf, vf)
}

fn check_rows(what: &'static str, expected: usize, rows: &[Vec<f64>]) -> Result<(), RegionError> {
    if rows.len() != expected {
        return Err(RegionError::ShapeMismatch {
            what,
            expected,
            found: rows.len(),
        });
    }
    Ok(())
}

/// Keep only detections inside their snapshot's region.
///
/// Output has the same shape as the input; every cell whose `(x, y)` lies
/// outside `regions[k]` (boundary counts as inside) or is NaN is replaced by
/// NaN. Inputs are not modified. Snapshots are filtered in parallel.
///
/// # Errors
///
/// Returns [`RegionError::ShapeMismatch`] when `x`, `y`, `values` and
/// `regions` disagree on the snapshot count, or a row of `y`/`values` differs
/// in width from the matching row of `x`.
pub fn filter_detections(
    detections: &DetectionMatrices,
    regions: &[BoundingRegion],
    observer: &dyn PipelineObserver,
) -> Result<DetectionMatrices, RegionError> {
    let n = regions.len();
    check_rows("x", n, &detections.x)?;
    check_rows("y", n, &detections.y)?;
    check_rows("values", n, &detections.values)?;

    for k in 0..n {
        let width = detections.x[k].len();
        for (what, row) in [("y row", &detections.y[k]), ("values row", &detections.values[k])] {
            if row.len() != width {
                return Err(RegionError::ShapeMismatch {
                    what,
                    expected: width,
                    found: row.len(),
                });
            }
        }
    }

    observer.on_stage_start(Stage::Filter, n);

    let rows: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = regions
        .par_iter()
        .enumerate()
        .map(|(k, region)| {
            let row = filter_row(
                &detections.x[k],
                &detections.y[k],
                &detections.values[k],
                region,
            );
            observer.on_snapshot(Stage::Filter, k + 1);
            row
        })
        .collect();

    observer.on_stage_finish(Stage::Filter);

    let mut out = DetectionMatrices {
        x: Vec::with_capacity(n),
        y: Vec::with_capacity(n),
        values: Vec::with_capacity(n),
    };
    for (x, y, values) in rows {
        out.x.push(x);
        out.y.push(y);
        out.values.push(values);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observer::NoopObserver;
    use crate::processors::regions::{make_regions, RegionLimits};

    fn matrices(x: Vec<Vec<f64>>, y: Vec<Vec<f64>>) -> DetectionMatrices {
        let values = x
            .iter()
            .map(|row| row.iter().map(|_| 1.0).collect())
            .collect();
        DetectionMatrices { x, y, values }
    }

    #[test]
    fn test_filter_keeps_inside_and_boundary_points() {
        let regions = make_regions(2, &RegionLimits::Fixed([0.0, 70.0]), 2.5).unwrap();
        let input = matrices(
            vec![vec![0.0, 2.5, 3.0, f64::NAN], vec![-2.5, 1.0]],
            vec![vec![10.0, 70.0, 10.0, f64::NAN], vec![0.0, 80.0]],
        );

        let out = filter_detections(&input, &regions, &NoopObserver).unwrap();

        assert_eq!(out.x[0][0], 0.0);
        assert_eq!(out.y[0][1], 70.0);
        assert_eq!(out.values[0][1], 1.0);
        assert!(out.x[0][2].is_nan());
        assert!(out.values[0][2].is_nan());
        assert!(out.x[0][3].is_nan());
        assert_eq!(out.x[1][0], -2.5);
        assert!(out.y[1][1].is_nan());
        assert_eq!(out.valid_count(0), 2);
        assert_eq!(out.valid_count(1), 1);

        // input untouched
        assert_eq!(input.x[0][2], 3.0);
    }

    #[test]
    fn test_filtered_points_lie_in_their_region() {
        let limits = RegionLimits::PerSnapshot(vec![[0.0, 10.0], [10.0, 20.0], [5.0, 6.0]]);
        let regions = make_regions(3, &limits, 2.5).unwrap();

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for _ in 0..3 {
            let mut xr = Vec::new();
            let mut yr = Vec::new();
            for i in 0..25 {
                xr.push(-4.0 + (i % 5) as f64 * 2.0);
                yr.push((i / 5) as f64 * 5.0);
            }
            xs.push(xr);
            ys.push(yr);
        }
        let out = filter_detections(&matrices(xs, ys), &regions, &NoopObserver).unwrap();

        for (k, region) in regions.iter().enumerate() {
            for j in 0..25 {
                let (x, y) = (out.x[k][j], out.y[k][j]);
                assert!((x.is_nan() && y.is_nan()) || region.contains(x, y));
            }
        }
        assert!(out.valid_count(0) > 0);
        assert!(out.valid_count(1) > 0);
    }

    #[test]
    fn test_degenerate_region_yields_sentinel_row() {
        let regions = vec![
            BoundingRegion::from_bounds([-2.5, 2.5], [0.0, 70.0]),
            BoundingRegion::from_bounds([0.0, 0.0], [0.0, 70.0]),
        ];
        let input = matrices(vec![vec![0.0], vec![0.0]], vec![vec![5.0], vec![5.0]]);

        let out = filter_detections(&input, &regions, &NoopObserver).unwrap();

        assert_eq!(out.valid_count(0), 1);
        assert_eq!(out.valid_count(1), 0);
        assert!(out.values[1][0].is_nan());
    }

    #[test]
    fn test_shape_mismatch() {
        let regions = make_regions(3, &RegionLimits::Fixed([0.0, 70.0]), 2.5).unwrap();
        let input = matrices(vec![vec![0.0]], vec![vec![5.0]]);
        assert!(matches!(
            filter_detections(&input, &regions, &NoopObserver),
            Err(RegionError::ShapeMismatch { what: "x", expected: 3, found: 1 })
        ));

        let regions = make_regions(1, &RegionLimits::Fixed([0.0, 70.0]), 2.5).unwrap();
        let short_y = DetectionMatrices {
            x: vec![vec![0.0, 1.0]],
            y: vec![vec![5.0]],
            values: vec![vec![1.0, 1.0]],
        };
        assert_eq!(
            filter_detections(&short_y, &regions, &NoopObserver),
            Err(RegionError::ShapeMismatch { what: "y row", expected: 2, found: 1 })
        );

        let long_values = DetectionMatrices {
            x: vec![vec![0.0, 1.0]],
            y: vec![vec![5.0, 6.0]],
            values: vec![vec![1.0, 1.0, 1.0]],
        };
        assert_eq!(
            filter_detections(&long_values, &regions, &NoopObserver),
            Err(RegionError::ShapeMismatch { what: "values row", expected: 2, found: 3 })
        );
    }

    #[test]
    fn test_empty_series() {
        let out = filter_detections(&DetectionMatrices::default(), &[], &NoopObserver).unwrap();
        assert!(out.is_empty());
    }
}
