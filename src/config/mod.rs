//! Configuration types for the scan pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Accepted label tokens for each row class. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_status_labels")]
    pub status: Vec<String>,

    #[serde(default = "default_near_labels")]
    pub near: Vec<String>,

    #[serde(default = "default_far_labels")]
    pub far: Vec<String>,
}

fn default_status_labels() -> Vec<String> {
    vec!["status".to_string()]
}

fn default_near_labels() -> Vec<String> {
    vec![
        "near".to_string(),
        "near-detection".to_string(),
        "near_detection".to_string(),
    ]
}

fn default_far_labels() -> Vec<String> {
    vec![
        "far".to_string(),
        "far-detection".to_string(),
        "far_detection".to_string(),
    ]
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            status: default_status_labels(),
            near: default_near_labels(),
            far: default_far_labels(),
        }
    }
}

/// Configuration for raw table ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Upper bound on detection slots per snapshot and scan type
    #[serde(default = "default_capacity_ceiling")]
    pub capacity_ceiling: usize,

    /// 1-based column holding the row label
    #[serde(default = "default_label_column")]
    pub label_column: usize,

    /// Treat any capacity overflow as a fatal error instead of truncating
    #[serde(default)]
    pub strict_capacity: bool,

    #[serde(default)]
    pub labels: LabelConfig,
}

fn default_capacity_ceiling() -> usize {
    256
}

fn default_label_column() -> usize {
    3
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            capacity_ceiling: default_capacity_ceiling(),
            label_column: default_label_column(),
            strict_capacity: false,
            labels: LabelConfig::default(),
        }
    }
}

/// Sensor resolution parameters used by the projector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Azimuth beamwidth in radians
    #[serde(default = "default_beamwidth")]
    pub azimuth_beamwidth_rad: f64,

    /// Elevation beamwidth in radians
    #[serde(default = "default_beamwidth")]
    pub elevation_beamwidth_rad: f64,

    /// Range resolution in meters
    #[serde(default = "default_range_resolution")]
    pub range_resolution_m: f64,

    /// Mounting offset added to every azimuth hypothesis
    #[serde(default)]
    pub azimuth_shift_rad: f64,
}

fn default_beamwidth() -> f64 {
    0.05
}

fn default_range_resolution() -> f64 {
    1.0
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            azimuth_beamwidth_rad: default_beamwidth(),
            elevation_beamwidth_rad: default_beamwidth(),
            range_resolution_m: default_range_resolution(),
            azimuth_shift_rad: 0.0,
        }
    }
}

/// Scene limits a projected detection must fall within to be valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Cross-range limits [min, max] in meters
    #[serde(default = "default_x_limits")]
    pub x_limits: [f64; 2],

    /// Down-range limits [min, max] in meters
    #[serde(default = "default_y_limits")]
    pub y_limits: [f64; 2],
}

fn default_x_limits() -> [f64; 2] {
    [-20.0, 20.0]
}

fn default_y_limits() -> [f64; 2] {
    [0.0, 70.0]
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            x_limits: default_x_limits(),
            y_limits: default_y_limits(),
        }
    }
}

/// Region of interest used to filter projected detections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Half width of the region in cross-range, in meters
    #[serde(default = "default_cross_range_half_width")]
    pub cross_range_half_width_m: f64,

    /// Down-range limits [min, max] shared by every snapshot
    #[serde(default = "default_y_limits")]
    pub down_range_limits: [f64; 2],

    /// Optional down-range limits per snapshot; overrides `down_range_limits`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_snapshot_limits: Option<Vec<[f64; 2]>>,
}

fn default_cross_range_half_width() -> f64 {
    2.5
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            cross_range_half_width_m: default_cross_range_half_width(),
            down_range_limits: default_y_limits(),
            per_snapshot_limits: None,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub scene: SceneConfig,

    #[serde(default)]
    pub region: RegionConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
