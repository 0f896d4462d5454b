//! Multi-hypothesis radar detection pipeline.
//!
//! This crate provides tools for:
//! - Ingesting raw per-detection measurement logs into per-snapshot series
//! - Selecting the likelier azimuth hypothesis and projecting to scene coordinates
//! - Building per-snapshot rectangular regions of interest
//! - Filtering projected detections against those regions (parallelized)
//!
//! # Example
//!
//! ```no_run
//! use radar_scan_pipeline::{core::observer::LogObserver, processors::pipeline::process_file};
//! use radar_scan_pipeline::PipelineConfig;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let summary = process_file(Path::new("log.csv"), Path::new("out"), &config, &LogObserver).unwrap();
//! println!("{} near detections", summary.near_detections);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{IngestConfig, PipelineConfig, RegionConfig, SceneConfig, SensorConfig};
pub use core::records::{ScanRecord, ScanSeries, ScanType, SnapshotSeries};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
