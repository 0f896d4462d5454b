//! Core data types and I/O operations.

pub mod loaders;
pub mod observer;
pub mod records;
pub mod transforms;
pub mod writers;

pub use loaders::{load_raw_table, LoaderError, RawTable, ScanField};
pub use observer::{LogObserver, NoopObserver, PipelineObserver, Stage};
pub use records::{ScanRecord, ScanSeries, ScanType, SnapshotSeries, StatusRecord};
pub use transforms::{Hypothesis, Limits, LimitsError};
pub use writers::{write_detections_csv, write_regions_csv, WriteError};
