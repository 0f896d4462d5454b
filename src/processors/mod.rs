//! Data processing modules.

pub mod cartesian;
pub mod filtering;
pub mod ingest;
pub mod pipeline;
pub mod regions;

// Re-export key types for convenience
pub use cartesian::{
    project, project_series, DetectionMatrices, ProjectedSeries, ProjectionError,
    ProjectionParams,
};
pub use filtering::filter_detections;
pub use ingest::{ingest, IngestError, IngestIssue, IngestOutcome};
pub use pipeline::{process_directory, process_file, run_table, PipelineOutput};
pub use regions::{make_regions, BoundingRegion, RegionError, RegionLimits};
