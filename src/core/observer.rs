//! Progress and issue reporting for the pipeline stages.
//!
//! The transforms never print. They report to a [`PipelineObserver`] that the
//! caller supplies; [`LogObserver`] forwards everything to the `log` facade.

use std::fmt;

use log::{debug, info, warn};

use crate::processors::ingest::IngestIssue;

/// Pipeline stage a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Project,
    Filter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Project => "project",
            Stage::Filter => "filter",
        };
        f.write_str(name)
    }
}

/// Receiver for pipeline notifications. All methods default to no-ops.
///
/// Snapshots may be processed in parallel, so implementations must be
/// `Send + Sync` and must not rely on the order of `on_snapshot` calls.
pub trait PipelineObserver: Send + Sync {
    fn on_stage_start(&self, _stage: Stage, _snapshots: usize) {}

    fn on_snapshot(&self, _stage: Stage, _snapshot: usize) {}

    fn on_stage_finish(&self, _stage: Stage) {}

    fn on_issue(&self, _issue: &IngestIssue) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Forwards notifications to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_stage_start(&self, stage: Stage, snapshots: usize) {
        info!("{}: {} snapshots", stage, snapshots);
    }

    fn on_snapshot(&self, stage: Stage, snapshot: usize) {
        debug!("{}: snapshot {} done", stage, snapshot);
    }

    fn on_stage_finish(&self, stage: Stage) {
        debug!("{}: finished", stage);
    }

    fn on_issue(&self, issue: &IngestIssue) {
        warn!("{}", issue);
    }
}
