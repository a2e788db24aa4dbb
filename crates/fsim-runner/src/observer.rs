//! Progress reporting.
//!
//! The pipeline never prints. It announces stages and outcomes to a
//! [`PipelineObserver`]; [`TracingObserver`] turns them into log lines and
//! stage timings.

use fsim_metrics::metric_defs;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Turning the request into a box and grid size.
    Resolve,
    /// Locating or downloading elevation tiles.
    FetchElevation,
    /// Mosaic, clip, repair and resample.
    Fuse,
    /// Mesh synthesis and file export.
    Synthesize,
    /// Map overlay build.
    Overlay,
}

impl Stage {
    /// Label used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::FetchElevation => "fetch_elevation",
            Stage::Fuse => "fuse",
            Stage::Synthesize => "synthesize",
            Stage::Overlay => "overlay",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress notifications from the pipeline.
///
/// Every method has an empty default, so implementors pick what they need.
pub trait PipelineObserver {
    /// A stage is about to run.
    fn stage_started(&self, _stage: Stage) {}

    /// A stage finished successfully.
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}

    /// A non-fatal problem.
    fn warning(&self, _stage: Stage, _message: &str) {}

    /// An output file was written.
    fn file_written(&self, _path: &Path) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {}

/// Logs progress with `tracing` and records stage durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn stage_started(&self, stage: Stage) {
        info!("Stage {}...", stage);
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        metrics::histogram!(metric_defs::STAGE_DURATION.name, "stage" => stage.as_str())
            .record(elapsed_ms);
        info!("Stage {} done in {:.1} ms", stage, elapsed_ms);
    }

    fn warning(&self, stage: Stage, message: &str) {
        warn!("[{}] {}", stage, message);
    }

    fn file_written(&self, path: &Path) {
        info!("Wrote {}", path.display());
    }
}
