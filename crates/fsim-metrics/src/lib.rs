//! Metric declarations for the FSim terrain pipeline.
//!
//! Every metric the pipeline records is declared once as a const [`Metric`]
//! in [`metric_defs`], so call sites never spell a metric name by hand. The
//! `metrics` crate is re-exported; recording is a no-op until a recorder is
//! installed.
//!
//! ```rust
//! use fsim_metrics::metric_defs;
//!
//! metrics::counter!(metric_defs::DEM_TILES_DOWNLOADED.name).increment(1);
//! metrics::histogram!(metric_defs::FUSION_DURATION.name).record(12.5);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use fsim_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const TILES: Metric = Metric::counter("fsim.example.tiles")
///     .with_description("Tiles processed")
///     .with_unit(Unit::Count)
///     .with_labels(&["source"]);
///
/// assert_eq!(TILES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "fsim.dem.tiles_downloaded").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Elevation tiles
    // ========================================================================

    /// Elevation tiles served from a local cache.
    ///
    /// Labels: source (`package-cache`, `local-cache`)
    pub const DEM_TILE_CACHE_HITS: Metric = Metric::counter("fsim.dem.tile_cache_hits")
        .with_description("Elevation tiles served from a local cache")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Elevation tiles downloaded from the archive.
    pub const DEM_TILES_DOWNLOADED: Metric = Metric::counter("fsim.dem.tiles_downloaded")
        .with_description("Elevation tiles downloaded from the archive")
        .with_unit(Unit::Count);

    /// Compressed bytes downloaded for elevation tiles.
    pub const DEM_BYTES_DOWNLOADED: Metric = Metric::counter("fsim.dem.bytes_downloaded")
        .with_description("Compressed bytes downloaded for elevation tiles")
        .with_unit(Unit::Bytes);

    /// Elevation tiles that no source could provide.
    pub const DEM_TILES_FAILED: Metric = Metric::counter("fsim.dem.tiles_failed")
        .with_description("Elevation tiles that no source could provide")
        .with_unit(Unit::Count);

    /// Wall-clock time to fuse rasters into the output grid.
    pub const FUSION_DURATION: Metric = Metric::histogram("fsim.dem.fusion_duration_ms")
        .with_description("Wall-clock time to fuse rasters into the output grid")
        .with_unit(Unit::Milliseconds);

    /// Cells replaced during nodata repair.
    pub const FUSION_REPAIRED_CELLS: Metric = Metric::counter("fsim.dem.repaired_cells")
        .with_description("Cells replaced during nodata repair")
        .with_unit(Unit::Count);

    // ========================================================================
    // Map tiles
    // ========================================================================

    /// Map tiles obtained.
    ///
    /// Labels: source (`cache`, `network`)
    pub const MAP_TILES_FETCHED: Metric = Metric::counter("fsim.overlay.tiles_fetched")
        .with_description("Map tiles obtained")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Map tiles that could not be obtained.
    pub const MAP_TILES_FAILED: Metric = Metric::counter("fsim.overlay.tiles_failed")
        .with_description("Map tiles that could not be obtained")
        .with_unit(Unit::Count);

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Wall-clock time per pipeline stage.
    ///
    /// Labels: stage
    pub const STAGE_DURATION: Metric = Metric::histogram("fsim.pipeline.stage_duration_ms")
        .with_description("Wall-clock time per pipeline stage")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["stage"]);

    /// Vertex count of the last synthesized mesh.
    pub const MESH_VERTICES: Metric = Metric::gauge("fsim.mesh.vertices")
        .with_description("Vertex count of the last synthesized mesh")
        .with_unit(Unit::Count);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &DEM_TILE_CACHE_HITS,
        &DEM_TILES_DOWNLOADED,
        &DEM_BYTES_DOWNLOADED,
        &DEM_TILES_FAILED,
        &FUSION_DURATION,
        &FUSION_REPAIRED_CELLS,
        &MAP_TILES_FETCHED,
        &MAP_TILES_FAILED,
        &STAGE_DURATION,
        &MESH_VERTICES,
    ];
}

/// Describes all pipeline metrics. Call once at startup, after installing a
/// recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
