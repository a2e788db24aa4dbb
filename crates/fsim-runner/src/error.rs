//! Error types for the pipeline runner.

use thiserror::Error;

/// Errors that can occur while running the terrain pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Area resolution failed.
    #[error(transparent)]
    Geo(#[from] fsim_geo::GeoError),

    /// Elevation acquisition or fusion failed.
    #[error(transparent)]
    Dem(#[from] fsim_dem::DemError),

    /// Mesh synthesis or export failed.
    #[error(transparent)]
    Mesh(#[from] fsim_mesh::MeshError),

    /// Overlay build failed.
    #[error(transparent)]
    Overlay(#[from] fsim_overlay::OverlayError),

    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl PipelineError {
    /// True when elevation data could not be obtained or decoded.
    pub fn is_elevation_failure(&self) -> bool {
        matches!(self, PipelineError::Dem(_))
    }
}
