//! # fsim-runner
//!
//! Orchestrates the FSim terrain pipeline: resolve an area, fetch and fuse
//! elevation, write the heightmap, metadata and mesh, and optionally render a
//! map overlay.
//!
//! The `fsim-terrain` binary is a thin CLI over [`Pipeline`].

mod config;
mod error;
mod geocode;
mod metadata;
mod observer;
mod pipeline;

pub use config::{
    CacheConfig, FusionSection, HttpConfig, OverlayConfig, PipelineConfig, DEFAULT_USER_AGENT,
    NOMINATIM_URL,
};
pub use error::PipelineError;
pub use geocode::NominatimGeocoder;
pub use metadata::{BoundsRecord, TerrainMetadata};
pub use observer::{NullObserver, PipelineObserver, Stage, TracingObserver};
pub use pipeline::{
    Pipeline, PipelineOutput, HEIGHTMAP_FILE, MESH_FILE, METADATA_FILE, OVERLAY_FILE,
};

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
