//! # fsim-overlay
//!
//! Builds a rectified map texture for a geographic box from slippy-map
//! tiles.
//!
//! This crate provides:
//! - [`MapTileRef`], [`MapTileRange`] and [`choose_zoom`] - tile indexing
//! - [`MapTileSource`] / [`OsmTileFetcher`] - tile retrieval with a disk cache
//! - [`CompositeImage`] - stitching, georeferenced cropping and rendering
//! - [`build_overlay`] - the whole sequence, tolerant of missing tiles
//!
//! ## Example
//!
//! ```no_run
//! use fsim_geo::GeoBox;
//! use fsim_overlay::{build_overlay, OsmTileFetcher, OverlaySettings};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let bounds = GeoBox::new(-39.07, 177.38, -39.03, 177.44)?;
//! let fetcher = OsmTileFetcher::new(Duration::from_secs(30), "my-app/1.0")?
//!     .with_cache_dir("tile_cache");
//!
//! let overlay = build_overlay(&bounds, &fetcher, &OverlaySettings::default())?;
//! overlay.save(Path::new("overlay.png"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod composite;
mod enhance;
mod error;
mod fetch;
mod tiles;

pub use composite::{CompositeImage, CropWindow};
pub use enhance::{
    adjust_contrast, adjust_saturation, enhance, luma, EnhanceSettings, DEFAULT_CONTRAST,
    DEFAULT_OUTPUT_SIZE, DEFAULT_SATURATION,
};
pub use error::OverlayError;
pub use fetch::{build_overlay, MapTileSource, OsmTileFetcher, Overlay, OverlaySettings, OSM_TILE_URL};
pub use tiles::{
    choose_zoom, tile_corner, MapTileRange, MapTileRef, DEFAULT_TILE_SIZE, MAX_MERCATOR_LAT,
    MAX_ZOOM, MIN_ZOOM,
};

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;
