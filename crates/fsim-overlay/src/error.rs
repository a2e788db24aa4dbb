//! Error types for the overlay crate.

use thiserror::Error;

/// Errors that can occur while building a map overlay.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP request error when fetching tiles.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Tile coordinates outside the zoom level's grid.
    #[error("Invalid map tile {z}/{x}/{y}")]
    InvalidTile {
        /// Zoom level.
        z: u8,
        /// Column.
        x: u32,
        /// Row.
        y: u32,
    },

    /// A single map tile could not be obtained.
    #[error("Map tile {tile} unavailable: {reason}")]
    TileUnavailable {
        /// Tile as `z/x/y`.
        tile: String,
        /// Reason for failure.
        reason: String,
    },

    /// The composite covers no geographic area, so pixel coordinates are undefined.
    #[error("Composite footprint is degenerate ({lon_span} deg lon x {lat_span} deg lat)")]
    DegenerateFootprint {
        /// East minus west of the composite.
        lon_span: f64,
        /// North minus south of the composite.
        lat_span: f64,
    },

    /// The requested box maps to no pixels of the composite.
    #[error("Crop window is empty")]
    EmptyCrop,

    /// Every map tile failed.
    #[error("No map tiles could be retrieved")]
    NoTilesRetrieved,
}
