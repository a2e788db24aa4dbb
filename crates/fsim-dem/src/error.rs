//! Error types for the DEM crate.

use thiserror::Error;

/// Errors that can occur when acquiring or fusing elevation data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags and no usable filename.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// SRTM archive file has an unexpected size.
    #[error("Invalid HGT file {path}: {reason}")]
    InvalidHgt {
        /// File that failed to decode.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid tile filename - cannot parse coordinates.
    #[error("Invalid tile filename: {0}")]
    InvalidFilename(String),

    /// Unsupported pixel layout in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// A single elevation tile could not be obtained from any source.
    #[error("Tile {tile} unavailable: {reason}")]
    TileUnavailable {
        /// Tile name (e.g. `S39E177`).
        tile: String,
        /// Reason for failure.
        reason: String,
    },

    /// Retrieval produced no usable tiles at all.
    #[error("No elevation tiles found or downloaded")]
    NoTilesFound,

    /// The requested box does not overlap the raster.
    #[error("Bounds {bounds} lie outside the raster extent")]
    BoxOutsideRaster {
        /// The requested box, formatted.
        bounds: String,
    },

    /// Rasters to be merged do not share a pixel size.
    #[error("Cannot merge rasters with different resolutions ({0} vs {1} deg/pixel)")]
    ResolutionMismatch(f64, f64),

    /// A grid sample is NaN or infinite.
    #[error("Grid sample {index} is not finite")]
    NonFiniteSample {
        /// Row-major index of the first offending sample.
        index: usize,
    },

    /// Sample count does not match the declared shape.
    #[error("Grid shape {rows}x{cols} does not match {len} samples")]
    ShapeMismatch {
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        cols: usize,
        /// Actual sample count.
        len: usize,
    },

    /// Target grid size must be positive.
    #[error("Invalid grid size {0}")]
    InvalidGridSize(usize),

    /// HTTP request error when fetching tiles.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Raster extent is not a valid geographic box.
    #[error(transparent)]
    Geo(#[from] fsim_geo::GeoError),
}
