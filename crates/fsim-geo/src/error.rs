//! Error types for area resolution.

use thiserror::Error;

/// Errors that can occur while resolving an area of interest.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Neither a location nor a raster was supplied.
    #[error("No location given: provide a coordinate, a place name, a bounding box or a raster")]
    InvalidLocation,

    /// The geocoder found no match for the place name.
    #[error("Could not geocode: {0}")]
    PlaceNotFound(String),

    /// The geocoder itself failed (transport, decoding, missing geocoder).
    #[error("Geocoding failed: {0}")]
    Geocode(String),

    /// Bounding box violates south < north, west < east or the coordinate ranges.
    #[error("Invalid bounds S={south} W={west} N={north} E={east}: {reason}")]
    InvalidBounds {
        /// South edge.
        south: f64,
        /// West edge.
        west: f64,
        /// North edge.
        north: f64,
        /// East edge.
        east: f64,
        /// Which invariant failed.
        reason: &'static str,
    },

    /// Bounding box string could not be parsed.
    #[error("Cannot parse bounds '{0}': expected \"south,west,north,east\"")]
    Parse(String),

    /// Scale preset name is not in the preset table.
    #[error("Unknown scale preset '{0}'")]
    UnknownPreset(String),

    /// Grid size override must be a positive integer.
    #[error("Invalid grid size {0} (must be at least 2)")]
    InvalidGridSize(usize),

    /// Vertical exaggeration override must be finite and positive.
    #[error("Invalid vertical exaggeration {0}")]
    InvalidExaggeration(f64),
}
