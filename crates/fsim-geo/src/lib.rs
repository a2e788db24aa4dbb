//! # fsim-geo
//!
//! Geographic primitives shared by every stage of the FSim terrain pipeline.
//!
//! This crate provides:
//! - [`GeoBox`] - a validated (south, west, north, east) rectangle in decimal degrees
//! - [`ScalePreset`] - the immutable table of named scales (radius and default grid size)
//! - [`AreaResolver`] - turns a coordinate, place name, explicit box or raster path
//!   into a canonical box and grid resolution
//! - [`Geocoder`] - the seam for place-name lookup, implemented outside this crate
//!
//! ## Example
//!
//! ```
//! use fsim_geo::{AreaRequest, AreaResolver, LocationInput};
//!
//! let request = AreaRequest::new(Some(LocationInput::Center { lat: -39.05, lon: 177.41 }))
//!     .with_scale("township");
//! let area = AreaResolver::new().resolve(&request)?;
//!
//! let bounds = area.bounds.expect("center input always yields a box");
//! assert!(bounds.south() < bounds.north());
//! assert_eq!(area.grid_size, 256);
//! # Ok::<(), fsim_geo::GeoError>(())
//! ```

mod area;
mod bounds;
mod error;

pub use area::{
    AreaRequest, AreaResolver, Coordinate, Geocoder, LocationInput, ResolvedArea, ScalePreset,
    DEFAULT_SCALE, SCALE_PRESETS,
};
pub use bounds::{GeoBox, KM_PER_DEGREE, METERS_PER_DEGREE};
pub use error::GeoError;

/// Result type for geographic operations.
pub type Result<T> = std::result::Result<T, GeoError>;
