//! Area-of-interest resolution.
//!
//! An [`AreaRequest`] carries whatever the user supplied (a center point, a
//! place name, an explicit box, a local raster) plus a scale preset name and
//! optional overrides. [`AreaResolver::resolve`] turns it into a
//! [`ResolvedArea`]: the bounding box, grid resolution and label that the
//! rest of the pipeline consumes.

use crate::{GeoBox, GeoError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A named scale: search radius and default grid resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePreset {
    /// Preset name as accepted on the command line.
    pub name: &'static str,
    /// Radius around the center point in kilometers.
    pub radius_km: f64,
    /// Default grid size (cells per side).
    pub grid_size: usize,
    /// Vertical exaggeration to force, or `None` to derive it from relief.
    pub vertical_exaggeration: Option<f64>,
}

/// Preset used when none is named.
pub const DEFAULT_SCALE: &str = "township";

/// The immutable preset table.
pub const SCALE_PRESETS: [ScalePreset; 5] = [
    ScalePreset {
        name: "human",
        radius_km: 0.25,
        grid_size: 256,
        vertical_exaggeration: None,
    },
    ScalePreset {
        name: "neighbourhood",
        radius_km: 1.0,
        grid_size: 256,
        vertical_exaggeration: None,
    },
    ScalePreset {
        name: "township",
        radius_km: 3.0,
        grid_size: 256,
        vertical_exaggeration: None,
    },
    ScalePreset {
        name: "catchment",
        radius_km: 25.0,
        grid_size: 256,
        vertical_exaggeration: None,
    },
    ScalePreset {
        name: "regional",
        radius_km: 75.0,
        grid_size: 128,
        vertical_exaggeration: None,
    },
];

impl ScalePreset {
    /// Look up a preset by name.
    pub fn by_name(name: &str) -> Result<&'static ScalePreset> {
        SCALE_PRESETS
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| GeoError::UnknownPreset(name.to_string()))
    }

    /// Names of all presets, in table order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        SCALE_PRESETS.iter().map(|p| p.name)
    }
}

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude (positive = north).
    pub lat: f64,
    /// Longitude (positive = east).
    pub lon: f64,
}

/// Resolves place names to coordinates.
///
/// Implementations return [`GeoError::PlaceNotFound`] when the lookup
/// succeeds but matches nothing, and [`GeoError::Geocode`] for every other
/// failure.
pub trait Geocoder {
    /// Look up a place name.
    fn geocode(&self, place: &str) -> Result<Coordinate>;
}

/// How the user described the area.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Center point; the box comes from the scale preset radius.
    Center {
        /// Latitude.
        lat: f64,
        /// Longitude.
        lon: f64,
    },
    /// Place name, resolved through a [`Geocoder`].
    Place(String),
    /// Explicit box, used verbatim.
    Bounds(GeoBox),
}

/// Everything needed to resolve an area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaRequest {
    /// Location, if any.
    pub location: Option<LocationInput>,
    /// Local raster to use instead of fetched tiles.
    pub raster: Option<PathBuf>,
    /// Scale preset name.
    pub scale: String,
    /// Grid size override.
    pub grid_size: Option<usize>,
    /// Vertical exaggeration override.
    pub vertical_exaggeration: Option<f64>,
}

impl AreaRequest {
    /// Request with the default scale and no overrides.
    pub fn new(location: Option<LocationInput>) -> Self {
        Self {
            location,
            raster: None,
            scale: DEFAULT_SCALE.to_string(),
            grid_size: None,
            vertical_exaggeration: None,
        }
    }

    /// Set the scale preset name.
    pub fn with_scale(mut self, scale: impl Into<String>) -> Self {
        self.scale = scale.into();
        self
    }

    /// Use a local raster.
    pub fn with_raster(mut self, path: impl Into<PathBuf>) -> Self {
        self.raster = Some(path.into());
        self
    }

    /// Override the preset grid size.
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = Some(grid_size);
        self
    }

    /// Force a vertical exaggeration.
    pub fn with_vertical_exaggeration(mut self, factor: f64) -> Self {
        self.vertical_exaggeration = Some(factor);
        self
    }
}

/// The canonical area handed to the rest of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArea {
    /// Box to cover. `None` only when a raster was given without a location;
    /// the raster's own extent is used in that case.
    pub bounds: Option<GeoBox>,
    /// Center coordinate when one was known up front.
    pub center: Option<Coordinate>,
    /// Cells per side of the output grid.
    pub grid_size: usize,
    /// Forced vertical exaggeration, if any.
    pub vertical_exaggeration: Option<f64>,
    /// Scale preset that was applied.
    pub preset: &'static ScalePreset,
    /// Human-readable label for the location.
    pub location_name: String,
    /// Local raster to load instead of fetching tiles.
    pub raster: Option<PathBuf>,
}

/// Turns an [`AreaRequest`] into a [`ResolvedArea`].
#[derive(Default)]
pub struct AreaResolver<'a> {
    geocoder: Option<&'a dyn Geocoder>,
}

impl std::fmt::Debug for AreaResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AreaResolver")
            .field("geocoder", &self.geocoder.is_some())
            .finish()
    }
}

impl<'a> AreaResolver<'a> {
    /// Resolver without place-name support.
    pub fn new() -> Self {
        Self { geocoder: None }
    }

    /// Resolver that uses `geocoder` for [`LocationInput::Place`].
    pub fn with_geocoder(geocoder: &'a dyn Geocoder) -> Self {
        Self {
            geocoder: Some(geocoder),
        }
    }

    /// Resolve the request.
    ///
    /// Precedence follows the input variant; a raster may accompany any
    /// location, in which case it is clipped to the resolved box.
    pub fn resolve(&self, request: &AreaRequest) -> Result<ResolvedArea> {
        let preset = ScalePreset::by_name(&request.scale)?;

        let grid_size = request.grid_size.unwrap_or(preset.grid_size);
        if grid_size < 2 {
            return Err(GeoError::InvalidGridSize(grid_size));
        }

        let vertical_exaggeration = request.vertical_exaggeration.or(preset.vertical_exaggeration);
        if let Some(factor) = vertical_exaggeration {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(GeoError::InvalidExaggeration(factor));
            }
        }

        let (bounds, center, location_name) = match &request.location {
            Some(LocationInput::Place(name)) => {
                let geocoder = self
                    .geocoder
                    .ok_or_else(|| GeoError::Geocode("no geocoder configured".to_string()))?;
                let coord = geocoder.geocode(name)?;
                debug!(
                    "Geocoded '{}' -> ({:.4}, {:.4})",
                    name, coord.lat, coord.lon
                );
                let bounds = GeoBox::around(coord.lat, coord.lon, preset.radius_km)?;
                (Some(bounds), Some(coord), name.clone())
            }
            Some(LocationInput::Center { lat, lon }) => {
                let bounds = GeoBox::around(*lat, *lon, preset.radius_km)?;
                let coord = Coordinate { lat: *lat, lon: *lon };
                (Some(bounds), Some(coord), format!("{:.4}, {:.4}", lat, lon))
            }
            Some(LocationInput::Bounds(bounds)) => {
                let (lat, lon) = bounds.center();
                (
                    Some(*bounds),
                    Some(Coordinate { lat, lon }),
                    "Custom bounds".to_string(),
                )
            }
            None => match &request.raster {
                Some(path) => (None, None, raster_label(path)),
                None => return Err(GeoError::InvalidLocation),
            },
        };

        Ok(ResolvedArea {
            bounds,
            center,
            grid_size,
            vertical_exaggeration,
            preset,
            location_name,
            raster: request.raster.clone(),
        })
    }
}

fn raster_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
