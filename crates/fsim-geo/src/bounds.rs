//! Geographic bounding box.

use crate::{GeoError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Kilometers per degree of latitude used for radius-to-box conversion.
///
/// This is the flat approximation the cell-size math is calibrated against;
/// swapping in a geodesic formula must update [`GeoBox::cell_size_m`] too.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Meters per degree used for scene cell sizes.
pub const METERS_PER_DEGREE: f64 = KM_PER_DEGREE * 1000.0;

/// An axis-aligned geographic rectangle in decimal degrees.
///
/// Always satisfies `south < north` and `west < east` with latitudes inside
/// [-90, 90] and longitudes inside [-180, 180]. Boxes crossing the
/// antimeridian are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBox {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl GeoBox {
    /// Create a box, validating its invariants.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        let invalid = |reason| GeoError::InvalidBounds {
            south,
            west,
            north,
            east,
            reason,
        };

        if ![south, west, north, east].iter().all(|v| v.is_finite()) {
            return Err(invalid("coordinates must be finite"));
        }
        if south >= north {
            return Err(invalid("south must be less than north"));
        }
        if west >= east {
            return Err(invalid("west must be less than east"));
        }
        if south < -90.0 || north > 90.0 {
            return Err(invalid("latitude outside [-90, 90]"));
        }
        if west < -180.0 || east > 180.0 {
            return Err(invalid("longitude outside [-180, 180]"));
        }

        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Box of `radius_km` around a center point.
    ///
    /// Latitude delta is `radius / 111`, longitude delta is
    /// `radius / (111 * cos(lat))`. Fails near the poles where the longitude
    /// delta leaves the valid range.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Result<Self> {
        let dlat = radius_km / KM_PER_DEGREE;
        let dlon = radius_km / (KM_PER_DEGREE * lat.to_radians().cos());
        Self::new(lat - dlat, lon - dlon, lat + dlat, lon + dlon)
    }

    /// South edge (minimum latitude).
    pub fn south(&self) -> f64 {
        self.south
    }

    /// West edge (minimum longitude).
    pub fn west(&self) -> f64 {
        self.west
    }

    /// North edge (maximum latitude).
    pub fn north(&self) -> f64 {
        self.north
    }

    /// East edge (maximum longitude).
    pub fn east(&self) -> f64 {
        self.east
    }

    /// Latitude span in degrees.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    /// Center as (lat, lon).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Check if a coordinate is inside the box (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Physical size of one grid cell in meters when the box is sampled at
    /// `grid_size` cells along its longer side.
    pub fn cell_size_m(&self, grid_size: usize) -> f64 {
        let (center_lat, _) = self.center();
        let lat_extent_m = self.lat_span() * METERS_PER_DEGREE;
        let lon_extent_m = self.lon_span() * METERS_PER_DEGREE * center_lat.to_radians().cos();
        lat_extent_m.max(lon_extent_m) / grid_size as f64
    }
}

impl FromStr for GeoBox {
    type Err = GeoError;

    /// Parse `"south,west,north,east"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| GeoError::Parse(s.to_string()))?;

        match parts.as_slice() {
            [south, west, north, east] => Self::new(*south, *west, *north, *east),
            _ => Err(GeoError::Parse(s.to_string())),
        }
    }
}

impl fmt::Display for GeoBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S={:.4} W={:.4} N={:.4} E={:.4}",
            self.south, self.west, self.north, self.east
        )
    }
}
