//! Slippy-map tile indexing.
//!
//! Uses the OpenStreetMap tile naming convention:
//! - `z` is the zoom level (1-18 here)
//! - `x` is the column (0 to 2^z - 1, from west to east)
//! - `y` is the row (0 to 2^z - 1, from north to south)
//!
//! At zoom 14 one tile spans ~0.022° of longitude (about 2.4 km at the
//! equator).

use crate::{OverlayError, Result};
use fsim_geo::GeoBox;
use std::f64::consts::PI;
use std::fmt;
use std::path::{Path, PathBuf};

/// Minimum zoom level used for overlays.
pub const MIN_ZOOM: u8 = 1;

/// Maximum zoom level used for overlays.
pub const MAX_ZOOM: u8 = 18;

/// Web Mercator latitude limit (arctan(sinh(π))), rounded.
pub const MAX_MERCATOR_LAT: f64 = 85.0511;

/// Pixels per tile edge on standard raster tile servers.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// OSM-style tile coordinates (z, x, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapTileRef {
    /// Zoom level.
    pub z: u8,
    /// Column, 0 at 180°W, increasing eastward.
    pub x: u32,
    /// Row, 0 at ~85.05°N, increasing southward.
    pub y: u32,
}

impl MapTileRef {
    /// Create a tile reference, checking the coordinates against the zoom level.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self> {
        let n = 1u32 << z;
        if z > MAX_ZOOM || x >= n || y >= n {
            return Err(OverlayError::InvalidTile { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Tile containing a coordinate.
    ///
    /// Latitude is clamped to the Mercator limit and indices to `2^z - 1`, so
    /// coordinates on the east or south edge of the world stay in range.
    pub fn from_lat_lon(lat: f64, lon: f64, z: u8) -> Self {
        let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
        let n = (1u64 << z) as f64;

        let x = ((lon + 180.0) / 360.0 * n).floor().max(0.0) as u32;
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n)
            .floor()
            .max(0.0) as u32;

        let max_coord = (1u32 << z) - 1;
        Self {
            z,
            x: x.min(max_coord),
            y: y.min(max_coord),
        }
    }

    /// Latitude and longitude of the tile's northwest corner.
    pub fn north_west(&self) -> (f64, f64) {
        tile_corner(self.x, self.y, self.z)
    }

    /// Server path component, `z/x/y`.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Cache file path, `<dir>/z/x/y.png`.
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir
            .join(self.z.to_string())
            .join(self.x.to_string())
            .join(format!("{}.png", self.y))
    }
}

impl fmt::Display for MapTileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Latitude and longitude of grid corner `(x, y)` at zoom `z`.
///
/// Corners run from 0 to `2^z` inclusive, so the southeast corner of the
/// last tile is addressable.
pub fn tile_corner(x: u32, y: u32, z: u8) -> (f64, f64) {
    let n = (1u64 << z) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    (lat, lon)
}

/// Zoom level at which `bounds` spans roughly `target_px` pixels along its
/// longer side, clamped to [`MIN_ZOOM`, `MAX_ZOOM`].
pub fn choose_zoom(bounds: &GeoBox, target_px: u32) -> u8 {
    let span = bounds.lat_span().max(bounds.lon_span());
    let z = (target_px as f64 * 360.0 / (span * DEFAULT_TILE_SIZE as f64))
        .log2()
        .round();
    z.clamp(MIN_ZOOM as f64, MAX_ZOOM as f64) as u8
}

/// Rectangular block of tiles at one zoom level, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTileRange {
    /// Zoom level.
    pub zoom: u8,
    /// Westmost column.
    pub x_min: u32,
    /// Eastmost column.
    pub x_max: u32,
    /// Northmost row.
    pub y_min: u32,
    /// Southmost row.
    pub y_max: u32,
}

impl MapTileRange {
    /// Tiles covering `bounds` at zoom `z`.
    pub fn covering(bounds: &GeoBox, z: u8) -> Self {
        let nw = MapTileRef::from_lat_lon(bounds.north(), bounds.west(), z);
        let se = MapTileRef::from_lat_lon(bounds.south(), bounds.east(), z);
        Self {
            zoom: z,
            x_min: nw.x,
            x_max: se.x,
            y_min: nw.y,
            y_max: se.y,
        }
    }

    /// Number of tile columns.
    pub fn cols(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    /// Number of tile rows.
    pub fn rows(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.cols() as usize * self.rows() as usize
    }

    /// Always false; a range holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `tile` belongs to the range.
    pub fn contains(&self, tile: &MapTileRef) -> bool {
        tile.z == self.zoom
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }

    /// Tiles in row-major order (north to south, west to east).
    pub fn tiles(&self) -> impl Iterator<Item = MapTileRef> + '_ {
        (self.y_min..=self.y_max).flat_map(move |y| {
            (self.x_min..=self.x_max).map(move |x| MapTileRef {
                z: self.zoom,
                x,
                y,
            })
        })
    }

    /// Latitude and longitude of the range's northwest corner.
    pub fn north_west(&self) -> (f64, f64) {
        tile_corner(self.x_min, self.y_min, self.zoom)
    }

    /// Latitude and longitude of the range's southeast corner.
    pub fn south_east(&self) -> (f64, f64) {
        tile_corner(self.x_max + 1, self.y_max + 1, self.zoom)
    }
}
