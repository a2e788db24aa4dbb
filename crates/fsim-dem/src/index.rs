//! Integer-degree elevation tile index.
//!
//! SRTM-style tiles cover one degree of latitude and longitude and are named
//! by their southwest corner: `S39E177` covers latitude -39 to -38 and
//! longitude 177 to 178.

use fsim_geo::GeoBox;
use std::fmt;

/// Base URL of the AWS Open Data "skadi" SRTM archive.
pub const SKADI_BASE_URL: &str = "https://s3.amazonaws.com/elevation-tiles-prod/skadi";

/// Identifier of a 1°×1° elevation tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElevationTileRef {
    /// Latitude of the southwest corner.
    lat: i32,
    /// Longitude of the southwest corner.
    lon: i32,
}

impl ElevationTileRef {
    /// Tile with the given southwest corner.
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Tile containing a coordinate.
    ///
    /// Tiles are named by their southwest corner, so (-39.05, 177.41) falls
    /// in `S40E177`.
    pub fn from_coord(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.floor() as i32,
            lon: lon.floor() as i32,
        }
    }

    /// Parse a tile name like `S39E177`, `n48w123` or `S39E177.hgt`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let mut chars = upper.chars().peekable();

        while let Some(c) = chars.next() {
            if c != 'N' && c != 'S' {
                continue;
            }
            let is_north = c == 'N';

            let mut lat_str = String::new();
            while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                lat_str.push(d);
            }

            let is_east = match chars.next_if(|d| *d == 'E' || *d == 'W') {
                Some(dir) => dir == 'E',
                None => continue,
            };

            let mut lon_str = String::new();
            while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                lon_str.push(d);
            }

            if lat_str.is_empty() || lon_str.is_empty() {
                continue;
            }

            let lat: i32 = lat_str.parse().ok()?;
            let lon: i32 = lon_str.parse().ok()?;
            return Some(Self {
                lat: if is_north { lat } else { -lat },
                lon: if is_east { lon } else { -lon },
            });
        }

        None
    }

    /// Latitude of the southwest corner.
    pub fn lat(&self) -> i32 {
        self.lat
    }

    /// Longitude of the southwest corner.
    pub fn lon(&self) -> i32 {
        self.lon
    }

    /// Tile name, e.g. `S39E177`.
    pub fn name(&self) -> String {
        let lon_prefix = if self.lon >= 0 { 'E' } else { 'W' };
        format!("{}{}{:03}", self.lat_dir(), lon_prefix, self.lon.unsigned_abs())
    }

    /// Latitude directory used by the archive layout, e.g. `S39`.
    pub fn lat_dir(&self) -> String {
        let prefix = if self.lat >= 0 { 'N' } else { 'S' };
        format!("{}{:02}", prefix, self.lat.unsigned_abs())
    }

    /// File name of the continuous raster representation.
    pub fn tif_file_name(&self) -> String {
        format!("{}.tif", self.name())
    }

    /// File name of the archive raster representation.
    pub fn hgt_file_name(&self) -> String {
        format!("{}.hgt", self.name())
    }

    /// Download URL of the gzipped archive raster under `base_url`
    /// (normally [`SKADI_BASE_URL`]).
    pub fn archive_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}.hgt.gz",
            base_url.trim_end_matches('/'),
            self.lat_dir(),
            self.name()
        )
    }
}

impl fmt::Display for ElevationTileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Every tile intersecting `bounds`, latitude-major in ascending order.
pub fn elevation_tiles(bounds: &GeoBox) -> Vec<ElevationTileRef> {
    let lat_min = bounds.south().floor() as i32;
    let lat_max = bounds.north().floor() as i32;
    let lon_min = bounds.west().floor() as i32;
    let lon_max = bounds.east().floor() as i32;

    (lat_min..=lat_max)
        .flat_map(|lat| (lon_min..=lon_max).map(move |lon| ElevationTileRef::new(lat, lon)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tile_name() {
        assert_eq!(ElevationTileRef::new(-39, 177).name(), "S39E177");
        assert_eq!(ElevationTileRef::new(47, -123).name(), "N47W123");
        assert_eq!(ElevationTileRef::new(0, 0).name(), "N00E000");
        assert_eq!(ElevationTileRef::new(-1, -1).name(), "S01W001");
        assert_eq!(ElevationTileRef::new(5, 7).name(), "N05E007");
    }

    #[test]
    fn test_tile_paths() {
        let tile = ElevationTileRef::new(-39, 177);
        assert_eq!(tile.lat_dir(), "S39");
        assert_eq!(tile.tif_file_name(), "S39E177.tif");
        assert_eq!(tile.hgt_file_name(), "S39E177.hgt");
        assert_eq!(
            tile.archive_url(SKADI_BASE_URL),
            "https://s3.amazonaws.com/elevation-tiles-prod/skadi/S39/S39E177.hgt.gz"
        );
        assert_eq!(
            tile.archive_url("http://mirror.local/skadi/"),
            "http://mirror.local/skadi/S39/S39E177.hgt.gz"
        );
    }

    #[test]
    fn test_from_coord() {
        assert_eq!(ElevationTileRef::from_coord(-39.05, 177.41), ElevationTileRef::new(-40, 177));
        assert_eq!(ElevationTileRef::from_coord(47.6062, -122.3321), ElevationTileRef::new(47, -123));
        assert_eq!(ElevationTileRef::from_coord(0.0, 0.0), ElevationTileRef::new(0, 0));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ElevationTileRef::from_name("S39E177"), Some(ElevationTileRef::new(-39, 177)));
        assert_eq!(ElevationTileRef::from_name("S39E177.hgt"), Some(ElevationTileRef::new(-39, 177)));
        assert_eq!(
            ElevationTileRef::from_name("USGS_13_n48w123_20240327.tif"),
            Some(ElevationTileRef::new(48, -123))
        );
        assert_eq!(ElevationTileRef::from_name("invalid.tif"), None);

        for tile in [ElevationTileRef::new(-39, 177), ElevationTileRef::new(12, -5)] {
            assert_eq!(ElevationTileRef::from_name(&tile.name()), Some(tile));
        }
    }

    #[test]
    fn test_single_cell_box() {
        let bounds = GeoBox::new(-39.07, 177.38, -39.03, 177.44).unwrap();
        assert_eq!(elevation_tiles(&bounds), vec![ElevationTileRef::new(-40, 177)]);
    }

    #[test]
    fn test_enumeration_is_exhaustive_and_minimal() {
        let bounds = GeoBox::new(-40.5, 176.2, -38.1, 178.9).unwrap();
        let tiles = elevation_tiles(&bounds);

        // 3 latitude rows (-41, -40, -39) x 3 longitude columns (176, 177, 178)
        assert_eq!(tiles.len(), 9);
        let unique: HashSet<_> = tiles.iter().collect();
        assert_eq!(unique.len(), tiles.len());

        for tile in &tiles {
            assert!(tile.lat() >= -41 && tile.lat() <= -39);
            assert!(tile.lon() >= 176 && tile.lon() <= 178);
        }

        // Every sample point inside the box falls in an enumerated tile.
        for i in 0..=20 {
            for j in 0..=20 {
                let lat = bounds.south() + bounds.lat_span() * i as f64 / 20.0;
                let lon = bounds.west() + bounds.lon_span() * j as f64 / 20.0;
                assert!(unique.contains(&ElevationTileRef::from_coord(lat, lon)));
            }
        }
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let bounds = GeoBox::new(10.5, -3.5, 12.5, -1.5).unwrap();
        let tiles = elevation_tiles(&bounds);
        let mut sorted = tiles.clone();
        sorted.sort();
        assert_eq!(tiles, sorted);
        assert_eq!(tiles, elevation_tiles(&bounds));
    }
}
