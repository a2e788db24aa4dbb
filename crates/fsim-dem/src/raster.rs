//! Decoded elevation rasters and their geotransforms.

use crate::index::ElevationTileRef;
use crate::{DemError, Result};
use fsim_geo::GeoBox;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

/// GeoTIFF ModelPixelScale tag.
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
/// GeoTIFF ModelTiepoint tag.
const TAG_MODEL_TIEPOINT: u16 = 33922;
/// GDAL_NODATA tag (ASCII).
const TAG_GDAL_NODATA: u16 = 42113;

/// No-data value used by SRTM `.hgt` archives.
pub const HGT_NODATA: f32 = -32768.0;

/// Affine transform from pixel space to geographic degrees (north-up, no
/// rotation terms).
///
/// Pixel (col, row) has its top-left corner at
/// `(origin_lon + col * pixel_width, origin_lat + row * pixel_height)`.
/// `pixel_height` is negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Longitude of the top-left corner of pixel (0, 0).
    pub origin_lon: f64,
    /// Latitude of the top-left corner of pixel (0, 0).
    pub origin_lat: f64,
    /// Degrees of longitude per pixel.
    pub pixel_width: f64,
    /// Degrees of latitude per pixel (negative when rows run southward).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Geographic position of a (fractional) pixel coordinate as (lon, lat).
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_lon + col * self.pixel_width,
            self.origin_lat + row * self.pixel_height,
        )
    }

    /// Fractional pixel coordinate (col, row) of a geographic position.
    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (lon - self.origin_lon) / self.pixel_width,
            (lat - self.origin_lat) / self.pixel_height,
        )
    }
}

/// Geographic extent of a raster, not yet validated as a [`GeoBox`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterExtent {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl RasterExtent {
    /// Convert to a [`GeoBox`], clamping to the valid coordinate range.
    ///
    /// Archive tiles extend half a pixel past their integer-degree edges, so
    /// a tile touching a pole or the antimeridian needs the clamp.
    pub fn to_geo_box(&self) -> Result<GeoBox> {
        Ok(GeoBox::new(
            self.south.max(-90.0),
            self.west.max(-180.0),
            self.north.min(90.0),
            self.east.min(180.0),
        )?)
    }
}

/// Half-open pixel window `[row_min, row_max) x [col_min, col_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    /// First row.
    pub row_min: usize,
    /// One past the last row.
    pub row_max: usize,
    /// First column.
    pub col_min: usize,
    /// One past the last column.
    pub col_max: usize,
}

impl PixelWindow {
    /// Number of rows in the window.
    pub fn rows(&self) -> usize {
        self.row_max - self.row_min
    }

    /// Number of columns in the window.
    pub fn cols(&self) -> usize {
        self.col_max - self.col_min
    }
}

/// A single-band elevation raster in memory.
#[derive(Debug, Clone)]
pub struct ElevationRaster {
    /// Elevation data in row-major order (north to south, west to east).
    data: Vec<f32>,
    /// Width in pixels.
    width: usize,
    /// Height in pixels.
    height: usize,
    /// Pixel-to-geographic transform.
    transform: GeoTransform,
    /// Declared no-data value.
    nodata: Option<f32>,
}

impl ElevationRaster {
    /// Build a raster from decoded samples.
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f32>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(DemError::ShapeMismatch {
                rows: height,
                cols: width,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            transform,
            nodata,
        })
    }

    /// Open a raster file, choosing the decoder by extension.
    ///
    /// `.hgt` files are read as SRTM archives; anything else is treated as a
    /// GeoTIFF.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_hgt = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("hgt"));

        debug!("Loading raster {}", path.display());
        if is_hgt {
            Self::from_hgt_file(path)
        } else {
            Self::from_geotiff(path)
        }
    }

    /// Load a GeoTIFF.
    ///
    /// The geotransform comes from the ModelTiepoint and ModelPixelScale
    /// tags; when those are missing the tile name in
    /// the filename (e.g. `S39E177.tif`) is used as a 1° cell.
    pub fn from_geotiff<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut decoder = Decoder::new(file)?;

        // 1 arc-second tiles are 3601 x 3601; USGS 1/3 arc-second tiles reach
        // ~116 million f32 pixels.
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 1024 * 1024 * 1024;
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => return Err(DemError::UnsupportedDataType(format!("{:?}", other))),
        }

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let transform = match Self::read_geotransform(&mut decoder) {
            Some(transform) => transform,
            None => Self::transform_from_filename(path, width, height)?,
        };
        let nodata = Self::read_nodata_value(&mut decoder);
        let data = Self::decode_elevation_data(&mut decoder)?;

        Self::new(data, width, height, transform, nodata)
    }

    /// Load an SRTM `.hgt` archive tile.
    pub fn from_hgt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DemError::InvalidFilename(path.display().to_string()))?;
        let tile = ElevationTileRef::from_name(name)
            .ok_or_else(|| DemError::InvalidFilename(name.to_string()))?;
        let bytes = std::fs::read(path)?;

        Self::from_hgt_bytes(&bytes, tile).map_err(|e| match e {
            DemError::InvalidHgt { reason, .. } => DemError::InvalidHgt {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Decode SRTM `.hgt` bytes for a known tile.
    ///
    /// The archive is a square grid of big-endian `i16` samples whose outer
    /// rows and columns sit exactly on the integer-degree edges, so pixel
    /// centers are offset by half a pixel from the cell corners.
    pub fn from_hgt_bytes(bytes: &[u8], tile: ElevationTileRef) -> Result<Self> {
        let invalid = |reason: String| DemError::InvalidHgt {
            path: tile.hgt_file_name(),
            reason,
        };

        if bytes.len() % 2 != 0 {
            return Err(invalid(format!("odd byte count {}", bytes.len())));
        }
        let samples = bytes.len() / 2;
        let side = (samples as f64).sqrt().round() as usize;
        if side < 2 || side * side != samples {
            return Err(invalid(format!("{} samples is not a square grid", samples)));
        }

        let data: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]) as f32)
            .collect();

        let step = 1.0 / (side - 1) as f64;
        let transform = GeoTransform {
            origin_lon: tile.lon() as f64 - step / 2.0,
            origin_lat: (tile.lat() + 1) as f64 + step / 2.0,
            pixel_width: step,
            pixel_height: -step,
        };

        Self::new(data, side, side, transform, Some(HGT_NODATA))
    }

    /// Read the geotransform from GeoTIFF tags.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Option<GeoTransform> {
        let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT)).ok()?;
        let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE)).ok()?;
        if tiepoint.len() < 6 || scale.len() < 2 {
            return None;
        }

        // Tiepoint format: [i, j, k, x, y, z] where (i, j) is a pixel and (x, y) its position
        let (tie_i, tie_j) = (tiepoint[0], tiepoint[1]);
        let (tie_x, tie_y) = (tiepoint[3], tiepoint[4]);
        let (scale_x, scale_y) = (scale[0], scale[1]);

        Some(GeoTransform {
            origin_lon: tie_x - tie_i * scale_x,
            origin_lat: tie_y + tie_j * scale_y,
            pixel_width: scale_x,
            pixel_height: -scale_y,
        })
    }

    /// Treat the raster as covering the 1° cell named in its filename.
    fn transform_from_filename(path: &Path, width: usize, height: usize) -> Result<GeoTransform> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DemError::InvalidFilename(path.display().to_string()))?;
        let tile = ElevationTileRef::from_name(filename).ok_or_else(|| {
            DemError::InvalidGeoTiff(format!(
                "{} has no georeferencing tags and no tile name",
                filename
            ))
        })?;

        Ok(GeoTransform {
            origin_lon: tile.lon() as f64,
            origin_lat: (tile.lat() + 1) as f64,
            pixel_width: 1.0 / width as f64,
            pixel_height: -1.0 / height as f64,
        })
    }

    /// Decode elevation data from the TIFF decoder.
    fn decode_elevation_data<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Vec<f32>> {
        let result = decoder.read_image()?;

        match result {
            DecodingResult::F32(data) => Ok(data),
            DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Read the GDAL_NODATA tag.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
    }

    /// Raw samples, row-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Dimensions as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Pixel-to-geographic transform.
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Declared no-data value.
    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// Whether `value` equals the declared no-data value.
    pub fn is_nodata(&self, value: f32) -> bool {
        self.nodata.is_some_and(|nd| (value - nd).abs() < 0.001)
    }

    /// Sample at a pixel.
    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.data[row * self.width + col]
    }

    /// Outer geographic extent of the raster.
    pub fn extent(&self) -> RasterExtent {
        let (west, north) = self.transform.pixel_to_geo(0.0, 0.0);
        let (east, south) = self
            .transform
            .pixel_to_geo(self.width as f64, self.height as f64);
        RasterExtent {
            west: west.min(east),
            south: south.min(north),
            east: west.max(east),
            north: south.max(north),
        }
    }

    /// Pixel window covering `bounds`, via the inverted geotransform.
    ///
    /// Edges are rounded outward and clamped to the raster; a window thinner
    /// than one pixel is widened to one pixel.
    pub fn window(&self, bounds: &GeoBox) -> Result<PixelWindow> {
        let (c0, r0) = self.transform.geo_to_pixel(bounds.west(), bounds.north());
        let (c1, r1) = self.transform.geo_to_pixel(bounds.east(), bounds.south());
        let (c0, r0, c1, r1) = (snap(c0), snap(r0), snap(c1), snap(r1));
        let (c0, c1) = (c0.min(c1), c0.max(c1));
        let (r0, r1) = (r0.min(r1), r0.max(r1));

        let (w, h) = (self.width as f64, self.height as f64);
        if c1 <= 0.0 || r1 <= 0.0 || c0 >= w || r0 >= h {
            return Err(DemError::BoxOutsideRaster {
                bounds: bounds.to_string(),
            });
        }

        let col_min = c0.floor().max(0.0) as usize;
        let row_min = r0.floor().max(0.0) as usize;
        let col_max = (c1.ceil().min(w) as usize).max(col_min + 1);
        let row_max = (r1.ceil().min(h) as usize).max(row_min + 1);

        Ok(PixelWindow {
            row_min,
            row_max,
            col_min,
            col_max,
        })
    }

    /// Copy the samples inside a window, row-major.
    pub fn read_window(&self, window: &PixelWindow) -> Vec<f32> {
        let mut out = Vec::with_capacity(window.rows() * window.cols());
        for row in window.row_min..window.row_max {
            let start = row * self.width;
            out.extend_from_slice(&self.data[start + window.col_min..start + window.col_max]);
        }
        out
    }
}

/// Round pixel coordinates that are within floating-point noise of an
/// integer, so box edges on pixel boundaries do not pick up an extra pixel.
fn snap(v: f64) -> f64 {
    let rounded = v.round();
    if (v - rounded).abs() < 1e-6 {
        rounded
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn degree_raster(width: usize, height: usize) -> ElevationRaster {
        let transform = GeoTransform {
            origin_lon: 177.0,
            origin_lat: -39.0,
            pixel_width: 1.0 / width as f64,
            pixel_height: -1.0 / height as f64,
        };
        let data = (0..width * height).map(|i| i as f32).collect();
        ElevationRaster::new(data, width, height, transform, None).unwrap()
    }

    #[test]
    fn test_shape_is_checked() {
        let transform = GeoTransform {
            origin_lon: 0.0,
            origin_lat: 1.0,
            pixel_width: 0.5,
            pixel_height: -0.5,
        };
        assert!(ElevationRaster::new(vec![0.0; 3], 2, 2, transform, None).is_err());
        assert!(ElevationRaster::new(vec![], 0, 0, transform, None).is_err());
    }

    #[test]
    fn test_transform_roundtrip() {
        let raster = degree_raster(100, 100);
        let t = raster.transform();
        let (lon, lat) = t.pixel_to_geo(25.0, 75.0);
        assert_relative_eq!(lon, 177.25, epsilon = 1e-12);
        assert_relative_eq!(lat, -39.75, epsilon = 1e-12);

        let (col, row) = t.geo_to_pixel(lon, lat);
        assert_relative_eq!(col, 25.0, epsilon = 1e-9);
        assert_relative_eq!(row, 75.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extent() {
        let extent = degree_raster(10, 20).extent();
        assert_relative_eq!(extent.west, 177.0);
        assert_relative_eq!(extent.east, 178.0, epsilon = 1e-12);
        assert_relative_eq!(extent.north, -39.0);
        assert_relative_eq!(extent.south, -40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_window_inside() {
        let raster = degree_raster(100, 100);
        let bounds = GeoBox::new(-39.5, 177.2, -39.1, 177.6).unwrap();
        let window = raster.window(&bounds).unwrap();

        assert_eq!(window.col_min, 20);
        assert_eq!(window.col_max, 60);
        assert_eq!(window.row_min, 10);
        assert_eq!(window.row_max, 50);
        assert_eq!(raster.read_window(&window).len(), 40 * 40);
        assert_eq!(raster.read_window(&window)[0], raster.get(20, 10));
    }

    #[test]
    fn test_window_is_clamped() {
        let raster = degree_raster(100, 100);
        let bounds = GeoBox::new(-40.5, 176.5, -39.5, 177.5).unwrap();
        let window = raster.window(&bounds).unwrap();
        assert_eq!(window.col_min, 0);
        assert_eq!(window.col_max, 50);
        assert_eq!(window.row_min, 50);
        assert_eq!(window.row_max, 100);
    }

    #[test]
    fn test_window_single_pixel() {
        let raster = degree_raster(10, 10);
        let bounds = GeoBox::new(-39.52, 177.51, -39.51, 177.52).unwrap();
        let window = raster.window(&bounds).unwrap();
        assert_eq!(window.rows(), 1);
        assert_eq!(window.cols(), 1);
    }

    #[test]
    fn test_window_outside() {
        let raster = degree_raster(10, 10);
        let bounds = GeoBox::new(10.0, 10.0, 11.0, 11.0).unwrap();
        assert!(matches!(
            raster.window(&bounds),
            Err(DemError::BoxOutsideRaster { .. })
        ));
    }

    #[test]
    fn test_hgt_decoding() {
        // 3x3 archive: big-endian i16 with one void sample
        let samples: [i16; 9] = [10, 20, 30, 40, -32768, 60, 70, 80, 90];
        let bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_be_bytes()).collect();
        let raster = ElevationRaster::from_hgt_bytes(&bytes, ElevationTileRef::new(-40, 177)).unwrap();

        assert_eq!(raster.dimensions(), (3, 3));
        assert_eq!(raster.get(1, 0), 20.0);
        assert!(raster.is_nodata(raster.get(1, 1)));

        // Outer pixel centers sit on the integer-degree edges.
        let t = raster.transform();
        let (lon, lat) = t.pixel_to_geo(0.5, 0.5);
        assert_relative_eq!(lon, 177.0, epsilon = 1e-12);
        assert_relative_eq!(lat, -39.0, epsilon = 1e-12);
        let (lon, lat) = t.pixel_to_geo(2.5, 2.5);
        assert_relative_eq!(lon, 178.0, epsilon = 1e-12);
        assert_relative_eq!(lat, -40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hgt_rejects_non_square() {
        let bytes = vec![0u8; 2 * 6];
        assert!(matches!(
            ElevationRaster::from_hgt_bytes(&bytes, ElevationTileRef::new(0, 0)),
            Err(DemError::InvalidHgt { .. })
        ));
    }
}
