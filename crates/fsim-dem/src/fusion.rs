//! Merge, clip, repair and resample rasters into one N×N grid.

use crate::grid::ElevationGrid;
use crate::raster::{ElevationRaster, GeoTransform};
use crate::resample::resample_cubic;
use crate::{DemError, Result};
use fsim_geo::GeoBox;
use fsim_metrics::metric_defs;
use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default sentinel threshold: samples at or below this are treated as voids.
pub const DEFAULT_SENTINEL_THRESHOLD: f32 = -1000.0;

/// Relative tolerance when comparing pixel sizes of rasters to be merged.
const RESOLUTION_TOLERANCE: f64 = 1e-6;

/// Fusion tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Samples `<=` this value are flagged as nodata.
    pub sentinel_threshold: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            sentinel_threshold: DEFAULT_SENTINEL_THRESHOLD,
        }
    }
}

/// What happened during fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionReport {
    /// Number of input rasters.
    pub rasters: usize,
    /// Shape of the clipped window before resampling, as (rows, cols).
    pub source_shape: (usize, usize),
    /// Cells flagged as nodata and replaced.
    pub repaired_cells: usize,
    /// No valid sample existed; the grid was filled with zeros.
    pub all_nodata: bool,
}

/// A fused grid and its report.
#[derive(Debug, Clone)]
pub struct FusedElevation {
    /// The N×N grid.
    pub grid: ElevationGrid,
    /// Fusion diagnostics.
    pub report: FusionReport,
}

/// Fuse `rasters` into a `grid_size × grid_size` grid covering `bounds`.
///
/// With no bounds, the full extent of the (merged) rasters is used.
pub fn fuse(
    rasters: &[ElevationRaster],
    bounds: Option<&GeoBox>,
    grid_size: usize,
    config: &FusionConfig,
) -> Result<FusedElevation> {
    if rasters.is_empty() {
        return Err(DemError::NoTilesFound);
    }
    if grid_size == 0 {
        return Err(DemError::InvalidGridSize(grid_size));
    }
    let start = Instant::now();

    let merged: Cow<'_, ElevationRaster> = match rasters {
        [single] => Cow::Borrowed(single),
        _ => Cow::Owned(mosaic(rasters)?),
    };

    let (mut data, rows, cols, out_bounds) = match bounds {
        Some(bounds) => {
            let window = merged.window(bounds)?;
            debug!(
                "Clip window rows {}..{} cols {}..{}",
                window.row_min, window.row_max, window.col_min, window.col_max
            );
            (merged.read_window(&window), window.rows(), window.cols(), *bounds)
        }
        None => {
            let (width, height) = merged.dimensions();
            let extent = merged.extent().to_geo_box()?;
            (merged.data().to_vec(), height, width, extent)
        }
    };

    let repair = repair_nodata(&mut data, merged.nodata(), config.sentinel_threshold);
    if repair.all_nodata {
        warn!("No valid elevation samples in {}; grid filled with zeros", out_bounds);
    } else if repair.repaired > 0 {
        debug!("Repaired {} nodata cells", repair.repaired);
    }

    let values = resample_cubic(&data, rows, cols, grid_size, grid_size)?;
    let grid = ElevationGrid::new(values, grid_size, grid_size, out_bounds)?;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!(metric_defs::FUSION_DURATION.name).record(elapsed_ms);
    metrics::counter!(metric_defs::FUSION_REPAIRED_CELLS.name).increment(repair.repaired as u64);
    info!(
        "Fused {} raster(s) {}x{} -> {}x{} in {:.1} ms",
        rasters.len(),
        rows,
        cols,
        grid_size,
        grid_size,
        elapsed_ms
    );

    Ok(FusedElevation {
        grid,
        report: FusionReport {
            rasters: rasters.len(),
            source_shape: (rows, cols),
            repaired_cells: repair.repaired,
            all_nodata: repair.all_nodata,
        },
    })
}

/// Merge rasters onto a common grid.
///
/// The canvas uses the first raster's pixel size and the union of all
/// extents. Where rasters overlap the first one wins; declared nodata never
/// claims a cell. Uncovered cells are NaN.
pub fn mosaic(rasters: &[ElevationRaster]) -> Result<ElevationRaster> {
    let first = rasters.first().ok_or(DemError::NoTilesFound)?;
    let pw = first.transform().pixel_width;
    let ph = first.transform().pixel_height;

    for raster in &rasters[1..] {
        let t = raster.transform();
        if !same_size(t.pixel_width, pw) || !same_size(t.pixel_height, ph) {
            return Err(DemError::ResolutionMismatch(pw, t.pixel_width));
        }
    }

    let mut west = f64::INFINITY;
    let mut north = f64::NEG_INFINITY;
    let mut east = f64::NEG_INFINITY;
    let mut south = f64::INFINITY;
    for raster in rasters {
        let extent = raster.extent();
        west = west.min(extent.west);
        north = north.max(extent.north);
        east = east.max(extent.east);
        south = south.min(extent.south);
    }

    let width = ((east - west) / pw.abs()).round() as usize;
    let height = ((north - south) / ph.abs()).round() as usize;
    let mut canvas = vec![f32::NAN; width * height];

    for raster in rasters {
        let t = raster.transform();
        let col_offset = ((t.origin_lon - west) / pw).round() as usize;
        let row_offset = ((t.origin_lat - north) / ph).round() as usize;
        let (w, h) = raster.dimensions();

        for row in 0..h {
            let dst_row = row + row_offset;
            if dst_row >= height {
                break;
            }
            for col in 0..w {
                let dst_col = col + col_offset;
                if dst_col >= width {
                    break;
                }
                let cell = &mut canvas[dst_row * width + dst_col];
                let value = raster.get(col, row);
                if cell.is_nan() && !value.is_nan() && !raster.is_nodata(value) {
                    *cell = value;
                }
            }
        }
    }

    debug!("Mosaicked {} rasters onto {}x{} canvas", rasters.len(), width, height);

    let transform = GeoTransform {
        origin_lon: west,
        origin_lat: north,
        pixel_width: pw,
        pixel_height: ph,
    };
    ElevationRaster::new(canvas, width, height, transform, None)
}

fn same_size(a: f64, b: f64) -> bool {
    (a - b).abs() <= RESOLUTION_TOLERANCE * b.abs()
}

/// Outcome of [`repair_nodata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodataRepair {
    /// Cells replaced.
    pub repaired: usize,
    /// No valid sample existed.
    pub all_nodata: bool,
}

/// Replace flagged cells with the minimum valid sample.
///
/// A cell is flagged when it is NaN, equals `nodata`, or is at or below
/// `threshold`. Without any valid sample every cell becomes 0.
pub fn repair_nodata(data: &mut [f32], nodata: Option<f32>, threshold: f32) -> NodataRepair {
    let flagged = |v: f32| {
        v.is_nan() || v <= threshold || nodata.is_some_and(|nd| (v - nd).abs() < 0.001)
    };

    let min_valid = data
        .iter()
        .copied()
        .filter(|&v| !flagged(v))
        .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |m| m.min(v))));
    let fill = min_valid.unwrap_or(0.0);

    let mut repaired = 0;
    for value in data.iter_mut() {
        if flagged(*value) {
            *value = fill;
            repaired += 1;
        }
    }

    NodataRepair {
        repaired,
        all_nodata: min_valid.is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raster(origin_lon: f64, origin_lat: f64, width: usize, height: usize, step: f64) -> ElevationRaster {
        let transform = GeoTransform {
            origin_lon,
            origin_lat,
            pixel_width: step,
            pixel_height: -step,
        };
        let data = (0..width * height)
            .map(|i| {
                let (r, c) = (i / width, i % width);
                let lon = origin_lon + (c as f64 + 0.5) * step;
                let lat = origin_lat - (r as f64 + 0.5) * step;
                (100.0 + 50.0 * lon.sin() + 30.0 * (lat * 3.0).cos()) as f32
            })
            .collect();
        ElevationRaster::new(data, width, height, transform, Some(-32768.0)).unwrap()
    }

    #[test]
    fn test_output_is_square() {
        let source = raster(177.0, -39.0, 40, 30, 0.025);
        let bounds = GeoBox::new(-39.5, 177.2, -39.1, 177.8).unwrap();

        for n in [8, 16, 64, 100] {
            let fused = fuse(&[source.clone()], Some(&bounds), n, &FusionConfig::default()).unwrap();
            assert_eq!(fused.grid.rows(), n);
            assert_eq!(fused.grid.cols(), n);
            assert_eq!(fused.grid.values().len(), n * n);
            assert_eq!(*fused.grid.bounds(), bounds);
        }
    }

    #[test]
    fn test_full_extent_without_bounds() {
        let source = raster(177.0, -39.0, 20, 20, 0.05);
        let fused = fuse(&[source], None, 10, &FusionConfig::default()).unwrap();
        let bounds = fused.grid.bounds();
        assert_relative_eq!(bounds.west(), 177.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.east(), 178.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.north(), -39.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.south(), -40.0, epsilon = 1e-9);
        assert_eq!(fused.report.source_shape, (20, 20));
    }

    #[test]
    fn test_sentinels_are_repaired() {
        let mut source = raster(177.0, -39.0, 10, 10, 0.1);
        let mut data = source.data().to_vec();
        data[5] = -32768.0;
        data[17] = -9999.0;
        data[42] = f32::NAN;
        let valid_min = data
            .iter()
            .copied()
            .filter(|v| !v.is_nan() && *v > -1000.0)
            .fold(f32::INFINITY, f32::min);
        source = ElevationRaster::new(data, 10, 10, *source.transform(), source.nodata()).unwrap();

        let fused = fuse(&[source], None, 10, &FusionConfig::default()).unwrap();
        assert_eq!(fused.report.repaired_cells, 3);
        assert!(!fused.report.all_nodata);
        assert!(fused.grid.values().iter().all(|v| *v > -1000.0 && !v.is_nan()));
        assert_relative_eq!(fused.grid.get(0, 5), valid_min);
    }

    #[test]
    fn test_all_sentinel_fuses_to_zeros() {
        let transform = GeoTransform {
            origin_lon: 10.0,
            origin_lat: 11.0,
            pixel_width: 0.1,
            pixel_height: -0.1,
        };
        let source = ElevationRaster::new(vec![-32768.0; 100], 10, 10, transform, None).unwrap();
        let fused = fuse(&[source], None, 16, &FusionConfig::default()).unwrap();

        assert!(fused.report.all_nodata);
        assert!(fused.grid.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let transform = GeoTransform {
            origin_lon: 0.0,
            origin_lat: 1.0,
            pixel_width: 0.5,
            pixel_height: -0.5,
        };
        let source = ElevationRaster::new(vec![-50.0, 10.0, 20.0, 30.0], 2, 2, transform, None).unwrap();

        let default = fuse(&[source.clone()], None, 2, &FusionConfig::default()).unwrap();
        assert_eq!(default.grid.get(0, 0), -50.0);

        let strict = FusionConfig {
            sentinel_threshold: -10.0,
        };
        let fused = fuse(&[source], None, 2, &strict).unwrap();
        assert_eq!(fused.grid.get(0, 0), 10.0);
    }

    #[test]
    fn test_split_tiles_match_single_raster() {
        let whole = raster(177.0, -39.0, 16, 8, 0.0625);
        let (width, height) = whole.dimensions();
        let half = width / 2;

        let split = |col0: usize| {
            let data: Vec<f32> = (0..height)
                .flat_map(|r| (col0..col0 + half).map(move |c| (r, c)))
                .map(|(r, c)| whole.get(c, r))
                .collect();
            let mut transform = *whole.transform();
            transform.origin_lon += col0 as f64 * transform.pixel_width;
            ElevationRaster::new(data, half, height, transform, whole.nodata()).unwrap()
        };
        let tiles = [split(0), split(half)];

        let bounds = GeoBox::new(-39.4, 177.1, -39.05, 177.9).unwrap();
        let config = FusionConfig::default();
        let single = fuse(&[whole.clone()], Some(&bounds), 32, &config).unwrap();
        let merged = fuse(&tiles, Some(&bounds), 32, &config).unwrap();
        assert_eq!(single.grid.values(), merged.grid.values());

        let single = fuse(&[whole], None, 12, &config).unwrap();
        let merged = fuse(&tiles, None, 12, &config).unwrap();
        assert_eq!(single.grid.values(), merged.grid.values());
    }

    #[test]
    fn test_mosaic_first_raster_wins_and_nodata_yields() {
        let transform_a = GeoTransform {
            origin_lon: 0.0,
            origin_lat: 1.0,
            pixel_width: 0.5,
            pixel_height: -0.5,
        };
        let transform_b = GeoTransform {
            origin_lon: 0.5,
            ..transform_a
        };
        let a = ElevationRaster::new(vec![1.0, -32768.0, 1.0, 1.0], 2, 2, transform_a, Some(-32768.0)).unwrap();
        let b = ElevationRaster::new(vec![2.0, 2.0, 2.0, 2.0], 2, 2, transform_b, None).unwrap();

        let merged = mosaic(&[a, b]).unwrap();
        assert_eq!(merged.dimensions(), (3, 2));
        // Row 0: a, b fills a's nodata, b
        assert_eq!(merged.get(0, 0), 1.0);
        assert_eq!(merged.get(1, 0), 2.0);
        assert_eq!(merged.get(2, 0), 2.0);
        // Row 1: overlap keeps a
        assert_eq!(merged.get(1, 1), 1.0);
    }

    #[test]
    fn test_mosaic_gap_is_nan() {
        let t1 = GeoTransform {
            origin_lon: 0.0,
            origin_lat: 2.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
        };
        let t2 = GeoTransform {
            origin_lon: 1.0,
            origin_lat: 1.0,
            ..t1
        };
        let a = ElevationRaster::new(vec![5.0], 1, 1, t1, None).unwrap();
        let b = ElevationRaster::new(vec![7.0], 1, 1, t2, None).unwrap();
        let merged = mosaic(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(merged.dimensions(), (2, 2));
        assert!(merged.get(1, 0).is_nan());
        assert!(merged.get(0, 1).is_nan());

        // Gaps are repaired with the minimum valid sample.
        let fused = fuse(&[a, b], None, 2, &FusionConfig::default()).unwrap();
        assert_eq!(fused.report.repaired_cells, 2);
        assert_eq!(fused.grid.get(0, 1), 5.0);
    }

    #[test]
    fn test_resolution_mismatch() {
        let a = raster(0.0, 1.0, 4, 4, 0.25);
        let b = raster(1.0, 1.0, 2, 2, 0.5);
        assert!(matches!(
            fuse(&[a, b], None, 4, &FusionConfig::default()),
            Err(DemError::ResolutionMismatch(..))
        ));
    }

    #[test]
    fn test_no_rasters() {
        assert!(matches!(
            fuse(&[], None, 4, &FusionConfig::default()),
            Err(DemError::NoTilesFound)
        ));
    }

    #[test]
    fn test_box_outside() {
        let source = raster(177.0, -39.0, 10, 10, 0.1);
        let bounds = GeoBox::new(10.0, 10.0, 11.0, 11.0).unwrap();
        assert!(matches!(
            fuse(&[source], Some(&bounds), 4, &FusionConfig::default()),
            Err(DemError::BoxOutsideRaster { .. })
        ));
    }
}
