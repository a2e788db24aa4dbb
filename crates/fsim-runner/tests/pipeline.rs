//! End-to-end runs against a synthetic elevation tile and fake network
//! collaborators.

use approx::assert_relative_eq;
use fsim_dem::{ElevationTileRef, LocalCache, TileChain};
use fsim_geo::{AreaRequest, Coordinate, GeoBox, GeoError, Geocoder, LocationInput};
use fsim_overlay::{MapTileRef, MapTileSource, OverlayError};
use fsim_runner::{
    Pipeline, PipelineConfig, PipelineObserver, Stage, TerrainMetadata, HEIGHTMAP_FILE,
    MESH_FILE, METADATA_FILE, OVERLAY_FILE,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const HGT_SIDE: usize = 121;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fsim-runner-it-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Gentle slope rising east and north, with one void sample.
fn write_tile(dir: &Path) -> PathBuf {
    let mut bytes = Vec::with_capacity(HGT_SIDE * HGT_SIDE * 2);
    for row in 0..HGT_SIDE {
        for col in 0..HGT_SIDE {
            let value: i16 = if (row, col) == (10, 50) {
                -32768
            } else {
                10 + (col as i16) * 2 + (HGT_SIDE - 1 - row) as i16
            };
            bytes.extend_from_slice(&value.to_be_bytes());
        }
    }
    let path = dir.join(ElevationTileRef::new(-40, 177).hgt_file_name());
    fs::write(&path, bytes).unwrap();
    path
}

fn read_heightmap(path: &Path) -> Vec<f32> {
    fs::read(path)
        .unwrap()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn napier_box() -> GeoBox {
    GeoBox::new(-39.07, 177.38, -39.03, 177.44).unwrap()
}

struct FixedGeocoder(Coordinate);

impl Geocoder for FixedGeocoder {
    fn geocode(&self, place: &str) -> fsim_geo::Result<Coordinate> {
        if place.is_empty() {
            return Err(GeoError::PlaceNotFound(place.to_string()));
        }
        Ok(self.0)
    }
}

struct PaperMap;

impl MapTileSource for PaperMap {
    fn fetch(&self, _tile: &MapTileRef) -> fsim_overlay::Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(256, 256, Rgb([240, 230, 210]))))
    }
}

struct NoMap;

impl MapTileSource for NoMap {
    fn fetch(&self, tile: &MapTileRef) -> fsim_overlay::Result<DynamicImage> {
        Err(OverlayError::TileUnavailable {
            tile: tile.to_string(),
            reason: "HTTP 429".to_string(),
        })
    }
}

#[derive(Clone, Default)]
struct Recorder {
    warnings: Rc<RefCell<Vec<(Stage, String)>>>,
    finished: Rc<RefCell<Vec<Stage>>>,
}

impl PipelineObserver for Recorder {
    fn stage_finished(&self, stage: Stage, _elapsed: std::time::Duration) {
        self.finished.borrow_mut().push(stage);
    }

    fn warning(&self, stage: Stage, message: &str) {
        self.warnings.borrow_mut().push((stage, message.to_string()));
    }
}

fn offline_pipeline(cache: &Path) -> Pipeline {
    let mut config = PipelineConfig::default();
    config.overlay.output_size = 64;
    Pipeline::new(config).with_tile_chain(TileChain::new().with_source(LocalCache::new(cache)))
}

#[test]
fn test_bounds_to_assets() {
    let cache = temp_dir("bounds-cache");
    write_tile(&cache);
    let out = temp_dir("bounds-out");

    let recorder = Recorder::default();
    let pipeline = offline_pipeline(&cache).with_observer(recorder.clone());
    let request = AreaRequest::new(Some(LocationInput::Bounds(napier_box()))).with_grid_size(256);
    let output = pipeline.run(&request, &out, false).unwrap();

    assert_eq!(
        output.files,
        vec![out.join(HEIGHTMAP_FILE), out.join(METADATA_FILE), out.join(MESH_FILE)]
    );
    assert!(!output.has_overlay());
    assert_eq!(output.fusion.rasters, 1);
    assert_eq!(output.bounds, napier_box());

    let meta = TerrainMetadata::read(&out.join(METADATA_FILE)).unwrap();
    assert_eq!(meta.grid_size, 256);
    assert_eq!(meta.location_name, "Custom bounds");
    assert_eq!(meta.scale, "township");
    assert_eq!(meta.has_overlay, None);
    assert_relative_eq!(meta.bounds.south, -39.07);
    assert_relative_eq!(meta.center_lon, 177.41);
    assert!(meta.cell_size_m > 0.0);
    assert!(meta.elev_min < meta.elev_max);
    assert!([1.0, 1.5, 2.0, 3.0, 5.0].contains(&meta.vertical_exaggeration));

    let heights = read_heightmap(&out.join(HEIGHTMAP_FILE));
    assert_eq!(heights.len(), 256 * 256);
    assert_eq!(heights.iter().cloned().fold(f32::INFINITY, f32::min), 0.0);
    assert!(heights.iter().all(|h| h.is_finite()));

    let glb = fs::read(out.join(MESH_FILE)).unwrap();
    assert_eq!(&glb[0..4], b"glTF");

    assert_eq!(
        *recorder.finished.borrow(),
        vec![Stage::Resolve, Stage::FetchElevation, Stage::Fuse, Stage::Synthesize]
    );
}

#[test]
fn test_overlay_sets_flag() {
    let cache = temp_dir("overlay-cache");
    write_tile(&cache);
    let out = temp_dir("overlay-out");

    let pipeline = offline_pipeline(&cache).with_map_source(PaperMap);
    let request = AreaRequest::new(Some(LocationInput::Bounds(napier_box()))).with_grid_size(32);
    let output = pipeline.run(&request, &out, true).unwrap();

    assert!(output.has_overlay());
    assert_eq!(output.files.last(), Some(&out.join(OVERLAY_FILE)));

    let overlay = image::open(out.join(OVERLAY_FILE)).unwrap();
    assert_eq!((overlay.width(), overlay.height()), (64, 64));

    let meta = TerrainMetadata::read(&out.join(METADATA_FILE)).unwrap();
    assert_eq!(meta.has_overlay, Some(true));
}

#[test]
fn test_overlay_failure_is_soft() {
    let cache = temp_dir("nomap-cache");
    write_tile(&cache);
    let out = temp_dir("nomap-out");

    let recorder = Recorder::default();
    let pipeline = offline_pipeline(&cache)
        .with_map_source(NoMap)
        .with_observer(recorder.clone());
    let request = AreaRequest::new(Some(LocationInput::Bounds(napier_box()))).with_grid_size(32);
    let output = pipeline.run(&request, &out, true).unwrap();

    assert!(!output.has_overlay());
    assert!(!out.join(OVERLAY_FILE).exists());
    assert!(out.join(MESH_FILE).is_file());
    assert!(recorder
        .warnings
        .borrow()
        .iter()
        .any(|(stage, _)| *stage == Stage::Overlay));

    let meta = TerrainMetadata::read(&out.join(METADATA_FILE)).unwrap();
    assert_eq!(meta.has_overlay, None);
}

fn two_tile_box() -> GeoBox {
    GeoBox::new(-39.6, 177.7, -39.3, 178.3).unwrap()
}

#[test]
fn test_unreadable_tile_is_skipped() {
    let cache = temp_dir("corrupt-cache");
    write_tile(&cache);
    let corrupt = cache.join(ElevationTileRef::new(-40, 178).hgt_file_name());
    fs::write(&corrupt, [0u8; 6]).unwrap();
    let out = temp_dir("corrupt-out");

    let recorder = Recorder::default();
    let pipeline = offline_pipeline(&cache).with_observer(recorder.clone());
    let request = AreaRequest::new(Some(LocationInput::Bounds(two_tile_box()))).with_grid_size(32);
    let output = pipeline.run(&request, &out, false).unwrap();

    assert_eq!(output.fusion.rasters, 1);
    assert_eq!(output.bounds, two_tile_box());
    assert!(out.join(MESH_FILE).is_file());
    assert!(recorder.warnings.borrow().iter().any(|(stage, message)| {
        *stage == Stage::FetchElevation && message.contains("S40E178")
    }));
}

#[test]
fn test_empty_cached_tile_is_a_miss() {
    let cache = temp_dir("empty-tile-cache");
    write_tile(&cache);
    fs::write(cache.join(ElevationTileRef::new(-40, 178).hgt_file_name()), b"").unwrap();
    let out = temp_dir("empty-tile-out");

    let recorder = Recorder::default();
    let pipeline = offline_pipeline(&cache).with_observer(recorder.clone());
    let request = AreaRequest::new(Some(LocationInput::Bounds(two_tile_box()))).with_grid_size(32);
    let output = pipeline.run(&request, &out, false).unwrap();

    assert_eq!(output.fusion.rasters, 1);
    assert_eq!(recorder.warnings.borrow().len(), 1);
}

#[test]
fn test_only_unreadable_tiles_is_elevation_failure() {
    let cache = temp_dir("all-corrupt-cache");
    fs::write(cache.join(ElevationTileRef::new(-40, 177).hgt_file_name()), [0u8; 6]).unwrap();
    let out = temp_dir("all-corrupt-out");

    let pipeline = offline_pipeline(&cache);
    let request = AreaRequest::new(Some(LocationInput::Bounds(napier_box())));
    let err = pipeline.run(&request, &out, false).unwrap_err();
    assert!(err.is_elevation_failure());
}

#[test]
fn test_missing_tiles_is_elevation_failure() {
    let cache = temp_dir("empty-cache");
    let out = temp_dir("empty-out");

    let pipeline = offline_pipeline(&cache);
    let request = AreaRequest::new(Some(LocationInput::Bounds(napier_box())));
    let err = pipeline.run(&request, &out, false).unwrap_err();
    assert!(err.is_elevation_failure());
    assert!(!out.join(HEIGHTMAP_FILE).exists());
}

#[test]
fn test_raster_without_location_uses_extent() {
    let cache = temp_dir("raster-cache");
    let tile = write_tile(&cache);
    let out = temp_dir("raster-out");

    let pipeline = Pipeline::new(PipelineConfig::default());
    let request = AreaRequest::new(None).with_raster(&tile).with_grid_size(16);
    let output = pipeline.run(&request, &out, false).unwrap();

    assert_eq!(output.metadata.location_name, "S40E177.hgt");
    assert_relative_eq!(output.bounds.west(), 177.0 - 0.5 / 120.0, epsilon = 1e-9);
    assert_relative_eq!(output.bounds.north(), -39.0 + 0.5 / 120.0, epsilon = 1e-9);
    assert_eq!(read_heightmap(&out.join(HEIGHTMAP_FILE)).len(), 16 * 16);
}

#[test]
fn test_place_and_forced_exaggeration() {
    let cache = temp_dir("place-cache");
    write_tile(&cache);
    let out = temp_dir("place-out");

    let pipeline = offline_pipeline(&cache).with_geocoder(FixedGeocoder(Coordinate {
        lat: -39.5,
        lon: 177.5,
    }));
    let request = AreaRequest::new(Some(LocationInput::Place("Wairoa".to_string())))
        .with_scale("human")
        .with_vertical_exaggeration(4.0);
    let output = pipeline.run(&request, &out, false).unwrap();

    assert_eq!(output.metadata.location_name, "Wairoa");
    assert_eq!(output.metadata.scale, "human");
    assert_relative_eq!(output.metadata.vertical_exaggeration, 4.0);
    assert!(output.bounds.contains(-39.5, 177.5));
}

#[test]
fn test_place_without_geocoder() {
    let out = temp_dir("nogeo-out");
    let pipeline = Pipeline::new(PipelineConfig::default());
    let request = AreaRequest::new(Some(LocationInput::Place("Napier".to_string())));
    assert!(pipeline.run(&request, &out, false).is_err());
}
