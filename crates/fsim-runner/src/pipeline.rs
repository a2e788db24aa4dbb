//! The end-to-end terrain pipeline.
//!
//! ```text
//! AreaRequest ─► resolve ─► elevation tiles ─► fuse ─► heightmap.bin
//!                   │                            ├──► heightmap_meta.json
//!                   │                            └──► terrain.glb
//!                   └──────► map tiles ─► composite ─► overlay.png (optional)
//! ```
//!
//! Elevation failures abort the run. The overlay is best effort: any failure
//! is reported to the observer and the other outputs are kept.

use crate::config::PipelineConfig;
use crate::geocode::NominatimGeocoder;
use crate::metadata::TerrainMetadata;
use crate::observer::{PipelineObserver, Stage, TracingObserver};
use crate::Result;
use fsim_dem::{
    elevation_tiles, fuse, DemError, DownloadStats, ElevationRaster, FusionReport, LocalCache,
    PackageCache, SkadiDownloader, TileChain,
};
use fsim_geo::{AreaRequest, AreaResolver, GeoBox, GeoError, Geocoder, ResolvedArea};
use fsim_mesh::{
    export_height_grid, vertical_exaggeration_for, write_heightmap, GlbExporter, MeshExporter,
    SceneMesh,
};
use fsim_overlay::{build_overlay, MapTileSource, OsmTileFetcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Raw scene heights, little-endian `f32`.
pub const HEIGHTMAP_FILE: &str = "heightmap.bin";
/// JSON sidecar.
pub const METADATA_FILE: &str = "heightmap_meta.json";
/// Binary glTF mesh.
pub const MESH_FILE: &str = "terrain.glb";
/// Map texture.
pub const OVERLAY_FILE: &str = "overlay.png";

/// What a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The resolved area.
    pub area: ResolvedArea,
    /// Box actually covered by the outputs.
    pub bounds: GeoBox,
    /// Contents of the metadata file, as last written.
    pub metadata: TerrainMetadata,
    /// Fusion diagnostics.
    pub fusion: FusionReport,
    /// Every file written, in order.
    pub files: Vec<PathBuf>,
}

impl PipelineOutput {
    /// Whether an overlay texture was written.
    pub fn has_overlay(&self) -> bool {
        self.metadata.has_overlay == Some(true)
    }
}

/// Runs requests against a fixed set of collaborators.
pub struct Pipeline {
    config: PipelineConfig,
    tiles: TileChain,
    downloader: Option<Arc<SkadiDownloader>>,
    geocoder: Option<Box<dyn Geocoder>>,
    map_tiles: Option<Box<dyn MapTileSource>>,
    observer: Box<dyn PipelineObserver>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("tiles", &self.tiles)
            .field("geocoder", &self.geocoder.is_some())
            .field("map_tiles", &self.map_tiles.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Pipeline with no network access: no tile sources, no geocoder and no
    /// map tiles until they are added.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            tiles: TileChain::new(),
            downloader: None,
            geocoder: None,
            map_tiles: None,
            observer: Box::new(TracingObserver),
        }
    }

    /// Pipeline with the standard collaborators.
    ///
    /// Elevation tiles come from the package cache, then the local `.hgt`
    /// cache, then the archive (which fills the local cache). Place names go
    /// to Nominatim and map tiles to the configured tile server.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.http.timeout();
        let user_agent = config.http.user_agent.clone();

        let mut tiles = TileChain::new();
        if let Some(root) = config.cache.package_root() {
            tiles = tiles.with_source(PackageCache::new(root));
        }
        let srtm_dir = config.cache.srtm_dir();
        let downloader = Arc::new(
            SkadiDownloader::new(&srtm_dir, timeout, &user_agent)?
                .with_base_url(config.http.elevation_url.clone()),
        );
        tiles = tiles
            .with_source(LocalCache::new(&srtm_dir))
            .with_source(Arc::clone(&downloader));

        let geocoder =
            NominatimGeocoder::new(config.http.geocoder_url.clone(), timeout, &user_agent)?;
        let map_tiles = OsmTileFetcher::new(timeout, &user_agent)?
            .with_url_template(config.http.map_tile_url.clone())
            .with_cache_dir(config.cache.map_tile_dir());

        let mut pipeline = Self::new(config)
            .with_tile_chain(tiles)
            .with_geocoder(geocoder)
            .with_map_source(map_tiles);
        pipeline.downloader = Some(downloader);
        Ok(pipeline)
    }

    /// Replace the elevation tile chain.
    pub fn with_tile_chain(mut self, tiles: TileChain) -> Self {
        self.tiles = tiles;
        self
    }

    /// Use `geocoder` for place names.
    pub fn with_geocoder(mut self, geocoder: impl Geocoder + 'static) -> Self {
        self.geocoder = Some(Box::new(geocoder));
        self
    }

    /// Use `source` for overlay tiles.
    pub fn with_map_source(mut self, source: impl MapTileSource + 'static) -> Self {
        self.map_tiles = Some(Box::new(source));
        self
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Archive download statistics, when the archive is in the chain.
    pub fn download_stats(&self) -> Option<DownloadStats> {
        self.downloader.as_ref().map(|d| d.download_stats())
    }

    fn timed<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.observer.stage_started(stage);
        let start = Instant::now();
        let value = f()?;
        self.observer.stage_finished(stage, start.elapsed());
        Ok(value)
    }

    /// Resolve a request without fetching anything.
    pub fn resolve(&self, request: &AreaRequest) -> Result<ResolvedArea> {
        let resolver = match self.geocoder.as_deref() {
            Some(geocoder) => AreaResolver::with_geocoder(geocoder),
            None => AreaResolver::new(),
        };
        Ok(resolver.resolve(request)?)
    }

    fn load_rasters(&self, area: &ResolvedArea) -> Result<Vec<ElevationRaster>> {
        if let Some(path) = &area.raster {
            return Ok(vec![ElevationRaster::open(path)?]);
        }

        let bounds = area.bounds.ok_or(GeoError::InvalidLocation)?;
        let report = self.tiles.fetch_all(&elevation_tiles(&bounds));
        for (tile, error) in &report.failures {
            self.observer
                .warning(Stage::FetchElevation, &format!("Failed to get {}: {}", tile, error));
        }

        let mut rasters = Vec::new();
        for path in report.into_paths()? {
            match ElevationRaster::open(&path) {
                Ok(raster) => rasters.push(raster),
                Err(e) => self.observer.warning(
                    Stage::FetchElevation,
                    &format!("Skipping unreadable tile {}: {}", path.display(), e),
                ),
            }
        }
        if rasters.is_empty() {
            return Err(DemError::NoTilesFound.into());
        }
        Ok(rasters)
    }

    /// Run the pipeline, writing into `output_dir`.
    pub fn run(&self, request: &AreaRequest, output_dir: &Path, overlay: bool) -> Result<PipelineOutput> {
        let area = self.timed(Stage::Resolve, || self.resolve(request))?;
        fs::create_dir_all(output_dir)?;

        let rasters = self.timed(Stage::FetchElevation, || self.load_rasters(&area))?;
        let fused = self.timed(Stage::Fuse, || {
            Ok(fuse(
                &rasters,
                area.bounds.as_ref(),
                area.grid_size,
                &self.config.fusion.config(),
            )?)
        })?;
        if fused.report.all_nodata {
            self.observer
                .warning(Stage::Fuse, "No valid elevation samples; terrain is flat");
        }

        let grid = fused.grid;
        let bounds = *grid.bounds();
        let mut files = Vec::new();

        let mut metadata = self.timed(Stage::Synthesize, || {
            let cell_size_m = bounds.cell_size_m(area.grid_size);
            let vertical_exaggeration = area
                .vertical_exaggeration
                .unwrap_or_else(|| vertical_exaggeration_for(&grid));

            let heightmap_path = output_dir.join(HEIGHTMAP_FILE);
            write_heightmap(&export_height_grid(&grid, vertical_exaggeration), &heightmap_path)?;
            files.push(heightmap_path);

            let metadata = TerrainMetadata::new(
                area.grid_size,
                cell_size_m,
                &bounds,
                grid.min(),
                grid.max(),
                vertical_exaggeration,
                area.location_name.clone(),
                area.preset.name,
            );
            let metadata_path = output_dir.join(METADATA_FILE);
            metadata.write(&metadata_path)?;
            files.push(metadata_path);

            let mesh = SceneMesh::from_grid(&grid, cell_size_m, vertical_exaggeration)?;
            let mesh_path = output_dir.join(MESH_FILE);
            GlbExporter.export(&mesh, &mesh_path)?;
            files.push(mesh_path);

            Ok(metadata)
        })?;

        if overlay {
            match self.timed(Stage::Overlay, || self.write_overlay(&bounds, output_dir)) {
                Ok(path) => {
                    files.push(path);
                    metadata.has_overlay = Some(true);
                    metadata.write(&output_dir.join(METADATA_FILE))?;
                }
                Err(e) => self
                    .observer
                    .warning(Stage::Overlay, &format!("Overlay failed: {}", e)),
            }
        }

        for file in &files {
            self.observer.file_written(file);
        }

        Ok(PipelineOutput {
            area,
            bounds,
            metadata,
            fusion: fused.report,
            files,
        })
    }

    fn write_overlay(&self, bounds: &GeoBox, output_dir: &Path) -> Result<PathBuf> {
        let source = self
            .map_tiles
            .as_deref()
            .ok_or(fsim_overlay::OverlayError::NoTilesRetrieved)?;
        let overlay = build_overlay(bounds, source, &self.config.overlay.settings())?;
        if overlay.missing > 0 {
            self.observer.warning(
                Stage::Overlay,
                &format!("{} of {} map tiles missing", overlay.missing, overlay.range.len()),
            );
        }
        let path = output_dir.join(OVERLAY_FILE);
        overlay.save(&path)?;
        Ok(path)
    }
}
