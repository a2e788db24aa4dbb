//! Map tile retrieval and the end-to-end overlay build.

use crate::composite::CompositeImage;
use crate::enhance::EnhanceSettings;
use crate::tiles::{choose_zoom, MapTileRange, MapTileRef, DEFAULT_TILE_SIZE};
use crate::{OverlayError, Result};
use fsim_geo::GeoBox;
use fsim_metrics::metric_defs;
use image::{DynamicImage, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Standard OpenStreetMap raster tile server.
pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Something that can produce map tile images.
pub trait MapTileSource {
    /// Fetch one tile.
    fn fetch(&self, tile: &MapTileRef) -> Result<DynamicImage>;
}

/// Fetches PNG tiles over HTTP with an optional on-disk cache.
///
/// Tile servers require an identifying User-Agent; the fetcher always sends
/// one.
pub struct OsmTileFetcher {
    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    url_template: String,
    /// Cache directory, laid out as `z/x/y.png`.
    cache_dir: Option<PathBuf>,
    client: reqwest::blocking::Client,
    tiles_downloaded: AtomicUsize,
}

impl std::fmt::Debug for OsmTileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsmTileFetcher")
            .field("url_template", &self.url_template)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl OsmTileFetcher {
    /// Fetcher for the standard OSM tile server.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            url_template: OSM_TILE_URL.to_string(),
            cache_dir: None,
            client,
            tiles_downloaded: AtomicUsize::new(0),
        })
    }

    /// Cache tiles under `dir`.
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Use a different tile server.
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    /// Number of tiles downloaded (not served from cache) this session.
    pub fn tiles_downloaded(&self) -> usize {
        self.tiles_downloaded.load(Ordering::Relaxed)
    }

    /// URL of a tile.
    pub fn url(&self, tile: &MapTileRef) -> String {
        self.url_template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    fn download(&self, tile: &MapTileRef) -> Result<Vec<u8>> {
        let url = self.url(tile);
        debug!("Downloading {}", url);

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(OverlayError::TileUnavailable {
                tile: tile.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        let bytes = response.bytes()?.to_vec();
        self.tiles_downloaded.fetch_add(1, Ordering::Relaxed);
        Ok(bytes)
    }
}

impl MapTileSource for OsmTileFetcher {
    fn fetch(&self, tile: &MapTileRef) -> Result<DynamicImage> {
        let cache_path = self.cache_dir.as_ref().map(|dir| tile.cache_path(dir));

        if let Some(path) = cache_path.as_ref().filter(|p| p.is_file()) {
            match image::open(path) {
                Ok(image) => {
                    metrics::counter!(metric_defs::MAP_TILES_FETCHED.name, "source" => "cache")
                        .increment(1);
                    return Ok(image);
                }
                Err(e) => warn!("Ignoring unreadable cached tile {}: {}", path.display(), e),
            }
        }

        let bytes = self.download(tile)?;
        let decoded = image::load_from_memory(&bytes)?;
        metrics::counter!(metric_defs::MAP_TILES_FETCHED.name, "source" => "network").increment(1);

        if let Some(path) = cache_path {
            if let Err(e) = store_tile(&path, &bytes) {
                warn!("Could not cache {} at {}: {}", tile, path.display(), e);
            }
        }
        Ok(decoded)
    }
}

/// Write a tile into the cache through a `.part` file, so an interrupted
/// write never leaves a truncated PNG at the final path.
fn store_tile(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = path.with_extension("png.part");
    fs::write(&partial, bytes)?;
    fs::rename(&partial, path)
}

/// Overlay build parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySettings {
    /// Approximate pixel span of the box used to pick the zoom level.
    pub target_px: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Final rendering parameters.
    pub enhance: EnhanceSettings,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            target_px: 1024,
            tile_size: DEFAULT_TILE_SIZE,
            enhance: EnhanceSettings::default(),
        }
    }
}

/// A rendered overlay and how it was built.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// The square, enhanced texture.
    pub image: RgbImage,
    /// Tiles the composite was built from.
    pub range: MapTileRange,
    /// Tiles that could not be fetched.
    pub missing: usize,
}

impl Overlay {
    /// Write the texture as PNG.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.image.save(path)?;
        info!(
            "Exported overlay: {} ({}x{})",
            path.display(),
            self.image.width(),
            self.image.height()
        );
        Ok(())
    }
}

/// Fetch, stitch and render the map overlay for `bounds`.
///
/// Individual tile failures are logged and leave holes; the build fails only
/// when no tile at all could be fetched.
pub fn build_overlay(
    bounds: &GeoBox,
    source: &dyn MapTileSource,
    settings: &OverlaySettings,
) -> Result<Overlay> {
    let zoom = choose_zoom(bounds, settings.target_px);
    let range = MapTileRange::covering(bounds, zoom);
    info!(
        "Map tiles: zoom={}, {}x{} tiles ({} total)",
        zoom,
        range.cols(),
        range.rows(),
        range.len()
    );

    let mut tiles = Vec::with_capacity(range.len());
    for tile in range.tiles() {
        match source.fetch(&tile) {
            Ok(image) => tiles.push((tile, image)),
            Err(e) => {
                warn!("Failed to fetch map tile {}: {}", tile, e);
                metrics::counter!(metric_defs::MAP_TILES_FAILED.name).increment(1);
            }
        }
    }
    if tiles.is_empty() {
        return Err(OverlayError::NoTilesRetrieved);
    }

    let composite = CompositeImage::assemble(range, tiles, settings.tile_size);
    let image = composite.render(bounds, &settings.enhance)?;

    Ok(Overlay {
        image,
        range,
        missing: composite.missing(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fsim-fetch-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_store_tile_leaves_no_partial() {
        let dir = temp_dir("store");
        let path = MapTileRef::new(3, 7, 4).unwrap().cache_path(&dir);

        store_tile(&path, b"png bytes").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"png bytes");
        assert!(!path.with_extension("png.part").exists());
    }

    #[test]
    fn test_store_tile_reports_unwritable_dir() {
        let dir = temp_dir("blocked");
        // A file where the zoom directory should be.
        fs::write(dir.join("3"), b"").unwrap();
        let path = MapTileRef::new(3, 7, 4).unwrap().cache_path(&dir);
        assert!(store_tile(&path, b"png bytes").is_err());
        assert!(!path.exists());
    }
}
