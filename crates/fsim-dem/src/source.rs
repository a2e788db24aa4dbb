//! Elevation tile retrieval through a prioritized chain of sources.
//!
//! A [`TileChain`] asks each [`TileSource`] in order for a local file holding
//! the tile; the first hit wins. The standard chain is:
//!
//! 1. [`PackageCache`] - GeoTIFFs left by other elevation tooling under
//!    `~/.cache/elevation/SRTM1/cache/<lat_dir>/<name>.tif`
//! 2. [`LocalCache`] - our own `<dir>/<name>.hgt` files
//! 3. [`SkadiDownloader`] - downloads `<name>.hgt.gz` from the AWS archive and
//!    gunzips it into the local cache directory

use crate::index::{ElevationTileRef, SKADI_BASE_URL};
use crate::{DemError, Result};
use flate2::read::GzDecoder;
use fsim_metrics::metric_defs;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A place elevation tiles can come from.
pub trait TileSource {
    /// Short name for logs and metrics.
    fn name(&self) -> &str;

    /// Path of a local file holding `tile`, or `None` if this source does
    /// not have it.
    fn locate(&self, tile: &ElevationTileRef) -> Result<Option<PathBuf>>;
}

/// Shared sources, so a caller can keep a handle (for download statistics)
/// after handing the source to a chain.
impl<T: TileSource + ?Sized> TileSource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn locate(&self, tile: &ElevationTileRef) -> Result<Option<PathBuf>> {
        (**self).locate(tile)
    }
}

/// A cached tile counts only when it is a non-empty file; an empty leftover
/// from an interrupted run is a miss.
fn is_cached(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// GeoTIFF cache maintained by other SRTM tooling.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Cache rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// `~/.cache/elevation/SRTM1/cache`, when a home directory is known.
    pub fn default_root() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".cache")
                .join("elevation")
                .join("SRTM1")
                .join("cache")
        })
    }

    /// Expected path of a tile.
    pub fn tile_path(&self, tile: &ElevationTileRef) -> PathBuf {
        self.root.join(tile.lat_dir()).join(tile.tif_file_name())
    }
}

impl TileSource for PackageCache {
    fn name(&self) -> &str {
        "package-cache"
    }

    fn locate(&self, tile: &ElevationTileRef) -> Result<Option<PathBuf>> {
        let path = self.tile_path(tile);
        if is_cached(&path) {
            metrics::counter!(metric_defs::DEM_TILE_CACHE_HITS.name, "source" => "package-cache")
                .increment(1);
            return Ok(Some(path));
        }
        Ok(None)
    }
}

/// Our own cache of decompressed `.hgt` tiles.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Cache in `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Expected path of a tile.
    pub fn tile_path(&self, tile: &ElevationTileRef) -> PathBuf {
        self.dir.join(tile.hgt_file_name())
    }
}

impl TileSource for LocalCache {
    fn name(&self) -> &str {
        "local-cache"
    }

    fn locate(&self, tile: &ElevationTileRef) -> Result<Option<PathBuf>> {
        let path = self.tile_path(tile);
        if is_cached(&path) {
            metrics::counter!(metric_defs::DEM_TILE_CACHE_HITS.name, "source" => "local-cache")
                .increment(1);
            return Ok(Some(path));
        }
        Ok(None)
    }
}

/// Download statistics for a [`SkadiDownloader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Number of tiles downloaded this session.
    pub tiles_downloaded: usize,
    /// Compressed bytes downloaded this session.
    pub bytes_downloaded: u64,
}

/// Downloads gzipped `.hgt` tiles from the AWS "skadi" archive.
pub struct SkadiDownloader {
    /// Directory the decompressed tiles are written to.
    dir: PathBuf,
    /// Archive root URL.
    base_url: String,
    /// HTTP client for downloading tiles.
    client: reqwest::blocking::Client,
    tiles_downloaded: AtomicUsize,
    bytes_downloaded: AtomicU64,
}

impl std::fmt::Debug for SkadiDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkadiDownloader")
            .field("dir", &self.dir)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SkadiDownloader {
    /// Downloader writing into `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, timeout: Duration, user_agent: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            dir,
            base_url: SKADI_BASE_URL.to_string(),
            client,
            tiles_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
        })
    }

    /// Point at a mirror of the archive.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get download statistics for this session.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            tiles_downloaded: self.tiles_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    fn url(&self, tile: &ElevationTileRef) -> String {
        tile.archive_url(&self.base_url)
    }

    fn download(&self, tile: &ElevationTileRef, dest: &Path) -> Result<Option<PathBuf>> {
        let url = self.url(tile);
        info!("Downloading {}", url);

        let response = self.client.get(&url).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // The archive has no files for open-ocean cells.
            debug!("{} not in archive", tile);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DemError::TileUnavailable {
                tile: tile.name(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let compressed = response.bytes()?;
        self.tiles_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded
            .fetch_add(compressed.len() as u64, Ordering::Relaxed);
        metrics::counter!(metric_defs::DEM_TILES_DOWNLOADED.name).increment(1);
        metrics::counter!(metric_defs::DEM_BYTES_DOWNLOADED.name).increment(compressed.len() as u64);

        let raw = gunzip(&compressed)?;

        // Write then rename; the cache never holds a partial tile.
        let partial = dest.with_extension("hgt.part");
        fs::write(&partial, &raw)?;
        fs::rename(&partial, dest)?;

        debug!("Cached {} ({} bytes)", dest.display(), raw.len());
        Ok(Some(dest.to_path_buf()))
    }
}

impl TileSource for SkadiDownloader {
    fn name(&self) -> &str {
        "skadi"
    }

    fn locate(&self, tile: &ElevationTileRef) -> Result<Option<PathBuf>> {
        let dest = self.dir.join(tile.hgt_file_name());
        if is_cached(&dest) {
            return Ok(Some(dest));
        }
        self.download(tile, &dest)
    }
}

/// Decompress a gzip stream.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Outcome of fetching a set of tiles.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Tiles that were found, with their local paths.
    pub found: Vec<(ElevationTileRef, PathBuf)>,
    /// Tiles that could not be obtained, with the reason.
    pub failures: Vec<(ElevationTileRef, DemError)>,
}

impl FetchReport {
    /// Local paths of the found tiles.
    ///
    /// Fails with [`DemError::NoTilesFound`] when nothing was found.
    pub fn into_paths(self) -> Result<Vec<PathBuf>> {
        if self.found.is_empty() {
            return Err(DemError::NoTilesFound);
        }
        Ok(self.found.into_iter().map(|(_, path)| path).collect())
    }
}

/// Sources queried in priority order.
#[derive(Default)]
pub struct TileChain {
    sources: Vec<Box<dyn TileSource>>,
}

impl std::fmt::Debug for TileChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("TileChain").field("sources", &names).finish()
    }
}

impl TileChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lower-priority source.
    pub fn with_source(mut self, source: impl TileSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the chain has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Find a tile. Errors from individual sources are logged and the next
    /// source is tried.
    pub fn locate(&self, tile: &ElevationTileRef) -> Result<PathBuf> {
        let mut last_error = None;
        for source in &self.sources {
            match source.locate(tile) {
                Ok(Some(path)) => {
                    debug!("{} found in {}: {}", tile, source.name(), path.display());
                    return Ok(path);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("{} failed for {}: {}", source.name(), tile, e);
                    last_error = Some(e.to_string());
                }
            }
        }
        Err(DemError::TileUnavailable {
            tile: tile.name(),
            reason: last_error.unwrap_or_else(|| "not found in any source".to_string()),
        })
    }

    /// Fetch every tile, collecting failures instead of stopping at the first.
    pub fn fetch_all(&self, tiles: &[ElevationTileRef]) -> FetchReport {
        let mut report = FetchReport::default();
        for tile in tiles {
            match self.locate(tile) {
                Ok(path) => report.found.push((*tile, path)),
                Err(e) => {
                    warn!("Skipping {}: {}", tile, e);
                    metrics::counter!(metric_defs::DEM_TILES_FAILED.name).increment(1);
                    report.failures.push((*tile, e));
                }
            }
        }
        info!(
            "Located {}/{} elevation tiles",
            report.found.len(),
            tiles.len()
        );
        report
    }
}
