//! # fsim-dem
//!
//! Elevation acquisition and fusion for the FSim terrain pipeline.
//!
//! This crate provides:
//! - [`elevation_tiles`] - the 1°×1° tiles (`S39E177`, ...) intersecting a box
//! - [`TileChain`] - prioritized tile lookup: package cache, local cache, then
//!   the AWS "skadi" SRTM archive
//! - [`ElevationRaster`] - SRTM `.hgt` and GeoTIFF decoding with geotransforms
//! - [`fuse`] - mosaic, clip, nodata repair and cubic resampling to an N×N
//!   [`ElevationGrid`]
//!
//! ## Example
//!
//! ```no_run
//! use fsim_dem::{elevation_tiles, fuse, ElevationRaster, FusionConfig, LocalCache, TileChain};
//! use fsim_geo::GeoBox;
//!
//! let bounds = GeoBox::new(-39.07, 177.38, -39.03, 177.44)?;
//! let chain = TileChain::new().with_source(LocalCache::new("srtm_cache"));
//!
//! let paths = chain.fetch_all(&elevation_tiles(&bounds)).into_paths()?;
//! let rasters = paths
//!     .iter()
//!     .map(ElevationRaster::open)
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let fused = fuse(&rasters, Some(&bounds), 256, &FusionConfig::default())?;
//! println!("{} m of relief", fused.grid.range());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod fusion;
mod grid;
mod index;
mod raster;
mod resample;
mod source;

pub use error::DemError;
pub use fusion::{
    fuse, mosaic, repair_nodata, FusedElevation, FusionConfig, FusionReport, NodataRepair,
    DEFAULT_SENTINEL_THRESHOLD,
};
pub use grid::ElevationGrid;
pub use index::{elevation_tiles, ElevationTileRef, SKADI_BASE_URL};
pub use raster::{ElevationRaster, GeoTransform, PixelWindow, RasterExtent, HGT_NODATA};
pub use resample::resample_cubic;
pub use source::{
    gunzip, DownloadStats, FetchReport, LocalCache, PackageCache, SkadiDownloader, TileChain,
    TileSource,
};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
