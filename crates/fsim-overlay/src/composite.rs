//! Stitch map tiles into one canvas and rectify it to a geographic box.

use crate::enhance::{enhance, EnhanceSettings};
use crate::tiles::{MapTileRange, MapTileRef};
use crate::{OverlayError, Result};
use fsim_geo::GeoBox;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

/// Pixel rectangle `[left, right) x [top, bottom)` inside a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    /// First column.
    pub left: u32,
    /// First row.
    pub top: u32,
    /// One past the last column.
    pub right: u32,
    /// One past the last row.
    pub bottom: u32,
}

impl CropWindow {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// A block of map tiles pasted onto one RGB canvas.
///
/// The geographic corners come from the tile indices, never from the
/// requested box.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    image: RgbImage,
    range: MapTileRange,
    tile_size: u32,
    placed: usize,
}

impl CompositeImage {
    /// Paste `tiles` onto a `cols·T × rows·T` canvas.
    ///
    /// Each tile lands at `((x - x_min)·T, (y - y_min)·T)`. Tiles outside the
    /// range are skipped; tiles that never arrive leave black holes.
    pub fn assemble<I>(range: MapTileRange, tiles: I, tile_size: u32) -> Self
    where
        I: IntoIterator<Item = (MapTileRef, DynamicImage)>,
    {
        let mut image = RgbImage::new(range.cols() * tile_size, range.rows() * tile_size);
        let mut placed = 0;

        for (tile, tile_image) in tiles {
            if !range.contains(&tile) {
                warn!("Tile {} is outside the composite range, skipping", tile);
                continue;
            }
            let px = ((tile.x - range.x_min) * tile_size) as i64;
            let py = ((tile.y - range.y_min) * tile_size) as i64;
            imageops::replace(&mut image, &tile_image.to_rgb8(), px, py);
            placed += 1;
        }

        debug!(
            "Composite {}x{} px from {}/{} tiles",
            image.width(),
            image.height(),
            placed,
            range.len()
        );

        Self {
            image,
            range,
            tile_size,
            placed,
        }
    }

    /// The stitched canvas.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// The tile block.
    pub fn range(&self) -> &MapTileRange {
        &self.range
    }

    /// Tile edge length in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of tiles actually pasted.
    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Number of tiles that left holes.
    pub fn missing(&self) -> usize {
        self.range.len() - self.placed
    }

    /// Pixel window covering `bounds`.
    ///
    /// Pixel positions interpolate linearly between the composite's corner
    /// coordinates, truncate toward zero, and are clamped to the canvas.
    pub fn crop_window(&self, bounds: &GeoBox) -> Result<CropWindow> {
        let (nw_lat, nw_lon) = self.range.north_west();
        let (se_lat, se_lon) = self.range.south_east();
        let lon_span = se_lon - nw_lon;
        let lat_span = nw_lat - se_lat;
        if lon_span <= 0.0 || lat_span <= 0.0 {
            return Err(OverlayError::DegenerateFootprint { lon_span, lat_span });
        }

        let width = self.image.width() as f64;
        let height = self.image.height() as f64;
        let to_px = |v: f64, max: f64| (v.trunc()).clamp(0.0, max) as u32;

        let left = to_px((bounds.west() - nw_lon) / lon_span * width, width);
        let right = to_px((bounds.east() - nw_lon) / lon_span * width, width);
        let top = to_px((nw_lat - bounds.north()) / lat_span * height, height);
        let bottom = to_px((nw_lat - bounds.south()) / lat_span * height, height);

        if right <= left || bottom <= top {
            return Err(OverlayError::EmptyCrop);
        }

        Ok(CropWindow {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Crop to `bounds`, resize to a square with Lanczos filtering, then
    /// boost contrast and saturation.
    pub fn render(&self, bounds: &GeoBox, settings: &EnhanceSettings) -> Result<RgbImage> {
        let window = self.crop_window(bounds)?;
        debug!("Crop window {:?}", window);

        let cropped = imageops::crop_imm(
            &self.image,
            window.left,
            window.top,
            window.width(),
            window.height(),
        )
        .to_image();
        let mut output = imageops::resize(
            &cropped,
            settings.output_size,
            settings.output_size,
            FilterType::Lanczos3,
        );
        enhance(&mut output, settings);
        Ok(output)
    }
}
