//! The `heightmap_meta.json` sidecar that tells a renderer how to place the
//! heightmap.

use crate::Result;
use fsim_geo::GeoBox;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Box edges as stored in the metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsRecord {
    /// South edge.
    pub south: f64,
    /// West edge.
    pub west: f64,
    /// North edge.
    pub north: f64,
    /// East edge.
    pub east: f64,
}

/// Description of one pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainMetadata {
    /// Cells per side.
    pub grid_size: usize,
    /// Ground distance between adjacent cells, in meters.
    pub cell_size_m: f64,
    /// Area covered.
    pub bounds: BoundsRecord,
    /// Lowest fused elevation.
    pub elev_min: f64,
    /// Highest fused elevation.
    pub elev_max: f64,
    /// Scale applied to elevation above the minimum.
    pub vertical_exaggeration: f64,
    /// Center latitude of the box.
    pub center_lat: f64,
    /// Center longitude of the box.
    pub center_lon: f64,
    /// Human-readable label.
    pub location_name: String,
    /// Scale preset name.
    pub scale: String,
    /// Set once an overlay texture has been written.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub has_overlay: Option<bool>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl TerrainMetadata {
    /// Build the record, rounding each field to the precision it is stored at.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid_size: usize,
        cell_size_m: f64,
        bounds: &GeoBox,
        elev_min: f32,
        elev_max: f32,
        vertical_exaggeration: f64,
        location_name: impl Into<String>,
        scale: impl Into<String>,
    ) -> Self {
        let (center_lat, center_lon) = bounds.center();
        Self {
            grid_size,
            cell_size_m: round_to(cell_size_m, 3),
            bounds: BoundsRecord {
                south: round_to(bounds.south(), 6),
                west: round_to(bounds.west(), 6),
                north: round_to(bounds.north(), 6),
                east: round_to(bounds.east(), 6),
            },
            elev_min: round_to(elev_min as f64, 2),
            elev_max: round_to(elev_max as f64, 2),
            vertical_exaggeration: round_to(vertical_exaggeration, 2),
            center_lat: round_to(center_lat, 6),
            center_lon: round_to(center_lon, 6),
            location_name: location_name.into(),
            scale: scale.into(),
            has_overlay: None,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the record to `path`, replacing any previous version.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        info!("Exported metadata: {}", path.display());
        Ok(())
    }

    /// Read a record back.
    pub fn read(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
