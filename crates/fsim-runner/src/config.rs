//! Pipeline configuration.
//!
//! Everything has a default, so an empty file (or no file) is valid. A YAML
//! file only needs the keys it changes:
//!
//! ```yaml
//! cache:
//!   srtm_dir: /data/srtm
//! http:
//!   timeout_secs: 60
//! overlay:
//!   contrast: 1.4
//! fusion:
//!   sentinel_threshold: -500.0
//! ```

use crate::{PipelineError, Result};
use fsim_dem::{FusionConfig, DEFAULT_SENTINEL_THRESHOLD, SKADI_BASE_URL};
use fsim_overlay::{
    EnhanceSettings, OverlaySettings, DEFAULT_CONTRAST, DEFAULT_OUTPUT_SIZE, DEFAULT_SATURATION,
    DEFAULT_TILE_SIZE, OSM_TILE_URL,
};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifies the pipeline to tile servers and the geocoder.
pub const DEFAULT_USER_AGENT: &str = "fsim-terrain/0.1 (terrain pipeline)";

/// Default place-name search endpoint.
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where tiles are looked up and stored.
    pub cache: CacheConfig,
    /// Network behaviour.
    pub http: HttpConfig,
    /// Map overlay rendering.
    pub overlay: OverlayConfig,
    /// Elevation fusion.
    pub fusion: FusionSection,
}

/// Cache directories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Read-only GeoTIFF cache laid out as `<root>/<lat_dir>/<name>.tif`.
    /// Defaults to `~/.cache/elevation/SRTM1/cache`.
    pub package_root: Option<PathBuf>,
    /// `.hgt` cache that downloads land in. Defaults to `~/.cache/fsim/srtm`.
    pub srtm_dir: Option<PathBuf>,
    /// Map tile cache. Defaults to `~/.cache/fsim/tiles`.
    pub map_tile_dir: Option<PathBuf>,
}

impl CacheConfig {
    /// Effective package cache root, if one can be determined.
    pub fn package_root(&self) -> Option<PathBuf> {
        self.package_root
            .clone()
            .or_else(fsim_dem::PackageCache::default_root)
    }

    /// Effective `.hgt` cache directory.
    pub fn srtm_dir(&self) -> PathBuf {
        self.srtm_dir
            .clone()
            .unwrap_or_else(|| user_cache_dir().join("srtm"))
    }

    /// Effective map tile cache directory.
    pub fn map_tile_dir(&self) -> PathBuf {
        self.map_tile_dir
            .clone()
            .unwrap_or_else(|| user_cache_dir().join("tiles"))
    }
}

fn user_cache_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".cache").join("fsim"),
        None => PathBuf::from(".fsim-cache"),
    }
}

/// HTTP settings shared by every network adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header.
    pub user_agent: String,
    /// Elevation archive base URL.
    pub elevation_url: String,
    /// Map tile URL template with `{z}`, `{x}`, `{y}`.
    pub map_tile_url: String,
    /// Geocoder search endpoint.
    pub geocoder_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            elevation_url: SKADI_BASE_URL.to_string(),
            map_tile_url: OSM_TILE_URL.to_string(),
            geocoder_url: NOMINATIM_URL.to_string(),
        }
    }
}

impl HttpConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Map overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Approximate pixel span used to pick the zoom level.
    pub target_px: u32,
    /// Map tile edge length in pixels.
    pub tile_size: u32,
    /// Output texture edge length in pixels.
    pub output_size: u32,
    /// Contrast factor.
    pub contrast: f32,
    /// Saturation factor.
    pub saturation: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            target_px: DEFAULT_OUTPUT_SIZE,
            tile_size: DEFAULT_TILE_SIZE,
            output_size: DEFAULT_OUTPUT_SIZE,
            contrast: DEFAULT_CONTRAST,
            saturation: DEFAULT_SATURATION,
        }
    }
}

impl OverlayConfig {
    /// Settings for [`fsim_overlay::build_overlay`].
    pub fn settings(&self) -> OverlaySettings {
        OverlaySettings {
            target_px: self.target_px,
            tile_size: self.tile_size,
            enhance: EnhanceSettings {
                output_size: self.output_size,
                contrast: self.contrast,
                saturation: self.saturation,
            },
        }
    }
}

/// Elevation fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSection {
    /// Samples at or below this value are treated as nodata.
    pub sentinel_threshold: f32,
}

impl Default for FusionSection {
    fn default() -> Self {
        Self {
            sentinel_threshold: DEFAULT_SENTINEL_THRESHOLD,
        }
    }
}

impl FusionSection {
    /// Settings for [`fsim_dem::fuse`].
    pub fn config(&self) -> FusionConfig {
        FusionConfig {
            sentinel_threshold: self.sentinel_threshold,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> PipelineError { serde_yaml::Error::custom(msg).into() };
        if self.overlay.tile_size == 0 {
            return Err(invalid("overlay.tile_size must be positive"));
        }
        if self.overlay.output_size == 0 {
            return Err(invalid("overlay.output_size must be positive"));
        }
        if self.overlay.target_px == 0 {
            return Err(invalid("overlay.target_px must be positive"));
        }
        Ok(())
    }

    /// Load a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(PipelineConfig::from_yaml_str("").unwrap(), PipelineConfig::default());
        assert_eq!(PipelineConfig::from_yaml_str("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
http:
  timeout_secs: 5
overlay:
  contrast: 1.2
fusion:
  sentinel_threshold: -500.0
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.http.timeout(), Duration::from_secs(5));
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.overlay.contrast, 1.2);
        assert_eq!(config.overlay.saturation, DEFAULT_SATURATION);
        assert_eq!(config.fusion.config().sentinel_threshold, -500.0);
    }

    #[test]
    fn test_overlay_settings() {
        let settings = OverlayConfig::default().settings();
        assert_eq!(settings, OverlaySettings::default());
    }

    #[test]
    fn test_explicit_cache_dirs() {
        let yaml = "cache:\n  srtm_dir: /data/srtm\n  map_tile_dir: /data/tiles\n";
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.srtm_dir(), PathBuf::from("/data/srtm"));
        assert_eq!(config.cache.map_tile_dir(), PathBuf::from("/data/tiles"));
    }

    #[test]
    fn test_unknown_type_is_error() {
        let yaml = "http:\n  timeout_secs: soon\n";
        assert!(PipelineConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_zero_overlay_sizes_rejected() {
        for yaml in [
            "overlay:\n  tile_size: 0\n",
            "overlay:\n  output_size: 0\n",
            "overlay:\n  target_px: 0\n",
        ] {
            assert!(matches!(
                PipelineConfig::from_yaml_str(yaml),
                Err(PipelineError::Config(_))
            ));
        }
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PipelineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
