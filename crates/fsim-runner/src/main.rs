//! `fsim-terrain`: build a terrain heightmap, mesh and map overlay for an
//! area.
//!
//! ```text
//! fsim-terrain --lat -39.05 --lon 177.41 --scale township --overlay
//! fsim-terrain --place "Napier, New Zealand" --grid-size 512
//! fsim-terrain --bounds=-39.07,177.38,-39.03,177.44 --output-dir out
//! fsim-terrain --input-tif dem.tif
//! ```

use clap::Parser;
use fsim_geo::{AreaRequest, GeoBox, LocationInput, ScalePreset, DEFAULT_SCALE};
use fsim_runner::{Pipeline, PipelineConfig, PipelineOutput};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Fetch elevation data and build terrain assets", long_about = None)]
struct Cli {
    #[arg(long, allow_hyphen_values = true, requires = "lon", help = "Center latitude")]
    lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "lat", help = "Center longitude")]
    lon: Option<f64>,

    #[arg(long, help = "Place name to geocode")]
    place: Option<String>,

    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Bounding box: \"south,west,north,east\""
    )]
    bounds: Option<GeoBox>,

    #[arg(long, default_value = DEFAULT_SCALE, help = "Scale preset (human, neighbourhood, township, catchment, regional)")]
    scale: String,

    #[arg(long, help = "Override the preset grid size")]
    grid_size: Option<usize>,

    #[arg(long, help = "Override the automatic vertical exaggeration")]
    vert_exag: Option<f64>,

    #[arg(long, help = "Use an existing GeoTIFF or .hgt instead of fetching tiles")]
    input_tif: Option<PathBuf>,

    #[arg(long, default_value = "data", help = "Output directory")]
    output_dir: PathBuf,

    #[arg(long, help = "Fetch a map overlay (roads, labels)")]
    overlay: bool,

    #[arg(long, help = "Path to a YAML configuration file")]
    config: Option<PathBuf>,

    #[arg(long, short, help = "Enable debug logging")]
    verbose: bool,
}

impl Cli {
    /// Location with precedence place > coordinates > box.
    fn location(&self) -> Option<LocationInput> {
        if let Some(place) = &self.place {
            return Some(LocationInput::Place(place.clone()));
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Some(LocationInput::Center { lat, lon });
        }
        self.bounds.map(LocationInput::Bounds)
    }

    fn request(&self) -> AreaRequest {
        let mut request = AreaRequest::new(self.location()).with_scale(self.scale.clone());
        if let Some(path) = &self.input_tif {
            request = request.with_raster(path.clone());
        }
        if let Some(grid_size) = self.grid_size {
            request = request.with_grid_size(grid_size);
        }
        if let Some(factor) = self.vert_exag {
            request = request.with_vertical_exaggeration(factor);
        }
        request
    }
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::builder().parse_lossy(format!(
            "fsim_runner={level},fsim_geo={level},fsim_dem={level},fsim_mesh={level},fsim_overlay={level},fsim_terrain={level}"
        ))
    };
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

fn log_summary(output: &PipelineOutput) {
    let meta = &output.metadata;
    info!("Location: {}", meta.location_name);
    info!(
        "Scale: {} ({} km radius)",
        meta.scale, output.area.preset.radius_km
    );
    info!("Grid: {}x{}", meta.grid_size, meta.grid_size);
    info!("Bounds: {}", output.bounds);
    info!("Elevation range: {:.1}m - {:.1}m", meta.elev_min, meta.elev_max);
    info!("Cell size: {:.1}m", meta.cell_size_m);
    info!("Vertical exaggeration: {:.1}x", meta.vertical_exaggeration);
    for file in &output.files {
        info!("  {}", file.display());
    }
}

fn run(cli: &Cli) -> fsim_runner::Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let request = cli.request();
    let preset = ScalePreset::by_name(&request.scale)?;
    info!(
        "FSim terrain pipeline: scale {} ({} km radius)",
        preset.name, preset.radius_km
    );

    let pipeline = Pipeline::from_config(config)?;
    let output = pipeline.run(&request, &cli.output_dir, cli.overlay)?;

    if let Some(stats) = pipeline.download_stats() {
        if stats.tiles_downloaded > 0 {
            info!(
                "Downloaded {} elevation tile(s), {} bytes",
                stats.tiles_downloaded, stats.bytes_downloaded
            );
        }
    }
    log_summary(&output);
    info!("Done! Files in {}", cli.output_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    fsim_metrics::describe_metrics();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            if e.is_elevation_failure() {
                error!("Try: --input-tif with a manually downloaded DEM");
            }
            ExitCode::from(1)
        }
    }
}
