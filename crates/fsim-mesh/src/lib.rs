//! # fsim-mesh
//!
//! Turns a fused [`ElevationGrid`](fsim_dem::ElevationGrid) into renderable
//! output.
//!
//! This crate provides:
//! - [`color_for`] / [`vertical_exaggeration_for`] - the relief palette and
//!   the automatic exaggeration step function
//! - [`SceneMesh`] - a centered, y-up, vertex-colored triangle mesh
//! - [`export_height_grid`] - the scene heights behind the mesh, for the raw
//!   heightmap file
//! - [`GlbExporter`] and [`write_heightmap`] - file writers

mod error;
mod export;
mod mesh;
mod relief;

pub use error::MeshError;
pub use export::{write_heightmap, GlbExporter, MeshExporter};
pub use mesh::{export_height_grid, scene_height, SceneMesh};
pub use relief::{color_for, exaggeration_for_range, rgba8_for, vertical_exaggeration_for};

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
