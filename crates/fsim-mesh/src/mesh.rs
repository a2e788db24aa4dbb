//! Scene-space triangle mesh built from an elevation grid.

use crate::relief::rgba8_for;
use crate::{MeshError, Result};
use fsim_dem::ElevationGrid;
use fsim_metrics::metric_defs;
use rayon::prelude::*;
use tracing::debug;

/// Scene height of a raw elevation: meters above the grid floor, scaled.
///
/// The mesh y coordinate and the exported heightmap both go through this
/// function so they agree bit for bit.
#[inline]
pub fn scene_height(elevation: f32, floor: f32, vertical_exaggeration: f64) -> f32 {
    ((elevation - floor) as f64 * vertical_exaggeration) as f32
}

/// A colored triangle mesh in scene space.
///
/// Scene space is meters, y up, centered on the origin in the x/z plane.
/// Grid row `r` maps to `+z`, column `c` to `+x`.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    /// Vertex positions, row-major over the grid.
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex RGBA colors.
    pub colors: Vec<[u8; 4]>,
    /// Triangles as vertex index triples.
    pub faces: Vec<[u32; 3]>,
}

impl SceneMesh {
    /// Build the mesh for `grid` with square cells of `cell_size_m` meters.
    ///
    /// Each quad `(r, c)` is split along the diagonal from `(r + 1, c)` to
    /// `(r, c + 1)` into `[i00, i10, i01]` and `[i01, i10, i11]`.
    pub fn from_grid(grid: &ElevationGrid, cell_size_m: f64, vertical_exaggeration: f64) -> Result<Self> {
        let (rows, cols) = (grid.rows(), grid.cols());
        if rows < 2 || cols < 2 {
            return Err(MeshError::EmptyGrid { rows, cols });
        }
        let vertex_count = rows * cols;
        if u32::try_from(vertex_count).is_err() {
            return Err(MeshError::TooLarge(vertex_count));
        }

        let floor = grid.min();
        let half_x = (cols - 1) as f64 * cell_size_m / 2.0;
        let half_z = (rows - 1) as f64 * cell_size_m / 2.0;
        let values = grid.values();

        let positions: Vec<[f32; 3]> = (0..vertex_count)
            .into_par_iter()
            .map(|i| {
                let (r, c) = (i / cols, i % cols);
                [
                    (c as f64 * cell_size_m - half_x) as f32,
                    scene_height(values[i], floor, vertical_exaggeration),
                    (r as f64 * cell_size_m - half_z) as f32,
                ]
            })
            .collect();

        let colors: Vec<[u8; 4]> = values.par_iter().map(|&e| rgba8_for(e)).collect();

        let cols_u32 = cols as u32;
        let mut faces = Vec::with_capacity(2 * (rows - 1) * (cols - 1));
        for r in 0..(rows - 1) as u32 {
            for c in 0..cols_u32 - 1 {
                let i00 = r * cols_u32 + c;
                let i10 = (r + 1) * cols_u32 + c;
                let i01 = r * cols_u32 + c + 1;
                let i11 = (r + 1) * cols_u32 + c + 1;
                faces.push([i00, i10, i01]);
                faces.push([i01, i10, i11]);
            }
        }

        metrics::gauge!(metric_defs::MESH_VERTICES.name).set(vertex_count as f64);
        debug!(
            "Built mesh: {} vertices, {} faces, cell {:.2} m",
            vertex_count,
            faces.len(),
            cell_size_m
        );

        Ok(Self {
            positions,
            colors,
            faces,
        })
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Axis-aligned bounds as (min, max).
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        (min, max)
    }
}

/// Row-major scene heights for the raw heightmap file.
pub fn export_height_grid(grid: &ElevationGrid, vertical_exaggeration: f64) -> Vec<f32> {
    let floor = grid.min();
    grid.values()
        .par_iter()
        .map(|&e| scene_height(e, floor, vertical_exaggeration))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fsim_geo::GeoBox;

    fn grid(n: usize) -> ElevationGrid {
        let bounds = GeoBox::new(-39.07, 177.38, -39.03, 177.44).unwrap();
        let data = (0..n * n)
            .map(|i| {
                let (r, c) = ((i / n) as f32, (i % n) as f32);
                40.0 + 12.0 * (r * 0.3).sin() + 7.0 * (c * 0.2).cos()
            })
            .collect();
        ElevationGrid::new(data, n, n, bounds).unwrap()
    }

    #[test]
    fn test_counts_and_indices() {
        let n = 17;
        let mesh = SceneMesh::from_grid(&grid(n), 25.0, 2.0).unwrap();
        assert_eq!(mesh.vertex_count(), n * n);
        assert_eq!(mesh.colors.len(), n * n);
        assert_eq!(mesh.face_count(), 2 * (n - 1) * (n - 1));
        assert!(mesh
            .faces
            .iter()
            .flatten()
            .all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_floor_is_zero() {
        let mesh = SceneMesh::from_grid(&grid(9), 10.0, 3.0).unwrap();
        let (min, _) = mesh.bounds();
        assert_eq!(min[1], 0.0);
    }

    #[test]
    fn test_centered() {
        let mesh = SceneMesh::from_grid(&grid(5), 10.0, 1.0).unwrap();
        let (min, max) = mesh.bounds();
        assert_relative_eq!(min[0], -20.0);
        assert_relative_eq!(max[0], 20.0);
        assert_relative_eq!(min[2], -20.0);
        assert_relative_eq!(max[2], 20.0);

        // Vertex (r = 1, c = 3)
        let p = mesh.positions[5 + 3];
        assert_relative_eq!(p[0], 10.0);
        assert_relative_eq!(p[2], -10.0);
    }

    #[test]
    fn test_winding() {
        let mesh = SceneMesh::from_grid(&grid(3), 1.0, 1.0).unwrap();
        assert_eq!(mesh.faces[0], [0, 3, 1]);
        assert_eq!(mesh.faces[1], [1, 3, 4]);
        assert_eq!(mesh.faces[2], [1, 4, 2]);
    }

    #[test]
    fn test_heightmap_matches_mesh() {
        let g = grid(33);
        let vexag = 1.5;
        let mesh = SceneMesh::from_grid(&g, 30.0, vexag).unwrap();
        let heights = export_height_grid(&g, vexag);

        assert_eq!(heights.len(), mesh.vertex_count());
        for (h, p) in heights.iter().zip(&mesh.positions) {
            assert_eq!(*h, p[1]);
        }
    }

    #[test]
    fn test_colors_use_raw_elevation() {
        let bounds = GeoBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let g = ElevationGrid::new(vec![-5.0, 0.0, 600.0, 2000.0], 2, 2, bounds).unwrap();
        let mesh = SceneMesh::from_grid(&g, 1.0, 5.0).unwrap();
        assert_eq!(mesh.colors[0], rgba8_for(-5.0));
        assert_eq!(mesh.colors[3], rgba8_for(2000.0));
    }

    #[test]
    fn test_too_small() {
        let bounds = GeoBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let g = ElevationGrid::new(vec![1.0, 2.0], 1, 2, bounds).unwrap();
        assert!(matches!(
            SceneMesh::from_grid(&g, 1.0, 1.0),
            Err(MeshError::EmptyGrid { rows: 1, cols: 2 })
        ));
    }
}
