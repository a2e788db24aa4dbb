//! The fused elevation grid handed to mesh synthesis.

use crate::{DemError, Result};
use fsim_geo::GeoBox;

/// Row-major elevation samples covering a geographic box.
///
/// Row 0 is the northern edge, column 0 the western edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
    bounds: GeoBox,
}

impl ElevationGrid {
    /// Wrap samples, checking that the shape matches and every sample is
    /// finite.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize, bounds: GeoBox) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(DemError::ShapeMismatch {
                rows,
                cols,
                len: data.len(),
            });
        }
        if let Some(index) = data.iter().position(|v| !v.is_finite()) {
            return Err(DemError::NonFiniteSample { index });
        }
        Ok(Self {
            data,
            rows,
            cols,
            bounds,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Box the grid covers.
    pub fn bounds(&self) -> &GeoBox {
        &self.bounds
    }

    /// Samples, row-major.
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Sample at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// Lowest sample.
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Highest sample.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Difference between the highest and lowest sample.
    pub fn range(&self) -> f32 {
        self.max() - self.min()
    }
}
