//! Error types for mesh synthesis and export.

use thiserror::Error;

/// Errors that can occur when building or writing a mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// I/O error writing an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The grid is too small to form a single quad.
    #[error("Grid {rows}x{cols} is too small to triangulate")]
    EmptyGrid {
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },

    /// Vertex count does not fit 32-bit indices.
    #[error("{0} vertices exceed the 32-bit index range")]
    TooLarge(usize),
}
