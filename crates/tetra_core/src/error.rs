//! Geometry error types
//!
//! Every failure of topology validation, tetrahedralization, or batch building
//! is reported through [`GeometryError`]. None of these are retried; the caller
//! decides whether to fall back to an empty batch.

use std::fmt;

/// Error type for geometry generation and batch building
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The input surface has no triangles
    EmptySurface,
    /// A meshing parameter is out of range
    InvalidParams(String),
    /// A cell references a vertex that does not exist
    IndexOutOfBounds {
        cell: usize,
        index: usize,
        vertex_count: usize,
    },
    /// A cell references the same vertex more than once
    DuplicateIndex { cell: usize },
    /// A face of a cell has zero area
    DegenerateFace { cell: usize, face: usize },
    /// Normal computation failed for a cell
    NormalComputation { cell: usize, reason: String },
    /// The tetrahedralizer could not produce a mesh
    Tetrahedralization(String),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::EmptySurface => write!(f, "Surface has no triangles"),
            GeometryError::InvalidParams(msg) => write!(f, "Invalid meshing parameters: {}", msg),
            GeometryError::IndexOutOfBounds { cell, index, vertex_count } => write!(
                f,
                "Cell {} references vertex {} but topology has {} vertices",
                cell, index, vertex_count
            ),
            GeometryError::DuplicateIndex { cell } => {
                write!(f, "Cell {} references the same vertex twice", cell)
            }
            GeometryError::DegenerateFace { cell, face } => {
                write!(f, "Face {} of cell {} is degenerate", face, cell)
            }
            GeometryError::NormalComputation { cell, reason } => {
                write!(f, "Normal computation failed for cell {}: {}", cell, reason)
            }
            GeometryError::Tetrahedralization(msg) => write!(f, "Tetrahedralization failed: {}", msg),
        }
    }
}

impl std::error::Error for GeometryError {}
