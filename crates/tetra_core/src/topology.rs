//! Tetrahedral topology
//!
//! A [`Topology`] is the immutable output of a tetrahedralizer: a vertex array
//! and a list of cells, each cell holding four indices into that array.
//! Construction validates every cell so downstream code can index freely.

use tetra_math::Vec3;

use crate::GeometryError;

/// A tetrahedral cell defined by vertex indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Indices into the parent topology's vertex array
    pub indices: [usize; 4],
}

impl Cell {
    /// Create a new cell with the given vertex indices
    #[inline]
    pub fn new(indices: [usize; 4]) -> Self {
        Self { indices }
    }

    /// The same cell with indices 2 and 3 swapped, which flips its orientation
    #[inline]
    pub fn flipped(self) -> Self {
        let [a, b, c, d] = self.indices;
        Self { indices: [a, b, d, c] }
    }

    fn has_duplicates(&self) -> bool {
        let i = self.indices;
        i[0] == i[1] || i[0] == i[2] || i[0] == i[3] || i[1] == i[2] || i[1] == i[3] || i[2] == i[3]
    }
}

/// Smallest axis-aligned-box-centred sphere containing a point set
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere around the box centre of `points`, or `None` for an empty set
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points.iter().fold((first, first), |(lo, hi), &p| {
            (lo.min_components(p), hi.max_components(p))
        });
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        Some(Self { center, radius })
    }
}

/// Immutable set of vertices and tetrahedral cells
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Topology {
    vertices: Vec<Vec3>,
    cells: Vec<Cell>,
}

impl Topology {
    /// Build a topology, validating that every cell references four distinct,
    /// in-bounds vertices
    pub fn new(vertices: Vec<Vec3>, cells: Vec<Cell>) -> Result<Self, GeometryError> {
        let vertex_count = vertices.len();
        for (cell_idx, cell) in cells.iter().enumerate() {
            if let Some(&index) = cell.indices.iter().find(|&&i| i >= vertex_count) {
                return Err(GeometryError::IndexOutOfBounds {
                    cell: cell_idx,
                    index,
                    vertex_count,
                });
            }
            if cell.has_duplicates() {
                return Err(GeometryError::DuplicateIndex { cell: cell_idx });
            }
        }
        Ok(Self { vertices, cells })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// True when there is nothing to draw
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The four corner positions of a cell
    pub fn cell_positions(&self, cell: &Cell) -> [Vec3; 4] {
        cell.indices.map(|i| self.vertices[i])
    }

    /// Arithmetic mean of a cell's four vertices
    pub fn centroid(&self, cell: &Cell) -> Vec3 {
        let [a, b, c, d] = self.cell_positions(cell);
        (a + b + c + d) * 0.25
    }

    /// Signed volume of a cell; positive when (v1-v0, v2-v0, v3-v0) is right-handed
    pub fn signed_volume(&self, cell: &Cell) -> f32 {
        let [a, b, c, d] = self.cell_positions(cell);
        signed_volume(a, b, c, d)
    }

    /// Bounding sphere of all vertices
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        BoundingSphere::from_points(&self.vertices)
    }
}

/// Signed volume of the tetrahedron (a, b, c, d)
pub fn signed_volume(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f32 {
    (b - a).cross(c - a).dot(d - a) / 6.0
}
