//! Batch builder
//!
//! Turns a [`Topology`] into flat, GPU-ready streams:
//!
//! - 12 exploded vertices and 12 normals per cell (4 faces, fixed winding)
//! - one centroid and one model matrix per cell (instance data)
//! - one indirect draw command per cell, so a single multi-draw covers the mesh
//!
//! Vertices are stored as `centroid + (vertex - centroid)`, which lets the
//! geometry shader shrink every cell toward its centroid with one uniform.

use bytemuck::{Pod, Zeroable};
use tetra_math::{mat4, Mat4, Vec3};

use crate::{FaceNormals, GeometryError, NormalComputer, Topology};

/// Vertices emitted per cell
pub const VERTICES_PER_CELL: usize = 12;

/// Corner order of each emitted face. The geometry stage relies on this order
/// for back-face culling, so it must not change.
pub const FACE_ORDER: [[usize; 3]; 4] = [[0, 3, 2], [3, 1, 2], [1, 0, 2], [0, 1, 3]];

/// Indirect draw record, byte-compatible with a non-indexed indirect draw
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// The command drawing cell `index`
    pub fn for_cell(index: u32) -> Self {
        Self {
            vertex_count: VERTICES_PER_CELL as u32,
            instance_count: 1,
            first_vertex: index * VERTICES_PER_CELL as u32,
            first_instance: index,
        }
    }
}

/// CPU side of a tetra batch
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TetraBatchData {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub centroids: Vec<Vec3>,
    pub model_matrices: Vec<Mat4>,
    pub draw_commands: Vec<DrawIndirectArgs>,
}

impl TetraBatchData {
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.draw_commands.len()
    }

    /// True when a draw would have nothing to do
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.draw_commands.is_empty()
    }
}

/// Position of `vertex` after shrinking it toward `centroid` by `scale`
///
/// Mirrors the tetra G-buffer vertex shader.
#[inline]
pub fn exploded_position(centroid: Vec3, vertex: Vec3, scale: f32) -> Vec3 {
    centroid + (vertex - centroid) * scale
}

/// Builds [`TetraBatchData`] from a topology
#[derive(Clone, Debug, Default)]
pub struct BatchBuilder<N = FaceNormals> {
    normals: N,
}

impl BatchBuilder<FaceNormals> {
    pub fn new() -> Self {
        Self { normals: FaceNormals }
    }
}

impl<N: NormalComputer> BatchBuilder<N> {
    /// Use a custom normal routine
    pub fn with_normals(normals: N) -> Self {
        Self { normals }
    }

    /// Build the batch streams
    ///
    /// `None` or an empty topology means no mesh is loaded and yields empty
    /// streams. Each cell is assembled on its own and appended only once it is
    /// complete; any cell failure fails the whole build.
    pub fn build(&self, topology: Option<&Topology>) -> Result<TetraBatchData, GeometryError> {
        let topology = match topology {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(TetraBatchData::default()),
        };

        let cell_count = topology.cell_count();
        if cell_count
            .checked_mul(VERTICES_PER_CELL)
            .map_or(true, |n| n > u32::MAX as usize)
        {
            return Err(GeometryError::InvalidParams(format!(
                "{} cells exceed the 32-bit draw command range",
                cell_count
            )));
        }

        let mut data = TetraBatchData {
            vertices: Vec::with_capacity(cell_count * VERTICES_PER_CELL),
            normals: Vec::with_capacity(cell_count * VERTICES_PER_CELL),
            centroids: Vec::with_capacity(cell_count),
            model_matrices: Vec::with_capacity(cell_count),
            draw_commands: Vec::with_capacity(cell_count),
        };

        for (index, cell) in topology.cells().iter().enumerate() {
            let corners = topology.cell_positions(cell);
            let centroid = topology.centroid(cell);

            let mut face_vertices = [Vec3::ZERO; VERTICES_PER_CELL];
            for (face, order) in FACE_ORDER.iter().enumerate() {
                for (k, &corner) in order.iter().enumerate() {
                    face_vertices[face * 3 + k] = exploded_position(centroid, corners[corner], 1.0);
                }
            }

            let normals = self
                .normals
                .compute_normals(index, &face_vertices)
                .inspect_err(|e| log::error!("Batch build failed: {}", e))?;

            data.vertices.extend_from_slice(&face_vertices);
            data.normals.extend_from_slice(&normals);
            data.centroids.push(centroid);
            data.model_matrices.push(mat4::IDENTITY);
            data.draw_commands.push(DrawIndirectArgs::for_cell(index as u32));
        }

        log::info!(
            "Built tetra batch: {} cells, {} vertices",
            data.cell_count(),
            data.vertices.len()
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cell;

    fn unit_topology() -> Topology {
        Topology::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            vec![Cell::new([0, 1, 2, 3])],
        )
        .unwrap()
    }

    #[test]
    fn test_draw_args_layout() {
        assert_eq!(std::mem::size_of::<DrawIndirectArgs>(), 16);
        let args = DrawIndirectArgs::for_cell(3);
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&args));
        assert_eq!(words, &[12, 1, 36, 3]);
    }

    #[test]
    fn test_face_order() {
        let data = BatchBuilder::new().build(Some(&unit_topology())).unwrap();
        let expected = [
            [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0],
        ];
        for (v, e) in data.vertices.iter().zip(expected.iter()) {
            assert!((*v - Vec3::from_array(*e)).length() < 1e-6, "{:?} != {:?}", v, e);
        }
    }

    #[test]
    fn test_exploded_position() {
        let c = Vec3::new(1.0, 1.0, 1.0);
        let v = Vec3::new(3.0, 1.0, -1.0);
        assert_eq!(exploded_position(c, v, 1.0), v);
        assert_eq!(exploded_position(c, v, 0.0), c);
        assert_eq!(exploded_position(c, v, 0.5), Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_empty_topology_is_not_an_error() {
        let empty = Topology::default();
        assert!(BatchBuilder::new().build(Some(&empty)).unwrap().is_empty());
        assert!(BatchBuilder::new().build(None).unwrap().is_empty());
    }

    struct FailOn(usize);

    impl NormalComputer for FailOn {
        fn compute_normals(&self, cell: usize, v: &[Vec3; 12]) -> Result<[Vec3; 12], GeometryError> {
            if cell == self.0 {
                Err(GeometryError::NormalComputation { cell, reason: "forced".to_string() })
            } else {
                FaceNormals.compute_normals(cell, v)
            }
        }
    }

    #[test]
    fn test_cell_failure_fails_whole_build() {
        let topo = Topology::new(
            unit_topology().vertices().to_vec(),
            vec![Cell::new([0, 1, 2, 3]), Cell::new([1, 0, 3, 2])],
        )
        .unwrap();
        let err = BatchBuilder::with_normals(FailOn(1)).build(Some(&topo)).unwrap_err();
        assert_eq!(
            err,
            GeometryError::NormalComputation { cell: 1, reason: "forced".to_string() }
        );
    }
}
