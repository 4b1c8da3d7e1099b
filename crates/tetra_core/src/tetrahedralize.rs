//! Surface to volume meshing
//!
//! Tetrahedralization is a capability: anything implementing
//! [`TetrahedralizerService`] can turn a closed [`TriangleSurface`] into a
//! [`Topology`]. The built-in [`GridTetrahedralizer`] voxelises the surface
//! and splits each interior cube into six tetrahedra.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tetra_math::Vec3;

use crate::{Cell, GeometryError, Topology, TriangleSurface};

/// Quality parameters threaded through to the tetrahedralizer
///
/// The precise meaning of each value belongs to the meshing backend. The grid
/// backend only uses `cell_size`; the rest are validated and logged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingParams {
    /// Target cell size
    pub cell_size: f64,
    /// Minimum facet angle in degrees
    pub facet_angle: f64,
    /// Upper bound on facet circumradius
    pub facet_size: f64,
    /// Upper bound on facet to surface distance
    pub facet_distance: f64,
    /// Upper bound on cell circumradius to shortest edge ratio
    pub cell_radius_edge_ratio: f64,
}

impl Default for MeshingParams {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            facet_angle: 20.0,
            facet_size: 1.4,
            facet_distance: 0.8,
            cell_radius_edge_ratio: 3.0,
        }
    }
}

impl MeshingParams {
    /// Check that every parameter is positive and finite
    pub fn validate(&self) -> Result<(), GeometryError> {
        let named = [
            ("cell_size", self.cell_size),
            ("facet_angle", self.facet_angle),
            ("facet_size", self.facet_size),
            ("facet_distance", self.facet_distance),
            ("cell_radius_edge_ratio", self.cell_radius_edge_ratio),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(GeometryError::InvalidParams(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Capability interface for volume meshing backends
///
/// Implementations never retry internally; failures are reported upward.
pub trait TetrahedralizerService {
    fn attempt_generate(
        &self,
        surface: &TriangleSurface,
        params: &MeshingParams,
    ) -> Result<Topology, GeometryError>;
}

/// Voxel-grid tetrahedralizer
///
/// Keeps every grid cube whose centre lies inside the surface and splits it
/// into six Kuhn tetrahedra. Neighbouring cubes share grid vertices, so the
/// output is a conforming mesh. Every cell is oriented with positive volume.
#[derive(Clone, Debug)]
pub struct GridTetrahedralizer {
    /// Maximum number of grid cubes along any axis
    pub max_resolution: usize,
}

impl Default for GridTetrahedralizer {
    fn default() -> Self {
        Self { max_resolution: 128 }
    }
}

/// Corner offsets for the six tetrahedra of a unit cube, one per axis permutation
const KUHN_PATHS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

impl GridTetrahedralizer {
    pub fn new(max_resolution: usize) -> Self {
        Self { max_resolution }
    }
}

impl TetrahedralizerService for GridTetrahedralizer {
    fn attempt_generate(
        &self,
        surface: &TriangleSurface,
        params: &MeshingParams,
    ) -> Result<Topology, GeometryError> {
        params.validate()?;
        let (min, max) = match surface.bounds() {
            Some(bounds) if !surface.is_empty() => bounds,
            _ => return Err(GeometryError::EmptySurface),
        };

        log::debug!(
            "Meshing with cell_size={} facet_angle={} facet_size={} facet_distance={} radius_edge_ratio={}",
            params.cell_size,
            params.facet_angle,
            params.facet_size,
            params.facet_distance,
            params.cell_radius_edge_ratio
        );

        let start = Instant::now();
        let h = params.cell_size as f32;
        let extent = max - min;
        let dims = [extent.x, extent.y, extent.z].map(|e| ((e / h).ceil() as usize).max(1));
        if dims.iter().any(|&n| n > self.max_resolution) {
            return Err(GeometryError::Tetrahedralization(format!(
                "grid resolution {}x{}x{} exceeds limit of {} per axis",
                dims[0], dims[1], dims[2], self.max_resolution
            )));
        }

        // Centre the grid on the surface bounds
        let center = (min + max) * 0.5;
        let origin = center
            - Vec3::new(dims[0] as f32, dims[1] as f32, dims[2] as f32) * (h * 0.5);
        let grid_point = |i: usize, j: usize, k: usize| {
            origin + Vec3::new(i as f32, j as f32, k as f32) * h
        };

        let mut vertices: Vec<Vec3> = Vec::new();
        let mut vertex_ids: HashMap<[usize; 3], usize> = HashMap::new();
        let mut cells: Vec<Cell> = Vec::new();

        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let cube_center = grid_point(i, j, k) + Vec3::splat(h * 0.5);
                    if !surface.contains(cube_center) {
                        continue;
                    }

                    for path in &KUHN_PATHS {
                        let mut corner = [i, j, k];
                        let mut ids = [0usize; 4];
                        for (step, slot) in ids.iter_mut().enumerate() {
                            if step > 0 {
                                corner[path[step - 1]] += 1;
                            }
                            *slot = *vertex_ids.entry(corner).or_insert_with(|| {
                                vertices.push(grid_point(corner[0], corner[1], corner[2]));
                                vertices.len() - 1
                            });
                        }

                        let cell = Cell::new(ids);
                        let [a, b, c, d] = ids.map(|id| vertices[id]);
                        if crate::topology::signed_volume(a, b, c, d) < 0.0 {
                            cells.push(cell.flipped());
                        } else {
                            cells.push(cell);
                        }
                    }
                }
            }
        }

        if cells.is_empty() {
            return Err(GeometryError::Tetrahedralization("no interior cells".to_string()));
        }

        let topology = Topology::new(vertices, cells)?;
        log::info!(
            "Generated tetrahedral mesh in {:.3}s with {} tetras and {} vertices",
            start.elapsed().as_secs_f32(),
            topology.cell_count(),
            topology.vertex_count()
        );
        Ok(topology)
    }
}
