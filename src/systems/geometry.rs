//! Load-time geometry
//!
//! Generates the configured surface, tetrahedralizes it, and reports what was
//! built. Nothing here touches the GPU.

use std::time::Instant;

use tetra_core::{
    BoundingSphere, GeometryError, GridTetrahedralizer, TetrahedralizerService, Topology,
    TriangleSurface,
};

use crate::config::MeshConfig;

/// What the load step produced, for framing and logging
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshSummary {
    pub surface_triangles: usize,
    pub cells: usize,
    pub vertices: usize,
    /// Bounds of the input surface, used to frame the camera
    pub bounds: Option<BoundingSphere>,
}

/// Mesh the configured sphere with the built-in grid tetrahedralizer
pub fn build_topology(config: &MeshConfig) -> Result<(Topology, MeshSummary), GeometryError> {
    let start = Instant::now();
    let surface = TriangleSurface::icosphere(config.radius, config.subdivisions);
    log::info!(
        "Generated surface: {} vertices, {} triangles",
        surface.vertices.len(),
        surface.triangles.len()
    );

    let topology = GridTetrahedralizer::default().attempt_generate(&surface, &config.meshing)?;
    log::info!(
        "Generated topology: {} cells, {} vertices in {:.2?}",
        topology.cell_count(),
        topology.vertex_count(),
        start.elapsed()
    );

    let summary = MeshSummary {
        surface_triangles: surface.triangles.len(),
        cells: topology.cell_count(),
        vertices: topology.vertex_count(),
        bounds: surface.bounding_sphere(),
    };
    Ok((topology, summary))
}

/// Floor plane height: just under the mesh, or the origin with no mesh
pub fn floor_height(bounds: Option<BoundingSphere>) -> f32 {
    bounds.map_or(0.0, |s| s.center.y - s.radius)
}
