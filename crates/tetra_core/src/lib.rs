//! Core types for the Tetra renderer
//!
//! Everything here is GPU-free:
//!
//! - [`Topology`] / [`Cell`] - validated tetrahedral mesh
//! - [`TriangleSurface`] - closed input surface, with procedural shapes
//! - [`TetrahedralizerService`] - meshing capability, with [`GridTetrahedralizer`]
//! - [`NormalComputer`] - per-cell normal capability, with [`FaceNormals`]
//! - [`BatchBuilder`] - exploded per-cell vertex streams and indirect draw commands
//! - [`LightSet`] - animated point lights
//! - [`GeometryError`] - failures of all of the above

mod error;
mod topology;
mod surface;
mod tetrahedralize;
mod normals;
mod batch;
mod lights;

pub use error::GeometryError;
pub use topology::{BoundingSphere, Cell, Topology};
pub use surface::TriangleSurface;
pub use tetrahedralize::{GridTetrahedralizer, MeshingParams, TetrahedralizerService};
pub use normals::{FaceNormals, NormalComputer};
pub use batch::{
    exploded_position, BatchBuilder, DrawIndirectArgs, TetraBatchData, FACE_ORDER,
    VERTICES_PER_CELL,
};
pub use lights::{Light, LightSet};

// Re-export math types for convenience
pub use tetra_math::{Mat4, Vec3};
