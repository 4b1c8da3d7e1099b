//! Per-cell face normals
//!
//! The batch builder hands each cell's 12 exploded vertices (4 triangles) to a
//! [`NormalComputer`] and copies the result 1:1 into the normal stream.

use tetra_math::Vec3;

use crate::GeometryError;

/// Capability interface for normal generation over one cell's triangles
pub trait NormalComputer {
    /// Compute one normal per vertex for `cell`'s 12 face vertices
    fn compute_normals(&self, cell: usize, face_vertices: &[Vec3; 12]) -> Result<[Vec3; 12], GeometryError>;
}

/// Flat shading: every vertex takes the normal of the triangle it belongs to
///
/// Since no vertex is shared between faces of an exploded cell, this is the
/// same result a smoothing routine over the temporary 4-triangle surface gives.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaceNormals;

impl NormalComputer for FaceNormals {
    fn compute_normals(&self, cell: usize, face_vertices: &[Vec3; 12]) -> Result<[Vec3; 12], GeometryError> {
        let mut normals = [Vec3::ZERO; 12];
        for (face, (tri, out)) in face_vertices
            .chunks_exact(3)
            .zip(normals.chunks_exact_mut(3))
            .enumerate()
        {
            if !tri.iter().all(|v| v.is_finite()) {
                return Err(GeometryError::NormalComputation {
                    cell,
                    reason: format!("face {} has a non-finite vertex", face),
                });
            }

            let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
            let len = n.length();
            if len <= f32::EPSILON * (tri[1] - tri[0]).length_squared().max(f32::MIN_POSITIVE) {
                return Err(GeometryError::DegenerateFace { cell, face });
            }

            out.fill(n / len);
        }
        Ok(normals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_vertices(p: [Vec3; 4]) -> [Vec3; 12] {
        [p[0], p[3], p[2], p[3], p[1], p[2], p[1], p[0], p[2], p[0], p[1], p[3]]
    }

    fn unit_tetra() -> [Vec3; 4] {
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn test_unit_tetra_normals_point_outward() {
        let verts = face_vertices(unit_tetra());
        let normals = FaceNormals.compute_normals(0, &verts).unwrap();
        let centroid = Vec3::splat(0.25);

        for face in 0..4 {
            let n = normals[face * 3];
            assert!((n.length() - 1.0).abs() < 1e-5);
            // All three vertices of a face share its normal
            assert_eq!(normals[face * 3 + 1], n);
            assert_eq!(normals[face * 3 + 2], n);
            let face_center = (verts[face * 3] + verts[face * 3 + 1] + verts[face * 3 + 2]) / 3.0;
            assert!(n.dot(face_center - centroid) > 0.0, "face {} points inward", face);
        }
    }

    #[test]
    fn test_axis_aligned_faces() {
        let normals = FaceNormals.compute_normals(0, &face_vertices(unit_tetra())).unwrap();
        // Face (v0, v3, v2) lies in the x = 0 plane
        assert!((normals[0] - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-6);
        // Face (v1, v0, v2) lies in the z = 0 plane
        assert!((normals[6] - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_degenerate_face() {
        let mut p = unit_tetra();
        p[3] = Vec3::new(0.5, 0.5, 0.0);
        let err = FaceNormals.compute_normals(4, &face_vertices(p)).unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateFace { cell: 4, .. }));
    }

    #[test]
    fn test_non_finite_vertex() {
        let mut p = unit_tetra();
        p[1] = Vec3::new(f32::NAN, 0.0, 0.0);
        let err = FaceNormals.compute_normals(2, &face_vertices(p)).unwrap_err();
        assert!(matches!(err, GeometryError::NormalComputation { cell: 2, .. }));
    }
}
