//! Closed triangulated surfaces
//!
//! A [`TriangleSurface`] is what gets handed to a tetrahedralizer. Mesh file
//! loading is outside this crate, so procedural shapes are provided for the
//! host application to mesh.

use std::collections::HashMap;

use tetra_math::Vec3;

use crate::BoundingSphere;

/// Ray direction for the inside test, skewed off +X so it never runs exactly
/// along a shared edge of an axis-aligned or symmetric mesh
const INSIDE_RAY: Vec3 = Vec3::new(1.0, 0.001_317, 0.002_713);

/// Vertex list plus counter-clockwise (outward facing) triangles
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleSurface {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleSurface {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[usize; 3]>) -> Self {
        Self { vertices, triangles }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Sphere enclosing every vertex, used to frame the camera
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        BoundingSphere::from_points(&self.vertices)
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), &p| {
            (lo.min_components(p), hi.max_components(p))
        }))
    }

    /// Enclosed volume, positive when triangles face outward
    pub fn signed_volume(&self) -> f32 {
        self.triangles
            .iter()
            .map(|&[a, b, c]| {
                let (a, b, c) = (self.vertices[a], self.vertices[b], self.vertices[c]);
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    /// Ray-parity inside test; only meaningful for closed surfaces
    pub fn contains(&self, point: Vec3) -> bool {
        let crossings = self
            .triangles
            .iter()
            .filter(|&&[a, b, c]| {
                ray_hits_triangle(point, INSIDE_RAY, self.vertices[a], self.vertices[b], self.vertices[c])
            })
            .count();
        crossings % 2 == 1
    }

    /// Axis-aligned cube centred on the origin
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        // Vertex i has x from bit 0, y from bit 1, z from bit 2
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -h } else { h },
                    if i & 2 == 0 { -h } else { h },
                    if i & 4 == 0 { -h } else { h },
                )
            })
            .collect();
        let triangles = vec![
            [0, 4, 6], [0, 6, 2], // -X
            [1, 3, 7], [1, 7, 5], // +X
            [0, 1, 5], [0, 5, 4], // -Y
            [2, 6, 7], [2, 7, 3], // +Y
            [0, 2, 3], [0, 3, 1], // -Z
            [4, 5, 7], [4, 7, 6], // +Z
        ];
        Self { vertices, triangles }
    }

    /// Subdivided icosahedron projected onto a sphere
    pub fn icosphere(radius: f32, subdivisions: u32) -> Self {
        let t = (1.0 + 5.0f32.sqrt()) / 2.0;
        let mut vertices: Vec<Vec3> = [
            (-1.0, t, 0.0), (1.0, t, 0.0), (-1.0, -t, 0.0), (1.0, -t, 0.0),
            (0.0, -1.0, t), (0.0, 1.0, t), (0.0, -1.0, -t), (0.0, 1.0, -t),
            (t, 0.0, -1.0), (t, 0.0, 1.0), (-t, 0.0, -1.0), (-t, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalized())
        .collect();

        let mut triangles: Vec<[usize; 3]> = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
            let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vec3>| -> usize {
                let key = (a.min(b), a.max(b));
                *midpoints.entry(key).or_insert_with(|| {
                    let mid = ((vertices[a] + vertices[b]) * 0.5).normalized();
                    vertices.push(mid);
                    vertices.len() - 1
                })
            };

            let mut next = Vec::with_capacity(triangles.len() * 4);
            for &[a, b, c] in &triangles {
                let ab = midpoint(a, b, &mut vertices);
                let bc = midpoint(b, c, &mut vertices);
                let ca = midpoint(c, a, &mut vertices);
                next.push([a, ab, ca]);
                next.push([b, bc, ab]);
                next.push([c, ca, bc]);
                next.push([ab, bc, ca]);
            }
            triangles = next;
        }

        for v in &mut vertices {
            *v = *v * radius;
        }

        Self { vertices, triangles }
    }
}

/// Möller–Trumbore intersection for a half-line starting at `origin`
fn ray_hits_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    const EPS: f32 = 1e-9;

    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return false;
    }
    let inv_det = 1.0 / det;

    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    e2.dot(q) * inv_det > EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_closed(surface: &TriangleSurface) {
        let mut edges: HashMap<(usize, usize), i32> = HashMap::new();
        for &[a, b, c] in &surface.triangles {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edges.entry((u, v)).or_insert(0) += 1;
            }
        }
        // Every directed edge must be matched by its reverse exactly once
        for (&(u, v), &count) in &edges {
            assert_eq!(count, 1, "edge {}->{} used {} times", u, v, count);
            assert_eq!(edges.get(&(v, u)), Some(&1), "edge {}->{} has no twin", u, v);
        }
    }

    #[test]
    fn test_icosahedron_counts() {
        let s = TriangleSurface::icosphere(1.0, 0);
        assert_eq!(s.vertices.len(), 12);
        assert_eq!(s.triangles.len(), 20);
        assert_closed(&s);
    }

    #[test]
    fn test_icosphere_subdivision_counts() {
        let s = TriangleSurface::icosphere(2.0, 2);
        assert_eq!(s.vertices.len(), 162);
        assert_eq!(s.triangles.len(), 320);
        assert_closed(&s);
        for v in &s.vertices {
            assert!((v.length() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_outward_winding() {
        assert!(TriangleSurface::icosphere(1.0, 1).signed_volume() > 0.0);
        let cube = TriangleSurface::cube(1.0);
        assert!((cube.signed_volume() - 8.0).abs() < 1e-4);
        assert_closed(&cube);
    }

    #[test]
    fn test_contains() {
        let s = TriangleSurface::icosphere(1.0, 1);
        assert!(s.contains(Vec3::ZERO));
        assert!(s.contains(Vec3::new(0.5, 0.0, 0.0)));
        assert!(!s.contains(Vec3::new(1.5, 0.0, 0.0)));
        assert!(!s.contains(Vec3::new(-1.5, 0.2, 0.1)));

        let cube = TriangleSurface::cube(1.0);
        assert!(cube.contains(Vec3::new(0.9, -0.9, 0.9)));
        assert!(!cube.contains(Vec3::new(1.1, 0.0, 0.0)));
    }

    #[test]
    fn test_bounds_and_sphere() {
        let cube = TriangleSurface::cube(2.0);
        let (min, max) = cube.bounds().unwrap();
        assert_eq!(min, Vec3::splat(-2.0));
        assert_eq!(max, Vec3::splat(2.0));
        let sphere = cube.bounding_sphere().unwrap();
        assert_eq!(sphere.center, Vec3::ZERO);
        assert!((sphere.radius - 12.0f32.sqrt()).abs() < 1e-5);

        assert!(TriangleSurface::default().bounds().is_none());
    }
}
