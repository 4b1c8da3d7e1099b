//! Orbit camera
//!
//! The camera looks at a fixed target from a point on a circle around it.
//! Interactive control is the host's business; the renderer only needs the
//! view and projection matrices.

use tetra_core::BoundingSphere;
use tetra_math::{mat4, Mat4, Vec3};

/// Perspective camera looking at a target
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_3,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            near,
            far,
            ..Default::default()
        }
    }

    pub fn view(&self) -> Mat4 {
        mat4::look_at(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        mat4::mul(self.projection(), self.view())
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Aim at `sphere` from far enough away that it fills the view
    ///
    /// `distance_scale` backs the camera off further; 1 just fits the sphere.
    /// The current viewing direction is kept.
    pub fn frame(&mut self, sphere: BoundingSphere, distance_scale: f32) {
        let mut direction = (self.eye - self.target).normalized();
        if direction == Vec3::ZERO {
            direction = Vec3::Z;
        }
        let half_fov = (self.fov_y * 0.5).min(self.fov_y * 0.5 * self.aspect);
        let distance = sphere.radius.max(f32::EPSILON) / half_fov.sin() * distance_scale;

        self.target = sphere.center;
        self.eye = sphere.center + direction * distance;
        log::debug!(
            "Camera framed sphere at {:?} (radius {:.2}) from distance {:.2}",
            sphere.center,
            sphere.radius,
            distance
        );
    }

    /// Rotate the eye around the target's vertical axis by `angle` radians
    pub fn orbit(&mut self, angle: f32) {
        let offset = self.eye - self.target;
        let (sin, cos) = angle.sin_cos();
        let rotated = Vec3::new(
            offset.x * cos + offset.z * sin,
            offset.y,
            -offset.x * sin + offset.z * cos,
        );
        self.eye = self.target + rotated;
    }

    /// Distance from eye to target
    pub fn distance(&self) -> f32 {
        self.eye.distance(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    #[test]
    fn test_frame_keeps_direction() {
        let mut camera = Camera::default();
        camera.frame(
            BoundingSphere {
                center: Vec3::new(1.0, 2.0, 3.0),
                radius: 4.0,
            },
            1.0,
        );
        assert_eq!(camera.target, Vec3::new(1.0, 2.0, 3.0));
        let direction = (camera.eye - camera.target).normalized();
        assert!((direction - Vec3::Z).length() < EPSILON);
        // 60 degree fov: radius / sin(30 degrees) = 8
        assert!((camera.distance() - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_frame_scale() {
        let sphere = BoundingSphere { center: Vec3::ZERO, radius: 1.0 };
        let mut near = Camera::default();
        near.frame(sphere, 1.0);
        let mut far = Camera::default();
        far.frame(sphere, 2.0);
        assert!((far.distance() - 2.0 * near.distance()).abs() < 1e-3);
    }

    #[test]
    fn test_orbit_preserves_distance() {
        let mut camera = Camera::default();
        let d = camera.distance();
        camera.orbit(std::f32::consts::FRAC_PI_2);
        assert!((camera.distance() - d).abs() < EPSILON);
        assert!((camera.eye - Vec3::new(5.0, 0.0, 0.0)).length() < EPSILON);
        camera.orbit(std::f32::consts::PI * 1.5);
        assert!((camera.eye - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-3);
    }

    #[test]
    fn test_target_projects_to_center() {
        let mut camera = Camera::default();
        camera.orbit(0.7);
        let clip = mat4::transform(camera.view_projection(), [0.0, 0.0, 0.0, 1.0]);
        assert!((clip[0] / clip[3]).abs() < EPSILON);
        assert!((clip[1] / clip[3]).abs() < EPSILON);
        let depth = clip[2] / clip[3];
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn test_set_aspect() {
        let mut camera = Camera::default();
        camera.set_aspect(1920, 1080);
        assert!((camera.aspect - 16.0 / 9.0).abs() < EPSILON);
        camera.set_aspect(100, 0);
        assert_eq!(camera.aspect, 100.0);
    }
}
