//! GPU-compatible data types for the deferred pipeline
//!
//! Each program has one uniform struct, written whole once per frame. The
//! struct fields are the program's parameter table: the layouts below must
//! match the WGSL declarations exactly. All types derive Pod and Zeroable for
//! safe GPU buffer operations.

use bytemuck::{Pod, Zeroable};
use tetra_core::Light;
use tetra_math::{mat4, Mat4, Vec3};

/// Uniforms of both G-buffer programs
/// Layout: 176 bytes total (must match GBufferUniforms in the G-buffer shaders)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GBufferUniforms {
    /// View matrix (64 bytes)
    pub view: Mat4,
    /// Projection matrix (64 bytes)
    pub projection: Mat4,
    /// Center + radius in world space; radius <= 0 disables clipping
    pub clip_sphere: [f32; 4],
    /// Albedo of the tetra mesh
    pub albedo: [f32; 4],
    /// Shrink-toward-centroid factor, 1 = cells touch
    pub tetra_scale: f32,
    pub _padding: [f32; 3],
}

impl Default for GBufferUniforms {
    fn default() -> Self {
        Self {
            view: mat4::IDENTITY,
            projection: mat4::IDENTITY,
            clip_sphere: [0.0; 4],
            albedo: [0.8, 0.8, 0.8, 1.0],
            tetra_scale: 1.0,
            _padding: [0.0; 3],
        }
    }
}

/// Uniforms of the light-volume program
/// Layout: 80 bytes total
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightUniforms {
    pub view_projection: Mat4,
    /// Viewport size in pixels
    pub size: [f32; 2],
    pub _padding: [f32; 2],
}

/// One entry of the light storage buffer
/// Layout: 80 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuLight {
    /// View-space position, volume radius in w
    pub view_position: [f32; 4],
    /// World-space position, intensity in w
    pub world_position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

impl GpuLight {
    pub fn new(light: &Light, view: Mat4) -> Self {
        let p = light.position;
        let v = mat4::transform_point(view, p);
        Self {
            view_position: [v.x, v.y, v.z, light.volume],
            world_position: [p.x, p.y, p.z, light.intensity],
            ambient: light.ambient,
            diffuse: light.diffuse,
            specular: light.specular,
        }
    }
}

/// Vertex of the floor and marker meshes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Per-instance data of the scene G-buffer program
/// Layout: 96 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MarkerInstance {
    pub model: Mat4,
    pub color: [f32; 4],
    pub emissive: f32,
    pub _padding: [f32; 3],
}

impl MarkerInstance {
    /// Emissive sphere for a light marker
    pub fn light(light: &Light) -> Self {
        Self {
            model: mat4::translation_scale(light.position, light.radius),
            color: light.diffuse,
            emissive: 1.0,
            _padding: [0.0; 3],
        }
    }

    /// Non-emissive floor at `height`
    pub fn floor(height: f32, color: [f32; 4]) -> Self {
        Self {
            model: mat4::translation(Vec3::new(0.0, height, 0.0)),
            color,
            emissive: 0.0,
            _padding: [0.0; 3],
        }
    }
}

/// Clip-space-Z linearization
/// Layout: 16 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CszUniforms {
    pub near: f32,
    pub far: f32,
    pub _padding: [f32; 2],
}

/// Scalable ambient obscurance parameters
/// Layout: 48 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SaoUniforms {
    /// Maps pixel coordinates and linear depth back to view space
    pub proj_info: [f32; 4],
    /// Pixels per world unit at distance 1
    pub proj_scale: f32,
    /// World-space sample radius
    pub radius: f32,
    pub bias: f32,
    /// intensity / radius^6
    pub intensity_div_r6: f32,
    pub far: f32,
    pub max_mip_level: i32,
    pub _padding: [f32; 2],
}

impl SaoUniforms {
    /// Derive the reconstruction terms from a projection matrix
    ///
    /// `width` and `height` are the full-resolution size the clip-space-Z
    /// target was rendered at.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        projection: Mat4,
        width: u32,
        height: u32,
        radius: f32,
        bias: f32,
        intensity: f32,
        far: f32,
        max_mip_level: i32,
    ) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let (p00, p11) = (projection[0][0], projection[1][1]);
        // Row 0/1, column 2 of the projection
        let (p02, p12) = (projection[2][0], projection[2][1]);
        let radius = radius.max(f32::EPSILON);
        Self {
            proj_info: [
                -2.0 / (w * p00),
                -2.0 / (h * p11),
                (1.0 - p02) / p00,
                (1.0 + p12) / p11,
            ],
            proj_scale: 0.5 * h * p11,
            radius,
            bias,
            intensity_div_r6: intensity / radius.powi(6),
            far,
            max_mip_level,
            _padding: [0.0; 2],
        }
    }
}

/// Blur direction in texels
/// Layout: 16 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BlurUniforms {
    pub axis: [i32; 2],
    pub _padding: [i32; 2],
}

impl BlurUniforms {
    pub const HORIZONTAL: Self = Self { axis: [1, 0], _padding: [0; 2] };
    pub const VERTICAL: Self = Self { axis: [0, 1], _padding: [0; 2] };
}

/// Composite parameters
/// Layout: 16 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CompositeUniforms {
    /// Written where the G-buffer holds no geometry
    pub background: [f32; 4],
}

/// Edge-smoothing filter parameters
/// Layout: 16 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FxaaUniforms {
    /// Reciprocal of one texel
    pub texel: [f32; 2],
    pub _padding: [f32; 2],
}

impl FxaaUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            texel: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            _padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_uniform_sizes() {
        // Uniform buffers must be multiples of 16 bytes
        assert_eq!(size_of::<GBufferUniforms>(), 176);
        assert_eq!(size_of::<LightUniforms>(), 80);
        assert_eq!(size_of::<CszUniforms>(), 16);
        assert_eq!(size_of::<SaoUniforms>(), 48);
        assert_eq!(size_of::<BlurUniforms>(), 16);
        assert_eq!(size_of::<CompositeUniforms>(), 16);
        assert_eq!(size_of::<FxaaUniforms>(), 16);
    }

    #[test]
    fn test_buffer_element_sizes() {
        assert_eq!(size_of::<GpuLight>(), 80);
        assert_eq!(size_of::<MeshVertex>(), 24);
        assert_eq!(size_of::<MarkerInstance>(), 96);
    }

    #[test]
    fn test_gpu_light_view_position() {
        let light = Light {
            position: Vec3::new(1.0, 2.0, 3.0),
            volume: 12.0,
            intensity: 0.5,
            ..Default::default()
        };
        let view = mat4::translation(Vec3::new(0.0, 0.0, -10.0));
        let gpu = GpuLight::new(&light, view);
        assert_eq!(gpu.view_position, [1.0, 2.0, -7.0, 12.0]);
        assert_eq!(gpu.world_position, [1.0, 2.0, 3.0, 0.5]);
    }

    #[test]
    fn test_sao_reconstructs_frustum_edges() {
        let proj = mat4::perspective(std::f32::consts::FRAC_PI_2, 2.0, 0.1, 100.0);
        let u = SaoUniforms::new(proj, 200, 100, 1.0, 0.01, 1.0, 100.0, 4);

        // Left edge at depth z = -1 reconstructs x = -aspect * tan(fov / 2)
        let z = -1.0;
        let x_left = (0.0 * u.proj_info[0] + u.proj_info[2]) * z;
        let x_right = (200.0 * u.proj_info[0] + u.proj_info[2]) * z;
        let y_bottom = (0.0 * u.proj_info[1] + u.proj_info[3]) * z;
        assert!((x_left + 2.0).abs() < 1e-4);
        assert!((x_right - 2.0).abs() < 1e-4);
        assert!((y_bottom + 1.0).abs() < 1e-4);
        // 90 degree fov: one world unit at distance 1 spans half the height
        assert!((u.proj_scale - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_fxaa_texel() {
        let u = FxaaUniforms::new(800, 400);
        assert_eq!(u.texel, [1.0 / 800.0, 1.0 / 400.0]);
        // Zero-sized surfaces never divide by zero
        assert_eq!(FxaaUniforms::new(0, 0).texel, [1.0, 1.0]);
    }

    #[test]
    fn test_marker_instances() {
        let light = Light {
            position: Vec3::new(0.0, 5.0, 0.0),
            radius: 2.0,
            ..Default::default()
        };
        let marker = MarkerInstance::light(&light);
        assert_eq!(marker.emissive, 1.0);
        assert_eq!(mat4::transform_point(marker.model, Vec3::X), Vec3::new(2.0, 5.0, 0.0));

        let floor = MarkerInstance::floor(-3.0, [0.5; 4]);
        assert_eq!(floor.emissive, 0.0);
        assert_eq!(mat4::transform_point(floor.model, Vec3::ZERO), Vec3::new(0.0, -3.0, 0.0));
    }
}
