//! Deferred renderer
//!
//! Records one frame by walking the [`FramePlan`] for the current targets,
//! programs, and flags. Each stage runs inside an [`EncoderScope`] and reads
//! its targets as borrows of the [`RenderTargets`] owned here. Stages the plan
//! skipped are logged once per cause.

use std::collections::HashSet;

use tetra_core::{BoundingSphere, LightSet, TriangleSurface};
use tetra_math::Vec3;
use wgpu::util::DeviceExt;

use crate::batch::TetraBatch;
use crate::camera::Camera;
use crate::context::DeviceCapabilities;
use crate::pipeline::{
    CompositeUniforms, CszUniforms, FrameFlags, FrameInputs, FramePlan, FxaaUniforms,
    GBufferUniforms, GpuLight, LightUniforms, MarkerInstance, MeshVertex, PlannedStage, Programs,
    SaoUniforms, SkippedStage, Stage,
};
use crate::scope::{capture_errors, EncoderScope};
use crate::targets::{GpuAllocator, GpuTarget, RenderTargets, TargetSlot};

/// Half the side length of the floor plane
pub const FLOOR_HALF_EXTENT: f32 = 100.0;
/// Subdivisions of the light marker sphere
const MARKER_SUBDIVISIONS: u32 = 2;

/// Ambient obscurance tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaoSettings {
    /// World-space sample radius
    pub radius: f32,
    pub bias: f32,
    pub intensity: f32,
}

impl Default for SaoSettings {
    fn default() -> Self {
        Self {
            radius: 1.0,
            bias: 0.012,
            intensity: 1.0,
        }
    }
}

/// A non-indexed vertex buffer
struct Mesh {
    buffer: wgpu::Buffer,
    vertex_count: u32,
}

impl Mesh {
    fn new<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, vertices: &[T]) -> Option<Self> {
        capture_errors(device, label, || Self {
            buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            vertex_count: vertices.len() as u32,
        })
    }
}

/// A buffer rewritten every frame, reallocated when it outgrows its capacity
struct DynamicBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: Option<wgpu::Buffer>,
    capacity: wgpu::BufferAddress,
}

impl DynamicBuffer {
    fn new(label: &'static str, usage: wgpu::BufferUsages) -> Self {
        Self {
            label,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            buffer: None,
            capacity: 0,
        }
    }

    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let needed = bytes.len() as wgpu::BufferAddress;
        if needed > self.capacity || self.buffer.is_none() {
            let capacity = grown_capacity(self.capacity, needed);
            self.buffer = None;
            self.buffer = capture_errors(device, self.label, || {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(self.label),
                    size: capacity,
                    usage: self.usage,
                    mapped_at_creation: false,
                })
            });
            self.capacity = if self.buffer.is_some() { capacity } else { 0 };
        }
        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, bytes);
        }
    }

    fn get(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}

/// Next capacity able to hold `needed` bytes
fn grown_capacity(current: wgpu::BufferAddress, needed: wgpu::BufferAddress) -> wgpu::BufferAddress {
    if needed <= current {
        current
    } else {
        needed.next_power_of_two().max(256)
    }
}

/// Floor plane at y = 0 facing +Y
fn floor_vertices(half_extent: f32) -> Vec<MeshVertex> {
    let h = half_extent;
    let up = [0.0, 1.0, 0.0];
    [[-h, 0.0, -h], [-h, 0.0, h], [h, 0.0, h], [-h, 0.0, -h], [h, 0.0, h], [h, 0.0, -h]]
        .into_iter()
        .map(|position| MeshVertex { position, normal: up })
        .collect()
}

/// Unit sphere flattened to a triangle list with smooth normals
fn marker_vertices() -> Vec<MeshVertex> {
    let sphere = TriangleSurface::icosphere(1.0, MARKER_SUBDIVISIONS);
    sphere
        .triangles
        .iter()
        .flatten()
        .map(|&i| {
            let p = sphere.vertices[i];
            MeshVertex {
                position: p.to_array(),
                normal: p.normalized().to_array(),
            }
        })
        .collect()
}

/// Cube around the unit sphere, outward winding
fn light_volume_vertices() -> Vec<Vec3> {
    let cube = TriangleSurface::cube(1.0);
    cube.triangles
        .iter()
        .flatten()
        .map(|&i| cube.vertices[i])
        .collect()
}

/// Static meshes of the scene pass and the light pass
struct SceneMeshes {
    floor: Option<Mesh>,
    marker: Option<Mesh>,
    light_volume: Option<Mesh>,
}

/// Records frames of the deferred pipeline
pub struct DeferredRenderer {
    targets: RenderTargets<GpuTarget>,
    programs: Programs,
    sampler: wgpu::Sampler,
    meshes: SceneMeshes,
    light_buffer: DynamicBuffer,
    marker_buffer: DynamicBuffer,
    capabilities: DeviceCapabilities,
    flags: FrameFlags,
    tetra_scale: f32,
    clip_sphere: [f32; 4],
    floor_height: f32,
    albedo: [f32; 4],
    floor_color: [f32; 4],
    background: [f32; 4],
    sao: SaoSettings,
    /// Skips already logged since the last resize
    reported: HashSet<SkippedStage>,
}

impl DeferredRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        capabilities: DeviceCapabilities,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let meshes = SceneMeshes {
            floor: Mesh::new(device, "Floor Mesh", &floor_vertices(FLOOR_HALF_EXTENT)),
            marker: Mesh::new(device, "Light Marker Mesh", &marker_vertices()),
            light_volume: Mesh::new(device, "Light Volume Mesh", &light_volume_vertices()),
        };

        let mut renderer = Self {
            targets: RenderTargets::with_formats(capabilities.formats),
            programs: Programs::new(device, queue, surface_format, &capabilities.formats),
            sampler,
            meshes,
            light_buffer: DynamicBuffer::new("Light Buffer", wgpu::BufferUsages::STORAGE),
            marker_buffer: DynamicBuffer::new("Marker Instance Buffer", wgpu::BufferUsages::VERTEX),
            capabilities,
            flags: FrameFlags::default(),
            tetra_scale: 1.0,
            clip_sphere: [0.0; 4],
            floor_height: 0.0,
            albedo: [0.8, 0.8, 0.8, 1.0],
            floor_color: [0.6, 0.6, 0.6, 1.0],
            background: [0.0, 0.0, 0.0, 1.0],
            sao: SaoSettings::default(),
            reported: HashSet::new(),
        };
        renderer.resize(device, width, height);
        renderer
    }

    /// Reallocate every render target
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.targets.resize(&mut GpuAllocator { device }, width, height);
        self.reported.clear();
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.set_flag(FrameFlags::DEBUG_MODE, enabled);
    }

    pub fn is_debug_mode(&self) -> bool {
        self.flags.contains(FrameFlags::DEBUG_MODE)
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: FrameFlags, enabled: bool) {
        self.flags.set(flag, enabled);
    }

    pub fn toggle_flag(&mut self, flag: FrameFlags) {
        self.flags.toggle(flag);
    }

    /// Shrink-toward-centroid factor, clamped to 0..=1
    pub fn set_tetra_scale(&mut self, scale: f32) {
        self.tetra_scale = scale.clamp(0.0, 1.0);
    }

    pub fn tetra_scale(&self) -> f32 {
        self.tetra_scale
    }

    /// Hide cells whose centroid lies outside `sphere`; `None` shows everything
    pub fn set_clip_sphere(&mut self, sphere: Option<BoundingSphere>) {
        self.clip_sphere = match sphere {
            Some(s) => [s.center.x, s.center.y, s.center.z, s.radius],
            None => [0.0; 4],
        };
    }

    pub fn set_floor_height(&mut self, height: f32) {
        self.floor_height = height;
    }

    pub fn set_background(&mut self, color: [f32; 4]) {
        self.background = color;
    }

    pub fn set_sao(&mut self, settings: SaoSettings) {
        self.sao = settings;
    }

    /// What this frame would run with the current state
    pub fn plan(&self) -> FramePlan {
        FramePlan::build(&FrameInputs {
            targets: self.targets.mask(),
            programs: self.programs.mask(),
            flags: self.flags,
        })
    }

    /// Record a frame into `encoder`, ending on `surface_view`
    ///
    /// Returns the plan that was executed.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        batch: &mut TetraBatch,
        lights: &LightSet,
        camera: &Camera,
    ) -> FramePlan {
        // Edited cell transforms land before the indirect draw reads them
        batch.upload_model_matrices(queue);

        let plan = self.plan();
        self.report_skips(&plan);
        self.write_uniforms(queue, camera);
        self.write_lights(device, queue, lights, camera);

        for planned in &plan.stages {
            log::trace!("Stage {:?}", planned);
            let mut scope = EncoderScope::new(encoder, planned.stage.label());
            self.run_stage(device, &mut scope, planned, batch, lights.len() as u32, surface_view);
        }

        if !plan.runs(Stage::Final) {
            let mut scope = EncoderScope::new(encoder, "Clear Surface");
            self.clear_surface(&mut scope, surface_view);
        }

        plan
    }

    fn report_skips(&mut self, plan: &FramePlan) {
        for skipped in &plan.skipped {
            if self.reported.insert(*skipped) {
                log::warn!("{} stage disabled: {:?}", skipped.stage.label(), skipped.reason);
            }
        }
    }

    fn write_uniforms(&self, queue: &wgpu::Queue, camera: &Camera) {
        let view = camera.view();
        let projection = camera.projection();
        let (width, height) = self.targets.size();

        let gbuffer = GBufferUniforms {
            view,
            projection,
            clip_sphere: self.clip_sphere,
            albedo: self.albedo,
            tetra_scale: self.tetra_scale,
            _padding: [0.0; 3],
        };
        if let Some(program) = &self.programs.tetra_gbuffer {
            program.write(queue, &gbuffer);
        }
        if let Some(program) = &self.programs.scene_gbuffer {
            program.write(queue, &gbuffer);
        }
        if let Some(program) = &self.programs.light_volume {
            program.write(
                queue,
                &LightUniforms {
                    view_projection: camera.view_projection(),
                    size: [width as f32, height as f32],
                    _padding: [0.0; 2],
                },
            );
        }
        if let Some(program) = &self.programs.clip_space_z {
            program.write(
                queue,
                &CszUniforms {
                    near: camera.near,
                    far: camera.far,
                    _padding: [0.0; 2],
                },
            );
        }
        if let Some(program) = &self.programs.sao {
            program.write(
                queue,
                &SaoUniforms::new(
                    projection,
                    width,
                    height,
                    self.sao.radius,
                    self.sao.bias,
                    self.sao.intensity,
                    camera.far,
                    self.max_csz_level(),
                ),
            );
        }
        if let Some(program) = &self.programs.composite {
            program.write(queue, &CompositeUniforms { background: self.background });
        }
        if let Some(program) = &self.programs.fxaa {
            program.write(queue, &FxaaUniforms::new(width, height));
        }
    }

    fn write_lights(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, lights: &LightSet, camera: &Camera) {
        let view = camera.view();
        let gpu_lights: Vec<GpuLight> = lights.iter().map(|l| GpuLight::new(l, view)).collect();
        self.light_buffer.write(device, queue, bytemuck::cast_slice(&gpu_lights));

        // Instance 0 is the floor, the markers follow
        let instances: Vec<MarkerInstance> = std::iter::once(MarkerInstance::floor(self.floor_height, self.floor_color))
            .chain(lights.iter().map(MarkerInstance::light))
            .collect();
        self.marker_buffer.write(device, queue, bytemuck::cast_slice(&instances));
    }

    /// Deepest clip-space Z level the AO pass may read
    fn max_csz_level(&self) -> i32 {
        if self.programs.csz_minify.is_none() {
            return 0;
        }
        self.targets
            .get(TargetSlot::Csz)
            .map_or(0, |csz| csz.mip_views.len().saturating_sub(1) as i32)
    }

    fn view(&self, slot: TargetSlot) -> Option<&wgpu::TextureView> {
        self.targets.get(slot).map(|t| &t.view)
    }

    fn run_stage(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        planned: &PlannedStage,
        batch: &TetraBatch,
        light_count: u32,
        surface_view: &wgpu::TextureView,
    ) {
        let read = planned.ping_pong_read.map(TargetSlot::ping_pong);
        let write = planned.ping_pong_write.map(TargetSlot::ping_pong);

        match planned.stage {
            Stage::GBuffer => self.gbuffer_pass(encoder, batch, light_count),
            Stage::LightAccumulation => self.light_pass(device, encoder, write, light_count),
            Stage::ClipSpaceZ => self.csz_pass(device, encoder),
            Stage::AmbientOcclusion => {
                if let (Some(program), Some(csz), Some(ao)) = (
                    &self.programs.sao,
                    self.view(TargetSlot::Csz),
                    self.view(TargetSlot::Ao0),
                ) {
                    program.run(device, encoder, &self.sampler, ao, &[csz]);
                }
            }
            Stage::AoBlurHorizontal => {
                if let (Some(blur), Some(src), Some(dst)) = (
                    &self.programs.blur,
                    self.view(TargetSlot::Ao0),
                    self.view(TargetSlot::Ao1),
                ) {
                    blur.horizontal.run(device, encoder, &self.sampler, dst, &[src]);
                }
            }
            Stage::AoBlurVertical => {
                if let (Some(blur), Some(src), Some(dst)) = (
                    &self.programs.blur,
                    self.view(TargetSlot::Ao1),
                    self.view(TargetSlot::Ao0),
                ) {
                    blur.vertical.run(device, encoder, &self.sampler, dst, &[src]);
                }
            }
            Stage::Composite => {
                if let (
                    Some(program),
                    Some(previous),
                    Some(current),
                    Some(ao),
                    Some(albedo),
                    Some(normal),
                    Some(position),
                ) = (
                    &self.programs.composite,
                    read.and_then(|s| self.view(s)),
                    write.and_then(|s| self.view(s)),
                    self.view(TargetSlot::Ao0),
                    self.view(TargetSlot::Albedo),
                    self.view(TargetSlot::NormalEmissive),
                    self.view(TargetSlot::Position),
                ) {
                    program.run(
                        device,
                        encoder,
                        &self.sampler,
                        current,
                        &[previous, ao, albedo, normal, position],
                    );
                }
            }
            Stage::DebugTiles => {
                if let (Some(program), Some(current), Some(albedo), Some(normal), Some(position)) = (
                    &self.programs.debug_tiles,
                    write.and_then(|s| self.view(s)),
                    self.view(TargetSlot::Albedo),
                    self.view(TargetSlot::NormalEmissive),
                    self.view(TargetSlot::Position),
                ) {
                    program.run(device, encoder, &self.sampler, current, &[albedo, normal, position]);
                }
            }
            Stage::AoOverlay => {
                if let (Some(program), Some(current), Some(ao)) = (
                    &self.programs.ao_overlay,
                    write.and_then(|s| self.view(s)),
                    self.view(TargetSlot::Ao0),
                ) {
                    program.run(device, encoder, &self.sampler, current, &[ao]);
                }
            }
            Stage::Final => {
                if let (Some(program), Some(last)) =
                    (&self.programs.fxaa, read.and_then(|s| self.view(s)))
                {
                    program.run(device, encoder, &self.sampler, surface_view, &[last]);
                }
            }
        }
    }

    fn gbuffer_pass(&self, encoder: &mut wgpu::CommandEncoder, batch: &TetraBatch, light_count: u32) {
        let (Some(albedo), Some(normal), Some(position), Some(depth)) = (
            self.view(TargetSlot::Albedo),
            self.view(TargetSlot::NormalEmissive),
            self.view(TargetSlot::Position),
            self.view(TargetSlot::Depth),
        ) else {
            return;
        };

        let clear = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("G-Buffer Pass"),
            color_attachments: &[clear(albedo), clear(normal), clear(position)],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let scene = self.programs.scene_gbuffer.as_ref().zip(self.marker_buffer.get());

        if self.flags.contains(FrameFlags::DRAW_FLOOR) {
            if let (Some((program, instances)), Some(floor)) = (scene, &self.meshes.floor) {
                program.bind(&mut pass);
                pass.set_vertex_buffer(0, floor.buffer.slice(..));
                pass.set_vertex_buffer(1, instances.slice(..));
                pass.draw(0..floor.vertex_count, 0..1);
            }
        }

        if let Some(program) = &self.programs.tetra_gbuffer {
            program.bind(&mut pass);
            batch.draw(&mut pass, self.capabilities.draw_strategy());
        }

        if self.flags.contains(FrameFlags::DRAW_LIGHTS) && light_count > 0 {
            if let (Some((program, instances)), Some(marker)) = (scene, &self.meshes.marker) {
                program.bind(&mut pass);
                pass.set_vertex_buffer(0, marker.buffer.slice(..));
                pass.set_vertex_buffer(1, instances.slice(..));
                pass.draw(0..marker.vertex_count, 1..1 + light_count);
            }
        }
    }

    fn light_pass(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        write: Option<TargetSlot>,
        light_count: u32,
    ) {
        let (Some(program), Some(target), Some(albedo), Some(normal), Some(position)) = (
            &self.programs.light_volume,
            write.and_then(|s| self.view(s)),
            self.view(TargetSlot::Albedo),
            self.view(TargetSlot::NormalEmissive),
            self.view(TargetSlot::Position),
        ) else {
            return;
        };

        // The clear alone is the whole result when there are no lights
        let draw = match (self.light_buffer.get(), &self.meshes.light_volume) {
            (Some(lights), Some(volume)) if light_count > 0 => {
                Some((program.bind(device, lights, [albedo, normal, position]), volume))
            }
            _ => None,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("L-Buffer Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some((bind_group, volume)) = &draw {
            pass.set_pipeline(program.pipeline());
            pass.set_bind_group(0, bind_group, &[]);
            pass.set_vertex_buffer(0, volume.buffer.slice(..));
            pass.draw(0..volume.vertex_count, 0..light_count);
        }
    }

    fn csz_pass(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        let (Some(program), Some(depth), Some(csz)) = (
            &self.programs.clip_space_z,
            self.view(TargetSlot::Depth),
            self.targets.get(TargetSlot::Csz),
        ) else {
            return;
        };

        let level0 = csz.mip_views.first().unwrap_or(&csz.view);
        program.run(device, encoder, &self.sampler, level0, &[depth]);

        if let Some(minify) = &self.programs.csz_minify {
            for pair in csz.mip_views.windows(2) {
                minify.run(device, encoder, &self.sampler, &pair[1], &[&pair[0]]);
            }
        }
    }

    fn clear_surface(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView) {
        let [r, g, b, a] = self.background.map(f64::from);
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Surface Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grown_capacity() {
        assert_eq!(grown_capacity(0, 80), 256);
        assert_eq!(grown_capacity(256, 200), 256);
        assert_eq!(grown_capacity(256, 257), 512);
        assert_eq!(grown_capacity(1024, 3000), 4096);
    }

    #[test]
    fn test_floor_faces_up() {
        let floor = floor_vertices(10.0);
        assert_eq!(floor.len(), 6);
        for tri in floor.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vec3::from_array(v.position));
            let n = (b - a).cross(c - a);
            assert!(n.y > 0.0, "floor triangle winds downward");
            assert_eq!(n.x, 0.0);
            assert_eq!(n.z, 0.0);
        }
    }

    #[test]
    fn test_marker_normals_are_unit() {
        let marker = marker_vertices();
        assert_eq!(marker.len() % 3, 0);
        assert!(!marker.is_empty());
        for v in &marker {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_light_volume_encloses_unit_sphere() {
        let volume = light_volume_vertices();
        assert_eq!(volume.len(), 36);
        // Every face plane is at distance 1 from the center
        for tri in volume.chunks(3) {
            let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalized();
            let d = n.dot(tri[0]);
            assert!((d - 1.0).abs() < 1e-5, "face at distance {}", d);
        }
    }
}
