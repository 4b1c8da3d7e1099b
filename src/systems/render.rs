//! GPU rendering system
//!
//! Owns everything on the GPU side of the host:
//! - Render context and surface
//! - The uploaded tetra batch and the deferred renderer
//! - Camera and light animation

use std::sync::Arc;

use tetra_core::{BatchBuilder, GeometryError, LightSet, Topology, Vec3};
use tetra_render::{
    Camera, DeferredRenderer, FrameFlags, FramePlan, RenderContext, RenderError, TetraBatch,
};
use winit::window::Window;

use crate::config::{CameraConfig, RenderingConfig};
use crate::systems::{floor_height, MeshSummary};

/// Step applied by the scale keys
const SCALE_STEP: f32 = 0.05;

/// Manages GPU rendering
pub struct RenderSystem {
    context: RenderContext,
    renderer: DeferredRenderer,
    batch: TetraBatch,
    lights: LightSet,
    camera: Camera,
    orbit_speed: f32,
    distance_scale: f32,
    elapsed: f32,
}

impl RenderSystem {
    /// Create render system from window and config
    pub fn new(
        window: Arc<Window>,
        render_config: &RenderingConfig,
        camera_config: &CameraConfig,
        vsync: bool,
    ) -> Result<Self, RenderError> {
        let context = pollster::block_on(RenderContext::new(window, vsync))?;

        let mut renderer = DeferredRenderer::new(
            &context.device,
            &context.queue,
            context.config.format,
            context.config.width,
            context.config.height,
            context.capabilities,
        );
        renderer.set_background(render_config.background_color);
        renderer.set_sao(render_config.sao_settings());
        renderer.set_tetra_scale(render_config.tetra_scale);
        renderer.set_clip_sphere(render_config.clip_sphere());
        renderer.set_debug_mode(render_config.debug_mode);
        renderer.set_flag(FrameFlags::DRAW_FLOOR, render_config.draw_floor);
        renderer.set_flag(FrameFlags::DRAW_LIGHTS, render_config.draw_lights);
        renderer.set_flag(FrameFlags::DRAW_AO, render_config.draw_ao);

        let mut camera = Camera::new(
            camera_config.fov.to_radians(),
            context.aspect_ratio(),
            camera_config.near,
            camera_config.far,
        );
        // Framing keeps this direction: slightly above the mesh
        camera.eye = Vec3::new(0.0, 0.5, 1.0);

        Ok(Self {
            context,
            renderer,
            batch: TetraBatch::empty(),
            lights: LightSet::new(),
            camera,
            orbit_speed: camera_config.orbit_speed,
            distance_scale: camera_config.distance_scale,
            elapsed: 0.0,
        })
    }

    /// Build and upload the batch for `topology`, replacing the current one
    ///
    /// On failure the previous batch is dropped and the renderer draws an
    /// empty scene.
    pub fn upload_topology(&mut self, topology: Option<&Topology>) -> Result<(), GeometryError> {
        self.batch = TetraBatch::empty();
        let data = BatchBuilder::new().build(topology)?;
        match TetraBatch::upload(&self.context.device, &data) {
            Ok(batch) => self.batch = batch,
            Err(e) => log::error!("Tetra batch upload failed: {}", e),
        }
        Ok(())
    }

    /// Aim the camera at the mesh and rest the floor just below it
    pub fn frame_mesh(&mut self, summary: &MeshSummary) {
        if let Some(bounds) = summary.bounds {
            self.camera.frame(bounds, self.distance_scale);
        }
        self.renderer.set_floor_height(floor_height(summary.bounds));
    }

    /// Advance light and camera animation by `dt` seconds
    pub fn advance_time(&mut self, dt: f32) {
        self.elapsed += dt;
        self.lights.advance(self.elapsed);
        if self.orbit_speed != 0.0 {
            self.camera.orbit(self.orbit_speed * dt);
        }
    }

    /// Handle window resize
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.context
            .resize(winit::dpi::PhysicalSize::new(width, height));
        self.renderer.resize(&self.context.device, width, height);
        self.camera.set_aspect(width, height);
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.renderer.set_debug_mode(enabled);
        log::info!("Debug mode: {}", if enabled { "ON" } else { "OFF" });
    }

    pub fn toggle_debug_mode(&mut self) {
        let enabled = !self.renderer.is_debug_mode();
        self.set_debug_mode(enabled);
    }

    /// Flip one renderer toggle and return its new state
    pub fn toggle_flag(&mut self, flag: FrameFlags) -> bool {
        self.renderer.toggle_flag(flag);
        self.renderer.flags().contains(flag)
    }

    /// Grow or shrink the exploded-view scale by `steps` increments
    pub fn adjust_tetra_scale(&mut self, steps: f32) -> f32 {
        let scale = self.renderer.tetra_scale() + steps * SCALE_STEP;
        self.renderer.set_tetra_scale(scale);
        self.renderer.tetra_scale()
    }

    /// Render a single frame
    ///
    /// A lost surface is reconfigured by the context; the caller only needs
    /// to request another frame.
    pub fn render(&mut self) -> Result<FramePlan, RenderError> {
        let output = self.context.acquire()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let plan = self.renderer.render(
            &self.context.device,
            &self.context.queue,
            &mut encoder,
            &view,
            &mut self.batch,
            &self.lights,
            &self.camera,
        );

        self.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(plan)
    }

    /// Get current surface size
    pub fn size(&self) -> (u32, u32) {
        (self.context.size.width, self.context.size.height)
    }

    pub fn cell_count(&self) -> usize {
        self.batch.cell_count()
    }

    pub fn tetra_scale(&self) -> f32 {
        self.renderer.tetra_scale()
    }

    pub fn is_debug_mode(&self) -> bool {
        self.renderer.is_debug_mode()
    }
}
