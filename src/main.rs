//! Tetra - deferred tetrahedral mesh viewer
//!
//! Meshes a sphere into tetrahedra and draws it exploded, lit by animated
//! point lights, with ambient obscurance and FXAA.

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

use tetra::config::AppConfig;
use tetra::systems::{build_topology, MeshSummary, RenderSystem, WindowSystem};
use tetra_core::Topology;
use tetra_render::{FrameFlags, RenderError};

/// Main application state
struct App {
    config: AppConfig,
    /// Meshed at startup so a failure is known before the window opens
    topology: Option<Topology>,
    summary: Option<MeshSummary>,
    window: Option<WindowSystem>,
    render: Option<RenderSystem>,
    last_frame: std::time::Instant,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let (topology, summary) = match build_topology(&config.mesh) {
            Ok((topology, summary)) => (Some(topology), Some(summary)),
            Err(e) => {
                log::error!("Geometry build failed, rendering an empty scene: {}", e);
                (None, None)
            }
        };

        Self {
            config,
            topology,
            summary,
            window: None,
            render: None,
            last_frame: std::time::Instant::now(),
        }
    }

    fn update_title(&self) {
        if let (Some(window), Some(render)) = (&self.window, &self.render) {
            window.update_title(render.cell_count(), render.tetra_scale(), render.is_debug_mode());
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        if key == KeyCode::Escape {
            event_loop.exit();
            return;
        }
        if key == KeyCode::KeyF {
            if let Some(window) = &self.window {
                window.toggle_fullscreen();
            }
            return;
        }

        let Some(render) = &mut self.render else {
            return;
        };
        match key {
            KeyCode::Tab => render.toggle_debug_mode(),
            KeyCode::BracketLeft => {
                let scale = render.adjust_tetra_scale(-1.0);
                log::info!("Tetra scale: {:.2}", scale);
            }
            KeyCode::BracketRight => {
                let scale = render.adjust_tetra_scale(1.0);
                log::info!("Tetra scale: {:.2}", scale);
            }
            KeyCode::KeyO => {
                let enabled = render.toggle_flag(FrameFlags::DRAW_AO);
                log::info!("AO overlay: {}", if enabled { "ON" } else { "OFF" });
            }
            KeyCode::KeyL => {
                let enabled = render.toggle_flag(FrameFlags::DRAW_LIGHTS);
                log::info!("Light markers: {}", if enabled { "ON" } else { "OFF" });
            }
            KeyCode::KeyP => {
                let enabled = render.toggle_flag(FrameFlags::DRAW_FLOOR);
                log::info!("Floor: {}", if enabled { "ON" } else { "OFF" });
            }
            _ => return,
        }
        self.update_title();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match WindowSystem::create(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
                return;
            }
        };

        let mut render = match RenderSystem::new(
            window.window().clone(),
            &self.config.rendering,
            &self.config.camera,
            self.config.window.vsync,
        ) {
            Ok(render) => render,
            Err(e) => {
                log::error!("Renderer initialization failed: {}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = render.upload_topology(self.topology.as_ref()) {
            log::error!("Batch build failed, rendering an empty scene: {}", e);
        }
        if let Some(summary) = &self.summary {
            render.frame_mesh(summary);
        }

        self.window = Some(window);
        self.render = Some(render);
        self.last_frame = std::time::Instant::now();
        self.update_title();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                if let Some(render) = &mut self.render {
                    render.resize(physical_size.width, physical_size.height);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        self.handle_key(event_loop, key);
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                let now = std::time::Instant::now();
                // Cap dt so a stalled frame does not jump the animation
                let dt = (now - self.last_frame).as_secs_f32().min(1.0 / 30.0);
                self.last_frame = now;

                if let Some(render) = &mut self.render {
                    render.advance_time(dt);
                    match render.render() {
                        Ok(plan) => log::trace!("Frame ran {} stages", plan.stages.len()),
                        Err(RenderError::SurfaceLost) => log::debug!("Surface lost, reconfigured"),
                        Err(RenderError::OutOfMemory) => {
                            log::error!("Surface out of memory");
                            event_loop.exit();
                            return;
                        }
                        Err(e) => log::warn!("Surface error: {}", e),
                    }
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

fn main() {
    let config = AppConfig::load();

    // RUST_LOG wins over the configured level
    let level = config
        .as_ref()
        .map(|c| c.debug.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    log::info!("Starting Tetra");

    let config = config.unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app).expect("Event loop error");
}
