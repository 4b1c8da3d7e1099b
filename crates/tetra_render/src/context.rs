//! WGPU device, queue, and surface management

use std::sync::Arc;

use winit::window::Window;

use crate::batch::DrawStrategy;
use crate::targets::TargetFormats;
use crate::RenderError;

/// Optional device features the renderer adapts to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Indirect draws may use a non-zero `first_instance`
    pub indirect_first_instance: bool,
    /// One call may issue a whole table of indirect draws
    pub multi_draw_indirect: bool,
    /// Formats of the AO and clip-space Z targets
    pub formats: TargetFormats,
}

impl DeviceCapabilities {
    /// Capabilities for an adapter offering `features`
    ///
    /// `renderable` reports whether a format can be a render attachment.
    pub fn from_features(
        features: wgpu::Features,
        renderable: impl Fn(wgpu::TextureFormat) -> bool,
    ) -> Self {
        Self {
            indirect_first_instance: features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE),
            multi_draw_indirect: features.contains(wgpu::Features::MULTI_DRAW_INDIRECT),
            formats: TargetFormats::select(renderable),
        }
    }

    /// Capabilities of `adapter`
    pub fn query(adapter: &wgpu::Adapter) -> Self {
        let capabilities = Self::from_features(adapter.features(), |format| {
            adapter
                .get_texture_format_features(format)
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        });
        if capabilities.formats != TargetFormats::default() {
            log::warn!(
                "32-bit float targets are not renderable, using {:?} for AO and {:?} for clip-space Z",
                capabilities.formats.ao,
                capabilities.formats.csz
            );
        }
        match capabilities.draw_strategy() {
            DrawStrategy::MultiDrawIndirect => {}
            DrawStrategy::Indirect => {
                log::warn!("MULTI_DRAW_INDIRECT unsupported, tetra batch will use one indirect draw per cell")
            }
            DrawStrategy::Direct => {
                log::warn!("INDIRECT_FIRST_INSTANCE unsupported, tetra batch will use per-cell draws")
            }
        }
        capabilities
    }

    /// Features to request so every capability can be used
    pub fn required_features(&self) -> wgpu::Features {
        let mut features = wgpu::Features::empty();
        if self.indirect_first_instance {
            features |= wgpu::Features::INDIRECT_FIRST_INSTANCE;
        }
        if self.multi_draw_indirect {
            features |= wgpu::Features::MULTI_DRAW_INDIRECT;
        }
        features
    }

    /// How the tetra batch is drawn on this device
    ///
    /// Every indirect command selects its cell through `first_instance`, so
    /// both indirect paths need `INDIRECT_FIRST_INSTANCE`.
    pub fn draw_strategy(&self) -> DrawStrategy {
        match (self.indirect_first_instance, self.multi_draw_indirect) {
            (true, true) => DrawStrategy::MultiDrawIndirect,
            (true, false) => DrawStrategy::Indirect,
            (false, _) => DrawStrategy::Direct,
        }
    }
}

/// Request a device with every feature `capabilities` relies on
///
/// Validation errors outside an error scope are logged instead of aborting.
pub async fn request_device(
    adapter: &wgpu::Adapter,
    capabilities: &DeviceCapabilities,
) -> Result<(wgpu::Device, wgpu::Queue), RenderError> {
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Tetra Device"),
                required_features: capabilities.required_features(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        )
        .await?;

    device.on_uncaptured_error(Box::new(|err| {
        log::error!("Uncaptured GPU error: {}", err);
    }));
    Ok((device, queue))
}

/// Holds all GPU resources needed for rendering
pub struct RenderContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    pub capabilities: DeviceCapabilities,
}

impl RenderContext {
    /// Create a context bound to `window`
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        // The surface must outlive the window; `Arc` guarantees this
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterUnavailable)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let capabilities = DeviceCapabilities::query(&adapter);
        let (device, queue) = request_device(&adapter, &capabilities).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".to_string()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            capabilities,
        })
    }

    /// Reconfigure the surface for a new window size
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Width over height of the surface
    pub fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Acquire the next surface texture, reconfiguring if the surface was lost
    pub fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                let err = RenderError::from(err);
                if err == RenderError::SurfaceLost {
                    self.surface.configure(&self.device, &self.config);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::{AO_FALLBACK_FORMAT, AO_FORMAT, CSZ_FALLBACK_FORMAT, CSZ_FORMAT};

    fn caps_for(features: wgpu::Features) -> DeviceCapabilities {
        DeviceCapabilities::from_features(features, |_| true)
    }

    #[test]
    fn test_full_features_use_multi_draw() {
        let caps = caps_for(wgpu::Features::INDIRECT_FIRST_INSTANCE | wgpu::Features::MULTI_DRAW_INDIRECT);
        assert!(caps.indirect_first_instance);
        assert!(caps.multi_draw_indirect);
        assert_eq!(caps.draw_strategy(), DrawStrategy::MultiDrawIndirect);
        assert_eq!(
            caps.required_features(),
            wgpu::Features::INDIRECT_FIRST_INSTANCE | wgpu::Features::MULTI_DRAW_INDIRECT
        );
    }

    #[test]
    fn test_first_instance_only_draws_indirect_per_cell() {
        let caps = caps_for(wgpu::Features::INDIRECT_FIRST_INSTANCE);
        assert_eq!(caps.draw_strategy(), DrawStrategy::Indirect);
        assert!(!caps.required_features().contains(wgpu::Features::MULTI_DRAW_INDIRECT));
    }

    #[test]
    fn test_no_first_instance_draws_directly() {
        // Multi-draw alone cannot select the instance row of each cell
        let caps = caps_for(wgpu::Features::MULTI_DRAW_INDIRECT);
        assert_eq!(caps.draw_strategy(), DrawStrategy::Direct);

        let caps = caps_for(wgpu::Features::empty());
        assert_eq!(caps.draw_strategy(), DrawStrategy::Direct);
        assert_eq!(caps.required_features(), wgpu::Features::empty());
    }

    #[test]
    fn test_unrelated_features_are_not_requested() {
        let caps = caps_for(wgpu::Features::all());
        assert_eq!(
            caps.required_features(),
            wgpu::Features::INDIRECT_FIRST_INSTANCE | wgpu::Features::MULTI_DRAW_INDIRECT
        );
    }

    #[test]
    fn test_unrenderable_float32_falls_back() {
        let caps = DeviceCapabilities::from_features(wgpu::Features::empty(), |format| {
            !matches!(
                format,
                wgpu::TextureFormat::Rg32Float | wgpu::TextureFormat::R32Float
            )
        });
        assert_eq!(caps.formats.ao, AO_FALLBACK_FORMAT);
        assert_eq!(caps.formats.csz, CSZ_FALLBACK_FORMAT);

        let caps = DeviceCapabilities::default();
        assert_eq!(caps.formats.ao, AO_FORMAT);
        assert_eq!(caps.formats.csz, CSZ_FORMAT);
    }
}
