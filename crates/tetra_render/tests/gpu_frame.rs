//! Integration tests that record real frames on a headless device
//!
//! Each test returns early when the machine has no adapter, so the suite
//! still passes on CI hosts without a GPU or software rasterizer.

use tetra_core::{
    BatchBuilder, GridTetrahedralizer, LightSet, MeshingParams, TetrahedralizerService,
    Topology, TriangleSurface,
};
use tetra_render::{
    request_device, Camera, DeferredRenderer, DeviceCapabilities, DrawStrategy, FrameFlags,
    FramePlan, Stage, TetraBatch,
};

const SIZE: u32 = 64;
const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct Headless {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: DeviceCapabilities,
}

fn headless() -> Option<Headless> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let capabilities = DeviceCapabilities::query(&adapter);
    let (device, queue) = pollster::block_on(request_device(&adapter, &capabilities)).ok()?;
    Some(Headless { device, queue, capabilities })
}

/// A cube meshed into 48 cells
fn meshed_cube() -> Topology {
    let params = MeshingParams { cell_size: 1.0, ..Default::default() };
    GridTetrahedralizer::default()
        .attempt_generate(&TriangleSurface::cube(1.0), &params)
        .unwrap()
}

/// Record and submit one frame, returning the plan and any validation error
fn render_frame(
    gpu: &Headless,
    capabilities: DeviceCapabilities,
    topology: Option<&Topology>,
    flags: FrameFlags,
) -> (FramePlan, Option<wgpu::Error>) {
    let device = &gpu.device;
    let mut renderer =
        DeferredRenderer::new(device, &gpu.queue, SURFACE_FORMAT, SIZE, SIZE, capabilities);
    renderer.set_flag(FrameFlags::DEBUG_MODE, flags.contains(FrameFlags::DEBUG_MODE));
    renderer.set_flag(FrameFlags::DRAW_AO, flags.contains(FrameFlags::DRAW_AO));

    let data = BatchBuilder::new().build(topology).unwrap();
    let mut batch = TetraBatch::upload(device, &data).unwrap();

    let surface = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Surface"),
        size: wgpu::Extent3d { width: SIZE, height: SIZE, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SURFACE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = surface.create_view(&wgpu::TextureViewDescriptor::default());

    let mut camera = Camera::default();
    if let Some(sphere) = topology.and_then(|t| t.bounding_sphere()) {
        camera.frame(sphere, 1.5);
    }

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Frame Encoder"),
    });
    let plan = renderer.render(
        device,
        &gpu.queue,
        &mut encoder,
        &view,
        &mut batch,
        &LightSet::new(),
        &camera,
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));
    let error = pollster::block_on(device.pop_error_scope());
    (plan, error)
}

/// The detected capabilities plus every weaker strategy the device can also run
fn strategies(detected: DeviceCapabilities) -> Vec<DeviceCapabilities> {
    let mut all = vec![detected];
    if detected.multi_draw_indirect {
        all.push(DeviceCapabilities { multi_draw_indirect: false, ..detected });
    }
    if detected.indirect_first_instance {
        all.push(DeviceCapabilities {
            indirect_first_instance: false,
            multi_draw_indirect: false,
            ..detected
        });
    }
    all
}

#[test]
fn test_multi_cell_frame_is_valid_for_every_strategy() {
    let Some(gpu) = headless() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let topology = meshed_cube();
    assert!(topology.cell_count() > 1);

    for capabilities in strategies(gpu.capabilities) {
        let (plan, error) =
            render_frame(&gpu, capabilities, Some(&topology), FrameFlags::default());
        assert!(
            error.is_none(),
            "{:?} frame failed validation: {:?}",
            capabilities.draw_strategy(),
            error
        );
        assert!(plan.runs(Stage::GBuffer));
    }
}

#[test]
fn test_detected_capabilities_match_device() {
    let Some(gpu) = headless() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let features = gpu.device.features();
    assert!(features.contains(gpu.capabilities.required_features()));
    if gpu.capabilities.draw_strategy() == DrawStrategy::MultiDrawIndirect {
        assert!(features.contains(wgpu::Features::MULTI_DRAW_INDIRECT));
    }
}

#[test]
fn test_empty_and_debug_frames_are_valid() {
    let Some(gpu) = headless() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let (plan, error) = render_frame(&gpu, gpu.capabilities, None, FrameFlags::default());
    assert!(error.is_none(), "empty frame failed validation: {:?}", error);
    assert!(plan.runs(Stage::Final));

    let topology = meshed_cube();
    let (plan, error) = render_frame(
        &gpu,
        gpu.capabilities,
        Some(&topology),
        FrameFlags::DEBUG_MODE | FrameFlags::DRAW_AO,
    );
    assert!(error.is_none(), "debug frame failed validation: {:?}", error);
    assert!(plan.runs(Stage::DebugTiles));
}
