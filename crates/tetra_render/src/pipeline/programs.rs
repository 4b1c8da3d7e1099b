//! Shader programs of the deferred pipeline
//!
//! Every program is compiled once at renderer construction inside error
//! scopes. A program that fails to compile is stored as `None` and the frame
//! planner skips the stages that need it.
//!
//! Full-screen programs share one bind group layout convention:
//!
//! | Binding | Resource |
//! |---|---|
//! | 0 | uniform struct (absent when the program has no uniforms) |
//! | 1 | linear clamp sampler |
//! | 2.. | input textures, in declaration order |

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use super::frame_plan::ProgramMask;
use super::types::{
    BlurUniforms, CompositeUniforms, CszUniforms, FxaaUniforms, GBufferUniforms, LightUniforms,
    MarkerInstance, MeshVertex, SaoUniforms,
};
use crate::batch::TetraBatch;
use crate::scope::capture_errors;
use crate::targets::{
    TargetFormats, ALBEDO_FORMAT, DATA_FORMAT, DEPTH_FORMAT, PING_PONG_FORMAT,
};

const FULLSCREEN_PRELUDE: &str = include_str!("../shaders/fullscreen.wgsl");

/// How a full-screen program reads one of its input textures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    /// Float texture read with `textureLoad`
    Float,
    /// Depth texture read with `textureLoad`
    Depth,
    /// Float texture sampled through the shared sampler
    Filterable,
}

impl Input {
    fn sample_type(self) -> wgpu::TextureSampleType {
        match self {
            Input::Float => wgpu::TextureSampleType::Float { filterable: false },
            Input::Depth => wgpu::TextureSampleType::Depth,
            Input::Filterable => wgpu::TextureSampleType::Float { filterable: true },
        }
    }
}

/// Description of a full-screen program
pub struct FullscreenDesc<'a> {
    pub label: &'static str,
    /// Fragment shader source; the shared vertex stage is prepended
    pub source: &'a str,
    pub inputs: &'a [Input],
    pub format: wgpu::TextureFormat,
}

/// A full-screen triangle program with uniforms of type `U`
pub struct FullscreenProgram<U> {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: Option<wgpu::Buffer>,
    input_count: usize,
    _uniforms: PhantomData<U>,
}

impl<U: Pod> FullscreenProgram<U> {
    pub fn new(device: &wgpu::Device, desc: &FullscreenDesc) -> Option<Self> {
        capture_errors(device, desc.label, || Self::create(device, desc))
    }

    fn create(device: &wgpu::Device, desc: &FullscreenDesc) -> Self {
        let has_uniforms = size_of::<U>() > 0;

        let mut entries = Vec::with_capacity(desc.inputs.len() + 2);
        if has_uniforms {
            entries.push(uniform_entry(0, wgpu::ShaderStages::FRAGMENT));
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        for (i, input) in desc.inputs.iter().enumerate() {
            entries.push(texture_entry(2 + i as u32, input.sample_type()));
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let source = format!("{}\n{}", FULLSCREEN_PRELUDE, desc.source);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = has_uniforms.then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: size_of::<U>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Self {
            label: desc.label,
            pipeline,
            layout,
            uniforms,
            input_count: desc.inputs.len(),
            _uniforms: PhantomData,
        }
    }

    /// Update uniforms
    pub fn write(&self, queue: &wgpu::Queue, uniforms: &U) {
        if let Some(buffer) = &self.uniforms {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(uniforms));
        }
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        sampler: &wgpu::Sampler,
        inputs: &[&wgpu::TextureView],
    ) -> wgpu::BindGroup {
        debug_assert_eq!(inputs.len(), self.input_count, "{}", self.label);

        let mut entries = Vec::with_capacity(inputs.len() + 2);
        if let Some(buffer) = &self.uniforms {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        for (i, view) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        })
    }

    /// Draw one full-screen triangle into `target`
    pub fn run(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        sampler: &wgpu::Sampler,
        target: &wgpu::TextureView,
        inputs: &[&wgpu::TextureView],
    ) {
        let bind_group = self.bind(device, sampler, inputs);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
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
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Targets written by both G-buffer programs
const GBUFFER_TARGETS: [Option<wgpu::ColorTargetState>; 3] = [
    Some(wgpu::ColorTargetState {
        format: ALBEDO_FORMAT,
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    }),
    Some(wgpu::ColorTargetState {
        format: DATA_FORMAT,
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    }),
    Some(wgpu::ColorTargetState {
        format: DATA_FORMAT,
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    }),
];

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

const MARKER_ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
    // model matrix columns
    2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4,
    // color, emissive
    6 => Float32x4, 7 => Float32
];

const LIGHT_VOLUME_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Vertex buffer layouts of the scene G-buffer program
pub fn scene_vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [
        wgpu::VertexBufferLayout {
            array_stride: size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: size_of::<MarkerInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &MARKER_ATTRIBUTES,
        },
    ]
}

/// A program writing the three G-buffer color targets plus depth
pub struct GBufferProgram {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GBufferProgram {
    /// The exploded tetra batch program
    pub fn tetra(device: &wgpu::Device) -> Option<Self> {
        capture_errors(device, "Tetra G-Buffer Program", || {
            Self::create(
                device,
                "Tetra G-Buffer",
                include_str!("../shaders/tetra_gbuffer.wgsl"),
                &TetraBatch::vertex_layouts(),
                Some(wgpu::Face::Back),
            )
        })
    }

    /// Floor and light marker program
    pub fn scene(device: &wgpu::Device) -> Option<Self> {
        capture_errors(device, "Scene G-Buffer Program", || {
            Self::create(
                device,
                "Scene G-Buffer",
                include_str!("../shaders/scene_gbuffer.wgsl"),
                &scene_vertex_layouts(),
                None,
            )
        })
    }

    fn create(
        device: &wgpu::Device,
        label: &'static str,
        source: &str,
        buffers: &[wgpu::VertexBufferLayout<'static>],
        cull_mode: Option<wgpu::Face>,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &GBUFFER_TARGETS,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&GBufferUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        Self { pipeline, uniforms, bind_group }
    }

    /// Update uniforms
    pub fn write(&self, queue: &wgpu::Queue, uniforms: &GBufferUniforms) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    /// Bind pipeline and uniforms on `pass`
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
    }
}

/// Instanced light volumes accumulated into the L-buffer
pub struct LightVolumeProgram {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
}

impl LightVolumeProgram {
    pub fn new(device: &wgpu::Device) -> Option<Self> {
        capture_errors(device, "Light Volume Program", || Self::create(device))
    }

    fn create(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Light Volume Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // albedo, normal + emissive, position
                texture_entry(2, wgpu::TextureSampleType::Float { filterable: false }),
                texture_entry(3, wgpu::TextureSampleType::Float { filterable: false }),
                texture_entry(4, wgpu::TextureSampleType::Float { filterable: false }),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Light Volume Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("L-Buffer Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/lbuffer.wgsl").into()),
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Light Volume Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 12,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &LIGHT_VOLUME_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: PING_PONG_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // Back faces only, so a volume containing the camera still shades
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Uniform Buffer"),
            size: size_of::<LightUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self { pipeline, layout, uniforms }
    }

    /// Update uniforms
    pub fn write(&self, queue: &wgpu::Queue, uniforms: &LightUniforms) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    /// Bind group over the light storage buffer and the G-buffer color targets
    pub fn bind(
        &self,
        device: &wgpu::Device,
        lights: &wgpu::Buffer,
        gbuffer: [&wgpu::TextureView; 3],
    ) -> wgpu::BindGroup {
        let [albedo, normal_emissive, position] = gbuffer;
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Light Volume Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(normal_emissive),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(position),
                },
            ],
        })
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}

/// The two directions of the separable AO blur
pub struct BlurPrograms {
    pub horizontal: FullscreenProgram<BlurUniforms>,
    pub vertical: FullscreenProgram<BlurUniforms>,
}

impl BlurPrograms {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Option<Self> {
        let desc = |label| FullscreenDesc {
            label,
            source: include_str!("../shaders/blur.wgsl"),
            inputs: &[Input::Float],
            format,
        };
        let horizontal = FullscreenProgram::new(device, &desc("SAO Blur H"))?;
        let vertical = FullscreenProgram::new(device, &desc("SAO Blur V"))?;
        Some(Self { horizontal, vertical })
    }

    /// The blur axes never change, so they are written once
    fn write_axes(&self, queue: &wgpu::Queue) {
        self.horizontal.write(queue, &BlurUniforms::HORIZONTAL);
        self.vertical.write(queue, &BlurUniforms::VERTICAL);
    }
}

/// Every program of the pipeline, each `None` if it failed to build
pub struct Programs {
    pub tetra_gbuffer: Option<GBufferProgram>,
    pub scene_gbuffer: Option<GBufferProgram>,
    pub light_volume: Option<LightVolumeProgram>,
    pub clip_space_z: Option<FullscreenProgram<CszUniforms>>,
    pub csz_minify: Option<FullscreenProgram<()>>,
    pub sao: Option<FullscreenProgram<SaoUniforms>>,
    pub blur: Option<BlurPrograms>,
    pub composite: Option<FullscreenProgram<CompositeUniforms>>,
    pub debug_tiles: Option<FullscreenProgram<()>>,
    pub ao_overlay: Option<FullscreenProgram<()>>,
    pub fxaa: Option<FullscreenProgram<FxaaUniforms>>,
}

impl Programs {
    /// Build every program; `formats` must match the allocated targets
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        formats: &TargetFormats,
    ) -> Self {
        let programs = Self {
            tetra_gbuffer: GBufferProgram::tetra(device),
            scene_gbuffer: GBufferProgram::scene(device),
            light_volume: LightVolumeProgram::new(device),
            clip_space_z: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "Clip Space Z",
                    source: include_str!("../shaders/csz.wgsl"),
                    inputs: &[Input::Depth],
                    format: formats.csz,
                },
            ),
            csz_minify: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "Clip Space Z Minify",
                    source: include_str!("../shaders/csz_minify.wgsl"),
                    inputs: &[Input::Float],
                    format: formats.csz,
                },
            ),
            sao: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "SAO",
                    source: include_str!("../shaders/sao.wgsl"),
                    inputs: &[Input::Float],
                    format: formats.ao,
                },
            ),
            blur: BlurPrograms::new(device, formats.ao),
            composite: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "Composite",
                    source: include_str!("../shaders/composite.wgsl"),
                    // previous light result, AO, albedo, normal + emissive, position
                    inputs: &[Input::Float; 5],
                    format: PING_PONG_FORMAT,
                },
            ),
            debug_tiles: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "Debug Tiles",
                    source: include_str!("../shaders/debug.wgsl"),
                    inputs: &[Input::Float; 3],
                    format: PING_PONG_FORMAT,
                },
            ),
            ao_overlay: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "AO Overlay",
                    source: include_str!("../shaders/ao_overlay.wgsl"),
                    inputs: &[Input::Float],
                    format: PING_PONG_FORMAT,
                },
            ),
            fxaa: FullscreenProgram::new(
                device,
                &FullscreenDesc {
                    label: "FXAA",
                    source: include_str!("../shaders/fxaa.wgsl"),
                    inputs: &[Input::Filterable],
                    format: surface_format,
                },
            ),
        };

        if let Some(blur) = &programs.blur {
            blur.write_axes(queue);
        }

        let mask = programs.mask();
        log::info!(
            "Compiled {} of {} shader programs",
            mask.bits().count_ones(),
            ProgramMask::all().bits().count_ones()
        );
        programs
    }

    /// Which programs are available
    pub fn mask(&self) -> ProgramMask {
        let mut mask = ProgramMask::empty();
        mask.set(ProgramMask::TETRA_GBUFFER, self.tetra_gbuffer.is_some());
        mask.set(ProgramMask::SCENE_GBUFFER, self.scene_gbuffer.is_some());
        mask.set(ProgramMask::LIGHT_VOLUME, self.light_volume.is_some());
        mask.set(ProgramMask::CLIP_SPACE_Z, self.clip_space_z.is_some());
        mask.set(ProgramMask::CSZ_MINIFY, self.csz_minify.is_some());
        mask.set(ProgramMask::SAO, self.sao.is_some());
        mask.set(ProgramMask::BLUR, self.blur.is_some());
        mask.set(ProgramMask::COMPOSITE, self.composite.is_some());
        mask.set(ProgramMask::DEBUG_TILES, self.debug_tiles.is_some());
        mask.set(ProgramMask::AO_OVERLAY, self.ao_overlay.is_some());
        mask.set(ProgramMask::FXAA, self.fxaa.is_some());
        mask
    }
}
