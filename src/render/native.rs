use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use log::{info, warn};
use pollster::block_on;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::shadow::ShadowMapTarget;
use super::{
    shaders, GraphicsBackend, MeshHandle, PassDescriptor, PolygonMode, Program, RenderTarget,
    UniformSlot, UniformValue, Viewport,
};
use crate::error::StartupError;
use crate::obj::{MeshData, Vertex};

/// wgpu implementation of [`GraphicsBackend`] drawing into a winit window.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    shadow: ShadowMap,
    uniform_layout: wgpu::BindGroupLayout,
    shadow_bind_group: wgpu::BindGroup,
    pipelines: [wgpu::RenderPipeline; 4],
    /// Line and point variants, present only when the adapter supports them.
    outline_pipelines: HashMap<(Program, PolygonMode), wgpu::RenderPipeline>,
    meshes: Vec<MeshBuffers>,
    uniforms: [UniformBlock; 4],
    program: Program,
    polygon_mode: PolygonMode,
    unsupported_modes: HashSet<PolygonMode>,
    frame: Option<Frame>,
    pass: Option<PendingPass>,
    errors: Vec<String>,
}

struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

struct PendingPass {
    descriptor: PassDescriptor,
    shadow_units: Vec<u32>,
    draws: Vec<PendingDraw>,
}

struct PendingDraw {
    program: Program,
    polygon_mode: PolygonMode,
    uniforms: UniformBlock,
    mesh: MeshHandle,
}

impl Renderer {
    /// Initializes the device, the window surface and the shadow map target.
    pub async fn new(window: Arc<Window>, shadow_resolution: u32) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(StartupError::WindowUnavailable("window has zero area".into()).into());
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|err| StartupError::WindowUnavailable(err.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| StartupError::NoAdapter(err.to_string()))?;
        info!("using adapter {:?}", adapter.get_info().name);

        let required_features = adapter.features() & OPTIONAL_FEATURES;
        let border_supported =
            required_features.contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadow-scene-device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| StartupError::WindowUnavailable("surface has no formats".into()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let target = ShadowMapTarget::new(
            shadow_resolution,
            device.limits().max_texture_dimension_2d,
        )?;
        let shadow = ShadowMap::create(&device, target, border_supported)?;
        let depth = DepthBuffer::create(&device, config.width, config.height);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<UniformBlock>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-sample-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-sample-bind-group"),
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&shadow.sampler),
                },
            ],
        });

        let builder = PipelineBuilder {
            device: &device,
            uniform_layout: &uniform_layout,
            shadow_layout: &shadow_layout,
            surface_format,
        };
        let pipelines = Program::ALL.map(|program| builder.build(program, PolygonMode::Fill));
        let mut outline_pipelines = HashMap::new();
        for mode in [PolygonMode::Line, PolygonMode::Point] {
            if !required_features.contains(polygon_mode_feature(mode)) {
                info!("{mode:?} polygon mode is not supported by this adapter");
                continue;
            }
            for program in [Program::Shaded, Program::LightMarker] {
                outline_pipelines.insert((program, mode), builder.build(program, mode));
            }
        }

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            shadow,
            uniform_layout,
            shadow_bind_group,
            pipelines,
            outline_pipelines,
            meshes: Vec::new(),
            uniforms: [UniformBlock::zeroed(); 4],
            program: Program::Shaded,
            polygon_mode: PolygonMode::Fill,
            unsupported_modes: HashSet::new(),
            frame: None,
            pass: None,
            errors: Vec::new(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain. The shadow map keeps its size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        info!("resized window to {}x{}", new_size.width, new_size.height);
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    fn encode_pass(&mut self, pass: PendingPass) {
        let Some(frame) = self.frame.as_mut() else {
            self.errors
                .push(format!("INVALID_OPERATION: {} ended outside a frame", pass.descriptor.label));
            return;
        };

        let mut bind_groups = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let required_unit = match draw.program {
                Program::Shaded => Some(draw.uniforms.flags[2]),
                Program::ScreenQuad => Some(draw.uniforms.flags[3]),
                Program::Depth | Program::LightMarker => None,
            };
            if let Some(unit) = required_unit {
                if !pass.shadow_units.contains(&unit) {
                    self.errors.push(format!(
                        "INVALID_OPERATION: {:?} samples unit {unit} but the shadow map is not bound there",
                        draw.program
                    ));
                }
            }
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("draw-uniforms"),
                    contents: bytes_of(&draw.uniforms),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            bind_groups.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("draw-bind-group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            }));
        }

        let descriptor = &pass.descriptor;
        let depth_ops = wgpu::Operations {
            load: descriptor
                .clear
                .depth
                .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        };
        let color_ops = wgpu::Operations {
            load: descriptor.clear.color.map_or(wgpu::LoadOp::Load, |[r, g, b, a]| {
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                })
            }),
            store: wgpu::StoreOp::Store,
        };
        let color_attachment = [Some(wgpu::RenderPassColorAttachment {
            view: &frame.view,
            depth_slice: None,
            resolve_target: None,
            ops: color_ops,
        })];
        let (color_attachments, depth_view): (&[Option<_>], Option<&wgpu::TextureView>) =
            match descriptor.target {
                RenderTarget::ShadowMap => (&[], Some(&self.shadow.view)),
                RenderTarget::Default if descriptor.depth_test => {
                    (&color_attachment, Some(&self.depth.view))
                }
                RenderTarget::Default => (&color_attachment, None),
            };

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(descriptor.label),
            color_attachments,
            depth_stencil_attachment: depth_view.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(depth_ops),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_viewport(
            0.0,
            0.0,
            descriptor.viewport.width as f32,
            descriptor.viewport.height as f32,
            0.0,
            1.0,
        );

        for (draw, bind_group) in pass.draws.iter().zip(&bind_groups) {
            let Some(mesh) = self.meshes.get(draw.mesh.index()) else {
                continue;
            };
            if mesh.index_count == 0 {
                continue;
            }
            let pipeline = self
                .outline_pipelines
                .get(&(draw.program, draw.polygon_mode))
                .unwrap_or(&self.pipelines[draw.program.index()]);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            if matches!(draw.program, Program::Shaded | Program::ScreenQuad) {
                render_pass.set_bind_group(1, &self.shadow_bind_group, &[]);
            }
            render_pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            render_pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn pop_error_scopes(&mut self) {
        for _ in 0..2 {
            if let Some(error) = block_on(self.device.pop_error_scope()) {
                self.errors.push(error.to_string());
            }
        }
    }
}

impl GraphicsBackend for Renderer {
    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle {
        self.meshes
            .push(MeshBuffers::from_mesh(&self.device, mesh, label));
        MeshHandle::new(self.meshes.len() - 1)
    }

    fn framebuffer_size(&self) -> Viewport {
        Viewport {
            width: self.size.width,
            height: self.size.height,
        }
    }

    fn shadow_target(&self) -> &ShadowMapTarget {
        &self.shadow.target
    }

    fn begin_frame(&mut self) -> Result<bool> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.resize(size);
                return Ok(false);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(anyhow!("GPU is out of memory")),
            Err(err) => {
                warn!("skipping frame: {err}");
                return Ok(false);
            }
        };
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        self.frame = Some(Frame {
            output,
            view,
            encoder,
        });
        Ok(true)
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) {
        if let Some(previous) = self.pass.take() {
            self.errors.push(format!(
                "INVALID_OPERATION: {} began before {} ended",
                pass.label, previous.descriptor.label
            ));
            self.encode_pass(previous);
        }
        self.polygon_mode = PolygonMode::Fill;
        self.pass = Some(PendingPass {
            descriptor: *pass,
            shadow_units: Vec::new(),
            draws: Vec::new(),
        });
    }

    fn use_program(&mut self, program: Program) {
        self.program = program;
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        let supported = mode == PolygonMode::Fill
            || self.outline_pipelines.contains_key(&(Program::Shaded, mode));
        if supported {
            self.polygon_mode = mode;
            return;
        }
        if self.unsupported_modes.insert(mode) {
            warn!("{mode:?} polygon mode is unavailable on this adapter; drawing filled");
        }
        self.polygon_mode = PolygonMode::Fill;
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        if let Err(message) = self.uniforms[self.program.index()].set(slot, value) {
            self.errors.push(message);
        }
    }

    fn bind_shadow_map(&mut self, unit: u32) {
        match self.pass.as_mut() {
            Some(pass) => pass.shadow_units.push(unit),
            None => self
                .errors
                .push("INVALID_OPERATION: texture bound outside a pass".into()),
        }
    }

    fn draw(&mut self, mesh: MeshHandle) {
        if mesh.index() >= self.meshes.len() {
            self.errors
                .push(format!("INVALID_VALUE: mesh {} was never uploaded", mesh.index()));
            return;
        }
        let draw = PendingDraw {
            program: self.program,
            polygon_mode: self.polygon_mode,
            uniforms: self.uniforms[self.program.index()],
            mesh,
        };
        match self.pass.as_mut() {
            Some(pass) => pass.draws.push(draw),
            None => self
                .errors
                .push("INVALID_OPERATION: draw issued outside a pass".into()),
        }
    }

    fn end_pass(&mut self) {
        if let Some(pass) = self.pass.take() {
            self.encode_pass(pass);
        }
    }

    fn present(&mut self) -> Result<()> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.output.present();
        self.pop_error_scopes();
        Ok(())
    }

    fn drain_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}

/// Features used when the adapter has them and worked around otherwise.
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER
    .union(wgpu::Features::POLYGON_MODE_LINE)
    .union(wgpu::Features::POLYGON_MODE_POINT);

fn polygon_mode_feature(mode: PolygonMode) -> wgpu::Features {
    match mode {
        PolygonMode::Fill => wgpu::Features::empty(),
        PolygonMode::Line => wgpu::Features::POLYGON_MODE_LINE,
        PolygonMode::Point => wgpu::Features::POLYGON_MODE_POINT,
    }
}

struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    uniform_layout: &'a wgpu::BindGroupLayout,
    shadow_layout: &'a wgpu::BindGroupLayout,
    surface_format: wgpu::TextureFormat,
}

impl PipelineBuilder<'_> {
    fn build(&self, program: Program, polygon_mode: PolygonMode) -> wgpu::RenderPipeline {
        let (label, source) = match program {
            Program::Depth => ("depth-program", shaders::depth()),
            Program::Shaded => ("shaded-program", shaders::shaded()),
            Program::LightMarker => ("light-marker-program", shaders::light_marker()),
            Program::ScreenQuad => ("screen-quad-program", shaders::screen_quad()),
        };
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let layouts: &[&wgpu::BindGroupLayout] = match program {
            Program::Shaded | Program::ScreenQuad => &[self.uniform_layout, self.shadow_layout],
            Program::Depth | Program::LightMarker => &[self.uniform_layout],
        };
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: layouts,
                push_constant_ranges: &[],
            });

        let depth_stencil = match program {
            Program::Depth => Some(wgpu::DepthStencilState {
                format: ShadowMap::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            Program::Shaded | Program::LightMarker => Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            Program::ScreenQuad => None,
        };
        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.surface_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let fragment = match program {
            Program::Depth => None,
            _ => Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
        };

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: match program {
                        Program::Shaded | Program::LightMarker => Some(wgpu::Face::Back),
                        Program::Depth | Program::ScreenQuad => None,
                    },
                    polygon_mode: match polygon_mode {
                        PolygonMode::Fill => wgpu::PolygonMode::Fill,
                        PolygonMode::Line => wgpu::PolygonMode::Line,
                        PolygonMode::Point => wgpu::PolygonMode::Point,
                    },
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment,
                multiview: None,
                cache: None,
            })
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("window-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// GPU side of the [`ShadowMapTarget`].
struct ShadowMap {
    target: ShadowMapTarget,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl ShadowMap {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn create(
        device: &wgpu::Device,
        target: ShadowMapTarget,
        border_supported: bool,
    ) -> Result<Self, StartupError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map"),
            size: wgpu::Extent3d {
                width: target.width(),
                height: target.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(error) = block_on(device.pop_error_scope()) {
            return Err(StartupError::ShadowTargetIncomplete {
                width: target.width(),
                height: target.height(),
                reason: error.to_string(),
            });
        }

        let address_mode = if border_supported {
            wgpu::AddressMode::ClampToBorder
        } else {
            wgpu::AddressMode::ClampToEdge
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            border_color: border_supported.then_some(wgpu::SamplerBorderColor::OpaqueWhite),
            ..Default::default()
        });

        Ok(Self {
            target,
            _texture: texture,
            view,
            sampler,
        })
    }
}

/// CPU copy of a program's uniform slots, laid out like `Uniforms` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct UniformBlock {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    light_space: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    light_dir: [f32; 4],
    light_color: [f32; 4],
    punct_light: [f32; 4],
    punct_light_color: [f32; 4],
    flags: [u32; 4],
}

impl UniformBlock {
    fn set(&mut self, slot: UniformSlot, value: UniformValue) -> Result<(), String> {
        match (slot, value) {
            (UniformSlot::Model, UniformValue::Mat4(m)) => self.model = mat4(m),
            (UniformSlot::View, UniformValue::Mat4(m)) => self.view = mat4(m),
            (UniformSlot::Projection, UniformValue::Mat4(m)) => self.projection = mat4(m),
            (UniformSlot::LightSpaceTrMatrix, UniformValue::Mat4(m)) => {
                self.light_space = mat4(m)
            }
            (UniformSlot::NormalMatrix, UniformValue::Mat3(m)) => self.normal = mat3_to_3x4(m),
            (UniformSlot::LightDir, UniformValue::Vec3(v)) => self.light_dir = vec4(v),
            (UniformSlot::LightColor, UniformValue::Vec3(v)) => self.light_color = vec4(v),
            (UniformSlot::PunctLight, UniformValue::Vec3(v)) => self.punct_light = vec4(v),
            (UniformSlot::PunctLightColor, UniformValue::Vec3(v)) => {
                self.punct_light_color = vec4(v)
            }
            (UniformSlot::SecondLight, UniformValue::Bool(on)) => self.flags[0] = on as u32,
            (UniformSlot::Fog, UniformValue::Bool(on)) => self.flags[1] = on as u32,
            (UniformSlot::ShadowMap, UniformValue::TextureUnit(unit)) => self.flags[2] = unit,
            (UniformSlot::DepthMap, UniformValue::TextureUnit(unit)) => self.flags[3] = unit,
            (slot, value) => {
                return Err(format!(
                    "INVALID_OPERATION: {value:?} does not fit uniform `{}`",
                    slot.name()
                ))
            }
        }
        Ok(())
    }
}

fn mat4(matrix: Mat4) -> [[f32; 4]; 4] {
    matrix.to_cols_array_2d()
}

fn vec4(vector: Vec3) -> [f32; 4] {
    vector.extend(0.0).into()
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<UniformBlock>(), 384);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn uniform_slots_land_in_their_fields() {
        let mut block = UniformBlock::zeroed();
        block
            .set(UniformSlot::Fog, UniformValue::Bool(true))
            .unwrap();
        block
            .set(UniformSlot::ShadowMap, UniformValue::TextureUnit(3))
            .unwrap();
        block
            .set(UniformSlot::LightDir, UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        assert_eq!(block.flags, [0, 1, 3, 0]);
        assert_eq!(block.light_dir, [1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn mismatched_uniform_value_is_reported() {
        let mut block = UniformBlock::zeroed();
        let err = block
            .set(UniformSlot::Model, UniformValue::Bool(true))
            .unwrap_err();
        assert!(err.contains("`model`"));
    }

    #[test]
    fn outline_modes_are_requested_as_optional_features() {
        for mode in [PolygonMode::Line, PolygonMode::Point] {
            let feature = polygon_mode_feature(mode);
            assert!(!feature.is_empty());
            assert!(OPTIONAL_FEATURES.contains(feature));
        }
        assert!(polygon_mode_feature(PolygonMode::Fill).is_empty());
    }

    #[test]
    fn normal_matrix_columns_are_padded() {
        let padded = mat3_to_3x4(Mat3::from_cols(Vec3::X, Vec3::Y * 2.0, Vec3::Z * 3.0));
        assert_eq!(padded[1], [0.0, 2.0, 0.0, 0.0]);
        assert_eq!(padded[2][3], 0.0);
    }
}
