//! Headless wgpu render host for `tiler-core`.
//!
//! [`WgpuHost`] owns a device and queue, a single-sample "window" colour
//! texture with a depth buffer, and any number of offscreen targets
//! (optionally multisampled). Draw calls are recorded into a batch and
//! encoded into one render pass when the target changes or pixels are read
//! back.
//!
//! Projection matrices handed to this host must target wgpu's `[0, 1]` clip
//! depth; [`SurfaceProvider::clip_depth`] reports that so the tiler builds
//! its sub-frusta accordingly.

mod readback;

use std::fmt;
use std::ops::Range as Span;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use log::{debug, info, trace};
use wgpu::util::DeviceExt;

use tiler_core::{
    ClipDepth, OffscreenProvider, PixelBuffer, Point, Range, Rgba, SurfaceProvider, TransformStack,
};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for [`WgpuHost`].
#[derive(Clone, Debug, PartialEq)]
pub struct WgpuHostConfig {
    /// Window texture width in device pixels.
    pub width: u32,
    /// Window texture height in device pixels.
    pub height: u32,
    pub scale_factor: f32,
    /// Initial window colour.
    pub clear_color: Rgba,
    pub power_preference: wgpu::PowerPreference,
    /// Ask for a software adapter.
    pub force_fallback_adapter: bool,
}

impl Default for WgpuHostConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            scale_factor: 1.0,
            clear_color: Rgba::BLACK,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from [`WgpuHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum WgpuHostError {
    /// No adapter matched the request.
    Adapter(String),
    /// The adapter refused to create a device.
    Device(String),
    /// Mapping a readback buffer failed.
    Map(String),
    /// Waiting for the device failed.
    Poll(String),
    /// A readback rectangle is not inside the texture.
    RegionOutOfBounds { rect: Range, bounds: Range },
    /// The target handle does not belong to this host.
    NoSuchTarget,
    /// `pop_state` without a matching `push_state`.
    UnbalancedPop,
    /// The request is valid but this host can't honour it.
    Unsupported(String),
}

impl fmt::Display for WgpuHostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adapter(e) => write!(f, "no suitable GPU adapter: {e}"),
            Self::Device(e) => write!(f, "failed to create GPU device: {e}"),
            Self::Map(e) => write!(f, "readback mapping failed: {e}"),
            Self::Poll(e) => write!(f, "device poll failed: {e}"),
            Self::RegionOutOfBounds { rect, bounds } => {
                write!(f, "region {rect} is outside the texture {bounds}")
            }
            Self::NoSuchTarget => write!(f, "no such offscreen target"),
            Self::UnbalancedPop => write!(f, "pop_state without matching push_state"),
            Self::Unsupported(what) => write!(f, "unsupported: {what}"),
        }
    }
}

impl std::error::Error for WgpuHostError {}

// ---------------------------------------------------------------------------
// GPU data
// ---------------------------------------------------------------------------

/// Vertex layout shared with `tile.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Vertex {
    /// Clip-space position, already mapped into the viewport.
    position: [f32; 4],
    /// Packed RGBA8, red in the low byte.
    color: u32,
}

impl Vertex {
    fn new(position: Vec4, color: Rgba) -> Self {
        Self {
            position: position.to_array(),
            color: u32::from_le_bytes(color.0),
        }
    }
}

/// Matrix taking clip coordinates for `viewport` to clip coordinates for
/// the whole `target`, so that every draw can use a full-target viewport.
/// Pixel y grows downwards.
fn viewport_transform(viewport: Range, target: Point) -> Mat4 {
    let (tw, th) = (target.x as f32, target.y as f32);
    let (vw, vh) = (viewport.width() as f32, viewport.height() as f32);
    let sx = vw / tw;
    let sy = vh / th;
    let ox = (2.0 * viewport.min.x as f32 + vw) / tw - 1.0;
    let oy = 1.0 - (2.0 * viewport.min.y as f32 + vh) / th;
    Mat4::from_cols(
        Vec4::new(sx, 0.0, 0.0, 0.0),
        Vec4::new(0.0, sy, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(ox, oy, 0.0, 1.0),
    )
}

/// Colour, depth and (when multisampled) MSAA textures of one render target.
struct Surface {
    size: Point,
    samples: u32,
    /// Single-sample colour, the copy source for readback.
    color: wgpu::Texture,
    msaa: Option<wgpu::Texture>,
    depth: wgpu::Texture,
    /// Whether readback forces alpha to 255, as on a window framebuffer.
    opaque: bool,
}

impl Surface {
    fn new(device: &wgpu::Device, size: Point, samples: u32, opaque: bool) -> Self {
        let extent = wgpu::Extent3d {
            width: size.x as u32,
            height: size.y as u32,
            depth_or_array_layers: 1,
        };
        let texture = |label, format, samples, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };
        let color = texture(
            "tiler colour",
            COLOR_FORMAT,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let msaa = (samples > 1).then(|| {
            texture("tiler msaa", COLOR_FORMAT, samples, wgpu::TextureUsages::RENDER_ATTACHMENT)
        });
        let depth = texture("tiler depth", DEPTH_FORMAT, samples, wgpu::TextureUsages::RENDER_ATTACHMENT);
        Self {
            size,
            samples,
            color,
            msaa,
            depth,
            opaque,
        }
    }

    fn bounds(&self) -> Range {
        Range::from_size(self.size)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Layer {
    /// Depth tested and written.
    Scene,
    /// Drawn over everything, depth untouched.
    Flat,
}

struct Draw {
    layer: Layer,
    scissor: Range,
    vertices: Span<u32>,
}

/// Work recorded for the bound surface since the last flush.
#[derive(Default)]
struct Batch {
    clear_color: Option<Rgba>,
    clear_depth: bool,
    vertices: Vec<Vertex>,
    draws: Vec<Draw>,
}

impl Batch {
    fn is_empty(&self) -> bool {
        self.clear_color.is_none() && !self.clear_depth && self.draws.is_empty()
    }

    fn push(&mut self, layer: Layer, scissor: Range, vertices: impl IntoIterator<Item = Vertex>) {
        let start = self.vertices.len() as u32;
        self.vertices.extend(vertices);
        let end = self.vertices.len() as u32;
        if end > start {
            self.draws.push(Draw {
                layer,
                scissor,
                vertices: start..end,
            });
        }
    }
}

struct Pipelines {
    samples: u32,
    scene: wgpu::RenderPipeline,
    flat: wgpu::RenderPipeline,
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    samples: u32,
    layer: Layer,
) -> wgpu::RenderPipeline {
    let depth_tested = layer == Layer::Scene;
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if depth_tested { "tiler scene pipeline" } else { "tiler flat pipeline" }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    // position
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x4,
                        offset: 0,
                        shader_location: 0,
                    },
                    // color
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Uint32,
                        offset: 16,
                        shader_location: 1,
                    },
                ],
            }],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_tested,
            depth_compare: if depth_tested {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: samples,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

fn wgpu_color(color: Rgba) -> wgpu::Color {
    let [r, g, b, a] = color.to_f64();
    wgpu::Color { r, g, b, a }
}

// ---------------------------------------------------------------------------
// WgpuHost
// ---------------------------------------------------------------------------

/// Handle to an offscreen target created by [`WgpuHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WgpuTarget {
    index: usize,
    size: Point,
    samples: u32,
}

impl WgpuTarget {
    pub fn size(&self) -> Point {
        self.size
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct State {
    viewport: Range,
    projection: Mat4,
    view: Mat4,
}

/// A headless GPU "window" with a GL-like drawing model.
pub struct WgpuHost {
    device: wgpu::Device,
    queue: wgpu::Queue,
    scale_factor: f32,
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    pipelines: Vec<Pipelines>,
    window: Surface,
    targets: Vec<Surface>,
    bound: Option<usize>,
    batch: Batch,
    state: State,
    stack: Vec<State>,
}

impl WgpuHost {
    /// Open the preferred adapter and create a device for it.
    pub fn new(config: WgpuHostConfig) -> Result<Self, WgpuHostError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        }))
        .map_err(|e| WgpuHostError::Adapter(e.to_string()))?;
        let adapter_info = adapter.get_info();
        info!("wgpu host: adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("tiler device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| WgpuHostError::Device(e.to_string()))?;

        Self::from_device(device, queue, config)
    }

    /// Build a host on an existing device, e.g. one shared with a window.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: WgpuHostConfig,
    ) -> Result<Self, WgpuHostError> {
        let size = Point::new(config.width as i32, config.height as i32);
        if !size.is_positive() {
            return Err(WgpuHostError::Unsupported(format!("window size {size}")));
        }
        let max = device.limits().max_texture_dimension_2d;
        if config.width > max || config.height > max {
            return Err(WgpuHostError::Unsupported(format!(
                "window size {size} exceeds the device limit of {max}"
            )));
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tiler shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("tile.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tiler pipeline layout"),
            bind_group_layouts: &[],
            immediate_size: 0,
        });
        let window = Surface::new(&device, size, 1, true);
        debug!("wgpu host: {size} window texture, scale {}", config.scale_factor);

        Ok(Self {
            device,
            queue,
            scale_factor: config.scale_factor,
            shader,
            layout,
            pipelines: Vec::new(),
            window,
            targets: Vec::new(),
            bound: None,
            batch: Batch {
                clear_color: Some(config.clear_color),
                clear_depth: true,
                ..Batch::default()
            },
            state: State {
                viewport: Range::from_size(size),
                projection: Mat4::IDENTITY,
                view: Mat4::IDENTITY,
            },
            stack: Vec::new(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The window colour texture. Call [`submit`](Self::submit) first to see
    /// recorded draws.
    pub fn window_texture(&self) -> &wgpu::Texture {
        &self.window.color
    }

    /// Resolved colour texture of an offscreen target.
    pub fn target_texture(&self, target: &WgpuTarget) -> Option<&wgpu::Texture> {
        self.targets.get(target.index).map(|s| &s.color)
    }

    pub fn is_offscreen_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn viewport(&self) -> Range {
        self.state.viewport
    }

    pub fn projection(&self) -> Mat4 {
        self.state.projection
    }

    pub fn view(&self) -> Mat4 {
        self.state.view
    }

    /// `projection * view`, world to clip space.
    pub fn view_projection(&self) -> Mat4 {
        self.state.projection * self.state.view
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    fn surface(&self) -> &Surface {
        match self.bound.and_then(|i| self.targets.get(i)) {
            Some(target) => target,
            None => &self.window,
        }
    }

    /// Drawable pixels: the viewport clipped to the bound surface.
    fn clip_rect(&self) -> Range {
        self.state.viewport.intersect(self.surface().bounds())
    }

    /// Fill the bound surface's colour buffer.
    pub fn clear_color(&mut self, color: Rgba) {
        if !self.batch.draws.is_empty() {
            self.submit();
        }
        self.batch.clear_color = Some(color);
    }

    /// Reset the bound surface's depth buffer to the far plane.
    pub fn clear_depth(&mut self) {
        if !self.batch.draws.is_empty() {
            self.submit();
        }
        self.batch.clear_depth = true;
    }

    /// Fill `rect`, given relative to the viewport origin, ignoring the
    /// matrices and the depth buffer.
    pub fn fill_rect(&mut self, rect: Range, color: Rgba) {
        let area = (rect + self.state.viewport.min).intersect(self.clip_rect());
        if area.is_empty() {
            return;
        }
        let size = self.surface().size;
        let ndc = |p: Point| {
            Vec4::new(
                p.x as f32 / size.x as f32 * 2.0 - 1.0,
                1.0 - p.y as f32 / size.y as f32 * 2.0,
                0.0,
                1.0,
            )
        };
        let (a, c) = (ndc(area.min), ndc(area.max));
        let (b, d) = (Vec4::new(c.x, a.y, 0.0, 1.0), Vec4::new(a.x, c.y, 0.0, 1.0));
        let quad = [a, b, c, a, c, d].map(|v| Vertex::new(v, color));
        self.batch.push(Layer::Flat, area, quad);
    }

    /// Draw a flat-coloured world-space triangle with the current matrices,
    /// depth-tested against the bound surface.
    pub fn draw_triangle(&mut self, vertices: [Vec3; 3], color: Rgba) {
        let scissor = self.clip_rect();
        if scissor.is_empty() {
            return;
        }
        let mvp = viewport_transform(self.state.viewport, self.surface().size) * self.view_projection();
        let tri = vertices.map(|v| Vertex::new(mvp * v.extend(1.0), color));
        self.batch.push(Layer::Scene, scissor, tri);
    }

    /// Draw the quad `v0 v1 v2 v3` as the triangles `v0 v1 v2` and `v0 v2 v3`.
    pub fn draw_quad(&mut self, vertices: [Vec3; 4], color: Rgba) {
        let [a, b, c, d] = vertices;
        self.draw_triangle([a, b, c], color);
        self.draw_triangle([a, c, d], color);
    }

    fn pipelines_for(&mut self, samples: u32) -> usize {
        if let Some(i) = self.pipelines.iter().position(|p| p.samples == samples) {
            return i;
        }
        trace!("wgpu host: building pipelines for {samples} samples");
        self.pipelines.push(Pipelines {
            samples,
            scene: create_pipeline(&self.device, &self.shader, &self.layout, samples, Layer::Scene),
            flat: create_pipeline(&self.device, &self.shader, &self.layout, samples, Layer::Flat),
        });
        self.pipelines.len() - 1
    }

    /// Encode and submit everything recorded for the bound surface.
    pub fn submit(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);
        let samples = self.surface().samples;
        let index = self.pipelines_for(samples);
        let pipelines = &self.pipelines[index];
        let surface = match self.bound.and_then(|i| self.targets.get(i)) {
            Some(target) => target,
            None => &self.window,
        };

        let color_view = surface.color.create_view(&wgpu::TextureViewDescriptor::default());
        let msaa_view = surface
            .msaa
            .as_ref()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));
        let depth_view = surface.depth.create_view(&wgpu::TextureViewDescriptor::default());
        let (view, resolve_target) = match &msaa_view {
            Some(msaa) => (msaa, Some(&color_view)),
            None => (&color_view, None),
        };

        let vertex_buffer = (!batch.vertices.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tiler vertices"),
                contents: bytemuck::cast_slice(&batch.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tiler encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tiler pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: match batch.clear_color {
                            Some(color) => wgpu::LoadOp::Clear(wgpu_color(color)),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if batch.clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(buffer) = &vertex_buffer {
                pass.set_vertex_buffer(0, buffer.slice(..));
            }
            for draw in &batch.draws {
                pass.set_pipeline(match draw.layer {
                    Layer::Scene => &pipelines.scene,
                    Layer::Flat => &pipelines.flat,
                });
                let s = draw.scissor;
                pass.set_scissor_rect(s.min.x as u32, s.min.y as u32, s.width() as u32, s.height() as u32);
                pass.draw(draw.vertices.clone(), 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        trace!("wgpu host: submitted {} draws", batch.draws.len());
    }

    fn check_region(rect: Range, bounds: Range) -> Result<(), WgpuHostError> {
        if rect.is_empty() || !rect.in_range(bounds) {
            return Err(WgpuHostError::RegionOutOfBounds { rect, bounds });
        }
        Ok(())
    }

    fn read_surface(&self, surface: &Surface, rect: Range) -> Result<PixelBuffer, WgpuHostError> {
        Self::check_region(rect, surface.bounds())?;
        let mut pixels = readback::read_texture(&self.device, &self.queue, &surface.color, rect)?;
        if surface.opaque {
            pixels.force_opaque();
        }
        Ok(pixels)
    }
}

impl SurfaceProvider for WgpuHost {
    type Error = WgpuHostError;

    fn viewport_size(&self) -> Point {
        self.window.size
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    fn clip_depth(&self) -> ClipDepth {
        ClipDepth::ZeroToOne
    }

    fn copy_region(&mut self, rect: Range) -> Result<PixelBuffer, WgpuHostError> {
        if self.bound.is_none() {
            self.submit();
        }
        self.read_surface(&self.window, rect)
    }
}

impl OffscreenProvider for WgpuHost {
    type Target = WgpuTarget;

    fn create_offscreen(&mut self, size: Point, samples: u32) -> Result<WgpuTarget, WgpuHostError> {
        if !matches!(samples, 1 | 4) {
            return Err(WgpuHostError::Unsupported(format!("{samples} samples per pixel")));
        }
        if !size.is_positive() {
            return Err(WgpuHostError::Unsupported(format!("offscreen size {size}")));
        }
        self.targets.push(Surface::new(&self.device, size, samples, false));
        let index = self.targets.len() - 1;
        debug!("wgpu host: offscreen target {index}, {size}, {samples} samples");
        Ok(WgpuTarget {
            index,
            size,
            samples,
        })
    }

    fn bind_offscreen(&mut self, target: &WgpuTarget) -> Result<(), WgpuHostError> {
        if target.index >= self.targets.len() {
            return Err(WgpuHostError::NoSuchTarget);
        }
        self.submit();
        self.bound = Some(target.index);
        Ok(())
    }

    fn unbind_offscreen(&mut self, target: &WgpuTarget) -> Result<(), WgpuHostError> {
        if self.bound != Some(target.index) {
            return Err(WgpuHostError::NoSuchTarget);
        }
        self.submit();
        self.bound = None;
        Ok(())
    }

    fn clear(&mut self, color: Rgba) -> Result<(), WgpuHostError> {
        // Everything recorded so far would be overwritten.
        self.batch = Batch {
            clear_color: Some(color),
            clear_depth: true,
            ..Batch::default()
        };
        Ok(())
    }

    fn read_offscreen(&mut self, target: &WgpuTarget, rect: Range) -> Result<PixelBuffer, WgpuHostError> {
        if self.bound == Some(target.index) {
            self.submit();
        }
        let surface = self.targets.get(target.index).ok_or(WgpuHostError::NoSuchTarget)?;
        self.read_surface(surface, rect)
    }
}

impl TransformStack for WgpuHost {
    fn push_state(&mut self) {
        self.stack.push(self.state);
    }

    fn pop_state(&mut self) -> Result<(), WgpuHostError> {
        self.state = self.stack.pop().ok_or(WgpuHostError::UnbalancedPop)?;
        Ok(())
    }

    fn set_viewport(&mut self, rect: Range) {
        self.state.viewport = rect;
    }

    fn set_projection(&mut self, projection: Mat4) {
        self.state.projection = projection;
    }

    fn set_view(&mut self, view: Mat4) {
        self.state.view = view;
    }
}
