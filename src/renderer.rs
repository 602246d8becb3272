use crate::enums::{ShadingMode, SliceAxis, SliceMode};
use crate::params::{RenderParameters, ViewState};
use crate::ramp::{ColorRamp, RampTexture};
use crate::shader::{PipelineConfig, Program, ShaderError};
use crate::volume::{Volume, VolumeDims, WGPU};

use glam::Mat4;
use half::f16;
use log::info;
use rayon::prelude::*;
use thiserror::Error;
use wgpu::{PollType, util::DeviceExt};

const RAYMARCH_VERT: &str = include_str!("shaders/raymarch_vert.wgsl");
const RAYMARCH_FRAG: &str = include_str!("shaders/raymarch_frag.wgsl");
const SLICE_VERT: &str = include_str!("shaders/slice_vert.wgsl");
const SLICE_FRAG: &str = include_str!("shaders/slice_frag.wgsl");

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("No linked program available")]
    NoProgram,

    #[error("Renderer already torn down")]
    TornDown,

    #[error("GPU unavailable: {0}")]
    Gpu(String),

    #[error("GPU resource allocation failed: {0}")]
    ResourceExhausted(String),

    #[error("Frame readback failed: {0}")]
    Readback(String),

    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// Sub-rectangle of the render target, in pixels.
#[derive(Clone, Copy, Debug)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Uniform block shared by the ray-march and slice programs. Field order
/// must match the `Uniforms` struct in the WGSL sources.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 3],
    azimuth: f32,
    elevation: f32,
    clip_plane_depth: f32,
    opacity_factor: f32,
    light_factor: f32,
    clip: u32,
    dither: u32,
    shading_mode: u32,
    slice_axis: u32,
    slice_position: f32,
    _pad: [f32; 3],
}

const CUBE_VERTICES: [[f32; 3]; 36] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, -1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [1.0, 1.0, -1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
];

impl WGPU {
    /// Request a device/queue pair from the default adapter.
    pub async fn request() -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|e| RendererError::Gpu(e.to_string()))?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| RendererError::Gpu(e.to_string()))?;
        Ok(Self { device, queue })
    }
}

/// Owner of every GPU resource the volume pipeline needs.
///
/// One renderer instance owns one volume texture, one ramp texture, the
/// two programs and the offscreen target; nothing lives in process-wide
/// state, so multiple independent instances can coexist on one device.
pub struct VolumeRenderer {
    wgpu: WGPU,
    params: RenderParameters,
    ramp: ColorRamp,
    ramp_texture: RampTexture,
    volume_texture: wgpu::Texture,
    volume_view: wgpu::TextureView,
    volume_sampler: wgpu::Sampler,
    volume_dims: Option<VolumeDims>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    cube_vertices: wgpu::Buffer,
    raymarch: Program,
    slice: Program,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    target_size: (u32, u32),
    torn_down: bool,
}

impl VolumeRenderer {
    /// Create a renderer with an offscreen target of the given size and
    /// compile the built-in programs. No volume is resident yet; frames
    /// render empty until [`Self::upload_volume`] is called.
    pub async fn new(wgpu: WGPU, width: u32, height: u32) -> Result<Self, RendererError> {
        let device = &wgpu.device;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Render Uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cube_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bounding Cube Vertices"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let volume_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // A 1x1x1 placeholder keeps the bind group valid before the
        // first upload.
        let (volume_texture, volume_view) = Self::create_volume_texture(
            device,
            VolumeDims {
                width: 1,
                height: 1,
                depth: 1,
            },
        );

        let ramp = ColorRamp::default();
        let ramp_texture = RampTexture::init(device, &wgpu.queue, &ramp);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Render Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D1,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Volume Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let bind_group = Self::create_bind_group(
            device,
            &bind_group_layout,
            &uniform_buffer,
            &volume_view,
            &volume_sampler,
            &ramp_texture,
        );

        let (target, target_view) = Self::create_target(device, width, height);

        let mut renderer = Self {
            wgpu,
            params: RenderParameters::default(),
            ramp,
            ramp_texture,
            volume_texture,
            volume_view,
            volume_sampler,
            volume_dims: None,
            bind_group_layout,
            pipeline_layout,
            bind_group,
            uniform_buffer,
            cube_vertices,
            raymarch: Program::new("raymarch"),
            slice: Program::new("slice"),
            target,
            target_view,
            target_size: (width, height),
            torn_down: false,
        };
        renderer.rebuild_shaders().await?;
        Ok(renderer)
    }

    /// Compile and link both built-in programs. A failure keeps any
    /// previously linked pipelines active.
    pub async fn rebuild_shaders(&mut self) -> Result<(), RendererError> {
        self.rebuild_raymarch(RAYMARCH_VERT, RAYMARCH_FRAG).await?;
        self.rebuild_slice(SLICE_VERT, SLICE_FRAG).await?;
        Ok(())
    }

    /// Hot-swap the ray-march program with edited sources.
    pub async fn rebuild_raymarch(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), RendererError> {
        if self.torn_down {
            return Err(RendererError::TornDown);
        }
        let cube_attributes = wgpu::vertex_attr_array![0 => Float32x3];
        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 3]>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &cube_attributes,
        }];
        let config = PipelineConfig {
            layout: &self.pipeline_layout,
            vertex_buffers: &vertex_buffers,
            target_format: TARGET_FORMAT,
            blend: None,
        };
        self.raymarch
            .compile_and_link(&self.wgpu.device, vertex_source, fragment_source, &config)
            .await?;
        Ok(())
    }

    /// Hot-swap the slice program with edited sources.
    pub async fn rebuild_slice(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), RendererError> {
        if self.torn_down {
            return Err(RendererError::TornDown);
        }
        let config = PipelineConfig {
            layout: &self.pipeline_layout,
            vertex_buffers: &[],
            target_format: TARGET_FORMAT,
            blend: None,
        };
        self.slice
            .compile_and_link(&self.wgpu.device, vertex_source, fragment_source, &config)
            .await?;
        Ok(())
    }

    /// Upload a volume into the 3D texture, replacing any previous one.
    ///
    /// Densities are converted to f16 so the texture stays linearly
    /// filterable. The previous texture's memory is released before the
    /// bind group is rebuilt; on allocation failure nothing is replaced.
    pub async fn upload_volume(&mut self, volume: &Volume) -> Result<VolumeDims, RendererError> {
        if self.torn_down {
            return Err(RendererError::TornDown);
        }
        let dims = volume.dims();
        let device = &self.wgpu.device;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let (texture, view) = Self::create_volume_texture(device, dims);
        if let Some(oom) = device.pop_error_scope().await {
            return Err(RendererError::ResourceExhausted(oom.to_string()));
        }

        let data_slice = volume.data.as_slice().expect("Volume must be contiguous");
        let texels: Vec<f16> = data_slice.par_iter().map(|&v| f16::from_f32(v)).collect();

        self.wgpu.queue.write_texture(
            wgpu::TexelCopyTextureInfoBase {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(2 * dims.width as u32),
                rows_per_image: Some(dims.height as u32),
            },
            wgpu::Extent3d {
                width: dims.width as u32,
                height: dims.height as u32,
                depth_or_array_layers: dims.depth as u32,
            },
        );

        // Exactly one live volume texture afterward.
        self.volume_texture.destroy();
        self.volume_texture = texture;
        self.volume_view = view;
        self.volume_dims = Some(dims);
        self.bind_group = Self::create_bind_group(
            device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.volume_view,
            &self.volume_sampler,
            &self.ramp_texture,
        );

        info!(
            "volume texture resident: {}x{}x{}",
            dims.width, dims.height, dims.depth
        );
        Ok(dims)
    }

    /// Replace the transfer-function control points and refresh the
    /// lookup texture in place.
    pub fn set_ramp_points(&mut self, points: Vec<(f32, [f32; 4])>) {
        self.ramp.set_points(points);
        self.ramp_texture.update(&self.wgpu.queue, &self.ramp);
    }

    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    pub fn params(&self) -> &RenderParameters {
        &self.params
    }

    pub fn volume_dims(&self) -> Option<VolumeDims> {
        self.volume_dims
    }

    pub fn set_azimuth(&mut self, degrees: f32) {
        self.params.set_azimuth(degrees);
    }

    pub fn set_elevation(&mut self, degrees: f32) {
        self.params.set_elevation(degrees);
    }

    pub fn set_clip_plane_depth(&mut self, depth: f32) {
        self.params.set_clip_plane_depth(depth);
    }

    pub fn set_clip(&mut self, enabled: bool) {
        self.params.set_clip(enabled);
    }

    pub fn set_dither(&mut self, enabled: bool) {
        self.params.set_dither(enabled);
    }

    pub fn set_opacity_factor(&mut self, factor: f32) {
        self.params.set_opacity_factor(factor);
    }

    pub fn set_light_factor(&mut self, factor: f32) {
        self.params.set_light_factor(factor);
    }

    pub fn set_shading_mode(&mut self, mode: ShadingMode) {
        self.params.set_shading_mode(mode);
    }

    pub fn set_slice_mode(&mut self, mode: SliceMode) {
        self.params.set_slice_mode(mode);
    }

    pub fn set_slice_position(&mut self, position: f32) {
        self.params.set_slice_position(position);
    }

    /// Render one frame into the offscreen target.
    ///
    /// In volume mode this ray-marches the bounding cube; in slice mode
    /// it draws the configured axis plane instead. A faulted program
    /// keeps rendering with its last good pipeline; without any linked
    /// pipeline the call is a reported no-op.
    pub fn render_frame(&mut self, view: &ViewState) -> Result<(), RendererError> {
        if self.torn_down {
            return Err(RendererError::TornDown);
        }
        match self.params.slice_mode {
            SliceMode::Volume => self.render_volume(view),
            SliceMode::Slice(axis) => {
                self.render_slice_internal(axis, self.params.slice_position, None, true)
            }
        }
    }

    /// Draw a single axis-aligned slice as an overlay into the given
    /// viewport sub-rectangle (full target when `None`).
    pub fn render_slice(
        &mut self,
        axis: SliceAxis,
        position: f32,
        viewport: Option<ViewportRect>,
    ) -> Result<(), RendererError> {
        if self.torn_down {
            return Err(RendererError::TornDown);
        }
        self.render_slice_internal(axis, position.clamp(0.0, 1.0), viewport, false)
    }

    fn render_volume(&mut self, view: &ViewState) -> Result<(), RendererError> {
        let pipeline = self.raymarch.pipeline().ok_or(RendererError::NoProgram)?;
        self.write_uniforms(Some(view), None);

        let mut encoder = self
            .wgpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Volume Frame Encoder"),
            });
        {
            // Pass scope: pipeline, bind group and viewport state all end
            // with the pass, nothing leaks into other passes.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Raymarch Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_vertex_buffer(0, self.cube_vertices.slice(..));
            pass.draw(0..CUBE_VERTICES.len() as u32, 0..1);
        }
        self.wgpu.queue.submit(Some(encoder.finish()));
        self.raymarch.mark_active();
        Ok(())
    }

    fn render_slice_internal(
        &mut self,
        axis: SliceAxis,
        position: f32,
        viewport: Option<ViewportRect>,
        clear: bool,
    ) -> Result<(), RendererError> {
        let pipeline = self.slice.pipeline().ok_or(RendererError::NoProgram)?;
        self.write_uniforms(None, Some((axis, position)));

        let load = if clear {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };

        let mut encoder = self
            .wgpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Slice Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Slice Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            if let Some(rect) = viewport {
                let rect = self.clamp_viewport(rect);
                pass.set_viewport(
                    rect.x as f32,
                    rect.y as f32,
                    rect.width as f32,
                    rect.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
            }
            pass.draw(0..6, 0..1);
        }
        self.wgpu.queue.submit(Some(encoder.finish()));
        self.slice.mark_active();
        Ok(())
    }

    /// Copy the offscreen target back to the CPU as tightly packed RGBA8
    /// rows.
    pub async fn read_frame(&self) -> Result<Vec<u8>, RendererError> {
        if self.torn_down {
            return Err(RendererError::TornDown);
        }
        let (width, height) = self.target_size;
        let bytes_per_row = (width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let staging_buffer = self.wgpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Staging Buffer"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .wgpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfoBase {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfoBase {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.wgpu.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.wgpu.device.poll(PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        receiver
            .await
            .map_err(|_| RendererError::Readback("map callback dropped".into()))?
            .map_err(|e| RendererError::Readback(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + (width * 4) as usize]);
        }
        drop(data);
        staging_buffer.unmap();
        Ok(pixels)
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    /// Release every GPU resource. Idempotent; all later rendering calls
    /// fail with [`RendererError::TornDown`].
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.volume_texture.destroy();
        self.ramp_texture.destroy();
        self.target.destroy();
        self.uniform_buffer.destroy();
        self.cube_vertices.destroy();
        self.raymarch.release();
        self.slice.release();
        self.volume_dims = None;
        self.torn_down = true;
        info!("renderer torn down");
    }

    fn write_uniforms(&self, view: Option<&ViewState>, slice: Option<(SliceAxis, f32)>) {
        let (view_proj, camera_pos) = match view {
            Some(view) => (
                view.view_proj.to_cols_array_2d(),
                view.camera_pos.to_array(),
            ),
            None => (Mat4::IDENTITY.to_cols_array_2d(), [0.0; 3]),
        };
        let (slice_axis, slice_position) = match slice {
            Some((axis, position)) => (axis.selector(), position),
            None => match self.params.slice_mode {
                SliceMode::Slice(axis) => (axis.selector(), self.params.slice_position),
                SliceMode::Volume => (SliceAxis::Z.selector(), self.params.slice_position),
            },
        };

        let uniforms = Uniforms {
            view_proj,
            camera_pos,
            azimuth: self.params.azimuth,
            elevation: self.params.elevation,
            clip_plane_depth: self.params.clip_plane_depth,
            opacity_factor: self.params.opacity_factor,
            light_factor: self.params.light_factor,
            clip: self.params.clip as u32,
            dither: self.params.dither as u32,
            shading_mode: self.params.shading_mode.selector(),
            slice_axis,
            slice_position,
            _pad: [0.0; 3],
        };
        self.wgpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn clamp_viewport(&self, rect: ViewportRect) -> ViewportRect {
        let (width, height) = self.target_size;
        let x = rect.x.min(width.saturating_sub(1));
        let y = rect.y.min(height.saturating_sub(1));
        ViewportRect {
            x,
            y,
            width: rect.width.min(width - x).max(1),
            height: rect.height.min(height - y).max(1),
        }
    }

    fn create_volume_texture(
        device: &wgpu::Device,
        dims: VolumeDims,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume 3D Texture"),
            size: wgpu::Extent3d {
                width: dims.width as u32,
                height: dims.height as u32,
                depth_or_array_layers: dims.depth as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        volume_view: &wgpu::TextureView,
        volume_sampler: &wgpu::Sampler,
        ramp_texture: &RampTexture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Render Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(volume_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(volume_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ramp_texture.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(ramp_texture.sampler()),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 128);
        assert_eq!(std::mem::offset_of!(Uniforms, view_proj), 0);
        assert_eq!(std::mem::offset_of!(Uniforms, camera_pos), 64);
        assert_eq!(std::mem::offset_of!(Uniforms, azimuth), 76);
        assert_eq!(std::mem::offset_of!(Uniforms, elevation), 80);
        assert_eq!(std::mem::offset_of!(Uniforms, clip_plane_depth), 84);
        assert_eq!(std::mem::offset_of!(Uniforms, opacity_factor), 88);
        assert_eq!(std::mem::offset_of!(Uniforms, light_factor), 92);
        assert_eq!(std::mem::offset_of!(Uniforms, clip), 96);
        assert_eq!(std::mem::offset_of!(Uniforms, dither), 100);
        assert_eq!(std::mem::offset_of!(Uniforms, shading_mode), 104);
        assert_eq!(std::mem::offset_of!(Uniforms, slice_axis), 108);
        assert_eq!(std::mem::offset_of!(Uniforms, slice_position), 112);
    }

    #[test]
    fn cube_covers_the_unit_box() {
        for vertex in CUBE_VERTICES {
            for component in vertex {
                assert!(component == 1.0 || component == -1.0);
            }
        }
        assert_eq!(CUBE_VERTICES.len(), 36);
    }
}
