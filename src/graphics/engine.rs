use anyhow::Result;
use glam::Mat4;
use log::{info, warn};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::shader::PipelineDesc;
use super::texture::DepthTexture;
use super::{ParticleInstance, ShaderManager, Vertex, VertexBuffer};
use crate::engine::color::Rgb;
use crate::engine::render_loop::{FrameSurface, SceneFrame};
use crate::error::RenderError;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl Uniforms {
    fn new(view: Mat4, proj: Mat4) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        }
    }
}

/// CPU-side vertex data for one frame.
#[derive(Debug, Default)]
pub struct SceneGeometry {
    pub faces: Vec<Vertex>,
    pub lines: Vec<Vertex>,
    pub particles: Vec<ParticleInstance>,
}

impl SceneGeometry {
    /// Flattens the frame into world-space vertices. `linear` converts colours
    /// for an sRGB target.
    pub fn build(frame: &SceneFrame<'_>, linear: bool) -> Self {
        let rgba = |c: Rgb| {
            if linear {
                c.to_linear_rgba()
            } else {
                [c.r, c.g, c.b, 1.0]
            }
        };

        let pool = frame.pool;
        let mut faces = Vec::with_capacity(pool.len() * 3);
        let mut lines = Vec::with_capacity(pool.len() * 6);
        for (i, object) in pool.objects().iter().enumerate() {
            let corners = pool.world_vertices(i);
            let face = rgba(object.color.to_rgb());
            let edge = rgba(object.wireframe.color);
            for c in corners {
                faces.push(Vertex {
                    position: c.to_array(),
                    color: face,
                });
            }
            for k in 0..3 {
                for c in [corners[k], corners[(k + 1) % 3]] {
                    lines.push(Vertex {
                        position: c.to_array(),
                        color: edge,
                    });
                }
            }
        }

        for shell in [&frame.shells.outer, &frame.shells.inner] {
            let model = shell.model_matrix();
            let color = rgba(shell.color);
            let vertices = shell.vertices();
            for [a, b] in shell.edges() {
                for v in [vertices[*a as usize], vertices[*b as usize]] {
                    lines.push(Vertex {
                        position: model.transform_point3(v).to_array(),
                        color,
                    });
                }
            }
        }

        let mut particles = Vec::with_capacity(frame.high_field.len() + frame.low_field.len());
        for (field, color) in [
            (frame.high_field, frame.high_color),
            (frame.low_field, frame.low_color),
        ] {
            let color = rgba(color);
            let scales = field.scales();
            for i in 0..field.len() {
                particles.push(ParticleInstance {
                    center: field.point(i),
                    scale: scales[i],
                    color,
                });
            }
        }

        Self {
            faces,
            lines,
            particles,
        }
    }
}

/// GPU buffers that `release` frees.
struct FrameBuffers {
    faces: VertexBuffer,
    lines: VertexBuffer,
    particles: VertexBuffer,
    depth: DepthTexture,
}

/// wgpu drawing surface for the window.
pub struct GraphicsEngine {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,

    shader_manager: ShaderManager,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    buffers: Option<FrameBuffers>,
    linear_colors: bool,
}

impl GraphicsEngine {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find an appropriate adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no texture formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniforms = Uniforms::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let mut shader_manager = ShaderManager::new();
        shader_manager.load_shader(&device, "scene", include_str!("../../shaders/scene.wgsl"));
        shader_manager.load_shader(
            &device,
            "particles",
            include_str!("../../shaders/particles.wgsl"),
        );

        let mesh_buffers = [Vertex::desc()];
        let particle_buffers = [ParticleInstance::desc()];
        let pipelines = [
            (
                "faces",
                PipelineDesc {
                    shader: "scene",
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    buffers: &mesh_buffers,
                    blend: wgpu::BlendState::REPLACE,
                    depth_write: true,
                },
            ),
            (
                "lines",
                PipelineDesc {
                    shader: "scene",
                    topology: wgpu::PrimitiveTopology::LineList,
                    buffers: &mesh_buffers,
                    blend: wgpu::BlendState::ALPHA_BLENDING,
                    depth_write: true,
                },
            ),
            (
                "particles",
                PipelineDesc {
                    shader: "particles",
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    buffers: &particle_buffers,
                    blend: wgpu::BlendState::ALPHA_BLENDING,
                    depth_write: false,
                },
            ),
        ];
        for (name, desc) in &pipelines {
            shader_manager.create_pipeline(
                &device,
                name,
                desc,
                surface_format,
                &uniform_bind_group_layout,
            )?;
        }

        let buffers = FrameBuffers {
            faces: VertexBuffer::new::<Vertex>(&device, "Face Buffer", &[]),
            lines: VertexBuffer::new::<Vertex>(&device, "Line Buffer", &[]),
            particles: VertexBuffer::new::<ParticleInstance>(&device, "Particle Buffer", &[]),
            depth: DepthTexture::new(&device, &config),
        };

        info!(
            "Graphics ready: {:?} via {:?}, {}x{}",
            surface_format,
            adapter.get_info().backend,
            config.width,
            config.height
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            shader_manager,
            uniform_buffer,
            uniform_bind_group,
            buffers: Some(buffers),
            linear_colors: surface_format.is_srgb(),
        })
    }

    fn clear_color(&self, background: Rgb) -> wgpu::Color {
        let [r, g, b, a] = if self.linear_colors {
            background.to_linear_rgba()
        } else {
            [background.r, background.g, background.b, 1.0]
        };
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }
    }
}

impl FrameSurface for GraphicsEngine {
    fn size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = winit::dpi::PhysicalSize::new(width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        if let Some(buffers) = self.buffers.as_mut() {
            buffers.depth.destroy();
            buffers.depth = DepthTexture::new(&self.device, &self.config);
        }
    }

    fn draw(&mut self, frame: &SceneFrame<'_>) -> Result<(), RenderError> {
        let clear = self.clear_color(frame.background);
        let Some(buffers) = self.buffers.as_mut() else {
            return Err(RenderError::SurfaceUnavailable("surface released".into()));
        };

        let geometry = SceneGeometry::build(frame, self.linear_colors);
        buffers.faces.update(&self.device, &self.queue, &geometry.faces);
        buffers.lines.update(&self.device, &self.queue, &geometry.lines);
        buffers
            .particles
            .update(&self.device, &self.queue, &geometry.particles);

        let uniforms = Uniforms::new(frame.view, frame.projection);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceUnavailable(e.to_string()));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                return Err(RenderError::SurfaceUnavailable("timeout".into()));
            }
            Err(e) => {
                warn!("Surface failure: {}", e);
                return Err(RenderError::Fatal(e.to_string()));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &buffers.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            for (name, buffer, vertices, instances) in [
                ("faces", &buffers.faces, buffers.faces.count, 1),
                ("lines", &buffers.lines, buffers.lines.count, 1),
                ("particles", &buffers.particles, 6, buffers.particles.count),
            ] {
                if buffer.count == 0 {
                    continue;
                }
                if let Some(pipeline) = self.shader_manager.get_pipeline(name) {
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_vertex_buffer(0, buffer.buffer.slice(..));
                    render_pass.draw(0..vertices, 0..instances);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn release(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            buffers.faces.destroy();
            buffers.lines.destroy();
            buffers.particles.destroy();
            buffers.depth.destroy();
            info!("GPU buffers released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrbitConfig, ShellConfig};
    use crate::engine::color::Hsl;
    use crate::engine::field::GeometryField;
    use crate::engine::pool::SceneObjectPool;
    use crate::engine::shell::ShellPair;
    use glam::Vec3;

    #[test]
    fn geometry_covers_every_scene_element() {
        let orbit = OrbitConfig {
            lines: 10,
            dots: 2,
            ..OrbitConfig::default()
        };
        let high = GeometryField::orbit(800.0, &orbit).unwrap();
        let low = GeometryField::orbit(600.0, &orbit).unwrap();
        let pool = SceneObjectPool::uniform(4, Hsl::new(0.0, 0.0, 0.5)).unwrap();
        let shells = ShellPair::new(&orbit, &ShellConfig::default(), Rgb::WHITE, Rgb::WHITE);

        let frame = SceneFrame {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera: Vec3::ZERO,
            background: Rgb::WHITE,
            high_field: &high,
            high_color: Rgb::WHITE,
            low_field: &low,
            low_color: Rgb::new(0.5, 0.5, 0.5),
            pool: &pool,
            shells: &shells,
        };
        let geometry = SceneGeometry::build(&frame, false);

        assert_eq!(geometry.faces.len(), 4 * 3);
        let shell_edges = shells.outer.edges().len() + shells.inner.edges().len();
        assert_eq!(geometry.lines.len(), 4 * 6 + shell_edges * 2);
        assert_eq!(geometry.particles.len(), 40);
        assert_eq!(geometry.particles[20].color, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(geometry.faces[0].color, [0.5, 0.5, 0.5, 1.0]);
    }
}
