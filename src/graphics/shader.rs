use anyhow::Result;
use std::collections::HashMap;
use wgpu::{Device, RenderPipeline, ShaderModule};

use super::texture::DEPTH_FORMAT;

/// How a named pipeline draws: which shader, which primitive, which buffers.
pub struct PipelineDesc<'a> {
    pub shader: &'a str,
    pub topology: wgpu::PrimitiveTopology,
    pub buffers: &'a [wgpu::VertexBufferLayout<'static>],
    pub blend: wgpu::BlendState,
    pub depth_write: bool,
}

pub struct ShaderManager {
    shaders: HashMap<String, ShaderModule>,
    pipelines: HashMap<String, RenderPipeline>,
}

impl ShaderManager {
    pub fn new() -> Self {
        Self {
            shaders: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn load_shader(&mut self, device: &Device, name: &str, source: &str) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        self.shaders.insert(name.to_string(), shader);
    }

    pub fn create_pipeline(
        &mut self,
        device: &Device,
        name: &str,
        desc: &PipelineDesc<'_>,
        format: wgpu::TextureFormat,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Result<()> {
        let shader = self
            .shaders
            .get(desc.shader)
            .ok_or_else(|| anyhow::anyhow!("Shader '{}' not found", desc.shader))?;

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", name)),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", name)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: desc.buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(desc.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Fracture faces are seen from both sides.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: desc.depth_write,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        self.pipelines.insert(name.to_string(), pipeline);
        Ok(())
    }

    pub fn get_pipeline(&self, name: &str) -> Option<&RenderPipeline> {
        self.pipelines.get(name)
    }
}
