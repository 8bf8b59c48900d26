use std::collections::HashMap;

use crate::catalog::BlendMode;
use crate::compile::{compile_layer_program, LayerProgram};
use crate::surfaces::SurfaceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    blend: BlendMode,
    surface_format: wgpu::TextureFormat,
    sample_count: u32,
}

/// Layer program compiled once, with one render pipeline per blend mode.
///
/// A compile failure is remembered, so every layer that asks afterwards is
/// failed with the same diagnostics instead of recompiling.
pub(crate) struct LayerPipelines {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    program: Option<Result<LayerProgram, SurfaceError>>,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
    surface_format: wgpu::TextureFormat,
    sample_count: u32,
}

impl LayerPipelines {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("layer uniform layout"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("layer pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            bind_group_layout,
            pipeline_layout,
            program: None,
            cache: HashMap::new(),
            surface_format,
            sample_count,
        }
    }

    fn program(&mut self, device: &wgpu::Device) -> Result<LayerProgram, SurfaceError> {
        self.program
            .get_or_insert_with(|| {
                compile_layer_program(device).inspect_err(|err| {
                    tracing::error!(error = %err, "layer program rejected by the device");
                })
            })
            .clone()
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        blend: BlendMode,
    ) -> Result<wgpu::RenderPipeline, SurfaceError> {
        let key = PipelineKey {
            blend,
            surface_format: self.surface_format,
            sample_count: self.sample_count,
        };
        if let Some(pipeline) = self.cache.get(&key) {
            return Ok(pipeline.clone());
        }

        let program = self.program(device)?;
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(blend.css_name()),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
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
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: self.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(blend_state(blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        tracing::debug!(blend = %blend, "created layer pipeline");
        self.cache.insert(key, pipeline.clone());
        Ok(pipeline)
    }
}

/// Fixed-function blend for premultiplied fragment output.
///
/// Normal, multiply and screen are exact. Colour-dodge is approximated as
/// additive, and overlay and soft-light as normal, since they need the
/// backdrop inside the blend equation.
pub(crate) fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    let component = |src_factor, dst_factor| wgpu::BlendComponent {
        src_factor,
        dst_factor,
        operation: wgpu::BlendOperation::Add,
    };
    let color = match mode {
        BlendMode::Normal | BlendMode::Overlay | BlendMode::SoftLight => {
            component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha)
        }
        BlendMode::Multiply => {
            component(wgpu::BlendFactor::Dst, wgpu::BlendFactor::OneMinusSrcAlpha)
        }
        BlendMode::Screen => component(wgpu::BlendFactor::OneMinusDst, wgpu::BlendFactor::One),
        BlendMode::ColorDodge => component(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
    };
    wgpu::BlendState {
        color,
        alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha),
    }
}
