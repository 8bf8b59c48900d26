use std::time::{Duration, Instant};

use tracing::debug;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::catalog::LayerDescriptor;
use crate::program::UniformBlock;
use crate::surfaces::{DrawError, LayerSurface, SurfaceError, SurfaceHost};
use crate::types::SurfaceSize;

use super::context::GpuContext;
use super::pipeline::LayerPipelines;
use super::uniforms::CompositeUniforms;

/// Creates layer surfaces that all draw into one shared swapchain.
pub(crate) struct GpuHost {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: LayerPipelines,
    bounds: SurfaceSize,
    max_dimension: u32,
}

impl GpuHost {
    pub(crate) fn new(context: &GpuContext) -> Self {
        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            pipelines: LayerPipelines::new(
                &context.device,
                context.surface_format,
                context.sample_count,
            ),
            bounds: SurfaceSize::new(context.size.width, context.size.height),
            max_dimension: context.max_dimension,
        }
    }
}

impl SurfaceHost for GpuHost {
    type Surface = GpuLayerSurface;

    fn bounds(&self) -> SurfaceSize {
        self.bounds
    }

    fn create_surface(
        &mut self,
        index: usize,
        descriptor: &'static LayerDescriptor,
    ) -> Result<GpuLayerSurface, SurfaceError> {
        if self.bounds.width > self.max_dimension || self.bounds.height > self.max_dimension {
            return Err(SurfaceError::TooLarge {
                size: self.bounds,
                limit: self.max_dimension,
            });
        }
        let pipeline = self.pipelines.get_or_create(&self.device, descriptor.blend)?;

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(descriptor.name),
                contents: bytemuck::bytes_of(&UniformBlock::default()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let composite = CompositeUniforms::for_layer(descriptor, self.bounds);
        let composite_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("layer composite uniforms"),
                contents: bytemuck::bytes_of(&composite),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(descriptor.name),
            layout: &self.pipelines.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: composite_buffer.as_entire_binding(),
                },
            ],
        });
        debug!(layer = descriptor.name, index, blend = %descriptor.blend, "gpu layer bound");

        Ok(GpuLayerSurface {
            queue: self.queue.clone(),
            descriptor,
            pipeline,
            uniform_buffer,
            composite_buffer,
            bind_group,
            size: self.bounds,
            pending: false,
        })
    }
}

/// One layer's uniforms and pipeline. Drawing records the uniforms; the
/// actual draw call is encoded when the frame is presented.
pub(crate) struct GpuLayerSurface {
    queue: wgpu::Queue,
    descriptor: &'static LayerDescriptor,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    composite_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    size: SurfaceSize,
    pending: bool,
}

impl GpuLayerSurface {
    fn encode(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        if !self.pending {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
        self.pending = false;
    }
}

impl LayerSurface for GpuLayerSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        if size.is_empty() {
            return;
        }
        let composite = CompositeUniforms::for_layer(self.descriptor, size);
        self.queue
            .write_buffer(&self.composite_buffer, 0, bytemuck::bytes_of(&composite));
    }

    fn draw(&mut self, uniforms: &UniformBlock) -> Result<(), DrawError> {
        if self.size.is_empty() {
            self.pending = false;
            return Ok(());
        }
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        self.pending = true;
        Ok(())
    }
}

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
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

/// Owns the swapchain side of the preview and stacks the layers into it.
pub(crate) struct GpuState {
    context: GpuContext,
    multisample_target: Option<MultisampleTarget>,
    frames_since_report: u32,
    last_report: Instant,
}

impl GpuState {
    pub(crate) fn new(context: GpuContext) -> Self {
        let multisample_target = Self::multisample_target_for(&context);
        Self {
            context,
            multisample_target,
            frames_since_report: 0,
            last_report: Instant::now(),
        }
    }

    fn multisample_target_for(context: &GpuContext) -> Option<MultisampleTarget> {
        (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        })
    }

    pub(crate) fn context(&self) -> &GpuContext {
        &self.context
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.multisample_target = Self::multisample_target_for(&self.context);
    }

    /// Clears the swapchain and draws every layer with pending uniforms, in order.
    pub(crate) fn present<'a>(
        &mut self,
        layers: impl Iterator<Item = &'a mut GpuLayerSurface>,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("layer stack encoder"),
                });

        {
            let (target, resolve_target) = match &self.multisample_target {
                Some(msaa) => (&msaa.view, Some(&view)),
                None => (&view, None),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("layer stack pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            for layer in layers {
                layer.encode(&mut pass);
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        self.record_frame();
        Ok(())
    }

    fn record_frame(&mut self) {
        self.frames_since_report += 1;
        let elapsed = self.last_report.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_report as f32 / elapsed.as_secs_f32();
            debug!(fps = fps.round(), "render stats");
            self.frames_since_report = 0;
            self.last_report = Instant::now();
        }
    }
}
