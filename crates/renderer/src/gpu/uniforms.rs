use bytemuck::{Pod, Zeroable};

use crate::catalog::LayerDescriptor;
use crate::types::SurfaceSize;

/// CPU mirror of the `CompositeParams` block: how one layer is placed and
/// filtered when it is drawn into the shared swapchain.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct CompositeUniforms {
    /// `xy` scales clip space about the centre, `zw` translates it.
    pub transform: [f32; 4],
    pub opacity: f32,
    pub brightness: f32,
    pub _padding: [f32; 2],
}

impl CompositeUniforms {
    /// Converts the descriptor's CSS-pixel translation into clip space for `size`.
    ///
    /// Blur has no GPU equivalent here and is left to the software compositor.
    pub fn for_layer(descriptor: &LayerDescriptor, size: SurfaceSize) -> Self {
        let width = size.width.max(1) as f32;
        let height = size.height.max(1) as f32;
        let transform = &descriptor.transform;
        Self {
            transform: [
                transform.scale,
                transform.scale,
                2.0 * transform.translate[0] / width,
                -2.0 * transform.translate[1] / height,
            ],
            opacity: descriptor.opacity,
            brightness: descriptor.filter.brightness,
            _padding: [0.0; 2],
        }
    }
}
