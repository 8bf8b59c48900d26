//! GPU presentation of the layer stack.
//!
//! - `context` owns the wgpu instance/device/surface wiring and rebuilds the
//!   swapchain when the window resizes.
//! - `pipeline` compiles the layer program once and caches one render
//!   pipeline per blend mode.
//! - `uniforms` converts a layer's transform, opacity and brightness into the
//!   composite block read by the vertex and fragment stages.
//! - `state` implements the surface host over those pieces and draws every
//!   live layer into the swapchain in catalog order.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use context::GpuContext;
pub(crate) use state::{GpuHost, GpuLayerSurface, GpuState};
