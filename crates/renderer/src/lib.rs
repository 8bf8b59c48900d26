//! Renderer crate for holoshade, a ten-layer holographic SDF visualizer.
//!
//! A variant number expands into a [`holoparams::ParameterSet`]; the same
//! layer program is then evaluated on ten stacked surfaces, each with its own
//! per-layer uniforms, opacity, blend mode, transform and filter. The flow is:
//!
//! ```text
//!   CLI / holoshade
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ Visualizer ──▶ AnimationDriver::tick ──▶ LayerSurface::draw (x10)
//!          │                ▲
//!          │                └── InteractionAdapter (pointer glow)
//!          ├─▶ window::run   (wgpu surfaces, one pipeline per blend mode)
//!          └─▶ software      (CPU surfaces, PNG export)
//! ```
//!
//! Surfaces live behind the [`SurfaceHost`]/[`LayerSurface`] traits so the
//! layer manager and the animation driver run unchanged against the GPU window
//! and the software compositor.

mod catalog;
mod compile;
mod driver;
mod gpu;
mod interaction;
mod program;
mod runtime;
mod software;
mod surfaces;
mod types;
mod visualizer;
mod window;

use anyhow::Result;
use tracing::info;

pub use catalog::{
    find as find_layer, layer_at, layers, BlendMode, LayerDescriptor, LayerFilter,
    LayerTransform, LAYER_COUNT,
};
pub use driver::{
    AnimationDriver, ClockState, DriverState, FrameReport, LayerRuntimeState, LoopHandle,
    VisualizerState,
};
pub use interaction::{InteractionAdapter, InteractionState};
pub use program::{distance, hsv_to_rgb, pixel_uv, shade, UniformBlock};
pub use runtime::{
    time_source_for_policy, BoxedTimeSource, FixedTimeSource, FrameScheduler, RenderPolicy,
    SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource,
};
pub use software::{composite, export_png, export_still, SoftwareHost, SoftwareSurface};
pub use surfaces::{
    DrawError, LayerStatus, LayerSurface, SurfaceError, SurfaceHost, SurfaceManager,
};
pub use types::{Antialiasing, BlendCadence, ColorSpaceMode, RendererConfig, SurfaceSize};
pub use visualizer::{Visualizer, VisualizerOptions};

/// Entry point that picks the preview window or the off-screen exporter.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Runs until the window closes, or until the still frame is written.
    pub fn run(&mut self) -> Result<()> {
        match &self.config.policy {
            RenderPolicy::Export { time, path } => {
                info!(path = %path.display(), time, "exporting still frame");
                export_still(&self.config, *time, path)
            }
            RenderPolicy::Animate { .. } | RenderPolicy::Still { .. } => {
                window::run(self.config.clone())
            }
        }
    }
}
