use crate::runtime::RenderPolicy;
use holoparams::GeneratorOptions;

/// Pixel dimensions of a layer surface or of the host container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero; such surfaces are kept but never rasterised.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl From<(u32, u32)> for SurfaceSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl std::fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the blend phase that offsets the geometry morph advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendCadence {
    /// Advance by `rate * delta_seconds`, independent of frame rate.
    Elapsed { rate: f32 },
    /// Advance by a constant 0.01 per frame, so faster displays morph faster.
    PerFrame,
}

impl BlendCadence {
    pub const PER_FRAME_STEP: f32 = 0.01;
    pub const DEFAULT_RATE: f32 = 0.6;

    /// Phase increment for a frame that lasted `delta_seconds`.
    pub fn step(&self, delta_seconds: f32) -> f32 {
        match self {
            BlendCadence::Elapsed { rate } => rate * delta_seconds.max(0.0),
            BlendCadence::PerFrame => Self::PER_FRAME_STEP,
        }
    }
}

impl Default for BlendCadence {
    fn default() -> Self {
        Self::Elapsed {
            rate: Self::DEFAULT_RATE,
        }
    }
}

/// Output color handling for the GPU preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain, matching how the layer colours were tuned.
    #[default]
    Auto,
    /// Treat program outputs as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat program outputs as linear and let an sRGB swapchain convert.
    Linear,
}

/// Anti-aliasing policy for the GPU preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors the CLI and config file: which variant to open with, how the
/// layer state is seeded, and which presentation path to take.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or export size in physical pixels.
    pub surface_size: (u32, u32),
    /// Variant the visualizer opens with.
    pub variant: u32,
    /// Parameter generation knobs (complexity ceiling).
    pub generator: GeneratorOptions,
    /// Seed for the per-layer rotation/scale/offset perturbation. `None` draws from entropy.
    pub seed: Option<u64>,
    pub blend_cadence: BlendCadence,
    pub antialiasing: Antialiasing,
    pub color_space: ColorSpaceMode,
    /// High-level render behaviour requested by the caller.
    pub policy: RenderPolicy,
}

impl Default for RendererConfig {
    /// A 1280x720 animated preview of variant 0.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            variant: 0,
            generator: GeneratorOptions::default(),
            seed: None,
            blend_cadence: BlendCadence::default(),
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            policy: RenderPolicy::default(),
        }
    }
}
