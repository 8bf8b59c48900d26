use holoparams::{GeneratorOptions, ParameterSet};
use tracing::{info, warn};

use crate::driver::{AnimationDriver, FrameReport, LoopHandle, VisualizerState};
use crate::interaction::{InteractionAdapter, InteractionState};
use crate::runtime::{time_source_for_policy, BoxedTimeSource, SystemTimeSource};
use crate::surfaces::{LayerStatus, LayerSurface, SurfaceHost, SurfaceManager};
use crate::types::{BlendCadence, RendererConfig, SurfaceSize};

/// Construction-time settings for a [`Visualizer`].
pub struct VisualizerOptions {
    pub variant: u32,
    pub generator: GeneratorOptions,
    pub seed: Option<u64>,
    pub cadence: BlendCadence,
    pub time_source: BoxedTimeSource,
    /// Per-second decay of the pointer glow; `None` holds it until the next update.
    pub pointer_decay: Option<f32>,
    /// Keep layer rotations and the blend phase fixed between ticks.
    pub frozen: bool,
}

impl VisualizerOptions {
    /// Wall-clock animation of `variant` with entropy-seeded layers.
    pub fn new(variant: u32) -> Self {
        Self {
            variant,
            generator: GeneratorOptions::default(),
            seed: None,
            cadence: BlendCadence::default(),
            time_source: Box::new(SystemTimeSource::new()),
            pointer_decay: None,
            frozen: false,
        }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            variant: config.variant,
            generator: config.generator,
            seed: config.seed,
            cadence: config.blend_cadence,
            time_source: time_source_for_policy(&config.policy),
            pointer_decay: None,
            frozen: config.policy.is_frozen(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_source(mut self, time_source: BoxedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn with_cadence(mut self, cadence: BlendCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_pointer_decay(mut self, rate: f32) -> Self {
        self.pointer_decay = Some(rate);
        self
    }
}

/// The layered holographic visualizer bound to one host.
///
/// Owns the layer surfaces, the animation driver and the pointer state. The
/// host calls [`Visualizer::tick`] once per display refresh while
/// [`Visualizer::is_running`] holds.
pub struct Visualizer<S> {
    surfaces: SurfaceManager<S>,
    driver: AnimationDriver,
    interaction: InteractionAdapter,
    generator: GeneratorOptions,
}

impl<S: LayerSurface> Visualizer<S> {
    /// Initialises every layer on `host` and starts the animation loop.
    pub fn construct<H>(host: &mut H, options: VisualizerOptions) -> Self
    where
        H: SurfaceHost<Surface = S>,
    {
        let params = holoparams::generate_with(options.variant, options.generator);
        info!(
            variant = params.variant,
            geometry = %params.primary_geometry,
            complexity = params.complexity_level,
            "constructing visualizer"
        );

        let surfaces = SurfaceManager::initialize(host);
        if surfaces.live_count() < surfaces.slot_count() {
            warn!(
                live = surfaces.live_count(),
                total = surfaces.slot_count(),
                "visualizer running with a partial layer stack"
            );
        }

        let state = VisualizerState::new(params, options.seed);
        let mut driver = AnimationDriver::new(state, options.cadence, options.time_source)
            .with_frozen_layers(options.frozen);
        driver.start();

        let interaction = match options.pointer_decay {
            Some(rate) => InteractionAdapter::with_decay(rate),
            None => InteractionAdapter::new(),
        };

        Self {
            surfaces,
            driver,
            interaction,
            generator: options.generator,
        }
    }

    /// Resizes every layer to `bounds`.
    pub fn resize(&mut self, bounds: SurfaceSize) {
        self.surfaces.resize(bounds);
    }

    /// Re-reads the container's bounds from `host` and resizes every layer to them.
    pub fn resize_to_host<H>(&mut self, host: &H)
    where
        H: SurfaceHost<Surface = S>,
    {
        self.resize(host.bounds());
    }

    pub fn update_mouse(&mut self, x: f32, y: f32, intensity: f32) {
        self.interaction.set_pointer(x, y, intensity);
    }

    /// Moves the pointer without touching the glow intensity.
    pub fn move_mouse(&mut self, x: f32, y: f32) {
        self.interaction.move_pointer(x, y);
    }

    /// Regenerates the parameter set; takes effect on the next frame.
    pub fn set_variant(&mut self, variant: u32) {
        let params = holoparams::generate_with(variant, self.generator);
        info!(
            variant,
            geometry = %params.primary_geometry,
            complexity = params.complexity_level,
            "variant changed"
        );
        self.driver.set_params(params);
    }

    pub fn start(&mut self) -> LoopHandle {
        self.driver.start()
    }

    pub fn stop(&mut self) {
        self.driver.stop();
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn loop_handle(&self) -> LoopHandle {
        self.driver.loop_handle()
    }

    /// Advances and draws one frame. `None` once the loop has been stopped.
    pub fn tick(&mut self) -> Option<FrameReport> {
        let report = self
            .driver
            .tick(&mut self.surfaces, &self.interaction.state())?;
        self.interaction.decay(self.driver.state().clock.delta);
        Some(report)
    }

    pub fn params(&self) -> &ParameterSet {
        &self.driver.state().params
    }

    pub fn variant(&self) -> u32 {
        self.params().variant
    }

    pub fn state(&self) -> &VisualizerState {
        self.driver.state()
    }

    pub fn interaction(&self) -> InteractionState {
        self.interaction.state()
    }

    pub fn layer_status(&self, index: usize) -> Option<&LayerStatus> {
        self.surfaces.status(index)
    }

    pub fn surfaces(&self) -> &SurfaceManager<S> {
        &self.surfaces
    }

    pub(crate) fn surfaces_mut(&mut self) -> &mut SurfaceManager<S> {
        &mut self.surfaces
    }
}
