//! Frame-by-frame animation of the layer stack.
//!
//! All mutable animation state lives in [`VisualizerState`], owned by the
//! [`AnimationDriver`]. Each tick advances the clock, the blend phase and the
//! per-layer rotations, then draws every live surface in catalog order with a
//! uniform block built from that state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use holoparams::ParameterSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, trace};

use crate::catalog::LAYER_COUNT;
use crate::interaction::InteractionState;
use crate::program::UniformBlock;
use crate::runtime::BoxedTimeSource;
use crate::surfaces::{LayerSurface, SurfaceManager};
use crate::types::{BlendCadence, SurfaceSize};

/// Per-layer perturbation, seeded once at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerRuntimeState {
    /// Accumulated rotation, interpreted as radians by the program.
    pub rotation: f32,
    pub scale: f32,
    pub offset: [f32; 2],
}

impl LayerRuntimeState {
    fn perturbed<R: Rng>(rng: &mut R) -> Self {
        Self {
            rotation: rng.gen_range(0.0..360.0),
            scale: rng.gen_range(0.8..1.2),
            offset: [rng.gen_range(-0.05..0.05), rng.gen_range(-0.05..0.05)],
        }
    }

    /// Rotation added per frame at unit speed. Higher layers spin faster.
    pub fn rotation_rate(index: usize) -> f32 {
        0.5 + index as f32 * 0.1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockState {
    /// Seconds since the driver's time source started.
    pub elapsed: f32,
    /// Seconds between the last two frames.
    pub delta: f32,
    /// Frames advanced so far.
    pub frame: u64,
}

/// Everything a frame reads: parameters, per-layer state, clock and blend phase.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerState {
    pub params: ParameterSet,
    pub layers: [LayerRuntimeState; LAYER_COUNT],
    pub clock: ClockState,
    pub blend_phase: f32,
}

impl VisualizerState {
    /// Seeds the per-layer perturbation from `seed`, or from entropy when `None`.
    pub fn new(params: ParameterSet, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let layers = std::array::from_fn(|_| LayerRuntimeState::perturbed(&mut rng));
        Self {
            params,
            layers,
            clock: ClockState::default(),
            blend_phase: 0.0,
        }
    }

    /// Phase offset that desynchronises the layers' depth and brightness waves.
    pub fn layer_phase(&self, index: usize) -> f32 {
        self.params.layer_phase_shift + index as f32 * 0.5
    }

    /// Builds the uniform block for layer `index` drawn at `resolution`.
    pub fn uniforms(
        &self,
        index: usize,
        resolution: SurfaceSize,
        interaction: &InteractionState,
    ) -> UniformBlock {
        let params = &self.params;
        let layer = self.layers.get(index).copied().unwrap_or(LayerRuntimeState {
            rotation: 0.0,
            scale: 1.0,
            offset: [0.0, 0.0],
        });
        UniformBlock {
            resolution: [resolution.width as f32, resolution.height as f32],
            pointer: interaction.pointer,
            layer_offset: layer.offset,
            time: self.clock.elapsed,
            pointer_intensity: interaction.intensity,
            primary_geometry: params.primary_geometry.code(),
            secondary_geometry: params.secondary_geometry().code(),
            tertiary_geometry: params.tertiary_geometry().code(),
            geometry_blend: params.geometry_blend_rate,
            blend_phase: self.blend_phase,
            density: params.density,
            speed: params.speed,
            chaos: params.chaos,
            morph: params.morph,
            hue: params.hue,
            saturation: params.saturation,
            intensity: params.intensity,
            layer_phase: self.layer_phase(index),
            depth_complexity: params.depth_complexity,
            hologram_intensity: params.hologram_intensity,
            layer_rotation: layer.rotation,
            layer_scale: layer.scale,
            color_harmonic1: params.color_harmonic1,
            color_harmonic2: params.color_harmonic2,
            color_harmonic3: params.color_harmonic3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

/// Cancellation token for a running loop. Clones share the flag, so a host
/// can hand one to another component and stop the loop from there.
#[derive(Debug, Clone, Default)]
pub struct LoopHandle {
    cancelled: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Outcome of drawing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub drawn: usize,
    /// Live surfaces whose draw failed this frame; they are retried next frame.
    pub skipped: usize,
}

pub struct AnimationDriver {
    state: VisualizerState,
    cadence: BlendCadence,
    time_source: BoxedTimeSource,
    status: DriverState,
    handle: LoopHandle,
    frozen: bool,
}

impl AnimationDriver {
    /// Creates a stopped driver.
    pub fn new(state: VisualizerState, cadence: BlendCadence, time_source: BoxedTimeSource) -> Self {
        Self {
            state,
            cadence,
            time_source,
            status: DriverState::Stopped,
            handle: LoopHandle::default(),
            frozen: false,
        }
    }

    /// Holds layer rotations and the blend phase still across ticks, so a
    /// frozen frame redraws identically after a resize or a variant change.
    pub fn with_frozen_layers(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    /// Enters `Running` and returns the token that stops this run.
    pub fn start(&mut self) -> LoopHandle {
        if !self.is_running() {
            self.handle = LoopHandle::default();
            self.status = DriverState::Running;
            info!(variant = self.state.params.variant, "animation loop started");
        }
        self.handle.clone()
    }

    pub fn stop(&mut self) {
        self.handle.cancel();
        if self.status == DriverState::Running {
            info!(frame = self.state.clock.frame, "animation loop stopped");
        }
        self.status = DriverState::Stopped;
    }

    /// Whether the host should schedule another tick.
    pub fn is_running(&self) -> bool {
        self.status == DriverState::Running && !self.handle.is_cancelled()
    }

    pub fn status(&self) -> DriverState {
        if self.is_running() {
            DriverState::Running
        } else {
            DriverState::Stopped
        }
    }

    pub fn loop_handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> &VisualizerState {
        &self.state
    }

    /// Swaps the parameter set; rotations, offsets, scales and the clock carry over.
    pub fn set_params(&mut self, params: ParameterSet) {
        self.state.params = params;
    }

    /// Advances clock, blend phase and per-layer rotation by one frame.
    /// A frozen driver only advances the clock.
    pub fn advance(&mut self) -> ClockState {
        let sample = self.time_source.sample();
        let previous = self.state.clock;
        let delta = (sample.seconds - previous.elapsed).max(0.0);
        self.state.clock = ClockState {
            elapsed: sample.seconds,
            delta,
            frame: previous.frame.saturating_add(1),
        };
        if self.frozen {
            return self.state.clock;
        }
        self.state.blend_phase += self.cadence.step(delta);

        let speed = self.state.params.speed;
        for (index, layer) in self.state.layers.iter_mut().enumerate() {
            layer.rotation += LayerRuntimeState::rotation_rate(index) * speed;
        }
        self.state.clock
    }

    /// Draws every live surface once, bottom to top.
    pub fn draw<S: LayerSurface>(
        &self,
        surfaces: &mut SurfaceManager<S>,
        interaction: &InteractionState,
    ) -> FrameReport {
        let mut report = FrameReport {
            frame: self.state.clock.frame,
            drawn: 0,
            skipped: 0,
        };
        for (index, descriptor, surface) in surfaces.live_mut() {
            let uniforms = self.state.uniforms(index, surface.size(), interaction);
            match surface.draw(&uniforms) {
                Ok(()) => report.drawn += 1,
                Err(err) => {
                    trace!(layer = descriptor.name, error = %err, "layer draw skipped");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// One complete frame. Returns `None` once the loop has been stopped.
    pub fn tick<S: LayerSurface>(
        &mut self,
        surfaces: &mut SurfaceManager<S>,
        interaction: &InteractionState,
    ) -> Option<FrameReport> {
        if !self.is_running() {
            self.status = DriverState::Stopped;
            return None;
        }
        self.advance();
        Some(self.draw(surfaces, interaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LayerDescriptor;
    use crate::runtime::{FixedTimeSource, SteppedTimeSource};
    use crate::surfaces::{DrawError, SurfaceError, SurfaceHost};

    #[derive(Default)]
    struct CountingSurface {
        size: SurfaceSize,
        draws: Vec<UniformBlock>,
        fail: bool,
    }

    impl LayerSurface for CountingSurface {
        fn size(&self) -> SurfaceSize {
            self.size
        }

        fn resize(&mut self, size: SurfaceSize) {
            self.size = size;
        }

        fn draw(&mut self, uniforms: &UniformBlock) -> Result<(), DrawError> {
            if self.fail {
                return Err(DrawError::NoProgram);
            }
            self.draws.push(*uniforms);
            Ok(())
        }
    }

    struct CountingHost;

    impl SurfaceHost for CountingHost {
        type Surface = CountingSurface;

        fn bounds(&self) -> SurfaceSize {
            SurfaceSize::new(40, 20)
        }

        fn create_surface(
            &mut self,
            index: usize,
            _descriptor: &'static LayerDescriptor,
        ) -> Result<Self::Surface, SurfaceError> {
            Ok(CountingSurface {
                fail: index == 4,
                ..CountingSurface::default()
            })
        }
    }

    fn driver(variant: u32, cadence: BlendCadence, step: f32) -> AnimationDriver {
        let state = VisualizerState::new(holoparams::generate(variant), Some(7));
        AnimationDriver::new(state, cadence, Box::new(SteppedTimeSource::new(0.0, step)))
    }

    #[test]
    fn seeded_layers_are_reproducible_and_in_range() {
        let first = VisualizerState::new(holoparams::generate(1), Some(42));
        let second = VisualizerState::new(holoparams::generate(1), Some(42));
        assert_eq!(first.layers, second.layers);
        for layer in first.layers {
            assert!((0.0..360.0).contains(&layer.rotation));
            assert!((0.8..1.2).contains(&layer.scale));
            assert!(layer.offset.iter().all(|o| (-0.05..0.05).contains(o)));
        }
    }

    #[test]
    fn rotation_advances_faster_for_higher_layers() {
        let mut driver = driver(9, BlendCadence::PerFrame, 0.016);
        let before = driver.state().layers;
        driver.advance();
        let speed = driver.state().params.speed;
        for (index, (old, new)) in before.iter().zip(driver.state().layers.iter()).enumerate() {
            let expected = (0.5 + index as f32 * 0.1) * speed;
            assert!((new.rotation - old.rotation - expected).abs() < 1e-3);
            assert_eq!(new.scale, old.scale);
            assert_eq!(new.offset, old.offset);
        }
    }

    #[test]
    fn rotation_is_non_decreasing_across_frames() {
        let mut driver = driver(3, BlendCadence::default(), 0.016);
        let mut previous = driver.state().layers;
        for _ in 0..32 {
            driver.advance();
            let current = driver.state().layers;
            for (old, new) in previous.iter().zip(current.iter()) {
                assert!(new.rotation >= old.rotation);
            }
            previous = current;
        }
    }

    #[test]
    fn elapsed_cadence_follows_time_not_frames() {
        let mut driver = driver(0, BlendCadence::Elapsed { rate: 0.5 }, 0.5);
        for _ in 0..3 {
            driver.advance();
        }
        // Samples at 0.0, 0.5, 1.0 seconds.
        assert!((driver.state().blend_phase - 0.5).abs() < 1e-6);
        assert!((driver.state().clock.delta - 0.5).abs() < 1e-6);
        assert_eq!(driver.state().clock.frame, 3);
    }

    #[test]
    fn per_frame_cadence_counts_frames() {
        let mut driver = driver(0, BlendCadence::PerFrame, 10.0);
        for _ in 0..3 {
            driver.advance();
        }
        assert!((driver.state().blend_phase - 0.03).abs() < 1e-6);
    }

    #[test]
    fn tick_draws_live_layers_and_tolerates_failures() {
        let mut surfaces = SurfaceManager::initialize(&mut CountingHost);
        let mut driver = driver(2, BlendCadence::default(), 0.1);
        driver.start();
        let report = driver
            .tick(&mut surfaces, &InteractionState::default())
            .expect("running");
        assert_eq!(report.drawn, LAYER_COUNT - 1);
        assert_eq!(report.skipped, 1);

        let report = driver
            .tick(&mut surfaces, &InteractionState::default())
            .expect("running");
        assert_eq!(report.frame, 2);
        assert_eq!(report.skipped, 1);

        let base = surfaces.surface(0).expect("layer 0");
        assert_eq!(base.draws.len(), 2);
        assert_eq!(base.draws[1].resolution, [40.0, 20.0]);
        let top = surfaces.surface(9).expect("layer 9");
        let params = driver.state().params;
        assert!((top.draws[0].layer_phase - (params.layer_phase_shift + 4.5)).abs() < 1e-5);
    }

    #[test]
    fn stopped_driver_does_not_tick() {
        let mut surfaces = SurfaceManager::initialize(&mut CountingHost);
        let mut driver = AnimationDriver::new(
            VisualizerState::new(holoparams::generate(0), Some(1)),
            BlendCadence::default(),
            Box::new(FixedTimeSource::new(1.0)),
        );
        assert_eq!(driver.status(), DriverState::Stopped);
        assert!(driver.tick(&mut surfaces, &InteractionState::default()).is_none());

        let handle = driver.start();
        assert!(driver.tick(&mut surfaces, &InteractionState::default()).is_some());
        handle.cancel();
        assert!(!driver.is_running());
        assert!(driver.tick(&mut surfaces, &InteractionState::default()).is_none());
        assert_eq!(driver.status(), DriverState::Stopped);

        let restarted = driver.start();
        assert!(!restarted.is_cancelled());
        assert!(driver.tick(&mut surfaces, &InteractionState::default()).is_some());
        assert_eq!(driver.state().clock.frame, 2);
    }

    #[test]
    fn frozen_driver_holds_rotation_and_blend_phase() {
        let state = VisualizerState::new(holoparams::generate(6), Some(7));
        let seeded = state.layers;
        let mut driver = AnimationDriver::new(
            state,
            BlendCadence::PerFrame,
            Box::new(FixedTimeSource::new(2.0)),
        )
        .with_frozen_layers(true);
        let mut surfaces = SurfaceManager::initialize(&mut CountingHost);
        driver.start();
        for _ in 0..3 {
            driver
                .tick(&mut surfaces, &InteractionState::default())
                .expect("running");
        }
        assert_eq!(driver.state().layers, seeded);
        assert_eq!(driver.state().blend_phase, 0.0);
        assert_eq!(driver.state().clock.frame, 3);
        assert_eq!(driver.state().clock.elapsed, 2.0);

        let base = surfaces.surface(0).expect("layer 0");
        assert_eq!(base.draws[0], base.draws[2]);
    }

    #[test]
    fn changing_params_keeps_layer_state() {
        let mut driver = driver(1, BlendCadence::default(), 0.1);
        driver.advance();
        let layers = driver.state().layers;
        let clock = driver.state().clock;
        driver.set_params(holoparams::generate(33));
        assert_eq!(driver.state().layers, layers);
        assert_eq!(driver.state().clock, clock);
        assert_eq!(driver.state().params.variant, 33);
    }
}
