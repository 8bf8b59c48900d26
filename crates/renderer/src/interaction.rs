/// Pointer state read by every layer on the next frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState {
    /// Surface-normalised position, origin bottom-left. Values outside
    /// `[0, 1]` are legal and put the glow off-frame.
    pub pointer: [f32; 2],
    /// Glow strength; zero disables the pointer term entirely.
    pub intensity: f32,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            pointer: [0.5, 0.5],
            intensity: 0.0,
        }
    }
}

/// Writes pointer input into [`InteractionState`].
///
/// Hosts either set the intensity explicitly on every event or configure a
/// decay rate so a released press fades out over time.
#[derive(Debug, Clone, Default)]
pub struct InteractionAdapter {
    state: InteractionState,
    decay_per_second: Option<f32>,
}

impl InteractionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intensity falls by `exp(-rate * dt)` on every [`InteractionAdapter::decay`].
    pub fn with_decay(rate: f32) -> Self {
        Self {
            state: InteractionState::default(),
            decay_per_second: Some(rate.max(0.0)),
        }
    }

    pub fn set_pointer(&mut self, x: f32, y: f32, intensity: f32) {
        self.state = InteractionState {
            pointer: [x, y],
            intensity,
        };
    }

    /// Moves the pointer while keeping the current intensity.
    pub fn move_pointer(&mut self, x: f32, y: f32) {
        self.state.pointer = [x, y];
    }

    pub fn decay(&mut self, delta_seconds: f32) {
        if let Some(rate) = self.decay_per_second {
            self.state.intensity *= (-rate * delta_seconds.max(0.0)).exp();
            if self.state.intensity < 1e-3 {
                self.state.intensity = 0.0;
            }
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }
}
