//! Deterministic parameter generation for the holographic layer stack.
//!
//! A variant is an unbounded integer seed. `variant % 8` selects the primary
//! geometry while `variant / 8` is the complexity tier, which scales density,
//! speed, chaos and the other intensity-like parameters linearly and without a
//! ceiling. Hue and the three colour harmonics are spread with non-integer
//! multipliers so neighbouring variants land far apart on the colour wheel.
//!
//! Very large variants therefore produce numerically extreme parameters. That
//! is the intended "variant tier" behaviour; callers who want a ceiling opt in
//! through [`GeneratorOptions::max_complexity`].

mod geometry;

pub use geometry::{GeometryKind, GEOMETRY_COUNT};

use serde::Serialize;

const HUE_MULTIPLIER: f64 = 15.5;
const HARMONIC_MULTIPLIERS: [f64; 3] = [25.3, 37.7, 43.1];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Knobs that alter generation without touching the variant mapping itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Upper bound applied to the complexity tier. `None` keeps growth unbounded.
    pub max_complexity: Option<u32>,
}

/// Full configuration derived from a single variant.
///
/// Immutable once generated; a variant change produces a fresh set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSet {
    pub variant: u32,
    pub primary_geometry: GeometryKind,
    pub complexity_level: u32,
    pub density: f32,
    pub speed: f32,
    pub chaos: f32,
    pub morph: f32,
    /// Degrees in `[0, 360)`.
    pub hue: f32,
    pub saturation: f32,
    pub intensity: f32,
    pub geometry_blend_rate: f32,
    pub layer_separation: f32,
    pub depth_complexity: f32,
    pub hologram_intensity: f32,
    pub multi_geometry_mix: f32,
    pub color_harmonic1: f32,
    pub color_harmonic2: f32,
    pub color_harmonic3: f32,
    pub layer_phase_shift: f32,
    pub layer_frequency: f32,
    pub layer_amplitude: f32,
}

impl ParameterSet {
    pub fn secondary_geometry(&self) -> GeometryKind {
        self.primary_geometry.secondary()
    }

    pub fn tertiary_geometry(&self) -> GeometryKind {
        self.primary_geometry.tertiary()
    }
}

/// Complexity tier for a variant: `floor(variant / 8)`.
pub fn complexity_level(variant: u32) -> u32 {
    variant / GEOMETRY_COUNT
}

/// Generates the parameter set for `variant` with unbounded complexity.
pub fn generate(variant: u32) -> ParameterSet {
    generate_with(variant, GeneratorOptions::default())
}

/// Generates the parameter set for `variant` honouring `options`.
pub fn generate_with(variant: u32, options: GeneratorOptions) -> ParameterSet {
    let level = match options.max_complexity {
        Some(max) => complexity_level(variant).min(max),
        None => complexity_level(variant),
    };
    let tier = f64::from(level);
    let seed = f64::from(variant);
    let scaled = |base: f64, step: f64| (base + tier * step) as f32;

    ParameterSet {
        variant,
        primary_geometry: GeometryKind::from_variant(variant),
        complexity_level: level,
        density: scaled(1.0, 0.3),
        speed: scaled(0.5, 0.2),
        chaos: scaled(0.0, 0.15),
        morph: scaled(0.0, 0.25),
        hue: wheel_angle(seed, HUE_MULTIPLIER),
        saturation: scaled(0.7, 0.1),
        intensity: scaled(0.6, 0.15),
        geometry_blend_rate: scaled(0.3, 0.2),
        layer_separation: scaled(0.8, 0.1),
        depth_complexity: scaled(1.5, 0.5),
        hologram_intensity: scaled(0.7, 0.2),
        multi_geometry_mix: scaled(0.4, 0.3),
        color_harmonic1: wheel_angle(seed, HARMONIC_MULTIPLIERS[0]),
        color_harmonic2: wheel_angle(seed, HARMONIC_MULTIPLIERS[1]),
        color_harmonic3: wheel_angle(seed, HARMONIC_MULTIPLIERS[2]),
        layer_phase_shift: (seed * 0.1) as f32,
        layer_frequency: (1.0 + f64::from(variant % 3) * 0.5) as f32,
        layer_amplitude: (0.3 + f64::from(variant % 4) * 0.2) as f32,
    }
}

fn wheel_angle(seed: f64, multiplier: f64) -> f32 {
    let angle = ((seed * multiplier) % 360.0) as f32;
    // Narrowing to f32 can round 359.99999.. up to exactly 360.
    if angle >= 360.0 {
        0.0
    } else {
        angle
    }
}

/// Parses a variant from user input, rejecting negative or fractional values.
pub fn parse_variant(raw: &str) -> Result<u32, VariantError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VariantError::InvalidArgument(
            "variant must not be empty".into(),
        ));
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return variant_from_i64(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) => variant_from_f64(value),
        Err(_) => Err(VariantError::InvalidArgument(format!(
            "variant '{trimmed}' is not a number"
        ))),
    }
}

/// Validates an integer coming from a loosely typed source (config, IPC).
pub fn variant_from_i64(value: i64) -> Result<u32, VariantError> {
    if value < 0 {
        return Err(VariantError::InvalidArgument(format!(
            "variant must be non-negative, got {value}"
        )));
    }
    u32::try_from(value).map_err(|_| {
        VariantError::InvalidArgument(format!(
            "variant {value} exceeds the supported maximum {}",
            u32::MAX
        ))
    })
}

/// Validates a float that is expected to carry an integral variant.
pub fn variant_from_f64(value: f64) -> Result<u32, VariantError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(VariantError::InvalidArgument(format!(
            "variant must be an integer, got {value}"
        )));
    }
    if value < 0.0 {
        return Err(VariantError::InvalidArgument(format!(
            "variant must be non-negative, got {value}"
        )));
    }
    if value > f64::from(u32::MAX) {
        return Err(VariantError::InvalidArgument(format!(
            "variant {value} exceeds the supported maximum {}",
            u32::MAX
        )));
    }
    Ok(value as u32)
}
