//! The layer program: one uniform block in, one straight-alpha colour out.
//!
//! The GPU evaluates the GLSL in [`crate::compile`]; this module holds the
//! uniform block shared with it and a CPU evaluation of the same maths that
//! the software host rasterises with. Both paths must stay in lock-step, so
//! any change to a distance function or the colour model lands in both.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use holoparams::GeometryKind;

use crate::types::SurfaceSize;

/// Smallest radius the fractal treats as non-zero before dividing by it.
const MIN_RADIUS: f32 = 1e-6;
const FRACTAL_POWER: f32 = 8.0;
const FRACTAL_ITERATIONS: usize = 8;
const FRACTAL_BAILOUT: f32 = 2.0;

/// CPU mirror of the `HoloParams` std140 block in the layer program.
///
/// Field order follows std140 packing: the three vec2 members first so every
/// scalar that follows stays 4-byte aligned without padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub resolution: [f32; 2],
    /// Pointer in surface uv space (origin bottom-left).
    pub pointer: [f32; 2],
    pub layer_offset: [f32; 2],
    pub time: f32,
    pub pointer_intensity: f32,
    pub primary_geometry: u32,
    pub secondary_geometry: u32,
    pub tertiary_geometry: u32,
    /// Angular rate of the primary/secondary/tertiary blend.
    pub geometry_blend: f32,
    /// Accumulated blend phase added to the blend angle.
    pub blend_phase: f32,
    pub density: f32,
    pub speed: f32,
    pub chaos: f32,
    pub morph: f32,
    pub hue: f32,
    pub saturation: f32,
    pub intensity: f32,
    pub layer_phase: f32,
    pub depth_complexity: f32,
    pub hologram_intensity: f32,
    pub layer_rotation: f32,
    pub layer_scale: f32,
    pub color_harmonic1: f32,
    pub color_harmonic2: f32,
    pub color_harmonic3: f32,
}

impl UniformBlock {
    fn geometry(code: u32) -> GeometryKind {
        GeometryKind::from_index(code)
    }

    /// Scale shared by every distance function for this layer.
    pub fn geometry_scale(&self) -> f32 {
        self.density * self.layer_scale
    }

    /// Weight used to mix the secondary and tertiary distances in.
    pub fn blend_factor(&self) -> f32 {
        (self.time * self.geometry_blend + self.blend_phase).sin() * 0.5 + 0.5
    }

    /// Per-layer brightness wave in `[0.6, 1.0]`.
    fn layer_modulation(&self) -> f32 {
        (self.layer_phase * 3.0 + self.time).sin() * 0.2 + 0.8
    }
}

pub fn sd_tetrahedron(p: Vec3, scale: f32) -> f32 {
    let n = 1.0 / 3.0_f32.sqrt();
    let d1 = p.dot(Vec3::new(1.0, 1.0, 1.0) * n) - scale;
    let d2 = p.dot(Vec3::new(-1.0, -1.0, 1.0) * n) - scale;
    let d3 = p.dot(Vec3::new(-1.0, 1.0, -1.0) * n) - scale;
    let d4 = p.dot(Vec3::new(1.0, -1.0, -1.0) * n) - scale;
    d1.max(d2).max(d3.max(d4))
}

fn sd_box(p: Vec3, half_extent: f32) -> f32 {
    let d = p.abs() - Vec3::splat(half_extent);
    d.x.max(d.y.max(d.z)).min(0.0) + d.max(Vec3::ZERO).length()
}

pub fn sd_hypercube(p: Vec3, scale: f32) -> f32 {
    sd_box(p, scale)
}

pub fn sd_sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

pub fn sd_torus(p: Vec3, major: f32, minor: f32) -> f32 {
    let q = Vec2::new(Vec2::new(p.x, p.z).length() - major, p.y);
    q.length() - minor
}

pub fn sd_klein_bottle(p: Vec3, scale: f32) -> f32 {
    let angle = p.y.atan2(p.x);
    let ripple = (angle * 2.0).sin() * 0.3;
    let q = Vec2::new(Vec2::new(p.x, p.y).length() - scale - ripple, p.z);
    q.length() - 0.2 * scale
}

/// Power-8 mandelbulb estimate. `scale` is accepted for a uniform signature
/// but the bulb is always evaluated at unit size.
pub fn sd_fractal(p: Vec3, _scale: f32) -> f32 {
    let mut z = p;
    let mut dr = 1.0_f32;
    let mut r = 0.0_f32;
    for _ in 0..FRACTAL_ITERATIONS {
        r = z.length();
        if r > FRACTAL_BAILOUT {
            break;
        }
        let safe_r = r.max(MIN_RADIUS);
        let theta = (z.z / safe_r).clamp(-1.0, 1.0).acos() * FRACTAL_POWER;
        let phi = z.y.atan2(z.x) * FRACTAL_POWER;
        dr = safe_r.powf(FRACTAL_POWER - 1.0) * FRACTAL_POWER * dr + 1.0;
        let zr = safe_r.powf(FRACTAL_POWER);
        z = zr * Vec3::new(theta.sin() * phi.cos(), phi.sin() * theta.sin(), theta.cos()) + p;
    }
    let safe_r = r.max(MIN_RADIUS);
    0.5 * safe_r.ln() * safe_r / dr
}

pub fn sd_wave(p: Vec3, scale: f32, time: f32) -> f32 {
    let wave1 = (p.x * 3.0 + time).sin() * 0.3;
    let wave2 = (p.z * 4.0 + time * 1.3).sin() * 0.2;
    (p.y - wave1 - wave2).abs() - 0.1 * scale
}

pub fn sd_crystal(p: Vec3, scale: f32) -> f32 {
    // Floor-based modulo so negative coordinates tile the same way as positive ones.
    let cell = p - 2.0 * (p / 2.0).floor();
    sd_box(cell - Vec3::ONE, scale * 0.3)
}

/// Distance to `kind` at `p`.
pub fn distance(kind: GeometryKind, p: Vec3, scale: f32, time: f32) -> f32 {
    match kind {
        GeometryKind::Tetrahedron => sd_tetrahedron(p, scale),
        GeometryKind::Hypercube => sd_hypercube(p, scale),
        GeometryKind::Sphere => sd_sphere(p, scale),
        GeometryKind::Torus => sd_torus(p, scale, scale * 0.3),
        GeometryKind::KleinBottle => sd_klein_bottle(p, scale),
        GeometryKind::Fractal => sd_fractal(p, scale),
        GeometryKind::Wave => sd_wave(p, scale, time),
        GeometryKind::Crystal => sd_crystal(p, scale),
    }
}

fn fract(x: Vec3) -> Vec3 {
    x - x.floor()
}

/// HSV (all components in `[0, 1]` turns) to RGB.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Vec3 {
    let k = Vec3::new(1.0, 2.0 / 3.0, 1.0 / 3.0);
    let p = (fract(Vec3::splat(hue) + k) * 6.0 - Vec3::splat(3.0)).abs();
    value * Vec3::ONE.lerp((p - Vec3::ONE).clamp(Vec3::ZERO, Vec3::ONE), saturation)
}

fn holographic_color(u: &UniformBlock, pos: Vec3) -> Vec3 {
    let t = u.time;
    let hue1 = u.hue + (t * 0.5).sin() * 30.0;
    let hue2 = u.color_harmonic1 + (t * 0.7).cos() * 25.0;
    let hue3 = u.color_harmonic2 + (t * 0.3).sin() * 20.0;

    let color1 = hsv_to_rgb(hue1 / 360.0, u.saturation, u.intensity);
    let color2 = hsv_to_rgb(hue2 / 360.0, u.saturation * 0.8, u.intensity * 1.2);
    let color3 = hsv_to_rgb(hue3 / 360.0, u.saturation * 1.1, u.intensity * 0.9);

    let mixer1 = (pos.x * 5.0 + t).sin() * 0.5 + 0.5;
    let mixer2 = (pos.y * 4.0 + t * 1.3).cos() * 0.5 + 0.5;

    color1.lerp(color2, mixer1).lerp(color3, mixer2 * 0.3)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Sample position for `uv`: aspect-corrected, rotated, offset, then lifted
/// to a depth that oscillates with time.
fn layer_position(u: &UniformBlock, uv: Vec2) -> Vec3 {
    let aspect = if u.resolution[1] > 0.0 {
        u.resolution[0] / u.resolution[1]
    } else {
        1.0
    };
    let mut p = (uv - Vec2::splat(0.5)) * 2.0;
    p.x *= aspect;

    let (s, c) = (u.layer_rotation + u.time * u.speed * 0.1).sin_cos();
    // Column-major mat2(c, -s, s, c) applied to p.
    p = Vec2::new(c * p.x + s * p.y, -s * p.x + c * p.y);
    p += Vec2::from(u.layer_offset);

    let depth = (u.time * u.speed + u.layer_phase).sin() * u.depth_complexity;
    Vec3::new(p.x, p.y, depth)
}

/// Primary distance morphed toward the secondary (at most 60%) and then the
/// tertiary (at most 30%) geometry.
fn blended_distance(u: &UniformBlock, pos: Vec3) -> f32 {
    let scale = u.geometry_scale();
    let d1 = distance(UniformBlock::geometry(u.primary_geometry), pos, scale, u.time);
    let d2 = distance(UniformBlock::geometry(u.secondary_geometry), pos * 1.2, scale, u.time);
    let d3 = distance(UniformBlock::geometry(u.tertiary_geometry), pos * 0.8, scale, u.time);

    let blend = u.blend_factor();
    let d = lerp(d1, d2, blend * 0.6);
    lerp(d, d3, blend * 0.3)
}

/// Evaluates the program at `uv` (surface-normalised, origin bottom-left).
///
/// Returns straight (non-premultiplied) RGBA. Alpha is `intensity * 0.8` and
/// is not clamped; the compositor clamps when it stacks the layer.
pub fn shade(u: &UniformBlock, uv: Vec2) -> [f32; 4] {
    let pos = layer_position(u, uv);
    let mut d = blended_distance(u, pos);
    d += (pos.x * 10.0 + u.time * 2.0).sin() * u.chaos * 0.1;
    d += (pos.y * 8.0 + u.time * 1.5).cos() * u.morph * 0.15;

    let mut intensity = (1.0 / (1.0 + d.abs() * 20.0)).powi(2);
    if u.pointer_intensity > 0.0 {
        let pointer_distance = (Vec2::from(u.pointer) - uv).length();
        intensity += u.pointer_intensity * (-pointer_distance * 5.0).exp() * 0.5;
    }

    let color =
        holographic_color(u, pos) * intensity * u.hologram_intensity * u.layer_modulation();
    [color.x, color.y, color.z, intensity * 0.8]
}

/// Pixel-centre uv for row-major pixel `(x, y)` with row 0 at the top.
pub fn pixel_uv(x: u32, y: u32, size: SurfaceSize) -> Vec2 {
    let width = size.width.max(1) as f32;
    let height = size.height.max(1) as f32;
    Vec2::new(
        (x as f32 + 0.5) / width,
        1.0 - (y as f32 + 0.5) / height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_6};
    use std::mem::{align_of, offset_of, size_of};

    fn sample_block() -> UniformBlock {
        let params = holoparams::generate(3);
        UniformBlock {
            resolution: [64.0, 48.0],
            pointer: [0.5, 0.5],
            time: 1.25,
            primary_geometry: params.primary_geometry.code(),
            secondary_geometry: params.secondary_geometry().code(),
            tertiary_geometry: params.tertiary_geometry().code(),
            geometry_blend: params.geometry_blend_rate,
            density: params.density,
            speed: params.speed,
            chaos: params.chaos,
            morph: params.morph,
            hue: params.hue,
            saturation: params.saturation,
            intensity: params.intensity,
            layer_phase: params.layer_phase_shift,
            depth_complexity: params.depth_complexity,
            hologram_intensity: params.hologram_intensity,
            layer_scale: 1.0,
            color_harmonic1: params.color_harmonic1,
            color_harmonic2: params.color_harmonic2,
            color_harmonic3: params.color_harmonic3,
            ..UniformBlock::default()
        }
    }

    /// Three spheres of radius 0.25 at full blend, everything time-driven parked.
    fn sphere_block() -> UniformBlock {
        let sphere = GeometryKind::Sphere.code();
        UniformBlock {
            resolution: [100.0, 100.0],
            primary_geometry: sphere,
            secondary_geometry: sphere,
            tertiary_geometry: sphere,
            blend_phase: FRAC_PI_2,
            density: 1.0,
            layer_scale: 0.25,
            saturation: 1.0,
            intensity: 1.0,
            hologram_intensity: 1.0,
            ..UniformBlock::default()
        }
    }

    /// The GLSL block relies on this exact packing.
    #[test]
    fn uniform_block_follows_std140_layout() {
        assert_eq!(size_of::<UniformBlock>(), 112);
        assert_eq!(align_of::<UniformBlock>(), 4);
        assert_eq!(offset_of!(UniformBlock, pointer), 8);
        assert_eq!(offset_of!(UniformBlock, layer_offset), 16);
        assert_eq!(offset_of!(UniformBlock, time), 24);
        assert_eq!(offset_of!(UniformBlock, primary_geometry), 32);
        assert_eq!(offset_of!(UniformBlock, blend_phase), 48);
        assert_eq!(offset_of!(UniformBlock, layer_rotation), 92);
        assert_eq!(offset_of!(UniformBlock, color_harmonic3), 108);
    }

    #[test]
    fn distance_functions_have_expected_signs() {
        let origin = Vec3::ZERO;
        assert!(sd_sphere(origin, 1.0) < 0.0);
        assert!((sd_sphere(Vec3::new(2.0, 0.0, 0.0), 1.0) - 1.0).abs() < 1e-6);
        assert!(sd_hypercube(origin, 0.5) < 0.0);
        assert!((sd_hypercube(Vec3::new(1.5, 0.0, 0.0), 0.5) - 1.0).abs() < 1e-6);
        assert!(sd_tetrahedron(origin, 1.0) < 0.0);
        assert!(sd_tetrahedron(Vec3::splat(5.0), 1.0) > 0.0);
        assert!((sd_torus(Vec3::new(1.0, 0.0, 0.0), 1.0, 0.3) + 0.3).abs() < 1e-6);
        assert!(sd_wave(Vec3::ZERO, 1.0, 0.0) < 0.0);
    }

    #[test]
    fn crystal_tiles_with_period_two() {
        for p in [
            Vec3::new(0.3, -0.7, 1.1),
            Vec3::new(-3.2, 0.0, 0.4),
            Vec3::new(5.0, 5.0, -5.0),
        ] {
            let shifted = p + Vec3::new(2.0, -4.0, 6.0);
            assert!((sd_crystal(p, 1.0) - sd_crystal(shifted, 1.0)).abs() < 1e-4);
        }
    }

    #[test]
    fn degenerate_points_stay_finite() {
        for kind in GeometryKind::ALL {
            for scale in [0.0, 1.0, 1.0e6] {
                let d = distance(kind, Vec3::ZERO, scale, 0.0);
                assert!(d.is_finite(), "{kind} at origin with scale {scale} gave {d}");
            }
        }
        assert!(sd_klein_bottle(Vec3::new(0.0, 0.0, 1.0), 1.0).is_finite());
    }

    #[test]
    fn hsv_primary_hues() {
        let red = hsv_to_rgb(0.0, 1.0, 1.0);
        assert!((red - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!((green - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
        let grey = hsv_to_rgb(0.7, 0.0, 0.5);
        assert!((grey - Vec3::splat(0.5)).length() < 1e-5);
        // Negative hues wrap rather than mirror.
        let wrapped = hsv_to_rgb(-2.0 / 3.0, 1.0, 1.0);
        assert!((wrapped - green).length() < 1e-5);
    }

    #[test]
    fn shade_is_finite_and_alpha_tracks_intensity() {
        let block = sample_block();
        let size = SurfaceSize::new(16, 12);
        for y in 0..size.height {
            for x in 0..size.width {
                let [r, g, b, a] = shade(&block, pixel_uv(x, y, size));
                assert!(r.is_finite() && g.is_finite() && b.is_finite());
                assert!(a > 0.0 && a <= 0.8 + 1e-6, "alpha {a}");
            }
        }
    }

    #[test]
    fn pointer_glow_is_additive() {
        let mut lit = sample_block();
        lit.pointer_intensity = 1.0;
        let dark = sample_block();
        let centre = Vec2::new(0.5, 0.5);
        let with_pointer = shade(&lit, centre)[3];
        let without_pointer = shade(&dark, centre)[3];
        assert!(with_pointer > without_pointer);
        assert!((with_pointer - without_pointer - 0.4).abs() < 1e-4);
    }

    #[test]
    fn chaos_and_morph_are_independent() {
        let base = sample_block();
        let mut chaotic = base;
        chaotic.chaos = 0.0;
        chaotic.morph = 0.0;
        let uv = Vec2::new(0.3, 0.6);
        let calm = shade(&chaotic, uv);

        let mut morph_only = chaotic;
        morph_only.morph = 2.0;
        let mut chaos_only = chaotic;
        chaos_only.chaos = 2.0;
        assert_ne!(shade(&morph_only, uv), calm);
        assert_ne!(shade(&chaos_only, uv), calm);
        assert_ne!(shade(&morph_only, uv), shade(&chaos_only, uv));
    }

    #[test]
    fn zero_resolution_does_not_poison_output() {
        let mut block = sample_block();
        block.resolution = [0.0, 0.0];
        let [r, g, b, a] = shade(&block, Vec2::new(0.5, 0.5));
        assert!(r.is_finite() && g.is_finite() && b.is_finite() && a.is_finite());
    }

    #[test]
    fn pixel_uv_has_bottom_left_origin() {
        let size = SurfaceSize::new(4, 2);
        assert_eq!(pixel_uv(0, 0, size), Vec2::new(0.125, 0.75));
        assert_eq!(pixel_uv(3, 1, size), Vec2::new(0.875, 0.25));
    }

    #[test]
    fn shade_matches_hand_computed_reference() {
        let block = sphere_block();
        // pos = (0.5, 0, 0). Distances at 1.0x, 1.2x and 0.8x are 0.25, 0.35
        // and 0.15; 0.25 -> 0.31 (60% toward 0.35) -> 0.262 (30% toward 0.15).
        let d = 0.262_f32;
        let glow = (1.0 / (1.0 + d * 20.0)).powi(2);
        let [r, g, b, a] = shade(&block, Vec2::new(0.75, 0.5));
        assert!((a - glow * 0.8).abs() < 1e-6, "alpha {a}");
        assert!((a - 0.020_545_69).abs() < 1e-6, "alpha {a}");

        // Layer modulation is 0.8 at phase 0, time 0.
        let expected = holographic_color(&block, Vec3::new(0.5, 0.0, 0.0)) * glow * 0.8;
        assert!((Vec3::new(r, g, b) - expected).length() < 1e-6);
    }

    #[test]
    fn blend_factor_stays_in_unit_range() {
        let mut block = sample_block();
        for step in 0..200 {
            block.time = step as f32 * 0.37;
            block.blend_phase = step as f32 * -0.11;
            let blend = block.blend_factor();
            assert!((0.0..=1.0).contains(&blend), "blend {blend}");
        }
        block.time = 0.0;
        block.blend_phase = FRAC_PI_2;
        assert!((block.blend_factor() - 1.0).abs() < 1e-6);
        block.blend_phase = -FRAC_PI_2;
        assert!(block.blend_factor().abs() < 1e-6);
    }

    #[test]
    fn blend_weights_cap_secondary_and_tertiary() {
        let mut block = sample_block();
        block.primary_geometry = GeometryKind::Hypercube.code();
        block.secondary_geometry = GeometryKind::Sphere.code();
        block.tertiary_geometry = GeometryKind::Torus.code();
        block.geometry_blend = 0.0;
        let pos = Vec3::new(0.4, -0.3, 0.2);
        let scale = block.geometry_scale();
        let d1 = sd_hypercube(pos, scale);
        let d2 = sd_sphere(pos * 1.2, scale);
        let d3 = sd_torus(pos * 0.8, scale, scale * 0.3);

        block.blend_phase = -FRAC_PI_2;
        assert!((blended_distance(&block, pos) - d1).abs() < 1e-5);

        block.blend_phase = FRAC_PI_2;
        let toward_secondary = d1 + (d2 - d1) * 0.6;
        let expected = toward_secondary + (d3 - toward_secondary) * 0.3;
        let blended = blended_distance(&block, pos);
        assert!((blended - expected).abs() < 1e-5);

        // However far the tertiary shape is, it moves the result by at most 30%.
        assert!((blended - toward_secondary).abs() <= 0.3 * (d3 - toward_secondary).abs() + 1e-5);
    }

    #[test]
    fn rotation_combines_layer_angle_and_scaled_time() {
        let uv = Vec2::new(0.75, 0.5);
        let mut by_angle = sphere_block();
        by_angle.layer_rotation = FRAC_PI_2;
        by_angle.layer_offset = [0.1, 0.2];

        // time * speed * 0.1 == pi/2
        let mut by_time = sphere_block();
        by_time.time = 2.5;
        by_time.speed = 2.0 * std::f32::consts::PI;
        by_time.layer_offset = [0.1, 0.2];

        // (0.5, 0) turned a quarter clockwise, then offset.
        let expected = Vec3::new(0.1, -0.3, 0.0);
        assert!((layer_position(&by_angle, uv) - expected).length() < 1e-5);
        assert!((layer_position(&by_time, uv) - expected).length() < 1e-5);
        assert!((layer_position(&sphere_block(), uv) - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn layer_modulation_stays_between_sixty_and_hundred_percent() {
        let mut block = sample_block();
        for step in 0..200 {
            block.layer_phase = step as f32 * 0.29;
            block.time = step as f32 * 0.13;
            let m = block.layer_modulation();
            assert!((0.6 - 1e-6..=1.0 + 1e-6).contains(&m), "modulation {m}");
        }
        block.time = 0.0;
        block.layer_phase = FRAC_PI_6;
        assert!((block.layer_modulation() - 1.0).abs() < 1e-6);
        block.layer_phase = -FRAC_PI_6;
        assert!((block.layer_modulation() - 0.6).abs() < 1e-6);
    }
}
