//! The fixed ten-layer stack.
//!
//! Order matters: index 0 is the bottom-most layer and compositing proceeds
//! upward. Each entry carries its compositing presentation (opacity, blend
//! mode, transform, filter) which is applied by the host when the rendered
//! layers are stacked. The catalog is immutable at runtime.

/// Number of layers every visualizer instance manages.
pub const LAYER_COUNT: usize = 10;

/// Separable blend modes used when compositing a layer over the ones below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Normal,
    Multiply,
    Overlay,
    Screen,
    ColorDodge,
    SoftLight,
}

impl BlendMode {
    /// CSS keyword for the mode.
    pub fn css_name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Overlay => "overlay",
            BlendMode::Screen => "screen",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::SoftLight => "soft-light",
        }
    }

    /// Blend function `B(backdrop, source)` for one colour channel in `[0, 1]`.
    pub fn apply(&self, backdrop: f32, source: f32) -> f32 {
        let cb = backdrop.clamp(0.0, 1.0);
        let cs = source.clamp(0.0, 1.0);
        match self {
            BlendMode::Normal => cs,
            BlendMode::Multiply => cb * cs,
            BlendMode::Screen => screen(cb, cs),
            // Overlay is hard-light with the operands swapped.
            BlendMode::Overlay => hard_light(cs, cb),
            BlendMode::ColorDodge => {
                if cb == 0.0 {
                    0.0
                } else if cs >= 1.0 {
                    1.0
                } else {
                    (cb / (1.0 - cs)).min(1.0)
                }
            }
            BlendMode::SoftLight => {
                if cs <= 0.5 {
                    cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
                } else {
                    let d = if cb <= 0.25 {
                        ((16.0 * cb - 12.0) * cb + 4.0) * cb
                    } else {
                        cb.sqrt()
                    };
                    cb + (2.0 * cs - 1.0) * (d - cb)
                }
            }
        }
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.css_name())
    }
}

fn screen(cb: f32, cs: f32) -> f32 {
    cb + cs - cb * cs
}

fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        screen(cb, 2.0 * cs - 1.0)
    }
}

/// Scale about the layer centre followed by a translation in CSS pixels
/// (positive y points down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTransform {
    pub scale: f32,
    pub translate: [f32; 2],
}

impl LayerTransform {
    pub const IDENTITY: Self = Self::scale(1.0);

    pub const fn scale(scale: f32) -> Self {
        Self {
            scale,
            translate: [0.0, 0.0],
        }
    }

    pub const fn translate(x: f32, y: f32) -> Self {
        Self {
            scale: 1.0,
            translate: [x, y],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Post-processing filter: blur radius in pixels and a brightness multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerFilter {
    pub blur_px: f32,
    pub brightness: f32,
}

impl LayerFilter {
    pub const NONE: Self = Self::blur(0.0);

    pub const fn blur(blur_px: f32) -> Self {
        Self {
            blur_px,
            brightness: 1.0,
        }
    }

    pub const fn blur_brightness(blur_px: f32, brightness: f32) -> Self {
        Self {
            blur_px,
            brightness,
        }
    }

    pub fn is_none(&self) -> bool {
        self.blur_px <= 0.0 && self.brightness == 1.0
    }
}

/// Static description of one layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDescriptor {
    pub name: &'static str,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    pub blend: BlendMode,
    pub transform: LayerTransform,
    pub filter: LayerFilter,
}

const fn layer(
    name: &'static str,
    opacity: f32,
    blend: BlendMode,
    transform: LayerTransform,
    filter: LayerFilter,
) -> LayerDescriptor {
    LayerDescriptor {
        name,
        opacity,
        blend,
        transform,
        filter,
    }
}

static LAYERS: [LayerDescriptor; LAYER_COUNT] = [
    layer(
        "deep-background",
        0.1,
        BlendMode::Normal,
        LayerTransform::scale(1.1),
        LayerFilter::blur(3.0),
    ),
    layer(
        "ambient-field",
        0.15,
        BlendMode::Multiply,
        LayerTransform::scale(1.05),
        LayerFilter::blur(2.0),
    ),
    layer(
        "shadow-depth",
        0.4,
        BlendMode::Multiply,
        LayerTransform::translate(3.0, 3.0),
        LayerFilter::blur_brightness(2.0, 0.6),
    ),
    layer(
        "base-geometry",
        0.6,
        BlendMode::Normal,
        LayerTransform::IDENTITY,
        LayerFilter::NONE,
    ),
    layer(
        "secondary-geo",
        0.5,
        BlendMode::Overlay,
        LayerTransform::scale(0.95),
        LayerFilter::NONE,
    ),
    layer(
        "content-layer",
        0.8,
        BlendMode::Normal,
        LayerTransform::IDENTITY,
        LayerFilter::NONE,
    ),
    layer(
        "highlight-layer",
        0.3,
        BlendMode::Screen,
        LayerTransform::translate(-1.0, -1.0),
        LayerFilter::blur_brightness(1.0, 1.4),
    ),
    layer(
        "accent-layer",
        0.25,
        BlendMode::ColorDodge,
        LayerTransform::scale(1.02),
        LayerFilter::blur(2.0),
    ),
    layer(
        "shimmer-layer",
        0.2,
        BlendMode::SoftLight,
        LayerTransform::scale(0.98),
        LayerFilter::blur(1.0),
    ),
    layer(
        "hologram-edge",
        0.4,
        BlendMode::Screen,
        LayerTransform::scale(1.03),
        LayerFilter::blur_brightness(1.0, 1.6),
    ),
];

/// Bottom-to-top layer descriptors.
pub fn layers() -> &'static [LayerDescriptor; LAYER_COUNT] {
    &LAYERS
}

/// Looks a descriptor up by stack index.
pub fn layer_at(index: usize) -> Option<&'static LayerDescriptor> {
    LAYERS.get(index)
}

/// Looks a descriptor up by name.
pub fn find(name: &str) -> Option<(usize, &'static LayerDescriptor)> {
    LAYERS
        .iter()
        .enumerate()
        .find(|(_, descriptor)| descriptor.name == name)
}
