use std::fmt;

use serde::Serialize;

/// Number of distance-field geometries the program can evaluate.
pub const GEOMETRY_COUNT: u32 = 8;

/// Signed-distance geometries understood by the layer program.
///
/// The discriminant doubles as the numeric selector uploaded to the GPU, so
/// the order here is part of the uniform contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeometryKind {
    Tetrahedron = 0,
    Hypercube = 1,
    Sphere = 2,
    Torus = 3,
    KleinBottle = 4,
    Fractal = 5,
    Wave = 6,
    Crystal = 7,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; GEOMETRY_COUNT as usize] = [
        GeometryKind::Tetrahedron,
        GeometryKind::Hypercube,
        GeometryKind::Sphere,
        GeometryKind::Torus,
        GeometryKind::KleinBottle,
        GeometryKind::Fractal,
        GeometryKind::Wave,
        GeometryKind::Crystal,
    ];

    /// Wraps any index onto the geometry cycle.
    pub fn from_index(index: u32) -> Self {
        Self::ALL[(index % GEOMETRY_COUNT) as usize]
    }

    /// Geometry cycles every eight variants.
    pub fn from_variant(variant: u32) -> Self {
        Self::from_index(variant)
    }

    /// Numeric selector passed to the program.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Geometry blended at up to 60% weight against the primary.
    pub fn secondary(self) -> Self {
        Self::from_index(self.code() + 2)
    }

    /// Geometry blended at up to 30% weight against the primary/secondary mix.
    pub fn tertiary(self) -> Self {
        Self::from_index(self.code() + 5)
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Tetrahedron => "tetrahedron",
            GeometryKind::Hypercube => "hypercube",
            GeometryKind::Sphere => "sphere",
            GeometryKind::Torus => "torus",
            GeometryKind::KleinBottle => "klein-bottle",
            GeometryKind::Fractal => "fractal",
            GeometryKind::Wave => "wave",
            GeometryKind::Crystal => "crystal",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
