//! Host-facing seam between the visualizer and whatever owns the pixels.
//!
//! A [`SurfaceHost`] hands out one [`LayerSurface`] per catalog entry; the
//! [`SurfaceManager`] keeps them in catalog order, tracks which layers came
//! up, and fans resizes out to every live surface.

use tracing::{debug, warn};

use crate::catalog::{self, LayerDescriptor};
use crate::program::UniformBlock;
use crate::types::SurfaceSize;

/// Why a layer surface could not be created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The host has no rendering context left for this layer.
    #[error("no rendering context available: {0}")]
    ContextUnavailable(String),
    /// The layer program failed to compile or link.
    #[error("layer program failed to compile: {0}")]
    ProgramCompile(String),
    #[error("surface {size} exceeds the device limit of {limit}px")]
    TooLarge { size: SurfaceSize, limit: u32 },
}

/// A per-frame draw failure. Never fatal; the layer is retried next frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("surface has no attached program")]
    NoProgram,
    #[error("draw rejected by backend: {0}")]
    Backend(String),
}

/// Whether a catalog layer took part in rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    Active,
    /// Excluded from the draw set for the lifetime of the instance.
    Failed(String),
}

impl LayerStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, LayerStatus::Active)
    }
}

impl std::fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerStatus::Active => f.write_str("active"),
            LayerStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One rendering surface bound to a single catalog layer.
pub trait LayerSurface {
    fn size(&self) -> SurfaceSize;

    /// Resizes the backing store. Zero-area sizes must be accepted.
    fn resize(&mut self, size: SurfaceSize);

    /// Runs the layer program once over the whole surface.
    fn draw(&mut self, uniforms: &UniformBlock) -> Result<(), DrawError>;
}

/// Owner of the container the layers are stacked in.
pub trait SurfaceHost {
    type Surface: LayerSurface;

    /// Current pixel bounds of the container.
    fn bounds(&self) -> SurfaceSize;

    /// Creates the surface for catalog entry `index`, applying the
    /// descriptor's compositing presentation to the surface itself.
    fn create_surface(
        &mut self,
        index: usize,
        descriptor: &'static LayerDescriptor,
    ) -> Result<Self::Surface, SurfaceError>;
}

#[derive(Debug)]
struct LayerSlot<S> {
    descriptor: &'static LayerDescriptor,
    status: LayerStatus,
    surface: Option<S>,
}

/// The ten layer surfaces in catalog order.
#[derive(Debug)]
pub struct SurfaceManager<S> {
    slots: Vec<LayerSlot<S>>,
    bounds: SurfaceSize,
}

impl<S: LayerSurface> SurfaceManager<S> {
    /// Creates one surface per catalog entry. A layer whose surface cannot be
    /// created is recorded as failed and skipped; the rest still come up.
    pub fn initialize<H>(host: &mut H) -> Self
    where
        H: SurfaceHost<Surface = S>,
    {
        let bounds = host.bounds();
        let slots = catalog::layers()
            .iter()
            .enumerate()
            .map(|(index, descriptor)| match host.create_surface(index, descriptor) {
                Ok(mut surface) => {
                    surface.resize(bounds);
                    debug!(layer = descriptor.name, index, %bounds, "layer surface ready");
                    LayerSlot {
                        descriptor,
                        status: LayerStatus::Active,
                        surface: Some(surface),
                    }
                }
                Err(err) => {
                    warn!(layer = descriptor.name, index, error = %err, "layer excluded from draw set");
                    LayerSlot {
                        descriptor,
                        status: LayerStatus::Failed(err.to_string()),
                        surface: None,
                    }
                }
            })
            .collect();

        Self { slots, bounds }
    }

    /// Resizes every live surface to `bounds`. Idempotent; zero-area bounds are allowed.
    pub fn resize(&mut self, bounds: SurfaceSize) {
        if bounds.is_empty() {
            debug!(%bounds, "container collapsed; layers will not rasterise");
        }
        self.bounds = bounds;
        for surface in self.slots.iter_mut().filter_map(|slot| slot.surface.as_mut()) {
            surface.resize(bounds);
        }
    }

    pub fn bounds(&self) -> SurfaceSize {
        self.bounds
    }

    /// Always the catalog length: failed layers keep their slot.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.surface.is_some()).count()
    }

    pub fn status(&self, index: usize) -> Option<&LayerStatus> {
        self.slots.get(index).map(|slot| &slot.status)
    }

    /// `(descriptor, status)` for every layer, bottom to top.
    pub fn statuses(&self) -> impl Iterator<Item = (&'static LayerDescriptor, &LayerStatus)> + '_ {
        self.slots.iter().map(|slot| (slot.descriptor, &slot.status))
    }

    pub fn surface(&self, index: usize) -> Option<&S> {
        self.slots.get(index).and_then(|slot| slot.surface.as_ref())
    }

    /// Live surfaces with their catalog index and descriptor, bottom to top.
    pub fn live(&self) -> impl Iterator<Item = (usize, &'static LayerDescriptor, &S)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.surface
                .as_ref()
                .map(|surface| (index, slot.descriptor, surface))
        })
    }

    pub fn live_mut(
        &mut self,
    ) -> impl Iterator<Item = (usize, &'static LayerDescriptor, &mut S)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let descriptor = slot.descriptor;
            slot.surface
                .as_mut()
                .map(|surface| (index, descriptor, surface))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LAYER_COUNT;

    #[derive(Debug, Default)]
    struct RecordingSurface {
        size: SurfaceSize,
        resizes: usize,
    }

    impl LayerSurface for RecordingSurface {
        fn size(&self) -> SurfaceSize {
            self.size
        }

        fn resize(&mut self, size: SurfaceSize) {
            self.size = size;
            self.resizes += 1;
        }

        fn draw(&mut self, _uniforms: &UniformBlock) -> Result<(), DrawError> {
            Ok(())
        }
    }

    struct FlakyHost {
        bounds: SurfaceSize,
        refuse: Vec<usize>,
    }

    impl SurfaceHost for FlakyHost {
        type Surface = RecordingSurface;

        fn bounds(&self) -> SurfaceSize {
            self.bounds
        }

        fn create_surface(
            &mut self,
            index: usize,
            _descriptor: &'static LayerDescriptor,
        ) -> Result<Self::Surface, SurfaceError> {
            if self.refuse.contains(&index) {
                Err(SurfaceError::ContextUnavailable(format!("slot {index}")))
            } else {
                Ok(RecordingSurface::default())
            }
        }
    }

    #[test]
    fn initialises_every_layer_at_host_bounds() {
        let mut host = FlakyHost {
            bounds: SurfaceSize::new(32, 16),
            refuse: Vec::new(),
        };
        let manager = SurfaceManager::initialize(&mut host);
        assert_eq!(manager.slot_count(), LAYER_COUNT);
        assert_eq!(manager.live_count(), LAYER_COUNT);
        for (index, descriptor, surface) in manager.live() {
            assert_eq!(descriptor.name, catalog::layers()[index].name);
            assert_eq!(surface.size(), SurfaceSize::new(32, 16));
        }
    }

    #[test]
    fn failed_layers_are_isolated() {
        let mut host = FlakyHost {
            bounds: SurfaceSize::new(8, 8),
            refuse: vec![2, 9],
        };
        let manager = SurfaceManager::initialize(&mut host);
        assert_eq!(manager.slot_count(), LAYER_COUNT);
        assert_eq!(manager.live_count(), LAYER_COUNT - 2);
        assert!(matches!(manager.status(2), Some(LayerStatus::Failed(reason)) if reason.contains("slot 2")));
        assert_eq!(manager.status(3), Some(&LayerStatus::Active));
        assert!(manager.surface(9).is_none());
        assert!(manager.live().all(|(index, _, _)| index != 2 && index != 9));
    }

    #[test]
    fn resize_survives_zero_area_and_recovers() {
        let mut host = FlakyHost {
            bounds: SurfaceSize::new(8, 8),
            refuse: Vec::new(),
        };
        let mut manager = SurfaceManager::initialize(&mut host);
        manager.resize(SurfaceSize::new(0, 0));
        assert!(manager.live().all(|(_, _, surface)| surface.size().is_empty()));

        manager.resize(SurfaceSize::new(640, 360));
        manager.resize(SurfaceSize::new(640, 360));
        assert_eq!(manager.bounds(), SurfaceSize::new(640, 360));
        for (_, _, surface) in manager.live() {
            assert_eq!(surface.size(), SurfaceSize::new(640, 360));
            assert_eq!(surface.resizes, 4);
        }
    }
}
