//! CPU rendering host.
//!
//! Every layer is rasterised by evaluating the layer program per pixel, and
//! the compositor stacks the layers with their opacity, blend mode,
//! transform and filter over an opaque black backdrop. Used for still
//! exports and for exercising the visualizer without a GPU.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use tracing::info;

use crate::catalog::{LayerDescriptor, LayerTransform};
use crate::program::{pixel_uv, shade, UniformBlock};
use crate::runtime::FixedTimeSource;
use crate::surfaces::{DrawError, LayerSurface, SurfaceError, SurfaceHost, SurfaceManager};
use crate::types::{RendererConfig, SurfaceSize};
use crate::visualizer::{Visualizer, VisualizerOptions};

/// Hands out CPU-backed layer surfaces.
#[derive(Debug, Clone)]
pub struct SoftwareHost {
    bounds: SurfaceSize,
    context_limit: Option<usize>,
    issued: usize,
}

impl SoftwareHost {
    pub fn new(bounds: SurfaceSize) -> Self {
        Self {
            bounds,
            context_limit: None,
            issued: 0,
        }
    }

    /// Refuses surfaces once `limit` have been created, the way a browser
    /// caps live rendering contexts per page.
    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = Some(limit);
        self
    }

    pub fn set_bounds(&mut self, bounds: SurfaceSize) {
        self.bounds = bounds;
    }
}

impl SurfaceHost for SoftwareHost {
    type Surface = SoftwareSurface;

    fn bounds(&self) -> SurfaceSize {
        self.bounds
    }

    fn create_surface(
        &mut self,
        _index: usize,
        descriptor: &'static LayerDescriptor,
    ) -> Result<SoftwareSurface, SurfaceError> {
        if let Some(limit) = self.context_limit {
            if self.issued >= limit {
                return Err(SurfaceError::ContextUnavailable(format!(
                    "context limit of {limit} reached before {}",
                    descriptor.name
                )));
            }
        }
        self.issued += 1;
        Ok(SoftwareSurface::new())
    }
}

/// Straight-alpha RGBA float buffer for one layer, row 0 at the top.
#[derive(Debug, Clone)]
pub struct SoftwareSurface {
    size: SurfaceSize,
    pixels: Vec<[f32; 4]>,
    frames: u64,
}

impl SoftwareSurface {
    fn new() -> Self {
        Self {
            size: SurfaceSize::default(),
            pixels: Vec::new(),
            frames: 0,
        }
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.size.width as usize + x as usize)
            .copied()
    }

    /// Frames drawn since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl LayerSurface for SoftwareSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        if size != self.size {
            self.size = size;
            self.pixels = vec![[0.0; 4]; size.area()];
        }
    }

    fn draw(&mut self, uniforms: &UniformBlock) -> Result<(), DrawError> {
        let size = self.size;
        let width = size.width as usize;
        for (offset, pixel) in self.pixels.iter_mut().enumerate() {
            let x = (offset % width) as u32;
            let y = (offset / width) as u32;
            *pixel = shade(uniforms, pixel_uv(x, y, size));
        }
        self.frames += 1;
        Ok(())
    }
}

/// Stacks the live layers bottom to top over opaque black.
pub fn composite(surfaces: &SurfaceManager<SoftwareSurface>) -> RgbaImage {
    let size = surfaces.bounds();
    let mut canvas = vec![[0.0_f32; 3]; size.area()];

    for (_, descriptor, surface) in surfaces.live() {
        if surface.size() != size || size.is_empty() {
            continue;
        }
        let filtered = apply_filter(surface.pixels(), size, descriptor);
        for y in 0..size.height {
            for x in 0..size.width {
                let Some(source) = sample_transformed(&filtered, size, &descriptor.transform, x, y)
                else {
                    continue;
                };
                let alpha = source[3] * descriptor.opacity;
                if alpha <= 0.0 {
                    continue;
                }
                let backdrop = &mut canvas[y as usize * size.width as usize + x as usize];
                for channel in 0..3 {
                    let blended = descriptor.blend.apply(backdrop[channel], source[channel]);
                    backdrop[channel] = (1.0 - alpha) * backdrop[channel] + alpha * blended;
                }
            }
        }
    }

    let mut image = RgbaImage::new(size.width, size.height);
    for (index, rgb) in canvas.iter().enumerate() {
        let x = (index % size.width as usize) as u32;
        let y = (index / size.width as usize) as u32;
        let [r, g, b] = rgb.map(to_byte);
        image.put_pixel(x, y, Rgba([r, g, b, 255]));
    }
    image
}

/// Composites the stack and writes it to `path` as PNG.
pub fn export_png(surfaces: &SurfaceManager<SoftwareSurface>, path: &Path) -> Result<()> {
    let image = composite(surfaces);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Renders one frame of `config` at `time` seconds on the CPU and saves it to `path`.
pub fn export_still(config: &RendererConfig, time: f32, path: &Path) -> Result<()> {
    let size = SurfaceSize::from(config.surface_size);
    anyhow::ensure!(!size.is_empty(), "export size {size} has no area");

    let mut host = SoftwareHost::new(size);
    let options = VisualizerOptions::from_config(config)
        .with_time_source(Box::new(FixedTimeSource::new(time)));
    let mut visualizer = Visualizer::construct(&mut host, options);
    visualizer
        .tick()
        .context("visualizer stopped before the first frame")?;
    export_png(visualizer.surfaces(), path)?;
    info!(
        path = %path.display(),
        variant = config.variant,
        %size,
        time,
        "still frame exported"
    );
    Ok(())
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Clamps the program output, then applies blur and brightness.
fn apply_filter(
    pixels: &[[f32; 4]],
    size: SurfaceSize,
    descriptor: &LayerDescriptor,
) -> Vec<[f32; 4]> {
    let mut premultiplied: Vec<[f32; 4]> = pixels
        .iter()
        .map(|&[r, g, b, a]| {
            let alpha = a.clamp(0.0, 1.0);
            [
                r.max(0.0) * alpha,
                g.max(0.0) * alpha,
                b.max(0.0) * alpha,
                alpha,
            ]
        })
        .collect();

    let radius = descriptor.filter.blur_px.round() as usize;
    if radius > 0 {
        premultiplied = box_blur(&premultiplied, size, radius);
    }

    let brightness = descriptor.filter.brightness;
    premultiplied
        .into_iter()
        .map(|[r, g, b, a]| {
            if a <= 0.0 {
                [0.0; 4]
            } else {
                [r / a * brightness, g / a * brightness, b / a * brightness, a]
            }
        })
        .collect()
}

/// Separable box blur over premultiplied pixels; outside the surface counts as transparent.
fn box_blur(pixels: &[[f32; 4]], size: SurfaceSize, radius: usize) -> Vec<[f32; 4]> {
    let width = size.width as usize;
    let height = size.height as usize;
    let window = (2 * radius + 1) as f32;

    let pass = |input: &[[f32; 4]], horizontal: bool| -> Vec<[f32; 4]> {
        let mut output = vec![[0.0; 4]; input.len()];
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0.0_f32; 4];
                let centre = if horizontal { x } else { y };
                let limit = if horizontal { width } else { height };
                let start = centre.saturating_sub(radius);
                let end = (centre + radius).min(limit - 1);
                for step in start..=end {
                    let (sx, sy) = if horizontal { (step, y) } else { (x, step) };
                    let sample = input[sy * width + sx];
                    for channel in 0..4 {
                        sum[channel] += sample[channel];
                    }
                }
                output[y * width + x] = sum.map(|value| value / window);
            }
        }
        output
    };

    let horizontal = pass(pixels, true);
    pass(&horizontal, false)
}

/// Nearest sample of the layer under a scale-about-centre plus translate transform.
fn sample_transformed(
    pixels: &[[f32; 4]],
    size: SurfaceSize,
    transform: &LayerTransform,
    x: u32,
    y: u32,
) -> Option<[f32; 4]> {
    let width = size.width as f32;
    let height = size.height as f32;
    let centre = [width * 0.5, height * 0.5];
    let source_x = centre[0] + (x as f32 + 0.5 - centre[0] - transform.translate[0]) / transform.scale;
    let source_y = centre[1] + (y as f32 + 0.5 - centre[1] - transform.translate[1]) / transform.scale;
    if source_x < 0.0 || source_y < 0.0 || source_x >= width || source_y >= height {
        return None;
    }
    pixels
        .get(source_y as usize * size.width as usize + source_x as usize)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, LAYER_COUNT};
    use crate::surfaces::LayerStatus;

    fn options(variant: u32) -> VisualizerOptions {
        VisualizerOptions::new(variant)
            .with_seed(11)
            .with_time_source(Box::new(FixedTimeSource::new(1.5)))
    }

    #[test]
    fn draws_every_pixel_of_every_layer() {
        let mut host = SoftwareHost::new(SurfaceSize::new(12, 8));
        let mut visualizer = Visualizer::construct(&mut host, options(5));
        let report = visualizer.tick().expect("running");
        assert_eq!(report.drawn, LAYER_COUNT);
        for (_, _, surface) in visualizer.surfaces().live() {
            assert_eq!(surface.frames(), 1);
            assert_eq!(surface.pixels().len(), 96);
            assert!(surface.pixels().iter().all(|p| p.iter().all(|c| c.is_finite())));
        }
    }

    #[test]
    fn context_limit_fails_the_upper_layers() {
        let mut host = SoftwareHost::new(SurfaceSize::new(4, 4)).with_context_limit(8);
        let mut visualizer = Visualizer::construct(&mut host, options(0));
        assert_eq!(visualizer.surfaces().live_count(), 8);
        assert!(matches!(
            visualizer.layer_status(8),
            Some(LayerStatus::Failed(reason)) if reason.contains("shimmer-layer")
        ));
        let report = visualizer.tick().expect("running");
        assert_eq!(report.drawn, 8);
    }

    #[test]
    fn box_blur_spreads_a_single_pixel() {
        let size = SurfaceSize::new(5, 5);
        let mut pixels = vec![[0.0; 4]; size.area()];
        pixels[12] = [9.0, 9.0, 9.0, 9.0];
        let blurred = box_blur(&pixels, size, 1);
        assert!((blurred[12][3] - 1.0).abs() < 1e-6);
        assert!((blurred[6][3] - 1.0).abs() < 1e-6);
        assert_eq!(blurred[0][3], 0.0);
        let total: f32 = blurred.iter().map(|p| p[3]).sum();
        assert!((total - 9.0).abs() < 1e-4);
    }

    #[test]
    fn transform_scales_about_centre() {
        let size = SurfaceSize::new(4, 4);
        let pixels: Vec<[f32; 4]> = (0..16).map(|i| [i as f32, 0.0, 0.0, 1.0]).collect();
        let identity = LayerTransform::IDENTITY;
        assert_eq!(sample_transformed(&pixels, size, &identity, 1, 2).map(|p| p[0]), Some(9.0));

        let shifted = LayerTransform::translate(1.0, 0.0);
        assert_eq!(sample_transformed(&pixels, size, &shifted, 0, 0), None);
        assert_eq!(sample_transformed(&pixels, size, &shifted, 1, 0).map(|p| p[0]), Some(0.0));

        let shrunk = LayerTransform::scale(0.5);
        assert_eq!(sample_transformed(&pixels, size, &shrunk, 0, 0), None);
        assert!(sample_transformed(&pixels, size, &shrunk, 2, 2).is_some());
    }

    #[test]
    fn brightness_scales_colour_not_alpha() {
        let size = SurfaceSize::new(1, 1);
        let (_, highlight) = catalog::find("content-layer").expect("layer");
        let bright = LayerDescriptor {
            filter: catalog::LayerFilter::blur_brightness(0.0, 2.0),
            ..*highlight
        };
        let out = apply_filter(&[[0.25, 0.5, 1.0, 0.5]], size, &bright);
        assert!((out[0][0] - 0.5).abs() < 1e-6);
        assert!((out[0][1] - 1.0).abs() < 1e-6);
        assert!((out[0][3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn composite_is_opaque_and_sized_to_bounds() {
        let mut host = SoftwareHost::new(SurfaceSize::new(16, 9));
        let mut visualizer = Visualizer::construct(&mut host, options(12));
        visualizer.update_mouse(0.5, 0.5, 1.0);
        visualizer.tick();
        let image = composite(visualizer.surfaces());
        assert_eq!(image.dimensions(), (16, 9));
        assert!(image.pixels().all(|pixel| pixel[3] == 255));
        assert!(image.pixels().any(|pixel| pixel[0] > 0 || pixel[1] > 0 || pixel[2] > 0));
    }

    #[test]
    fn export_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frames/still.png");
        let config = RendererConfig {
            surface_size: (24, 16),
            variant: 20,
            seed: Some(3),
            ..RendererConfig::default()
        };
        export_still(&config, 2.0, &path).expect("export");
        let decoded = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (24, 16));
    }

    #[test]
    fn export_rejects_empty_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RendererConfig {
            surface_size: (0, 16),
            ..RendererConfig::default()
        };
        assert!(export_still(&config, 0.0, &dir.path().join("x.png")).is_err());
    }
}
