use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use holoconfig::{AntialiasSetting, HoloConfig};
use holoparams::GeneratorOptions;
use renderer::{Antialiasing, BlendCadence, RenderPolicy, Renderer, RendererConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{GlobalArgs, RunArgs, StillArgs};
use crate::paths::{AppPaths, ENV_CONFIG_DIR};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run_preview(global: &GlobalArgs, args: &RunArgs, paths: &AppPaths) -> Result<()> {
    let file = load_config(global, paths)?;
    let policy = match args.freeze {
        Some(time) => RenderPolicy::Still {
            time: time.as_secs_f32(),
        },
        None => RenderPolicy::Animate {
            target_fps: fps_cap(global, &file),
        },
    };
    let config = renderer_config(global, &file, policy)?;
    tracing::info!(
        variant = config.variant,
        size = ?config.surface_size,
        "starting holoshade preview"
    );
    Renderer::new(config).run()
}

pub fn run_still(global: &GlobalArgs, args: &StillArgs, paths: &AppPaths) -> Result<()> {
    let file = load_config(global, paths)?;
    let time = args.time.or(file.still_time).unwrap_or(Duration::ZERO);
    let policy = RenderPolicy::Export {
        time: time.as_secs_f32(),
        path: args.output.clone(),
    };
    let config = renderer_config(global, &file, policy)?;
    Renderer::new(config).run()
}

pub fn print_params(global: &GlobalArgs, variant: u32, paths: &AppPaths) -> Result<()> {
    let file = load_config(global, paths)?;
    let params = holoparams::generate_with(variant, generator_options(global, &file));
    let json = serde_json::to_string_pretty(&params).context("failed to encode parameters")?;
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct LayerRow {
    index: usize,
    name: &'static str,
    opacity: f32,
    blend: &'static str,
    scale: f32,
    translate: [f32; 2],
    blur_px: f32,
    brightness: f32,
}

pub fn print_layers(json: bool) -> Result<()> {
    let rows: Vec<LayerRow> = renderer::layers()
        .iter()
        .enumerate()
        .map(|(index, layer)| LayerRow {
            index,
            name: layer.name,
            opacity: layer.opacity,
            blend: layer.blend.css_name(),
            scale: layer.transform.scale,
            translate: layer.transform.translate,
            blur_px: layer.filter.blur_px,
            brightness: layer.filter.brightness,
        })
        .collect();

    if json {
        let encoded = serde_json::to_string_pretty(&rows).context("failed to encode layers")?;
        println!("{encoded}");
        return Ok(());
    }

    println!("Layer stack (bottom to top):");
    for row in rows {
        println!(
            "  {:>2} {:<18} opacity={:.2} blend={:<11} scale={:.2} translate={:?} blur={}px brightness={:.1}",
            row.index,
            row.name,
            row.opacity,
            row.blend,
            row.scale,
            row.translate,
            row.blur_px,
            row.brightness
        );
    }
    Ok(())
}

pub fn print_where(global: &GlobalArgs, paths: &AppPaths) -> Result<()> {
    let config_file = global
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!(
        "  config file: {} ({})",
        config_file.display(),
        if config_file.exists() {
            "present"
        } else {
            "missing"
        }
    );
    println!("  override:    ${ENV_CONFIG_DIR}");
    Ok(())
}

/// Loads `--config` when given, else the discovered file, else defaults.
fn load_config(global: &GlobalArgs, paths: &AppPaths) -> Result<HoloConfig> {
    match &global.config {
        Some(path) => read_config(path),
        None => {
            let default_path = paths.config_file();
            if default_path.exists() {
                read_config(&default_path)
            } else {
                tracing::debug!(path = %default_path.display(), "no config file; using defaults");
                Ok(HoloConfig::default())
            }
        }
    }
}

fn read_config(path: &Path) -> Result<HoloConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = HoloConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Merges file values with CLI overrides; flags win.
fn renderer_config(
    global: &GlobalArgs,
    file: &HoloConfig,
    policy: RenderPolicy,
) -> Result<RendererConfig> {
    if let Some(rate) = global.blend_rate {
        if !rate.is_finite() || rate < 0.0 {
            bail!("--blend-rate must be >= 0, got {rate}");
        }
    }
    if let Some(fps) = global.fps {
        if !fps.is_finite() || fps < 0.0 {
            bail!("--fps must be >= 0, got {fps}");
        }
    }

    let defaults = RendererConfig::default();
    let surface_size = match global.size {
        Some(size) => size,
        None => file.surface_size()?.unwrap_or(defaults.surface_size),
    };
    let per_frame =
        global.per_frame_blend || file.blend_cadence == holoconfig::BlendCadence::PerFrame;
    let blend_cadence = if per_frame {
        BlendCadence::PerFrame
    } else {
        BlendCadence::Elapsed {
            rate: global.blend_rate.unwrap_or(file.blend_rate),
        }
    };

    Ok(RendererConfig {
        surface_size,
        variant: global.variant.unwrap_or(file.variant),
        generator: generator_options(global, file),
        seed: global.seed.or(file.seed),
        blend_cadence,
        antialiasing: global
            .antialias
            .or(file.antialias)
            .map(antialiasing)
            .unwrap_or_default(),
        color_space: global.color_space,
        policy,
    })
}

/// `--fps 0` lifts a cap set in the file.
fn fps_cap(global: &GlobalArgs, file: &HoloConfig) -> Option<f32> {
    match global.fps {
        Some(fps) => (fps > 0.0).then_some(fps),
        None => file.fps_cap(),
    }
}

fn generator_options(global: &GlobalArgs, file: &HoloConfig) -> GeneratorOptions {
    let mut options = file.generator_options();
    if let Some(level) = global.max_complexity {
        options.max_complexity = Some(level);
    }
    options
}

fn antialiasing(setting: AntialiasSetting) -> Antialiasing {
    match setting {
        AntialiasSetting::Auto => Antialiasing::Auto,
        AntialiasSetting::Off => Antialiasing::Off,
        AntialiasSetting::Samples2 => Antialiasing::Samples(2),
        AntialiasSetting::Samples4 => Antialiasing::Samples(4),
        AntialiasSetting::Samples8 => Antialiasing::Samples(8),
        AntialiasSetting::Samples16 => Antialiasing::Samples(16),
    }
}
