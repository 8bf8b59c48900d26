use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use holoconfig::AntialiasSetting;
use renderer::ColorSpaceMode;

#[derive(Parser, Debug)]
#[command(
    name = "holoshade",
    author,
    version,
    about = "Ten-layer holographic SDF visualizer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    /// Defaults to `run` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Overrides for values that can also come from `holoshade.toml`.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file; defaults to `holoshade.toml` in the config directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Variant to open with (non-negative integer).
    #[arg(
        long,
        global = true,
        value_name = "N",
        allow_hyphen_values = true,
        value_parser = parse_variant
    )]
    pub variant: Option<u32>,

    /// Seed for the per-layer rotation/scale/offset perturbation.
    #[arg(long, global = true, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Render resolution (e.g. `1280x720`).
    #[arg(long, global = true, value_name = "WIDTHxHEIGHT", value_parser = holoconfig::parse_size)]
    pub size: Option<(u32, u32)>,

    /// FPS cap for the preview window (0 = uncapped).
    #[arg(long, global = true, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an MSAA sample count (2/4/8/16).
    #[arg(long, global = true, value_name = "MODE", value_parser = holoconfig::parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(
        long,
        global = true,
        value_name = "MODE",
        value_parser = parse_color_space,
        default_value = "auto"
    )]
    pub color_space: ColorSpaceMode,

    /// Advance the geometry blend by a fixed 0.01 per frame instead of by elapsed time.
    #[arg(long, global = true)]
    pub per_frame_blend: bool,

    /// Geometry blend phase units per second.
    #[arg(long, global = true, value_name = "RATE")]
    pub blend_rate: Option<f32>,

    /// Ceiling for the complexity tier (unbounded by default).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub max_complexity: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the animated preview window (approximates overlay, soft-light and
    /// color-dodge; `still` composites them exactly).
    Run(RunArgs),
    /// Render one frame on the CPU and write it as PNG.
    Still(StillArgs),
    /// Print the generated parameter set for a variant as JSON.
    Params {
        #[arg(value_name = "VARIANT", allow_hyphen_values = true, value_parser = parse_variant)]
        number: u32,
    },
    /// List the layer stack in drawing order.
    Layers {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration paths.
    Where,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Freeze the preview at this timestamp instead of animating.
    #[arg(long, value_name = "SECONDS", value_parser = holoconfig::parse_duration)]
    pub freeze: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct StillArgs {
    /// Destination PNG path.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// Timestamp to evaluate (seconds or `2.5s`-style durations).
    #[arg(long, value_name = "SECONDS", value_parser = holoconfig::parse_duration)]
    pub time: Option<Duration>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_variant(value: &str) -> Result<u32, String> {
    holoparams::parse_variant(value).map_err(|err| err.to_string())
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" | "srgb-off" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        _ => Err("unknown color space (expected auto, gamma, or linear)".to_string()),
    }
}
