use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "holoshade.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the geometry-blend phase advances between frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendCadence {
    /// `phase += blend_rate * delta_seconds`; independent of refresh rate.
    #[default]
    Elapsed,
    /// `phase += 0.01` per tick, matching the legacy frame-coupled cadence.
    PerFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HoloConfig {
    pub version: u32,
    #[serde(default, deserialize_with = "deserialize_variant")]
    pub variant: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default)]
    pub blend_cadence: BlendCadence,
    #[serde(default = "default_blend_rate")]
    pub blend_rate: f32,
    #[serde(default)]
    pub max_complexity: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub still_time: Option<Duration>,
}

impl Default for HoloConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            variant: 0,
            seed: None,
            fps: None,
            blend_cadence: BlendCadence::default(),
            blend_rate: default_blend_rate(),
            max_complexity: None,
            size: None,
            antialias: None,
            still_time: None,
        }
    }
}

/// 0.01 phase units per frame at 60 Hz.
fn default_blend_rate() -> f32 {
    0.6
}

fn deserialize_variant<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Int(i64),
        Float(f64),
        Str(String),
    }

    let parsed = match Helper::deserialize(deserializer)? {
        Helper::Int(value) => holoparams::variant_from_i64(value),
        Helper::Float(value) => holoparams::variant_from_f64(value),
        Helper::Str(raw) => holoparams::parse_variant(&raw),
    };
    parsed.map_err(de::Error::custom)
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_duration(v).map(Some).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

pub fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

/// Accepts plain seconds (`2.5`) or humantime strings (`2s 500ms`).
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds.is_sign_negative() {
            return Err(format!("invalid duration '{trimmed}': must be non-negative"));
        }
        return Ok(Duration::from_secs_f64(seconds));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{trimmed}': {err}"))
}

/// Parses `WIDTHxHEIGHT` into a non-zero pixel size.
pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

impl HoloConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: HoloConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// FPS cap with `0` normalised to "uncapped".
    pub fn fps_cap(&self) -> Option<f32> {
        self.fps.filter(|fps| *fps > 0.0)
    }

    pub fn surface_size(&self) -> Result<Option<(u32, u32)>, ConfigError> {
        self.size
            .as_deref()
            .map(|raw| parse_size(raw).map_err(|err| ConfigError::Invalid(format!("size: {err}"))))
            .transpose()
    }

    pub fn generator_options(&self) -> holoparams::GeneratorOptions {
        holoparams::GeneratorOptions {
            max_complexity: self.max_complexity,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("fps must be >= 0".into()));
            }
        }

        if !self.blend_rate.is_finite() || self.blend_rate < 0.0 {
            return Err(ConfigError::Invalid("blend_rate must be >= 0".into()));
        }

        self.surface_size()?;
        Ok(())
    }
}
