use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::surfaces::SurfaceError;

/// Vertex and fragment modules of the layer program, compiled once per device
/// and shared by every layer surface.
#[derive(Clone)]
pub(crate) struct LayerProgram {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

/// Compiles the layer program, surfacing every diagnostic as a
/// [`SurfaceError::ProgramCompile`] instead of letting the device error out.
pub(crate) fn compile_layer_program(device: &wgpu::Device) -> Result<LayerProgram, SurfaceError> {
    let vertex_source = layer_vertex_source();
    let vertex = compile_stage(
        device,
        "holographic layer vertex",
        &vertex_source,
        ShaderStage::Vertex,
    )?;
    let fragment_source = layer_fragment_source();
    let fragment = compile_stage(
        device,
        "holographic layer fragment",
        &fragment_source,
        ShaderStage::Fragment,
    )?;
    tracing::debug!("compiled layer program");
    Ok(LayerProgram { vertex, fragment })
}

fn compile_stage(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, SurfaceError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    });
    let info = pollster::block_on(module.get_compilation_info());
    let scope_error = pollster::block_on(device.pop_error_scope());

    let mut diagnostics: Vec<String> = info
        .messages
        .iter()
        .filter(|message| message.message_type == wgpu::CompilationMessageType::Error)
        .map(|message| match &message.location {
            Some(location) => format!(
                "{}:{}: {}",
                location.line_number, location.line_position, message.message
            ),
            None => message.message.clone(),
        })
        .collect();
    if let Some(err) = scope_error {
        diagnostics.push(err.to_string());
    }

    if diagnostics.is_empty() {
        Ok(module)
    } else {
        Err(SurfaceError::ProgramCompile(format!(
            "{label}: {}",
            diagnostics.join("; ")
        )))
    }
}

/// Complete fragment source: uniform declarations, the program body, and the
/// compositing epilogue.
pub(crate) fn layer_fragment_source() -> String {
    format!("{FRAGMENT_HEADER}{UNIFORMS}\n{PROGRAM}\n{FOOTER}")
}

pub(crate) fn layer_vertex_source() -> String {
    format!("{VERTEX_HEADER}{UNIFORMS}\n{VERTEX_MAIN}")
}

/// Uniform blocks visible to both stages.
///
/// `HoloParams` must match [`crate::program::UniformBlock`] byte for byte and
/// `CompositeParams` must match the GPU composite uniforms.
const UNIFORMS: &str = r"layout(std140, set = 0, binding = 0) uniform HoloParams {
    vec2 resolution;
    vec2 pointer;
    vec2 layerOffset;
    float time;
    float pointerIntensity;
    uint primaryGeometry;
    uint secondaryGeometry;
    uint tertiaryGeometry;
    float geometryBlend;
    float blendPhase;
    float density;
    float speed;
    float chaos;
    float morph;
    float hue;
    float saturation;
    float intensity;
    float layerPhase;
    float depthComplexity;
    float hologramIntensity;
    float layerRotation;
    float layerScale;
    float colorHarmonic1;
    float colorHarmonic2;
    float colorHarmonic3;
} holo;

layout(std140, set = 0, binding = 1) uniform CompositeParams {
    vec4 transform;
    float opacity;
    float brightness;
    vec2 compositePadding;
} composite;
";

const FRAGMENT_HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

";

const VERTEX_HEADER: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

";

/// Distance functions, colour model and per-pixel evaluation.
///
/// Mirrors `crate::program::shade`; keep the two in sync.
const PROGRAM: &str = r"const float MIN_RADIUS = 0.000001;

float sdTetrahedron(vec3 p, float scale) {
    float n = 1.0 / sqrt(3.0);
    float d1 = dot(p, vec3(1.0, 1.0, 1.0) * n) - scale;
    float d2 = dot(p, vec3(-1.0, -1.0, 1.0) * n) - scale;
    float d3 = dot(p, vec3(-1.0, 1.0, -1.0) * n) - scale;
    float d4 = dot(p, vec3(1.0, -1.0, -1.0) * n) - scale;
    return max(max(d1, d2), max(d3, d4));
}

float sdBox(vec3 p, float halfExtent) {
    vec3 d = abs(p) - vec3(halfExtent);
    return min(max(d.x, max(d.y, d.z)), 0.0) + length(max(d, vec3(0.0)));
}

float sdSphere(vec3 p, float radius) {
    return length(p) - radius;
}

float sdTorus(vec3 p, float major, float minor) {
    vec2 q = vec2(length(p.xz) - major, p.y);
    return length(q) - minor;
}

float sdKleinBottle(vec3 p, float scale) {
    float angle = atan(p.y, p.x);
    float ripple = sin(angle * 2.0) * 0.3;
    vec2 q = vec2(length(p.xy) - scale - ripple, p.z);
    return length(q) - 0.2 * scale;
}

float sdFractal(vec3 p, float scale) {
    vec3 z = p;
    float dr = 1.0;
    float r = 0.0;
    for (int i = 0; i < 8; i++) {
        r = length(z);
        if (r > 2.0) {
            break;
        }
        float safeR = max(r, MIN_RADIUS);
        float theta = acos(clamp(z.z / safeR, -1.0, 1.0)) * 8.0;
        float phi = atan(z.y, z.x) * 8.0;
        dr = pow(safeR, 7.0) * 8.0 * dr + 1.0;
        float zr = pow(safeR, 8.0);
        z = zr * vec3(sin(theta) * cos(phi), sin(phi) * sin(theta), cos(theta)) + p;
    }
    float finalR = max(r, MIN_RADIUS);
    return 0.5 * log(finalR) * finalR / dr;
}

float sdWave(vec3 p, float scale) {
    float wave1 = sin(p.x * 3.0 + holo.time) * 0.3;
    float wave2 = sin(p.z * 4.0 + holo.time * 1.3) * 0.2;
    return abs(p.y - wave1 - wave2) - 0.1 * scale;
}

float sdCrystal(vec3 p, float scale) {
    vec3 cell = p - 2.0 * floor(p / 2.0);
    return sdBox(cell - vec3(1.0), scale * 0.3);
}

float geometryDistance(vec3 p, uint kind) {
    float scale = holo.density * holo.layerScale;
    uint code = kind % 8u;
    float d = 0.0;
    if (code == 0u) {
        d = sdTetrahedron(p, scale);
    } else if (code == 1u) {
        d = sdBox(p, scale);
    } else if (code == 2u) {
        d = sdSphere(p, scale);
    } else if (code == 3u) {
        d = sdTorus(p, scale, scale * 0.3);
    } else if (code == 4u) {
        d = sdKleinBottle(p, scale);
    } else if (code == 5u) {
        d = sdFractal(p, scale);
    } else if (code == 6u) {
        d = sdWave(p, scale);
    } else {
        d = sdCrystal(p, scale);
    }
    return d;
}

vec3 hsvToRgb(vec3 c) {
    vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
    return c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}

vec3 holographicColor(vec3 pos) {
    float t = holo.time;
    float hue1 = holo.hue + sin(t * 0.5) * 30.0;
    float hue2 = holo.colorHarmonic1 + cos(t * 0.7) * 25.0;
    float hue3 = holo.colorHarmonic2 + sin(t * 0.3) * 20.0;

    vec3 color1 = hsvToRgb(vec3(hue1 / 360.0, holo.saturation, holo.intensity));
    vec3 color2 = hsvToRgb(vec3(hue2 / 360.0, holo.saturation * 0.8, holo.intensity * 1.2));
    vec3 color3 = hsvToRgb(vec3(hue3 / 360.0, holo.saturation * 1.1, holo.intensity * 0.9));

    float mixer1 = sin(pos.x * 5.0 + t) * 0.5 + 0.5;
    float mixer2 = cos(pos.y * 4.0 + t * 1.3) * 0.5 + 0.5;

    vec3 mixed = mix(color1, color2, mixer1);
    return mix(mixed, color3, mixer2 * 0.3);
}

vec4 holoLayer(vec2 uv) {
    float aspect = 1.0;
    if (holo.resolution.y > 0.0) {
        aspect = holo.resolution.x / holo.resolution.y;
    }
    vec2 p = (uv - vec2(0.5)) * 2.0;
    p.x = p.x * aspect;

    float rotation = holo.layerRotation + holo.time * holo.speed * 0.1;
    float c = cos(rotation);
    float s = sin(rotation);
    p = mat2(c, -s, s, c) * p;
    p = p + holo.layerOffset;

    float depth = sin(holo.time * holo.speed + holo.layerPhase) * holo.depthComplexity;
    vec3 pos = vec3(p, depth);

    float d1 = geometryDistance(pos, holo.primaryGeometry);
    float d2 = geometryDistance(pos * 1.2, holo.secondaryGeometry);
    float d3 = geometryDistance(pos * 0.8, holo.tertiaryGeometry);

    float blendFactor = sin(holo.time * holo.geometryBlend + holo.blendPhase) * 0.5 + 0.5;
    float d = mix(d1, d2, blendFactor * 0.6);
    d = mix(d, d3, blendFactor * 0.3);
    d = d + sin(pos.x * 10.0 + holo.time * 2.0) * holo.chaos * 0.1;
    d = d + cos(pos.y * 8.0 + holo.time * 1.5) * holo.morph * 0.15;

    float glow = 1.0 / (1.0 + abs(d) * 20.0);
    float intensity = glow * glow;
    if (holo.pointerIntensity > 0.0) {
        float pointerDistance = length(holo.pointer - uv);
        intensity = intensity + holo.pointerIntensity * exp(-pointerDistance * 5.0) * 0.5;
    }

    float layerMod = sin(holo.layerPhase * 3.0 + holo.time) * 0.2 + 0.8;
    vec3 color = holographicColor(pos) * intensity * holo.hologramIntensity * layerMod;
    return vec4(color, intensity * 0.8);
}
";

/// Applies the layer's opacity and brightness filter and premultiplies so the
/// fixed-function blend state can implement the layer's blend mode.
const FOOTER: &str = r"void main() {
    vec4 layer = holoLayer(v_uv);
    float alpha = clamp(layer.a, 0.0, 1.0) * composite.opacity;
    vec3 rgb = clamp(layer.rgb * composite.brightness, 0.0, 1.0);
    outColor = vec4(rgb * alpha, alpha);
}
";

/// Full-screen triangle scaled and offset by the layer transform. `v_uv` is
/// taken before the transform so the whole layer image moves as one.
const VERTEX_MAIN: &str = r"const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos * composite.transform.xy + composite.transform.zw, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
    use wgpu::naga::{Module, TypeInner};

    fn parse(source: &str, stage: ShaderStage) -> Module {
        let module = Frontend::default()
            .parse(&Options::from(stage), source)
            .unwrap_or_else(|err| panic!("{stage:?} stage failed to parse: {err:?}"));
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|err| panic!("{stage:?} stage failed validation: {err:?}"));
        module
    }

    #[test]
    fn fragment_stage_parses_and_validates() {
        parse(&layer_fragment_source(), ShaderStage::Fragment);
    }

    #[test]
    fn vertex_stage_parses_and_validates() {
        parse(&layer_vertex_source(), ShaderStage::Vertex);
    }

    /// The std140 block the GLSL declares must agree with `UniformBlock`.
    #[test]
    fn holo_params_block_matches_uniform_block() {
        let module = parse(&layer_fragment_source(), ShaderStage::Fragment);
        let (members, span) = module
            .types
            .iter()
            .find_map(|(_, ty)| match &ty.inner {
                TypeInner::Struct { members, span }
                    if members
                        .iter()
                        .any(|member| member.name.as_deref() == Some("layerScale")) =>
                {
                    Some((members.clone(), *span))
                }
                _ => None,
            })
            .expect("HoloParams block present");

        assert_eq!(span as usize, std::mem::size_of::<crate::program::UniformBlock>());
        let offset = |name: &str| {
            members
                .iter()
                .find(|member| member.name.as_deref() == Some(name))
                .map(|member| member.offset)
                .unwrap_or_else(|| panic!("member {name} missing"))
        };
        assert_eq!(offset("pointer"), 8);
        assert_eq!(offset("time"), 24);
        assert_eq!(offset("primaryGeometry"), 32);
        assert_eq!(offset("blendPhase"), 48);
        assert_eq!(offset("layerRotation"), 92);
        assert_eq!(offset("colorHarmonic3"), 108);
    }

    #[test]
    fn program_declares_every_geometry() {
        let source = layer_fragment_source();
        for function in [
            "sdTetrahedron",
            "sdBox",
            "sdSphere",
            "sdTorus",
            "sdKleinBottle",
            "sdFractal",
            "sdWave",
            "sdCrystal",
        ] {
            assert!(source.contains(function), "{function} missing");
        }
        assert!(source.starts_with("#version 450"));
    }
}
