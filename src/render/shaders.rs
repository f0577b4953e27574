/// Uniform block shared by every program. Field order and padding mirror
/// `UniformBlock` in the native backend.
const UNIFORMS: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_space: mat4x4<f32>,
    normal: mat3x4<f32>,
    light_dir: vec4<f32>,
    light_color: vec4<f32>,
    punct_light: vec4<f32>,
    punct_light_color: vec4<f32>,
    // x: second light, y: fog, z: shadow map unit, w: depth map unit
    flags: vec4<u32>,
}

@group(0) @binding(0)
var<uniform> u: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}
"#;

const DEPTH: &str = r#"
@vertex
fn vs_main(input: VertexInput) -> @builtin(position) vec4<f32> {
    return u.light_space * u.model * vec4<f32>(input.position, 1.0);
}
"#;

const SHADED: &str = r#"
@group(1) @binding(0)
var shadow_map: texture_depth_2d;
@group(1) @binding(1)
var shadow_sampler: sampler_comparison;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) eye_position: vec3<f32>,
    @location(1) eye_normal: vec3<f32>,
    @location(2) light_space: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = u.model * vec4<f32>(input.position, 1.0);
    let eye = u.view * world;
    out.clip = u.projection * eye;
    out.eye_position = eye.xyz;
    let normal_matrix = mat3x3<f32>(u.normal[0].xyz, u.normal[1].xyz, u.normal[2].xyz);
    out.eye_normal = normal_matrix * input.normal;
    out.light_space = u.light_space * world;
    return out;
}

const BASE_COLOR: vec3<f32> = vec3<f32>(0.8, 0.8, 0.8);
const AMBIENT: f32 = 0.2;
const SPECULAR: f32 = 0.5;
const SHININESS: f32 = 32.0;
const SHADOW_BIAS: f32 = 0.005;
const FOG_DENSITY: f32 = 0.05;
const FOG_COLOR: vec3<f32> = vec3<f32>(0.5, 0.5, 0.5);

// 1.0 when lit, 0.0 when occluded. Outside the light frustum is lit.
fn shadow_factor(position: vec4<f32>) -> f32 {
    let ndc = position.xyz / position.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    let lit = textureSampleCompareLevel(shadow_map, shadow_sampler, uv, ndc.z - SHADOW_BIAS);
    let outside = any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z > 1.0;
    return select(lit, 1.0, outside);
}

fn phong(normal: vec3<f32>, to_light: vec3<f32>, to_eye: vec3<f32>) -> vec2<f32> {
    let diffuse = max(dot(normal, to_light), 0.0);
    let specular = pow(max(dot(to_eye, reflect(-to_light, normal)), 0.0), SHININESS);
    return vec2<f32>(diffuse, specular * SPECULAR);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.eye_normal);
    let to_eye = normalize(-input.eye_position);
    let light_color = u.light_color.xyz;

    let sun = phong(normal, normalize(u.light_dir.xyz), to_eye);
    let shadow = shadow_factor(input.light_space);
    var color = (AMBIENT + shadow * (sun.x + sun.y)) * light_color * BASE_COLOR;

    if (u.flags.x != 0u) {
        let punct = (u.view * vec4<f32>(u.punct_light.xyz, 1.0)).xyz - input.eye_position;
        let dist = length(punct);
        let attenuation = 1.0 / (1.0 + 0.09 * dist + 0.032 * dist * dist);
        let lamp = phong(normal, punct / dist, to_eye);
        color += (AMBIENT + lamp.x + lamp.y) * attenuation * u.punct_light_color.xyz * BASE_COLOR;
    }

    if (u.flags.y != 0u) {
        let fog = clamp(exp(-pow(length(input.eye_position) * FOG_DENSITY, 2.0)), 0.0, 1.0);
        color = mix(FOG_COLOR, color, fog);
    }

    return vec4<f32>(min(color, vec3<f32>(1.0)), 1.0);
}
"#;

const LIGHT_MARKER: &str = r#"
@vertex
fn vs_main(input: VertexInput) -> @builtin(position) vec4<f32> {
    return u.projection * u.view * u.model * vec4<f32>(input.position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

const SCREEN_QUAD: &str = r#"
@group(1) @binding(0)
var depth_map: texture_depth_2d;

struct QuadOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> QuadOutput {
    var out: QuadOutput;
    out.clip = vec4<f32>(input.position.xy, 0.0, 1.0);
    out.uv = vec2<f32>(input.position.x * 0.5 + 0.5, 0.5 - input.position.y * 0.5);
    return out;
}

@fragment
fn fs_main(input: QuadOutput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(depth_map));
    let texel = vec2<i32>(clamp(input.uv * size, vec2<f32>(0.0), size - vec2<f32>(1.0)));
    let depth = textureLoad(depth_map, texel, 0);
    return vec4<f32>(vec3<f32>(depth), 1.0);
}
"#;

pub(crate) fn depth() -> String {
    format!("{UNIFORMS}{DEPTH}")
}

pub(crate) fn shaded() -> String {
    format!("{UNIFORMS}{SHADED}")
}

pub(crate) fn light_marker() -> String {
    format!("{UNIFORMS}{LIGHT_MARKER}")
}

pub(crate) fn screen_quad() -> String {
    format!("{UNIFORMS}{SCREEN_QUAD}")
}
