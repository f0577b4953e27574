use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::assets::MeshSource;
use crate::error::StartupError;
use crate::input::InputCommand;
use crate::light::{LightFrustum, PointLight};
use crate::render::shadow::DEFAULT_SHADOW_RESOLUTION;
use crate::scene::{ObjectDescription, SceneDescription, Transform};

pub const USAGE: &str = "Usage: shadow-scene [--config <file>] [--shadow-resolution <n>] \
[--headless] [--frames <n>] [--commands <a,b,...>]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Shadow Scene".into(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// World units per frame while a movement key is held.
    pub speed: f32,
    /// Degrees per pixel of mouse motion.
    pub sensitivity: f32,
    /// Vertical field of view, in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-6.79388, 2.73188, -7.94507),
            target: Vec3::new(15.384, -0.275071, -11.2464),
            up: Vec3::Y,
            speed: 0.9,
            sensitivity: 0.3,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl CameraConfig {
    /// Perspective projection for a framebuffer of the given aspect ratio.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect.max(0.01), self.near, self.far)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub color: Vec3,
    /// Initial angle around world up, in degrees.
    pub angle: f32,
    pub frustum: LightFrustum,
    pub marker_scale: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            angle: 0.0,
            frustum: LightFrustum::default(),
            marker_scale: 0.1,
        }
    }
}

/// Everything the viewer reads at startup. Nothing here changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub window: WindowConfig,
    pub shadow_resolution: u32,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub point_light: PointLight,
    pub clear_color: [f32; 4],
    pub scene: SceneDescription,
    /// Directory relative OBJ paths are resolved against.
    pub asset_root: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            shadow_resolution: DEFAULT_SHADOW_RESOLUTION,
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            point_light: PointLight::default(),
            clear_color: [0.7, 0.7, 0.7, 1.0],
            scene: SceneDescription::default(),
            asset_root: PathBuf::from("."),
        }
    }
}

impl RenderConfig {
    /// Reads an XML configuration file. Relative mesh paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::from_xml(&xml)
            .map_err(|err| StartupError::Config(format!("{}: {err:#}", path.display())))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.asset_root = parent.to_path_buf();
        }
        Ok(config)
    }

    /// Parses a configuration document, keeping defaults for every element
    /// that is absent.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid config XML")?;
        let root = document.root_element();
        let mut config = Self::default();

        if let Some(node) = child(&root, "window") {
            let window = &mut config.window;
            window.title = optional_text(&node, "title").unwrap_or_else(|| window.title.clone());
            window.width = parse_u32(optional_text(&node, "width"), window.width)?;
            window.height = parse_u32(optional_text(&node, "height"), window.height)?;
        }

        if let Some(node) = child(&root, "shadow") {
            config.shadow_resolution =
                parse_u32(optional_text(&node, "resolution"), config.shadow_resolution)?;
        }

        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.position = parse_vec3(optional_text(&node, "position"), camera.position)?;
            camera.target = parse_vec3(optional_text(&node, "target"), camera.target)?;
            camera.up = parse_vec3(optional_text(&node, "up"), camera.up)?;
            camera.speed = parse_f32(optional_text(&node, "speed"), camera.speed)?;
            camera.sensitivity =
                parse_f32(optional_text(&node, "sensitivity"), camera.sensitivity)?;
            camera.fov = parse_f32(optional_text(&node, "fov"), camera.fov)?;
            camera.near = parse_f32(optional_text(&node, "near"), camera.near)?;
            camera.far = parse_f32(optional_text(&node, "far"), camera.far)?;
            let front = camera.target - camera.position;
            if front.length_squared() <= f32::EPSILON {
                return Err(anyhow!("camera target must differ from its position"));
            }
            if camera.up.length_squared() <= f32::EPSILON {
                return Err(anyhow!("camera up must be non-zero"));
            }
            if front.normalize().cross(camera.up.normalize()).length_squared() <= 1e-8 {
                return Err(anyhow!("camera up must not be parallel to the view direction"));
            }
        }

        if let Some(node) = child(&root, "light") {
            let light = &mut config.light;
            light.color = parse_color(optional_text(&node, "color"), light.color)?;
            light.angle = parse_f32(optional_text(&node, "angle"), light.angle)?;
            light.marker_scale =
                parse_f32(optional_text(&node, "marker-scale"), light.marker_scale)?;
            let frustum = &mut light.frustum;
            frustum.half_extent =
                parse_f32(optional_text(&node, "half-extent"), frustum.half_extent)?;
            frustum.near = parse_f32(optional_text(&node, "near"), frustum.near)?;
            frustum.far = parse_f32(optional_text(&node, "far"), frustum.far)?;
            frustum.distance = parse_f32(optional_text(&node, "distance"), frustum.distance)?;
        }

        if let Some(node) = child(&root, "point-light") {
            let point = &mut config.point_light;
            point.position = parse_vec3(optional_text(&node, "position"), point.position)?;
            point.color = parse_color(optional_text(&node, "color"), point.color)?;
        }

        if let Some(node) = child(&root, "clear-color") {
            let [r, g, b] = parse_color(node.text().map(str::to_string), Vec3::ZERO)?.to_array();
            config.clear_color = [r, g, b, 1.0];
        }

        let objects = root
            .children()
            .filter(|node| node.has_tag_name("object"))
            .map(|node| parse_object(&node))
            .collect::<Result<Vec<_>>>()?;
        if !objects.is_empty() {
            config.scene = SceneDescription { objects };
        }

        Ok(config)
    }
}

fn parse_object(node: &Node<'_, '_>) -> Result<ObjectDescription> {
    let name = required_text(node, "name")?;
    let mesh_name = required_text(node, "mesh").with_context(|| format!("object `{name}`"))?;
    let mesh = MeshSource::parse(&mesh_name)
        .ok_or_else(|| anyhow!("object `{name}` has unknown mesh `{mesh_name}`"))?;
    let transform = Transform::new(
        parse_vec3(optional_text(node, "position"), Vec3::ZERO)?,
        parse_vec3(optional_text(node, "scale"), Vec3::ONE)?,
    );
    Ok(ObjectDescription {
        name,
        mesh,
        transform,
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str) -> Result<Vec3> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("{what} component `{component}`: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(anyhow!("{what} needs 3 components, got {}", numbers.len())),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components(&value, "vector"),
        None => Ok(default),
    }
}

/// Colors are written as 0-255 components.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(parse_components(&value, "color")? / 255.0),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer `{value}`: {err}")),
        None => Ok(default),
    }
}

/// Command line options.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub shadow_resolution: Option<u32>,
    pub headless: bool,
    pub frames: u32,
    pub commands: Vec<InputCommand>,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            config: None,
            shadow_resolution: None,
            headless: false,
            frames: 1,
            commands: Vec::new(),
        }
    }
}

impl CliOptions {
    pub fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--shadow-resolution" => {
                    let raw = value("--shadow-resolution")?;
                    let resolution = raw
                        .parse()
                        .with_context(|| format!("invalid shadow resolution `{raw}`"))?;
                    options.shadow_resolution = Some(resolution);
                }
                "--headless" => options.headless = true,
                "--frames" => {
                    let raw = value("--frames")?;
                    options.frames = raw
                        .parse()
                        .with_context(|| format!("invalid frame count `{raw}`"))?;
                }
                "--commands" => {
                    options.commands = InputCommand::parse_list(&value("--commands")?)?;
                }
                "--help" | "-h" => return Err(anyhow!("{USAGE}")),
                other => return Err(anyhow!("Unknown argument: {other}\n{USAGE}")),
            }
        }
        Ok(options)
    }

    /// Loads the configuration file if one was given and applies command
    /// line overrides.
    pub fn resolve_config(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)?,
            None => RenderConfig::default(),
        };
        if let Some(resolution) = self.shadow_resolution {
            config.shadow_resolution = resolution;
        }
        Ok(config)
    }
}
