//! Rendering contract shared by the passes and the graphics backends.
//!
//! Passes never talk to a GPU API directly. They drive a [`GraphicsBackend`]
//! through a small, GL-like vocabulary: begin a pass on a target, select a
//! program, fill its named uniform slots, draw meshes, end the pass. The
//! wgpu implementation lives in [`native`]; [`headless`] records the calls
//! for tests and for the `--headless` mode of the binary.

pub mod headless;
pub mod main_pass;
pub mod native;
mod shaders;
pub mod shadow;

use anyhow::Result;
use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::obj::MeshData;
use shadow::ShadowMapTarget;

pub use main_pass::{
    DepthVisualizationPass, MainPass, MainPassInputs, RenderOptions, Toggle, ViewMode,
};
pub use shadow::ShadowPass;

/// Texture unit the shaded program samples the shadow map from.
pub const SHADOW_MAP_UNIT: u32 = 3;
/// Texture unit the depth visualization program samples from.
pub const DEPTH_MAP_UNIT: u32 = 0;

/// Opaque handle to a mesh uploaded to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(usize);

impl MeshHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Compiled programs the backend provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    /// Depth-only program used to fill the shadow map.
    Depth,
    /// Directional + point light shading with shadows and fog.
    Shaded,
    /// Unlit marker showing where the directional light sits.
    LightMarker,
    /// Full-screen quad showing the shadow map's depth.
    ScreenQuad,
}

impl Program {
    pub const ALL: [Program; 4] = [
        Program::Depth,
        Program::Shaded,
        Program::LightMarker,
        Program::ScreenQuad,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Named uniform slots a program exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    Model,
    View,
    Projection,
    NormalMatrix,
    LightDir,
    LightColor,
    PunctLight,
    PunctLightColor,
    SecondLight,
    Fog,
    LightSpaceTrMatrix,
    ShadowMap,
    DepthMap,
}

impl UniformSlot {
    /// Name of the slot as declared by the programs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::View => "view",
            Self::Projection => "projection",
            Self::NormalMatrix => "normalMatrix",
            Self::LightDir => "lightDir",
            Self::LightColor => "lightColor",
            Self::PunctLight => "punctLight",
            Self::PunctLightColor => "punctLightColor",
            Self::SecondLight => "secondLight",
            Self::Fog => "fog",
            Self::LightSpaceTrMatrix => "lightSpaceTrMatrix",
            Self::ShadowMap => "shadowMap",
            Self::DepthMap => "depthMap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Mat3(Mat3),
    Vec3(Vec3),
    Bool(bool),
    TextureUnit(u32),
}

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

/// Framebuffer a pass renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The window's framebuffer.
    Default,
    /// The depth-only shadow map target.
    ShadowMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Buffers cleared when a pass begins. `None` keeps the previous contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearOps {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDescriptor {
    pub label: &'static str,
    pub target: RenderTarget,
    pub clear: ClearOps,
    pub viewport: Viewport,
    pub depth_test: bool,
}

/// Graphics API seen by the passes.
///
/// Uniform values persist per program until overwritten, and every `draw`
/// uses the values current at the time of the call.
pub trait GraphicsBackend {
    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle;

    /// Size of the window's framebuffer in pixels.
    fn framebuffer_size(&self) -> Viewport;

    fn shadow_target(&self) -> &ShadowMapTarget;

    /// Acquires the next frame. Returns `false` when the frame must be skipped.
    fn begin_frame(&mut self) -> Result<bool>;

    fn begin_pass(&mut self, pass: &PassDescriptor);

    fn use_program(&mut self, program: Program);

    /// Rasterization mode for the following draws. Reset to
    /// [`PolygonMode::Fill`] by `begin_pass`.
    fn set_polygon_mode(&mut self, mode: PolygonMode);

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue);

    /// Binds the shadow map's depth texture to a texture unit.
    fn bind_shadow_map(&mut self, unit: u32);

    fn draw(&mut self, mesh: MeshHandle);

    /// Finishes the current pass and rebinds the default framebuffer.
    fn end_pass(&mut self);

    /// Submits the frame and blocks until the display accepts it.
    fn present(&mut self) -> Result<()>;

    /// Returns and clears the graphics errors raised since the last call.
    fn drain_errors(&mut self) -> Vec<String>;
}

/// Logs every pending backend error with the location of the check.
#[macro_export]
macro_rules! check_graphics_errors {
    ($backend:expr) => {
        for error in $crate::render::GraphicsBackend::drain_errors(&mut *$backend) {
            ::log::error!("{} | {} ({})", error, file!(), line!());
        }
    };
}
