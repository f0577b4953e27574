//! Shadow-mapped scene viewer.
//!
//! Every frame renders the scene's depth from a directional light into an
//! offscreen shadow map, then shades the scene from a free-flying camera
//! while sampling that map. A debug view shows the raw shadow map instead.
//! The passes talk to a small [`render::GraphicsBackend`] trait so the whole
//! frame can be driven by the wgpu renderer or by a recording backend in
//! tests and headless runs.

pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod input;
pub mod light;
pub mod obj;
pub mod render;
pub mod scene;

pub use camera::{Camera, MoveDirection};
pub use config::{CliOptions, RenderConfig};
pub use error::StartupError;
pub use frame::{FrameReport, FrameScheduler, RenderState};
pub use input::{InputCommand, InputState, KeyCode, NamedKey};
pub use light::{compute_light_space_matrix, LightFrustum, LightState, PointLight};
pub use obj::{parse_obj, MeshData, Vertex};
pub use render::headless::HeadlessBackend;
pub use render::native::Renderer;
pub use render::{GraphicsBackend, MainPass, PolygonMode, ShadowPass, ViewMode};
pub use scene::{Scene, SceneDescription};
