use glam::{Mat3, Mat4, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    ClearOps, GraphicsBackend, PassDescriptor, PolygonMode, Program, RenderTarget, UniformSlot,
    UniformValue, DEPTH_MAP_UNIT, SHADOW_MAP_UNIT,
};
use crate::light::PointLight;
use crate::scene::Scene;

/// What the default framebuffer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    Shaded,
    /// Raw shadow map depth on a full-screen quad.
    DepthMap,
}

/// Runtime switches the user can flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Toggle {
    SecondLight(bool),
    Fog(bool),
    DepthView,
    Animation,
    PolygonMode(PolygonMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    pub second_light: bool,
    pub fog: bool,
    pub view: ViewMode,
    pub animation: bool,
    pub polygon_mode: PolygonMode,
}

impl RenderOptions {
    pub fn apply(&mut self, toggle: Toggle) {
        match toggle {
            Toggle::SecondLight(on) => self.second_light = on,
            Toggle::Fog(on) => self.fog = on,
            Toggle::DepthView => {
                self.view = match self.view {
                    ViewMode::Shaded => ViewMode::DepthMap,
                    ViewMode::DepthMap => ViewMode::Shaded,
                }
            }
            Toggle::Animation => self.animation = !self.animation,
            Toggle::PolygonMode(mode) => self.polygon_mode = mode,
        }
        debug!("render options now {self:?}");
    }
}

/// Per-frame values the shaded pass consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainPassInputs {
    pub view: Mat4,
    pub projection: Mat4,
    /// Must be the matrix the shadow pass rendered with this frame.
    pub light_space: Mat4,
    pub light_direction: Vec3,
    pub light_rotation: Mat4,
    pub light_color: Vec3,
    /// Where the light marker is drawn, in world space.
    pub light_position: Vec3,
    pub point_light: PointLight,
    pub options: RenderOptions,
    pub clear_color: [f32; 4],
    pub marker_scale: f32,
}

/// Upper 3x3 inverse-transpose of a model-view matrix.
pub fn normal_matrix(model_view: Mat4) -> Mat3 {
    Mat3::from_mat4(model_view).inverse().transpose()
}

/// Shades the scene from the camera, sampling the shadow map.
#[derive(Debug, Default)]
pub struct MainPass;

impl MainPass {
    pub fn run<B: GraphicsBackend>(&self, backend: &mut B, inputs: &MainPassInputs, scene: &Scene) {
        let viewport = backend.framebuffer_size();
        backend.begin_pass(&PassDescriptor {
            label: "main-pass",
            target: RenderTarget::Default,
            clear: ClearOps {
                color: Some(inputs.clear_color),
                depth: Some(1.0),
            },
            viewport,
            depth_test: true,
        });

        backend.set_polygon_mode(inputs.options.polygon_mode);
        backend.use_program(Program::Shaded);
        backend.set_uniform(UniformSlot::View, UniformValue::Mat4(inputs.view));
        backend.set_uniform(UniformSlot::Projection, UniformValue::Mat4(inputs.projection));
        let eye_light = normal_matrix(inputs.view * inputs.light_rotation) * inputs.light_direction;
        backend.set_uniform(UniformSlot::LightDir, UniformValue::Vec3(eye_light));
        backend.set_uniform(UniformSlot::LightColor, UniformValue::Vec3(inputs.light_color));
        backend.set_uniform(
            UniformSlot::PunctLight,
            UniformValue::Vec3(inputs.point_light.position),
        );
        backend.set_uniform(
            UniformSlot::PunctLightColor,
            UniformValue::Vec3(inputs.point_light.color),
        );
        backend.set_uniform(
            UniformSlot::SecondLight,
            UniformValue::Bool(inputs.options.second_light),
        );
        backend.set_uniform(UniformSlot::Fog, UniformValue::Bool(inputs.options.fog));
        backend.bind_shadow_map(SHADOW_MAP_UNIT);
        backend.set_uniform(
            UniformSlot::ShadowMap,
            UniformValue::TextureUnit(SHADOW_MAP_UNIT),
        );
        backend.set_uniform(
            UniformSlot::LightSpaceTrMatrix,
            UniformValue::Mat4(inputs.light_space),
        );

        for object in &scene.objects {
            backend.set_uniform(UniformSlot::Model, UniformValue::Mat4(object.model));
            backend.set_uniform(
                UniformSlot::NormalMatrix,
                UniformValue::Mat3(normal_matrix(inputs.view * object.model)),
            );
            backend.draw(object.mesh);
        }

        backend.use_program(Program::LightMarker);
        backend.set_uniform(UniformSlot::View, UniformValue::Mat4(inputs.view));
        backend.set_uniform(UniformSlot::Projection, UniformValue::Mat4(inputs.projection));
        let marker = Mat4::from_translation(inputs.light_position)
            * Mat4::from_scale(Vec3::splat(inputs.marker_scale));
        backend.set_uniform(UniformSlot::Model, UniformValue::Mat4(marker));
        backend.draw(scene.light_marker);

        backend.end_pass();
    }
}

/// Debug pass replacing the shaded view with the shadow map's depth.
#[derive(Debug, Default)]
pub struct DepthVisualizationPass;

impl DepthVisualizationPass {
    pub fn run<B: GraphicsBackend>(&self, backend: &mut B, clear_color: [f32; 4], scene: &Scene) {
        let viewport = backend.framebuffer_size();
        backend.begin_pass(&PassDescriptor {
            label: "depth-visualization-pass",
            target: RenderTarget::Default,
            clear: ClearOps {
                color: Some(clear_color),
                depth: None,
            },
            viewport,
            depth_test: false,
        });
        backend.use_program(Program::ScreenQuad);
        backend.bind_shadow_map(DEPTH_MAP_UNIT);
        backend.set_uniform(
            UniformSlot::DepthMap,
            UniformValue::TextureUnit(DEPTH_MAP_UNIT),
        );
        backend.draw(scene.screen_quad);
        backend.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::render::headless::{BackendCall, HeadlessBackend};
    use crate::scene::SceneDescription;

    fn inputs() -> MainPassInputs {
        MainPassInputs {
            view: Mat4::look_at_rh(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(45f32.to_radians(), 4.0 / 3.0, 0.1, 100.0),
            light_space: Mat4::from_scale(Vec3::splat(0.1)),
            light_direction: Vec3::new(0.0, 1.0, 1.0).normalize(),
            light_rotation: Mat4::IDENTITY,
            light_color: Vec3::ONE,
            light_position: Vec3::new(0.0, 3.0, 3.0),
            point_light: PointLight::default(),
            options: RenderOptions::default(),
            clear_color: [0.7, 0.7, 0.7, 1.0],
            marker_scale: 0.1,
        }
    }

    fn setup() -> (HeadlessBackend, Scene) {
        let mut backend = HeadlessBackend::default();
        let scene = Scene::upload(&SceneDescription::default(), &AssetLibrary::new("."), &mut backend);
        (backend, scene)
    }

    #[test]
    fn options_toggle() {
        let mut options = RenderOptions::default();
        options.apply(Toggle::DepthView);
        assert_eq!(options.view, ViewMode::DepthMap);
        options.apply(Toggle::DepthView);
        assert_eq!(options.view, ViewMode::Shaded);
        options.apply(Toggle::Fog(true));
        options.apply(Toggle::Fog(true));
        assert!(options.fog);
        options.apply(Toggle::SecondLight(false));
        assert!(!options.second_light);
        options.apply(Toggle::Animation);
        assert!(options.animation);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let normal = normal_matrix(model) * Vec3::X;
        assert!((normal - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn main_pass_clears_and_shades_every_object() {
        let (mut backend, scene) = setup();
        let inputs = inputs();
        MainPass.run(&mut backend, &inputs, &scene);
        let calls = backend.take_calls();

        let BackendCall::BeginPass(descriptor) = &calls[0] else {
            panic!("expected pass begin, got {:?}", calls[0]);
        };
        assert_eq!(descriptor.target, RenderTarget::Default);
        assert_eq!(descriptor.clear.color, Some(inputs.clear_color));
        assert_eq!(descriptor.clear.depth, Some(1.0));
        assert_eq!(descriptor.viewport, backend.framebuffer_size());
        assert!(calls.contains(&BackendCall::BindShadowMap(SHADOW_MAP_UNIT)));
        assert!(calls.contains(&BackendCall::SetUniform(
            UniformSlot::LightSpaceTrMatrix,
            UniformValue::Mat4(inputs.light_space)
        )));

        let normal_matrices = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::SetUniform(UniformSlot::NormalMatrix, _)))
            .count();
        assert_eq!(normal_matrices, scene.objects.len());
        let draws: Vec<_> = calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Draw(mesh) => Some(*mesh),
                _ => None,
            })
            .collect();
        assert_eq!(draws.len(), scene.objects.len() + 1);
        assert_eq!(draws.last(), Some(&scene.light_marker));
    }

    #[test]
    fn light_direction_is_sent_in_view_space() {
        let (mut backend, scene) = setup();
        let mut inputs = inputs();
        inputs.view = Mat4::from_rotation_y(90f32.to_radians());
        inputs.light_direction = Vec3::Z;
        MainPass.run(&mut backend, &inputs, &scene);

        let sent = backend.calls().iter().find_map(|call| match call {
            BackendCall::SetUniform(UniformSlot::LightDir, UniformValue::Vec3(v)) => Some(*v),
            _ => None,
        });
        let sent = sent.expect("lightDir uniform");
        assert!((sent - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn toggles_reach_the_program() {
        let (mut backend, scene) = setup();
        let mut inputs = inputs();
        inputs.options.apply(Toggle::SecondLight(true));
        inputs.options.apply(Toggle::Fog(true));
        MainPass.run(&mut backend, &inputs, &scene);
        let calls = backend.calls();
        assert!(calls.contains(&BackendCall::SetUniform(
            UniformSlot::SecondLight,
            UniformValue::Bool(true)
        )));
        assert!(calls.contains(&BackendCall::SetUniform(
            UniformSlot::Fog,
            UniformValue::Bool(true)
        )));
    }

    #[test]
    fn polygon_mode_applies_to_the_main_pass_only() {
        let (mut backend, scene) = setup();
        let mut inputs = inputs();
        inputs.options.apply(Toggle::PolygonMode(PolygonMode::Line));
        MainPass.run(&mut backend, &inputs, &scene);
        let calls = backend.take_calls();
        let set = calls
            .iter()
            .position(|call| *call == BackendCall::SetPolygonMode(PolygonMode::Line))
            .expect("polygon mode set");
        let first_draw = calls
            .iter()
            .position(|call| matches!(call, BackendCall::Draw(_)))
            .expect("draw");
        assert!(set < first_draw);
        assert_eq!(backend.polygon_mode(), PolygonMode::Line);

        DepthVisualizationPass.run(&mut backend, [0.0; 4], &scene);
        assert_eq!(backend.polygon_mode(), PolygonMode::Fill);
        assert!(!backend
            .calls()
            .iter()
            .any(|call| matches!(call, BackendCall::SetPolygonMode(_))));
    }

    #[test]
    fn depth_view_draws_only_the_quad_without_depth_test() {
        let (mut backend, scene) = setup();
        DepthVisualizationPass.run(&mut backend, [0.0; 4], &scene);
        let calls = backend.take_calls();

        let BackendCall::BeginPass(descriptor) = &calls[0] else {
            panic!("expected pass begin, got {:?}", calls[0]);
        };
        assert!(!descriptor.depth_test);
        assert_eq!(descriptor.clear.depth, None);
        assert!(calls.contains(&BackendCall::UseProgram(Program::ScreenQuad)));
        assert!(calls.contains(&BackendCall::SetUniform(
            UniformSlot::DepthMap,
            UniformValue::TextureUnit(DEPTH_MAP_UNIT)
        )));
        let draws: Vec<_> = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Draw(_)))
            .collect();
        assert_eq!(draws, [&BackendCall::Draw(scene.screen_quad)]);
    }
}
