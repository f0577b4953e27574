use anyhow::Result;
use glam::{Mat4, Vec3};
use log::{debug, info};

use crate::camera::Camera;
use crate::check_graphics_errors;
use crate::config::{CameraConfig, RenderConfig};
use crate::input::InputCommand;
use crate::light::{LightState, PointLight, ANIMATION_STEP};
use crate::render::{
    DepthVisualizationPass, GraphicsBackend, MainPass, MainPassInputs, RenderOptions, ShadowPass,
    Toggle, ViewMode,
};
use crate::scene::Scene;

/// Degrees the camera rolls per frame while an arrow key is held.
const ROLL_STEP: f32 = 1.0;

/// Values fixed at startup that the frame loop reads.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSettings {
    pub camera: CameraConfig,
    pub light_color: Vec3,
    pub point_light: PointLight,
    pub clear_color: [f32; 4],
    pub marker_scale: f32,
}

/// Mutable state carried from one frame to the next.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub camera: Camera,
    pub light: LightState,
    pub options: RenderOptions,
    pub scene: Scene,
    pub settings: FrameSettings,
}

impl RenderState {
    pub fn new(config: &RenderConfig, scene: Scene) -> Self {
        let camera = &config.camera;
        Self {
            camera: Camera::new(camera.position, camera.target, camera.up),
            light: LightState::new(config.light.angle, config.light.frustum),
            options: RenderOptions::default(),
            scene,
            settings: FrameSettings {
                camera: camera.clone(),
                light_color: config.light.color,
                point_light: config.point_light,
                clear_color: config.clear_color,
                marker_scale: config.light.marker_scale,
            },
        }
    }
}

/// What a frame rendered, for callers that want to observe it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub light_space_matrix: Mat4,
    pub view: ViewMode,
}

/// Drives the passes in order, once per displayed frame.
#[derive(Debug)]
pub struct FrameScheduler {
    state: RenderState,
    shadow_pass: ShadowPass,
    main_pass: MainPass,
    depth_pass: DepthVisualizationPass,
    close_requested: bool,
    frames: u64,
}

impl FrameScheduler {
    pub fn new(state: RenderState) -> Self {
        Self {
            state,
            shadow_pass: ShadowPass::new(),
            main_pass: MainPass,
            depth_pass: DepthVisualizationPass,
            close_requested: false,
            frames: 0,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Number of frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        self.state.settings.camera.projection(aspect)
    }

    pub fn apply_command(&mut self, command: InputCommand) {
        let state = &mut self.state;
        let settings = &state.settings;
        match command {
            InputCommand::Move(direction) => state.camera.move_by(direction, settings.camera.speed),
            InputCommand::RotateCamera { dx, dy } => {
                let sensitivity = settings.camera.sensitivity;
                state.camera.rotate(
                    (dy * sensitivity).to_radians(),
                    (dx * sensitivity).to_radians(),
                    0.0,
                );
            }
            InputCommand::RollLeft => state.camera.rotate(0.0, 0.0, -ROLL_STEP.to_radians()),
            InputCommand::RollRight => state.camera.rotate(0.0, 0.0, ROLL_STEP.to_radians()),
            InputCommand::RotateLight(degrees) => state.light.advance(degrees),
            InputCommand::SetSecondLight(on) => state.options.apply(Toggle::SecondLight(on)),
            InputCommand::SetFog(on) => state.options.apply(Toggle::Fog(on)),
            InputCommand::SetPolygonMode(mode) => state.options.apply(Toggle::PolygonMode(mode)),
            InputCommand::ToggleDepthView => state.options.apply(Toggle::DepthView),
            InputCommand::ToggleAnimation => state.options.apply(Toggle::Animation),
            InputCommand::RequestClose => {
                info!("close requested");
                self.close_requested = true;
            }
        }
    }

    /// Applies `commands`, advances the animation and renders one frame.
    ///
    /// Returns `None` when the backend had no frame to draw into. Graphics
    /// errors raised while rendering are logged, never returned.
    pub fn run_frame<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        commands: &[InputCommand],
    ) -> Result<Option<FrameReport>> {
        for command in commands {
            self.apply_command(*command);
        }
        if self.state.options.animation {
            self.state.light.advance(ANIMATION_STEP);
        }

        if !backend.begin_frame()? {
            debug!("frame skipped by the backend");
            check_graphics_errors!(backend);
            return Ok(None);
        }

        let state = &self.state;
        let light_space = state.light.light_space_matrix();
        self.shadow_pass.run(backend, light_space, &state.scene);

        match state.options.view {
            ViewMode::Shaded => {
                let direction = state.light.direction();
                let inputs = MainPassInputs {
                    view: state.camera.view_matrix(),
                    projection: self.projection(backend.framebuffer_size().aspect()),
                    light_space,
                    light_direction: direction,
                    light_rotation: state.light.rotation(),
                    light_color: state.settings.light_color,
                    light_position: direction * state.light.frustum().distance,
                    point_light: state.settings.point_light,
                    options: state.options,
                    clear_color: state.settings.clear_color,
                    marker_scale: state.settings.marker_scale,
                };
                self.main_pass.run(backend, &inputs, &state.scene);
            }
            ViewMode::DepthMap => {
                self.depth_pass
                    .run(backend, state.settings.clear_color, &state.scene);
            }
        }

        backend.present()?;
        check_graphics_errors!(backend);
        self.frames += 1;

        Ok(Some(FrameReport {
            light_space_matrix: light_space,
            view: state.options.view,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::camera::MoveDirection;
    use crate::render::headless::{BackendCall, HeadlessBackend};
    use crate::render::{PolygonMode, Program, UniformSlot, UniformValue};

    fn scheduler(config: &RenderConfig) -> (FrameScheduler, HeadlessBackend) {
        let mut backend = HeadlessBackend::default();
        let scene = Scene::upload(&config.scene, &AssetLibrary::new("."), &mut backend);
        (FrameScheduler::new(RenderState::new(config, scene)), backend)
    }

    fn light_space_uploads(calls: &[BackendCall]) -> Vec<Mat4> {
        calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetUniform(UniformSlot::LightSpaceTrMatrix, UniformValue::Mat4(m)) => {
                    Some(*m)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn still_light_renders_the_same_matrix_twice() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        let first = scheduler.run_frame(&mut backend, &[]).unwrap().unwrap();
        let second = scheduler.run_frame(&mut backend, &[]).unwrap().unwrap();
        assert_eq!(first.light_space_matrix, second.light_space_matrix);
        assert_eq!(scheduler.frames(), 2);
    }

    #[test]
    fn both_passes_share_the_frame_matrix() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        backend.take_calls();
        let report = scheduler
            .run_frame(&mut backend, &[InputCommand::ToggleAnimation])
            .unwrap()
            .unwrap();
        let uploads = light_space_uploads(backend.calls());
        assert_eq!(uploads, [report.light_space_matrix; 2]);
    }

    #[test]
    fn animation_turns_the_light_each_frame() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        let first = scheduler
            .run_frame(&mut backend, &[InputCommand::ToggleAnimation])
            .unwrap()
            .unwrap();
        let second = scheduler.run_frame(&mut backend, &[]).unwrap().unwrap();
        assert_ne!(first.light_space_matrix, second.light_space_matrix);
        assert_eq!(scheduler.state().light.angle(), 2.0 * ANIMATION_STEP);
    }

    #[test]
    fn pass_order_is_shadow_then_main() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        backend.take_calls();
        scheduler.run_frame(&mut backend, &[]).unwrap();
        let labels: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::BeginPass(pass) => Some(pass.label),
                _ => None,
            })
            .collect();
        assert_eq!(labels, ["shadow-pass", "main-pass"]);
        assert_eq!(backend.calls().first(), Some(&BackendCall::BeginFrame));
        assert_eq!(backend.calls().last(), Some(&BackendCall::Present));
    }

    #[test]
    fn depth_view_replaces_the_main_pass() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        backend.take_calls();
        let report = scheduler
            .run_frame(&mut backend, &[InputCommand::ToggleDepthView])
            .unwrap()
            .unwrap();
        assert_eq!(report.view, ViewMode::DepthMap);
        let calls = backend.calls();
        assert!(calls.contains(&BackendCall::UseProgram(Program::Depth)));
        assert!(calls.contains(&BackendCall::UseProgram(Program::ScreenQuad)));
        assert!(!calls.contains(&BackendCall::UseProgram(Program::Shaded)));
    }

    #[test]
    fn wireframe_only_reaches_the_main_pass() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        backend.take_calls();
        let wireframe = InputCommand::SetPolygonMode(PolygonMode::Line);
        scheduler.run_frame(&mut backend, &[wireframe]).unwrap();
        assert_eq!(scheduler.state().options.polygon_mode, PolygonMode::Line);

        let calls = backend.calls();
        let main_start = calls
            .iter()
            .position(|call| matches!(call, BackendCall::BeginPass(pass) if pass.label == "main-pass"))
            .unwrap();
        let line = BackendCall::SetPolygonMode(PolygonMode::Line);
        assert!(!calls[..main_start].contains(&line));
        assert!(calls[main_start..].contains(&line));

        // the next frame's shadow pass starts filled again
        backend.take_calls();
        scheduler.run_frame(&mut backend, &[]).unwrap();
        let calls = backend.calls();
        let main_start = calls
            .iter()
            .position(|call| matches!(call, BackendCall::BeginPass(pass) if pass.label == "main-pass"))
            .unwrap();
        assert!(!calls[..main_start].contains(&line));
    }

    #[test]
    fn commands_move_the_camera_before_rendering() {
        let mut config = RenderConfig::default();
        config.camera.position = Vec3::new(0.0, 0.0, 5.0);
        config.camera.target = Vec3::ZERO;
        config.camera.speed = 1.0;
        let (mut scheduler, mut backend) = scheduler(&config);
        scheduler
            .run_frame(&mut backend, &[InputCommand::Move(MoveDirection::Forward)])
            .unwrap();
        let position = scheduler.state().camera.position();
        assert!((position - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-5);
    }

    #[test]
    fn mouse_motion_turns_the_camera_by_sensitivity() {
        let mut config = RenderConfig::default();
        config.camera.position = Vec3::ZERO;
        config.camera.target = Vec3::X;
        let (mut scheduler, _) = scheduler(&config);
        let yaw = scheduler.state().camera.yaw();
        scheduler.apply_command(InputCommand::RotateCamera { dx: 10.0, dy: 0.0 });
        assert!((scheduler.state().camera.yaw() - yaw - 3.0).abs() < 1e-4);
    }

    #[test]
    fn close_request_stops_the_loop() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        assert!(!scheduler.should_close());
        scheduler
            .run_frame(&mut backend, &[InputCommand::RequestClose])
            .unwrap();
        assert!(scheduler.should_close());
    }

    #[test]
    fn graphics_errors_do_not_fail_the_frame() {
        let (mut scheduler, mut backend) = scheduler(&RenderConfig::default());
        backend.inject_error("INVALID_OPERATION: injected");
        let report = scheduler.run_frame(&mut backend, &[]).unwrap();
        assert!(report.is_some());
        assert!(backend.drain_errors().is_empty());
    }

    #[test]
    fn projection_follows_the_aspect_ratio() {
        let (scheduler, _) = scheduler(&RenderConfig::default());
        let wide = scheduler.projection(2.0);
        let square = scheduler.projection(1.0);
        assert!((square.x_axis.x / wide.x_axis.x - 2.0).abs() < 1e-5);
    }
}
