use glam::Mat4;
use log::info;

use super::{
    ClearOps, GraphicsBackend, PassDescriptor, Program, RenderTarget, UniformSlot, UniformValue,
    Viewport,
};
use crate::error::StartupError;
use crate::scene::Scene;

/// Default edge length of the shadow map, in texels.
pub const DEFAULT_SHADOW_RESOLUTION: u32 = 2048;

/// Off-screen depth-only target the shadow pass renders into.
///
/// Its size is fixed at creation and independent of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapTarget {
    width: u32,
    height: u32,
}

impl ShadowMapTarget {
    pub const DEFAULT: Self = Self {
        width: DEFAULT_SHADOW_RESOLUTION,
        height: DEFAULT_SHADOW_RESOLUTION,
    };

    /// Validates a square target of `resolution` texels against the largest
    /// 2D texture the device supports.
    pub fn new(resolution: u32, max_dimension: u32) -> Result<Self, StartupError> {
        Self::with_size(resolution, resolution, max_dimension)
    }

    pub fn with_size(width: u32, height: u32, max_dimension: u32) -> Result<Self, StartupError> {
        let incomplete = |reason: String| StartupError::ShadowTargetIncomplete {
            width,
            height,
            reason,
        };
        if width == 0 || height == 0 {
            return Err(incomplete("depth attachment has zero area".into()));
        }
        if width > max_dimension || height > max_dimension {
            return Err(incomplete(format!(
                "device supports at most {max_dimension}x{max_dimension}"
            )));
        }
        info!("shadow map target {width}x{height} ready");
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    #[default]
    Idle,
    Rendering,
}

/// Renders the scene's depth from the light's point of view.
#[derive(Debug, Default)]
pub struct ShadowPass {
    state: PassState,
}

impl ShadowPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn run<B: GraphicsBackend>(&mut self, backend: &mut B, light_space: Mat4, scene: &Scene) {
        self.state = PassState::Rendering;
        let viewport = backend.shadow_target().viewport();
        backend.begin_pass(&PassDescriptor {
            label: "shadow-pass",
            target: RenderTarget::ShadowMap,
            clear: ClearOps {
                color: None,
                depth: Some(1.0),
            },
            viewport,
            depth_test: true,
        });
        backend.use_program(Program::Depth);
        backend.set_uniform(
            UniformSlot::LightSpaceTrMatrix,
            UniformValue::Mat4(light_space),
        );
        for object in &scene.objects {
            backend.set_uniform(UniformSlot::Model, UniformValue::Mat4(object.model));
            backend.draw(object.mesh);
        }
        backend.end_pass();
        self.state = PassState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::render::headless::{BackendCall, HeadlessBackend};
    use crate::scene::SceneDescription;

    #[test]
    fn zero_sized_target_is_incomplete() {
        let err = ShadowMapTarget::new(0, 8192).unwrap_err();
        assert!(matches!(err, StartupError::ShadowTargetIncomplete { .. }));
    }

    #[test]
    fn oversized_target_is_incomplete() {
        assert!(ShadowMapTarget::new(16384, 8192).is_err());
        assert!(ShadowMapTarget::with_size(2048, 9000, 8192).is_err());
    }

    #[test]
    fn default_target_is_complete() {
        let target = ShadowMapTarget::new(DEFAULT_SHADOW_RESOLUTION, 8192).unwrap();
        assert_eq!(target.viewport(), Viewport { width: 2048, height: 2048 });
    }

    #[test]
    fn shadow_pass_renders_depth_only() {
        let mut backend = HeadlessBackend::default();
        let scene = Scene::upload(&SceneDescription::default(), &AssetLibrary::new("."), &mut backend);
        let light_space = Mat4::from_scale(glam::Vec3::splat(0.25));

        let mut pass = ShadowPass::new();
        pass.run(&mut backend, light_space, &scene);
        assert_eq!(pass.state(), PassState::Idle);

        let calls = backend.take_calls();
        let BackendCall::BeginPass(descriptor) = &calls[0] else {
            panic!("pass must begin first, got {:?}", calls[0]);
        };
        assert_eq!(descriptor.target, RenderTarget::ShadowMap);
        assert_eq!(descriptor.clear.color, None);
        assert_eq!(descriptor.clear.depth, Some(1.0));
        assert_eq!(descriptor.viewport, backend.shadow_target().viewport());
        assert_eq!(calls.last(), Some(&BackendCall::EndPass));

        let draws = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Draw(_)))
            .count();
        assert_eq!(draws, scene.objects.len());
        assert!(!calls.iter().any(|call| matches!(
            call,
            BackendCall::SetUniform(UniformSlot::NormalMatrix, _)
        )));
        assert!(calls.contains(&BackendCall::SetUniform(
            UniformSlot::LightSpaceTrMatrix,
            UniformValue::Mat4(light_space)
        )));
        assert_eq!(backend.bound_target(), RenderTarget::Default);
    }
}
