use anyhow::Result;

use super::shadow::ShadowMapTarget;
use super::{
    GraphicsBackend, MeshHandle, PassDescriptor, PolygonMode, Program, RenderTarget, UniformSlot,
    UniformValue, Viewport,
};
use crate::obj::MeshData;

/// Largest texture edge the headless backend accepts, matching wgpu's default
/// device limits.
pub const MAX_TEXTURE_DIMENSION: u32 = 8192;

/// One call made against the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    BeginFrame,
    BeginPass(PassDescriptor),
    UseProgram(Program),
    SetPolygonMode(PolygonMode),
    SetUniform(UniformSlot, UniformValue),
    BindShadowMap(u32),
    Draw(MeshHandle),
    EndPass,
    Present,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMesh {
    pub label: String,
    pub triangles: usize,
}

/// Backend that renders nothing and records every call instead.
#[derive(Debug)]
pub struct HeadlessBackend {
    framebuffer: Viewport,
    shadow_target: ShadowMapTarget,
    bound_target: RenderTarget,
    polygon_mode: PolygonMode,
    meshes: Vec<UploadedMesh>,
    calls: Vec<BackendCall>,
    pending_errors: Vec<String>,
    frames_presented: u64,
}

impl HeadlessBackend {
    pub fn new(framebuffer: Viewport, shadow_target: ShadowMapTarget) -> Self {
        Self {
            framebuffer,
            shadow_target,
            bound_target: RenderTarget::Default,
            polygon_mode: PolygonMode::Fill,
            meshes: Vec::new(),
            calls: Vec::new(),
            pending_errors: Vec::new(),
            frames_presented: 0,
        }
    }

    pub fn resize(&mut self, framebuffer: Viewport) {
        self.framebuffer = framebuffer;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn meshes(&self) -> &[UploadedMesh] {
        &self.meshes
    }

    pub fn bound_target(&self) -> RenderTarget {
        self.bound_target
    }

    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Queues an error for the next `drain_errors` call.
    pub fn inject_error(&mut self, message: impl Into<String>) {
        self.pending_errors.push(message.into());
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(
            Viewport {
                width: 800,
                height: 600,
            },
            ShadowMapTarget::DEFAULT,
        )
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle {
        self.meshes.push(UploadedMesh {
            label: label.to_string(),
            triangles: mesh.triangle_count(),
        });
        MeshHandle::new(self.meshes.len() - 1)
    }

    fn framebuffer_size(&self) -> Viewport {
        self.framebuffer
    }

    fn shadow_target(&self) -> &ShadowMapTarget {
        &self.shadow_target
    }

    fn begin_frame(&mut self) -> Result<bool> {
        self.calls.push(BackendCall::BeginFrame);
        Ok(true)
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) {
        self.bound_target = pass.target;
        self.polygon_mode = PolygonMode::Fill;
        self.calls.push(BackendCall::BeginPass(*pass));
    }

    fn use_program(&mut self, program: Program) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.polygon_mode = mode;
        self.calls.push(BackendCall::SetPolygonMode(mode));
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        self.calls.push(BackendCall::SetUniform(slot, value));
    }

    fn bind_shadow_map(&mut self, unit: u32) {
        self.calls.push(BackendCall::BindShadowMap(unit));
    }

    fn draw(&mut self, mesh: MeshHandle) {
        if mesh.index() >= self.meshes.len() {
            self.pending_errors
                .push(format!("INVALID_VALUE: mesh {} was never uploaded", mesh.index()));
        }
        self.calls.push(BackendCall::Draw(mesh));
    }

    fn end_pass(&mut self) {
        self.bound_target = RenderTarget::Default;
        self.calls.push(BackendCall::EndPass);
    }

    fn present(&mut self) -> Result<()> {
        self.frames_presented += 1;
        self.calls.push(BackendCall::Present);
        Ok(())
    }

    fn drain_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ClearOps;

    #[test]
    fn drawing_unknown_mesh_raises_an_error() {
        let mut backend = HeadlessBackend::default();
        backend.draw(MeshHandle::new(7));
        let errors = backend.drain_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("mesh 7"));
        assert!(backend.drain_errors().is_empty());
    }

    #[test]
    fn end_pass_restores_default_target() {
        let mut backend = HeadlessBackend::default();
        backend.begin_pass(&PassDescriptor {
            label: "scratch-pass",
            target: RenderTarget::ShadowMap,
            clear: ClearOps {
                color: None,
                depth: Some(1.0),
            },
            viewport: backend.shadow_target().viewport(),
            depth_test: true,
        });
        assert_eq!(backend.bound_target(), RenderTarget::ShadowMap);
        backend.end_pass();
        assert_eq!(backend.bound_target(), RenderTarget::Default);
    }
}
