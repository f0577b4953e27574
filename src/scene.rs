use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::assets::{AssetLibrary, BuiltinMesh, MeshSource};
use crate::render::{GraphicsBackend, MeshHandle};

/// Translate-then-scale placement of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, scale: Vec3) -> Self {
        Self { translation, scale }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation) * Mat4::from_scale(self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Configured scene object, before its mesh has been uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub name: String,
    pub mesh: MeshSource,
    #[serde(default)]
    pub transform: Transform,
}

/// Ordered list of drawables making up the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub objects: Vec<ObjectDescription>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self {
            objects: vec![
                ObjectDescription {
                    name: "centerpiece".into(),
                    mesh: MeshSource::Builtin(BuiltinMesh::Cube),
                    transform: Transform::IDENTITY,
                },
                ObjectDescription {
                    name: "ground".into(),
                    mesh: MeshSource::Builtin(BuiltinMesh::Plane),
                    transform: Transform::new(Vec3::new(0.0, -1.0, 0.0), Vec3::splat(0.5)),
                },
            ],
        }
    }
}

/// Uploaded scene object.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub mesh: MeshHandle,
    pub model: Mat4,
}

/// The fixed set of drawables rendered every frame, plus the helper meshes
/// the passes need.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub light_marker: MeshHandle,
    pub screen_quad: MeshHandle,
}

impl Scene {
    /// Loads and uploads every mesh of `description` through `backend`.
    pub fn upload<B: GraphicsBackend>(
        description: &SceneDescription,
        assets: &AssetLibrary,
        backend: &mut B,
    ) -> Self {
        let objects = description
            .objects
            .iter()
            .map(|object| SceneObject {
                name: object.name.clone(),
                mesh: backend.upload_mesh(&object.name, &assets.load(&object.mesh)),
                model: object.transform.matrix(),
            })
            .collect();
        let light_marker = backend.upload_mesh(
            "light-marker",
            &assets.load(&MeshSource::Builtin(BuiltinMesh::Cube)),
        );
        let screen_quad = backend.upload_mesh(
            "screen-quad",
            &assets.load(&MeshSource::Builtin(BuiltinMesh::Quad)),
        );
        Self {
            objects,
            light_marker,
            screen_quad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessBackend;

    #[test]
    fn transform_translates_after_scaling() {
        let transform = Transform::new(Vec3::new(0.0, -1.0, 0.0), Vec3::splat(0.5));
        let corner = transform.matrix().transform_point3(Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(corner, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn upload_keeps_object_order() {
        let mut backend = HeadlessBackend::default();
        let assets = AssetLibrary::new(".");
        let scene = Scene::upload(&SceneDescription::default(), &assets, &mut backend);

        let names: Vec<_> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["centerpiece", "ground"]);
        assert_eq!(backend.meshes().len(), 4);
        assert_ne!(scene.light_marker, scene.screen_quad);
        assert_eq!(
            scene.objects[1].model,
            Mat4::from_translation(Vec3::NEG_Y) * Mat4::from_scale(Vec3::splat(0.5))
        );
    }
}
