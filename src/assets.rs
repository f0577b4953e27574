use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::Vec3;
use log::error;
use serde::{Deserialize, Serialize};

use crate::obj::{parse_obj, MeshData, Vertex};

/// Meshes that ship with the viewer and need no files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinMesh {
    /// Unit cube centred on the origin.
    Cube,
    /// 20x20 ground plane in the XZ plane, facing +Y.
    Plane,
    /// Full-screen quad in clip space.
    Quad,
}

/// Where the geometry of a drawable comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshSource {
    Builtin(BuiltinMesh),
    Obj(PathBuf),
}

impl MeshSource {
    /// Parses `builtin:<name>` or treats the value as an OBJ path.
    pub fn parse(value: &str) -> Option<Self> {
        match value.strip_prefix("builtin:") {
            Some("cube") => Some(Self::Builtin(BuiltinMesh::Cube)),
            Some("plane") => Some(Self::Builtin(BuiltinMesh::Plane)),
            Some("quad") => Some(Self::Builtin(BuiltinMesh::Quad)),
            Some(_) => None,
            None if value.is_empty() => None,
            None => Some(Self::Obj(PathBuf::from(value))),
        }
    }
}

impl fmt::Display for MeshSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(BuiltinMesh::Cube) => f.write_str("builtin:cube"),
            Self::Builtin(BuiltinMesh::Plane) => f.write_str("builtin:plane"),
            Self::Builtin(BuiltinMesh::Quad) => f.write_str("builtin:quad"),
            Self::Obj(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolves mesh sources into CPU-side mesh data.
///
/// Relative OBJ paths are looked up under `root`. A file that cannot be read
/// or parsed is logged and replaced by the built-in cube so the scene still
/// renders.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
}

impl AssetLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self, source: &MeshSource) -> MeshData {
        match source {
            MeshSource::Builtin(mesh) => builtin_mesh(*mesh),
            MeshSource::Obj(path) => match self.load_obj(path) {
                Ok(mesh) => mesh,
                Err(err) => {
                    error!("failed to load mesh {source}: {err:?}; using builtin cube");
                    builtin_mesh(BuiltinMesh::Cube)
                }
            },
        }
    }

    fn load_obj(&self, path: &Path) -> Result<MeshData> {
        let path = self.root.join(path);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        parse_obj(&contents).with_context(|| format!("failed to parse OBJ {}", path.display()))
    }
}

pub fn builtin_mesh(mesh: BuiltinMesh) -> MeshData {
    match mesh {
        BuiltinMesh::Cube => cube(),
        BuiltinMesh::Plane => quad_facing(Vec3::Y, 10.0),
        BuiltinMesh::Quad => MeshData {
            vertices: [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .into_iter()
                .map(|(x, y)| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z))
                .collect(),
            indices: vec![0, 1, 2, 0, 2, 3],
        },
    }
}

fn cube() -> MeshData {
    let mut mesh = MeshData::default();
    for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        let face = quad_facing(normal, 0.5);
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(face.vertices.into_iter().map(|mut vertex| {
            let offset = normal * 0.5;
            vertex.position = (Vec3::from(vertex.position) + offset).into();
            vertex
        }));
        mesh.indices.extend(face.indices.into_iter().map(|i| base + i));
    }
    mesh
}

/// Square of half size `half` through the origin, wound counter-clockwise
/// when seen from the side `normal` points to.
fn quad_facing(normal: Vec3, half: f32) -> MeshData {
    let helper = if normal.y.abs() > 0.5 { Vec3::Z } else { Vec3::Y };
    let tangent = helper.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    let corner = |s: f32, t: f32| Vertex::new((tangent * s + bitangent * t) * half, normal);
    MeshData {
        vertices: vec![
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn winding_normal(mesh: &MeshData, triangle: usize) -> Vec3 {
        let p = |i: usize| Vec3::from(mesh.vertices[mesh.indices[triangle * 3 + i] as usize].position);
        (p(1) - p(0)).cross(p(2) - p(0)).normalize()
    }

    #[test]
    fn builtin_faces_wind_towards_their_normals() {
        for kind in [BuiltinMesh::Cube, BuiltinMesh::Plane, BuiltinMesh::Quad] {
            let mesh = builtin_mesh(kind);
            for triangle in 0..mesh.triangle_count() {
                let declared = Vec3::from(mesh.vertices[mesh.indices[triangle * 3] as usize].normal);
                assert!((winding_normal(&mesh, triangle) - declared).length() < 1e-5);
            }
        }
    }

    #[test]
    fn cube_spans_unit_box() {
        let mesh = builtin_mesh(BuiltinMesh::Cube);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        for vertex in &mesh.vertices {
            for component in vertex.position {
                assert!((component.abs() - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn parses_mesh_sources() {
        assert_eq!(
            MeshSource::parse("builtin:plane"),
            Some(MeshSource::Builtin(BuiltinMesh::Plane))
        );
        assert_eq!(
            MeshSource::parse("models/cube/cube.obj"),
            Some(MeshSource::Obj(PathBuf::from("models/cube/cube.obj")))
        );
        assert_eq!(MeshSource::parse("builtin:teapot"), None);
        assert_eq!(MeshSource::parse(""), None);
    }

    #[test]
    fn loads_obj_relative_to_root() {
        let mut file = NamedTempFile::new().expect("temp obj");
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").expect("write obj");
        let root = file.path().parent().expect("temp dir").to_path_buf();
        let name = file.path().file_name().expect("file name").to_owned();

        let library = AssetLibrary::new(root);
        let mesh = library.load(&MeshSource::Obj(PathBuf::from(name)));
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn missing_obj_falls_back_to_cube() {
        let library = AssetLibrary::new("/definitely/not/here");
        let mesh = library.load(&MeshSource::Obj(PathBuf::from("proj.obj")));
        assert_eq!(mesh, builtin_mesh(BuiltinMesh::Cube));
    }
}
