use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Interleaved vertex consumed by every program: position then normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
        }
    }
}

/// Indexed triangle list ready to be uploaded by a graphics backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Parses Wavefront OBJ text into a [`MeshData`].
///
/// Polygons are fan-triangulated. Texture coordinates, groups and materials
/// are ignored. Vertices without a normal get a smoothed face normal.
pub fn parse_obj(source: &str) -> Result<MeshData> {
    let mut reader = ObjReader::default();
    for (index, line) in source.lines().enumerate() {
        reader
            .read_line(line)
            .with_context(|| format!("line {}", index + 1))?;
    }
    reader.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    position: usize,
    normal: Option<usize>,
}

#[derive(Default)]
struct ObjReader {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    corners: Vec<Corner>,
}

impl ObjReader {
    fn read_line(&mut self, line: &str) -> Result<()> {
        let line = line.split('#').next().unwrap_or_default().trim();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => self.positions.push(read_vec3(tokens)?),
            Some("vn") => self.normals.push(read_vec3(tokens)?),
            Some("f") => {
                let polygon = tokens
                    .map(|token| self.read_corner(token))
                    .collect::<Result<Vec<_>>>()?;
                if polygon.len() < 3 {
                    bail!("face needs at least three corners");
                }
                for i in 1..polygon.len() - 1 {
                    self.corners
                        .extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn read_corner(&self, token: &str) -> Result<Corner> {
        let mut fields = token.split('/');
        let position = fields
            .next()
            .filter(|field| !field.is_empty())
            .ok_or_else(|| anyhow!("face corner `{token}` has no vertex index"))?;
        let position = resolve_index(position.parse()?, self.positions.len())
            .ok_or_else(|| anyhow!("vertex index in `{token}` is out of range"))?;
        let normal = match fields.nth(1) {
            Some(field) if !field.is_empty() => Some(
                resolve_index(field.parse()?, self.normals.len())
                    .ok_or_else(|| anyhow!("normal index in `{token}` is out of range"))?,
            ),
            _ => None,
        };
        Ok(Corner { position, normal })
    }

    fn finish(self) -> Result<MeshData> {
        if self.positions.is_empty() {
            bail!("OBJ data defines no vertices");
        }

        let mut mesh = MeshData::default();
        let mut unique: HashMap<Corner, u32> = HashMap::new();
        for corner in &self.corners {
            let index = *unique.entry(*corner).or_insert_with(|| {
                let normal = corner.normal.map_or(Vec3::ZERO, |n| self.normals[n]);
                mesh.vertices
                    .push(Vertex::new(self.positions[corner.position], normal));
                (mesh.vertices.len() - 1) as u32
            });
            mesh.indices.push(index);
        }

        if self.corners.iter().any(|corner| corner.normal.is_none()) {
            smooth_missing_normals(&mut mesh);
        }
        Ok(mesh)
    }
}

fn read_vec3<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(tokens
            .next()
            .ok_or_else(|| anyhow!("expected three components"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

/// OBJ indices are one-based; negative values count back from the end.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    match index {
        0 => None,
        i if i > 0 => usize::try_from(i - 1).ok().filter(|&i| i < len),
        i => len.checked_sub(usize::try_from(i.unsigned_abs()).ok()?),
    }
}

fn smooth_missing_normals(mesh: &mut MeshData) {
    let mut accumulated = vec![Vec3::ZERO; mesh.vertices.len()];
    for triangle in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p = |i: usize| Vec3::from(mesh.vertices[i].position);
        let face = (p(b) - p(a)).cross(p(c) - p(a));
        if face.length_squared() > f32::EPSILON {
            let face = face.normalize();
            for i in [a, b, c] {
                accumulated[i] += face;
            }
        }
    }
    for (vertex, normal) in mesh.vertices.iter_mut().zip(accumulated) {
        if Vec3::from(vertex.normal) == Vec3::ZERO {
            vertex.normal = normal.normalize_or_zero().into();
        }
    }
}
