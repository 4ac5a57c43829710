use glam::{vec2, Vec2, Vec3};

use crate::error::MeshError;

/// Largest vertex count the geometry stage scratch arena accepts per mesh.
pub const MAX_MESH_VERTICES: usize = 0xFFFF;

/// Immutable indexed triangle list. Front faces wind clockwise as seen by the viewer.
#[derive(Debug, Clone)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    indices: Vec<u16>,
}

impl Mesh {
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        tex_coords: Vec<Vec2>,
        indices: Vec<u16>,
    ) -> Result<Mesh, MeshError> {
        if positions.len() != normals.len() || positions.len() != tex_coords.len() {
            return Err(MeshError::AttributeMismatch {
                positions: positions.len(),
                normals: normals.len(),
                tex_coords: tex_coords.len(),
            });
        }

        if positions.len() > MAX_MESH_VERTICES {
            return Err(MeshError::TooManyVertices {
                vertex_count: positions.len(),
                max: MAX_MESH_VERTICES,
            });
        }

        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCount(indices.len()));
        }

        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: positions.len(),
            });
        }

        Ok(Mesh {
            positions,
            normals,
            tex_coords,
            indices,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &[Vec2] {
        &self.tex_coords
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Square in the XY plane facing -Z, spanning `-half_extent..half_extent`.
    pub fn quad(half_extent: f32) -> Mesh {
        let mut builder = MeshBuilder::default();
        builder.push_face(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, half_extent, 1.0);
        builder.build()
    }

    /// Axis-aligned cube centered on the origin with outward-facing sides.
    pub fn cube(half_extent: f32) -> Mesh {
        let mut builder = MeshBuilder::default();
        let faces = [
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::NEG_Z),
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
        ];
        for (normal, up) in faces {
            builder.push_face(normal * half_extent, normal, up, half_extent, 1.0);
        }
        builder.build()
    }

    /// Horizontal ground plane facing +Y, texture repeated `uv_repeat` times per side.
    pub fn ground(half_extent: f32, uv_repeat: f32) -> Mesh {
        let mut builder = MeshBuilder::default();
        builder.push_face(Vec3::ZERO, Vec3::Y, Vec3::Z, half_extent, uv_repeat);
        builder.build()
    }
}

#[derive(Default)]
struct MeshBuilder {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    indices: Vec<u16>,
}

impl MeshBuilder {
    /// Square face seen from outside along `-normal`, with `up` pointing to the top edge.
    fn push_face(&mut self, center: Vec3, normal: Vec3, up: Vec3, half_extent: f32, uv_repeat: f32) {
        let right = normal.cross(up) * half_extent;
        let up = up * half_extent;
        let base = self.positions.len() as u16;

        let corners = [
            (center - right + up, vec2(0.0, 0.0)),
            (center + right + up, vec2(uv_repeat, 0.0)),
            (center + right - up, vec2(uv_repeat, uv_repeat)),
            (center - right - up, vec2(0.0, uv_repeat)),
        ];
        for (position, uv) in corners {
            self.positions.push(position);
            self.normals.push(normal);
            self.tex_coords.push(uv);
        }

        self.indices.extend_from_slice(&[base, base + 1, base + 3, base + 1, base + 2, base + 3]);
    }

    fn build(self) -> Mesh {
        Mesh {
            positions: self.positions,
            normals: self.normals,
            tex_coords: self.tex_coords,
            indices: self.indices,
        }
    }
}
