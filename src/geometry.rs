use glam::{Mat4, Vec3, Vec4};

use crate::mesh::{Mesh, MAX_MESH_VERTICES};

/// Per-participant vertex scratch, reused from one draw call to the next.
#[derive(Debug, Default)]
pub struct GeometryScratch {
    clip_positions: Vec<Vec4>,
    world_normals: Vec<Vec3>,
}

impl GeometryScratch {
    pub fn new() -> GeometryScratch {
        GeometryScratch::default()
    }

    /// Transforms every vertex of `mesh`: positions by `world_view_proj` into
    /// homogeneous clip space, normals by the upper 3x3 of `world`.
    pub fn transform(&mut self, mesh: &Mesh, world: &Mat4, world_view_proj: &Mat4) {
        let vertex_count = mesh.vertex_count();
        // Mesh::new enforces this
        debug_assert!(vertex_count <= MAX_MESH_VERTICES);

        self.clip_positions.clear();
        self.clip_positions
            .extend(mesh.positions().iter().map(|p| world_view_proj.mul_vec4(p.extend(1.0))));

        self.world_normals.clear();
        self.world_normals
            .extend(mesh.normals().iter().map(|n| world.transform_vector3(*n)));
    }

    pub fn clip_positions(&self) -> &[Vec4] {
        &self.clip_positions
    }

    pub fn world_normals(&self) -> &[Vec3] {
        &self.world_normals
    }
}
