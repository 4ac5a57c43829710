use glam::{Vec2, Vec3, Vec4};

/// Clipping a triangle against the six frustum planes adds at most one vertex per plane.
pub const MAX_CLIP_VERTICES: usize = 3 + 6;

/// Vertex in homogeneous clip space, before the perspective divide.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ClipVertex {
    pub position: Vec4,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl ClipVertex {
    pub fn new(position: Vec4, normal: Vec3, uv: Vec2) -> ClipVertex {
        ClipVertex { position, normal, uv }
    }

    #[inline]
    pub fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        ClipVertex {
            position: self.position.lerp(other.position, t),
            normal: self.normal.lerp(other.normal, t),
            uv: self.uv.lerp(other.uv, t),
        }
    }
}

/// One side of the canonical view volume `-w <= x, y, z <= w`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClipPlane {
    Top,
    Bottom,
    Right,
    Left,
    Far,
    Near,
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Top,
        ClipPlane::Bottom,
        ClipPlane::Right,
        ClipPlane::Left,
        ClipPlane::Far,
        ClipPlane::Near,
    ];

    /// Positive inside the half-space.
    #[inline]
    pub fn distance(self, p: Vec4) -> f32 {
        match self {
            ClipPlane::Top => p.w - p.y,
            ClipPlane::Bottom => p.w + p.y,
            ClipPlane::Right => p.w - p.x,
            ClipPlane::Left => p.w + p.x,
            ClipPlane::Far => p.w - p.z,
            ClipPlane::Near => p.w + p.z,
        }
    }
}

/// Convex polygon produced by clipping one triangle.
#[derive(Debug, Copy, Clone)]
pub struct ClipPolygon {
    vertices: [ClipVertex; MAX_CLIP_VERTICES],
    len: usize,
}

impl ClipPolygon {
    pub fn triangle(v0: ClipVertex, v1: ClipVertex, v2: ClipVertex) -> ClipPolygon {
        let mut polygon = ClipPolygon::empty();
        polygon.push(v0);
        polygon.push(v1);
        polygon.push(v2);
        polygon
    }

    fn empty() -> ClipPolygon {
        ClipPolygon {
            vertices: [ClipVertex::default(); MAX_CLIP_VERTICES],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, vertex: ClipVertex) {
        debug_assert!(self.len < MAX_CLIP_VERTICES);
        if self.len < MAX_CLIP_VERTICES {
            self.vertices[self.len] = vertex;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn vertices(&self) -> &[ClipVertex] {
        &self.vertices[..self.len]
    }

    /// Sutherland-Hodgman pass against one plane. Vertices at distance `<= 0` are outside.
    pub fn clip<F>(&self, distance: F) -> ClipPolygon
    where
        F: Fn(Vec4) -> f32,
    {
        let mut output = ClipPolygon::empty();
        if self.len == 0 {
            return output;
        }

        let mut v1 = &self.vertices[self.len - 1];
        let mut d1 = distance(v1.position);

        for v2 in self.vertices() {
            let d2 = distance(v2.position);

            match (d1 > 0.0, d2 > 0.0) {
                (true, true) => output.push(*v2),
                (true, false) => output.push(v1.lerp(v2, d1 / (d1 - d2))),
                (false, true) => {
                    output.push(v1.lerp(v2, d1 / (d1 - d2)));
                    output.push(*v2);
                }
                (false, false) => {}
            }

            v1 = v2;
            d1 = d2;
        }

        output
    }

    pub fn clip_to_frustum(&self) -> ClipPolygon {
        let mut polygon = *self;
        for plane in ClipPlane::ALL {
            polygon = polygon.clip(|p| plane.distance(p));
            if polygon.len < 3 {
                return ClipPolygon::empty();
            }
        }
        polygon
    }

    /// Perspective divide and viewport mapping. `w` becomes `1/w`, `z` becomes `z/w`
    /// and the texture coordinate is pre-multiplied by `1/w`.
    pub fn to_screen(&self, width: f32, height: f32) -> ScreenPolygon {
        let mut screen = ScreenPolygon {
            vertices: [ScreenVertex::default(); MAX_CLIP_VERTICES],
            len: self.len,
        };

        for (dst, src) in screen.vertices.iter_mut().zip(self.vertices()) {
            let inv_w = 1.0 / src.position.w;
            dst.position = Vec4::new(
                (src.position.x * inv_w * 0.5 + 0.5) * width,
                (-src.position.y * inv_w * 0.5 + 0.5) * height,
                src.position.z * inv_w,
                inv_w,
            );
            dst.normal = src.normal;
            dst.uv = src.uv * inv_w;
        }

        screen
    }
}

/// Clips one triangle to the view volume. Fewer than three surviving vertices means
/// the triangle is entirely outside and the result is empty.
pub fn clip_triangle(v0: ClipVertex, v1: ClipVertex, v2: ClipVertex) -> ClipPolygon {
    ClipPolygon::triangle(v0, v1, v2).clip_to_frustum()
}

/// Post-divide vertex: `position` is (screen x, screen y, z/w, 1/w), `uv` is `uv/w`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ScreenVertex {
    pub position: Vec4,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl ScreenVertex {
    #[inline]
    pub fn xy(&self) -> Vec2 {
        self.position.truncate().truncate()
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ScreenPolygon {
    vertices: [ScreenVertex; MAX_CLIP_VERTICES],
    len: usize,
}

impl ScreenPolygon {
    pub fn vertices(&self) -> &[ScreenVertex] {
        &self.vertices[..self.len]
    }

    /// Fan triangulation around vertex 0.
    pub fn triangles(&self) -> impl Iterator<Item = [ScreenVertex; 3]> + '_ {
        (1..self.len.saturating_sub(1)).map(move |j| [self.vertices[0], self.vertices[j], self.vertices[j + 1]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{vec2, vec3, vec4};

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
        ClipVertex::new(vec4(x, y, z, w), Vec3::Z, vec2(x, y))
    }

    #[test]
    fn triangle_inside_is_unchanged() {
        let a = vertex(-0.5, -0.5, 0.5, 1.0);
        let b = vertex(0.0, 0.5, 0.2, 1.0);
        let c = vertex(0.5, -0.5, 0.7, 1.0);

        let clipped = clip_triangle(a, b, c);
        assert_eq!(clipped.vertices(), &[a, b, c]);
    }

    #[test]
    fn triangle_outside_one_plane_is_rejected() {
        for plane in ClipPlane::ALL {
            // push the triangle past whichever plane we are testing
            let offset = match plane {
                ClipPlane::Top => vec4(0.0, 3.0, 0.0, 0.0),
                ClipPlane::Bottom => vec4(0.0, -3.0, 0.0, 0.0),
                ClipPlane::Right => vec4(3.0, 0.0, 0.0, 0.0),
                ClipPlane::Left => vec4(-3.0, 0.0, 0.0, 0.0),
                ClipPlane::Far => vec4(0.0, 0.0, 3.0, 0.0),
                ClipPlane::Near => vec4(0.0, 0.0, -3.0, 0.0),
            };
            let mut a = vertex(-0.5, -0.5, 0.0, 1.0);
            let mut b = vertex(0.0, 0.5, 0.0, 1.0);
            let mut c = vertex(0.5, -0.5, 0.0, 1.0);
            a.position += offset;
            b.position += offset;
            c.position += offset;

            assert!(clip_triangle(a, b, c).is_empty(), "{plane:?}");
        }
    }

    #[test]
    fn triangle_behind_the_eye_is_rejected() {
        let a = vertex(0.2, 0.1, -0.5, -1.0);
        let b = vertex(-0.3, 0.4, -0.2, -0.5);
        let c = vertex(0.0, -0.6, -0.1, 0.0);
        assert!(clip_triangle(a, b, c).is_empty());
    }

    #[test]
    fn opposite_planes_leave_a_polygon_inside_both() {
        // wider than the volume on x, so both Left and Right cut it
        let a = vertex(-3.0, -0.5, 0.0, 1.0);
        let b = vertex(0.0, 0.8, 0.0, 1.0);
        let c = vertex(3.0, -0.5, 0.0, 1.0);

        let polygon = ClipPolygon::triangle(a, b, c)
            .clip(|p| ClipPlane::Right.distance(p))
            .clip(|p| ClipPlane::Left.distance(p));

        assert!(polygon.len() >= 4);
        for v in polygon.vertices() {
            assert!(ClipPlane::Right.distance(v.position) >= -1e-5);
            assert!(ClipPlane::Left.distance(v.position) >= -1e-5);
        }
    }

    #[test]
    fn intersection_interpolates_attributes() {
        let a = ClipVertex::new(vec4(0.0, 0.0, 0.0, 1.0), vec3(1.0, 0.0, 0.0), vec2(0.0, 0.0));
        let b = ClipVertex::new(vec4(3.0, 0.0, 0.0, 1.0), vec3(0.0, 1.0, 0.0), vec2(1.0, 0.0));
        let c = ClipVertex::new(vec4(0.0, 0.5, 0.0, 1.0), vec3(1.0, 0.0, 0.0), vec2(0.0, 1.0));

        let polygon = ClipPolygon::triangle(a, b, c).clip(|p| ClipPlane::Right.distance(p));
        // the a->b edge crosses x = w at one third of the way
        let crossing = polygon
            .vertices()
            .iter()
            .find(|v| (v.position.x - 1.0).abs() < 1e-6 && v.position.y.abs() < 1e-6)
            .copied()
            .unwrap();
        assert!((crossing.uv.x - 1.0 / 3.0).abs() < 1e-6);
        assert!(crossing.normal.abs_diff_eq(vec3(2.0 / 3.0, 1.0 / 3.0, 0.0), 1e-6));
    }

    #[test]
    fn corner_clip_stays_within_capacity() {
        // a large triangle poking through many planes at once
        let a = vertex(-4.0, -4.0, -4.0, 1.0);
        let b = vertex(4.0, -1.0, 4.0, 1.0);
        let c = vertex(-1.0, 4.0, 0.5, 1.0);

        let polygon = clip_triangle(a, b, c);
        assert!(polygon.len() >= 3 && polygon.len() <= MAX_CLIP_VERTICES);
        for v in polygon.vertices() {
            for plane in ClipPlane::ALL {
                assert!(plane.distance(v.position) >= -1e-4, "{plane:?}");
            }
        }
    }

    #[test]
    fn triangle_crossing_every_plane_clips_to_nine_vertices() {
        // each plane trims one more corner off, filling the polygon to capacity
        let a = vertex(-1.84, 1.84, 0.0, 1.0);
        let b = vertex(0.0, -1.84, 1.84, 1.0);
        let c = vertex(1.84, 0.0, -1.84, 1.0);

        let polygon = clip_triangle(a, b, c);
        assert_eq!(polygon.len(), MAX_CLIP_VERTICES);
        for v in polygon.vertices() {
            for plane in ClipPlane::ALL {
                assert!(plane.distance(v.position) >= -1e-4, "{plane:?}");
            }
        }
    }

    #[test]
    fn screen_mapping_divides_and_flips_y() {
        let a = ClipVertex::new(vec4(-2.0, 2.0, 1.0, 2.0), Vec3::Z, vec2(1.0, 0.5));
        let b = ClipVertex::new(vec4(1.0, 1.0, 0.5, 1.0), Vec3::Z, vec2(0.0, 0.0));
        let c = ClipVertex::new(vec4(-1.0, -1.0, 0.5, 1.0), Vec3::Z, vec2(0.0, 0.0));

        let screen = ClipPolygon::triangle(a, b, c).to_screen(100.0, 50.0);
        let v = screen.vertices()[0];
        assert_eq!(v.position, vec4(0.0, 0.0, 0.5, 0.5));
        assert_eq!(v.uv, vec2(0.5, 0.25));
        assert_eq!(screen.vertices()[1].position.truncate().truncate(), vec2(100.0, 0.0));
        assert_eq!(screen.vertices()[2].xy(), vec2(0.0, 50.0));
    }

    #[test]
    fn fan_covers_every_polygon_vertex() {
        let a = vertex(-3.0, -0.5, 0.0, 1.0);
        let b = vertex(0.0, 0.8, 0.0, 1.0);
        let c = vertex(3.0, -0.5, 0.0, 1.0);
        let screen = clip_triangle(a, b, c).to_screen(64.0, 64.0);

        let triangles: Vec<_> = screen.triangles().collect();
        assert_eq!(triangles.len(), screen.vertices().len() - 2);
        assert!(triangles.iter().all(|t| t[0] == screen.vertices()[0]));
    }
}
