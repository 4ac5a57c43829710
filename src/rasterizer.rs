use glam::{vec2, Vec2, Vec3};

use crate::backbuffer::{GBufferTexel, SharedBuffer, DEPTH_FAR};
use crate::math::{edge_function, IRect};
use crate::tile::{BinnedTriangle, Tile};

/// Depth and G-buffer pixels a rasterization pass may touch.
pub trait GeometryTarget {
    /// Pixels this target owns. Writes outside of it are never issued.
    fn rect(&self) -> IRect;

    /// Resets the owned pixels to far depth and empty texels.
    fn clear(&mut self);

    /// Stores `depth` and returns `true` when it is strictly nearer than the stored value.
    fn test_and_set_depth(&mut self, x: usize, y: usize, depth: f32) -> bool;

    fn write_texel(&mut self, x: usize, y: usize, texel: GBufferTexel);
}

/// One tile's rectangle of the shared frame buffers.
pub(crate) struct TileTarget<'s, 'a> {
    rect: IRect,
    depth: &'s SharedBuffer<'a, f32>,
    gbuffer: &'s SharedBuffer<'a, GBufferTexel>,
}

impl<'s, 'a> TileTarget<'s, 'a> {
    /// # Safety
    /// No other target over the same buffers may overlap `rect` while this one is alive.
    pub(crate) unsafe fn new(
        rect: IRect,
        depth: &'s SharedBuffer<'a, f32>,
        gbuffer: &'s SharedBuffer<'a, GBufferTexel>,
    ) -> TileTarget<'s, 'a> {
        let screen = IRect::from_xywh(0, 0, depth.width() as i32, depth.height() as i32);
        assert_eq!(rect.intersect(&screen), rect);
        assert!(depth.width() == gbuffer.width() && depth.height() == gbuffer.height());
        TileTarget { rect, depth, gbuffer }
    }
}

impl GeometryTarget for TileTarget<'_, '_> {
    fn rect(&self) -> IRect {
        self.rect
    }

    fn clear(&mut self) {
        if self.rect.is_empty() {
            return;
        }
        let columns = self.rect.min.x as usize..self.rect.max.x as usize;
        for y in self.rect.min.y as usize..self.rect.max.y as usize {
            // the rect is ours alone
            unsafe {
                self.depth.row_mut(y, columns.clone()).fill(DEPTH_FAR);
                self.gbuffer.row_mut(y, columns.clone()).fill(GBufferTexel::EMPTY);
            }
        }
    }

    #[inline]
    fn test_and_set_depth(&mut self, x: usize, y: usize, depth: f32) -> bool {
        debug_assert!(self.rect.contains(glam::ivec2(x as i32, y as i32)));
        let stored = unsafe { self.depth.pixel_mut(x, y) };
        if depth >= *stored {
            return false;
        }
        *stored = depth;
        true
    }

    #[inline]
    fn write_texel(&mut self, x: usize, y: usize, texel: GBufferTexel) {
        debug_assert!(self.rect.contains(glam::ivec2(x as i32, y as i32)));
        unsafe { *self.gbuffer.pixel_mut(x, y) = texel };
    }
}

/// Edge functions of one triangle plus their per-pixel increments.
///
/// Edge `i` is the one opposite vertex `i`, so its value is vertex `i`'s
/// unnormalized barycentric weight.
#[derive(Debug, Copy, Clone)]
pub struct EdgeSetup {
    points: [Vec2; 3],
    step_x: Vec3,
    step_y: Vec3,
}

impl EdgeSetup {
    pub fn new(p0: Vec2, p1: Vec2, p2: Vec2) -> EdgeSetup {
        EdgeSetup {
            points: [p0, p1, p2],
            step_x: Vec3::new(p1.y - p2.y, p2.y - p0.y, p0.y - p1.y),
            step_y: Vec3::new(p2.x - p1.x, p0.x - p2.x, p1.x - p0.x),
        }
    }

    /// Unnormalized weights at `p`; they sum to the signed double area.
    #[inline]
    pub fn weights_at(&self, p: Vec2) -> Vec3 {
        let [p0, p1, p2] = self.points;
        Vec3::new(edge_function(p1, p2, p), edge_function(p2, p0, p), edge_function(p0, p1, p))
    }

    #[inline]
    pub fn step_x(&self) -> Vec3 {
        self.step_x
    }

    #[inline]
    pub fn step_y(&self) -> Vec3 {
        self.step_y
    }
}

/// Barycentric weights of `p` in the binned triangle, summing to one.
pub fn barycentric(triangle: &BinnedTriangle, p: Vec2) -> Vec3 {
    let [v0, v1, v2] = &triangle.vertices;
    EdgeSetup::new(v0.xy(), v1.xy(), v2.xy()).weights_at(p) * triangle.inv_denom
}

/// Rasterizes one binned triangle within its clamped bounds, sampling at pixel
/// centers. Returns the number of G-buffer texels written.
pub fn rasterize_triangle<T: GeometryTarget>(triangle: &BinnedTriangle, target: &mut T) -> usize {
    let bounds = triangle.bounds.intersect(&target.rect());
    if bounds.is_empty() {
        return 0;
    }

    let [v0, v1, v2] = &triangle.vertices;
    let edges = EdgeSetup::new(v0.xy(), v1.xy(), v2.xy());
    let step_x = edges.step_x();
    let inv_denom = triangle.inv_denom;

    let mut written = 0;
    for y in bounds.min.y..bounds.max.y {
        let mut weights = edges.weights_at(vec2(bounds.min.x as f32 + 0.5, y as f32 + 0.5));
        let mut entered = false;

        for x in bounds.min.x..bounds.max.x {
            if weights.x >= 0.0 && weights.y >= 0.0 && weights.z >= 0.0 {
                entered = true;

                let b = weights * inv_denom;
                let depth = b.x * v0.position.z + b.y * v1.position.z + b.z * v2.position.z;

                if target.test_and_set_depth(x as usize, y as usize, depth) {
                    let inv_w = b.x * v0.position.w + b.y * v1.position.w + b.z * v2.position.w;
                    let uv = (b.x * v0.uv + b.y * v1.uv + b.z * v2.uv) / inv_w;
                    let normal = b.x * v0.normal + b.y * v1.normal + b.z * v2.normal;

                    target.write_texel(
                        x as usize,
                        y as usize,
                        GBufferTexel {
                            texture_id: triangle.texture_id,
                            triangle_id: triangle.triangle_id,
                            normal,
                            uv,
                        },
                    );
                    written += 1;
                }
            } else if entered {
                // convex: the span on this row is over
                break;
            }

            weights += step_x;
        }
    }

    written
}

/// Clears the tile's pixels, rasterizes its bin and empties the bin.
pub fn rasterize_tile<T: GeometryTarget>(tile: &Tile, target: &mut T) -> usize {
    target.clear();

    // binning for this frame has finished before any tile is rasterized
    let triangles = unsafe { tile.triangles() };
    let written = triangles.iter().map(|t| rasterize_triangle(t, target)).sum();

    tile.reset();
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbuffer::{DepthBuffer, GBuffer, NO_SURFACE};
    use crate::clipper::ScreenVertex;
    use glam::{vec3, vec4};

    /// Whole-screen target over exclusively borrowed buffers.
    struct GeometryBuffers<'a> {
        depth: &'a mut DepthBuffer,
        gbuffer: &'a mut GBuffer,
    }

    impl<'a> GeometryBuffers<'a> {
        fn new(depth: &'a mut DepthBuffer, gbuffer: &'a mut GBuffer) -> GeometryBuffers<'a> {
            assert_eq!(depth.get_width(), gbuffer.get_width());
            assert_eq!(depth.get_height(), gbuffer.get_height());
            GeometryBuffers { depth, gbuffer }
        }
    }

    impl GeometryTarget for GeometryBuffers<'_> {
        fn rect(&self) -> IRect {
            IRect::from_xywh(0, 0, self.depth.get_width() as i32, self.depth.get_height() as i32)
        }

        fn clear(&mut self) {
            self.depth.clear(DEPTH_FAR);
            self.gbuffer.clear(GBufferTexel::EMPTY);
        }

        #[inline]
        fn test_and_set_depth(&mut self, x: usize, y: usize, depth: f32) -> bool {
            if depth >= self.depth.get_pixel(x, y) {
                return false;
            }
            self.depth.set_pixel(x, y, depth);
            true
        }

        #[inline]
        fn write_texel(&mut self, x: usize, y: usize, texel: GBufferTexel) {
            self.gbuffer.set_pixel(x, y, texel);
        }
    }

    fn binned(points: [(f32, f32, f32); 3], bounds: IRect) -> BinnedTriangle {
        let vertices = points.map(|(x, y, z)| ScreenVertex {
            position: vec4(x, y, z, 1.0),
            normal: vec3(0.0, 0.0, -1.0),
            uv: vec2(x / 64.0, y / 64.0),
        });
        let denom = edge_function(vertices[0].xy(), vertices[1].xy(), vertices[2].xy());
        BinnedTriangle {
            bounds,
            inv_denom: 1.0 / denom,
            texture_id: 0,
            triangle_id: 9,
            vertices,
        }
    }

    fn buffers(size: usize) -> (DepthBuffer, GBuffer) {
        (DepthBuffer::new(size, size, DEPTH_FAR), GBuffer::new(size, size, GBufferTexel::EMPTY))
    }

    #[test]
    fn weights_sum_to_one_inside() {
        let triangle = binned([(4.0, 2.0, 0.5), (30.0, 8.0, 0.5), (10.0, 28.0, 0.5)], IRect::from_xywh(0, 0, 32, 32));
        for (x, y) in [(10.5, 10.5), (12.25, 15.75), (20.0, 10.0)] {
            let b = barycentric(&triangle, vec2(x, y));
            assert!(b.min_element() >= 0.0);
            assert!((b.element_sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn weights_at_corners_select_that_corner() {
        let triangle = binned([(0.0, 0.0, 0.5), (16.0, 0.0, 0.5), (0.0, 16.0, 0.5)], IRect::from_xywh(0, 0, 16, 16));
        for (i, v) in triangle.vertices.iter().enumerate() {
            let b = barycentric(&triangle, v.xy());
            let mut expected = Vec3::ZERO;
            expected[i] = 1.0;
            assert_eq!(b, expected);
            let uv = b.x * triangle.vertices[0].uv + b.y * triangle.vertices[1].uv + b.z * triangle.vertices[2].uv;
            assert_eq!(uv, v.uv);
        }
    }

    #[test]
    fn incremental_steps_match_direct_evaluation() {
        let edges = EdgeSetup::new(vec2(3.0, 1.0), vec2(29.0, 7.0), vec2(11.0, 30.0));
        let start = vec2(0.5, 0.5);
        let mut w = edges.weights_at(start);
        for x in 1..20 {
            w += edges.step_x();
            let direct = edges.weights_at(start + vec2(x as f32, 0.0));
            assert!(w.abs_diff_eq(direct, 1e-3));
        }
        let down = edges.weights_at(start) + edges.step_y();
        assert!(down.abs_diff_eq(edges.weights_at(start + Vec2::Y), 1e-3));
    }

    #[test]
    fn covers_only_pixels_whose_centers_are_inside() {
        let (mut depth, mut gbuffer) = buffers(8);
        let triangle = binned([(0.0, 0.0, 0.5), (8.0, 0.0, 0.5), (0.0, 8.0, 0.5)], IRect::from_xywh(0, 0, 8, 8));

        let written = rasterize_triangle(&triangle, &mut GeometryBuffers::new(&mut depth, &mut gbuffer));

        // centers with x + y <= 7 lie on or above the hypotenuse
        assert_eq!(written, 36);
        assert_eq!(gbuffer.get_pixel(0, 0).triangle_id, 9);
        assert_eq!(gbuffer.get_pixel(3, 3).texture_id, 0);
        assert_eq!(gbuffer.get_pixel(4, 4).texture_id, NO_SURFACE);
        assert_eq!(depth.get_pixel(7, 7), DEPTH_FAR);
    }

    #[test]
    fn uv_is_perspective_corrected() {
        let (mut depth, mut gbuffer) = buffers(4);
        let mut triangle = binned([(0.0, 0.0, 0.5), (8.0, 0.0, 0.5), (0.0, 8.0, 0.5)], IRect::from_xywh(0, 0, 4, 4));
        // constant 1/w = 0.5 with uv pre-divided by w
        for v in triangle.vertices.iter_mut() {
            v.position.w = 0.5;
            v.uv = vec2(0.25, 0.75) * 0.5;
        }

        rasterize_triangle(&triangle, &mut GeometryBuffers::new(&mut depth, &mut gbuffer));
        assert!(gbuffer.get_pixel(1, 2).uv.abs_diff_eq(vec2(0.25, 0.75), 1e-6));
    }

    #[test]
    fn nearer_triangle_wins_and_repeat_pass_writes_nothing() {
        let (mut depth, mut gbuffer) = buffers(16);
        let bounds = IRect::from_xywh(0, 0, 16, 16);
        let far = binned([(0.0, 0.0, 0.8), (16.0, 0.0, 0.8), (0.0, 16.0, 0.8)], bounds);
        let mut near = binned([(0.0, 0.0, 0.3), (16.0, 0.0, 0.3), (0.0, 16.0, 0.3)], bounds);
        near.triangle_id = 10;

        let mut target = GeometryBuffers::new(&mut depth, &mut gbuffer);
        let first = rasterize_triangle(&near, &mut target);
        assert!(first > 0);
        assert_eq!(rasterize_triangle(&far, &mut target), 0);
        assert_eq!(rasterize_triangle(&near, &mut target), 0);

        assert_eq!(gbuffer.get_pixel(2, 2).triangle_id, 10);
        assert!((depth.get_pixel(2, 2) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn tile_target_stays_inside_its_rect() {
        let (mut depth, mut gbuffer) = buffers(8);
        depth.clear(0.0);
        let rect = IRect::from_xywh(4, 0, 4, 8);
        let tile = Tile::new(rect, 4);
        let triangle = binned([(0.0, 0.0, 0.5), (8.0, 0.0, 0.5), (0.0, 8.0, 0.5)], rect);
        assert!(tile.push(triangle));

        {
            let shared_depth = SharedBuffer::new(&mut depth);
            let shared_gbuffer = SharedBuffer::new(&mut gbuffer);
            let mut target = unsafe { TileTarget::new(rect, &shared_depth, &shared_gbuffer) };
            assert!(rasterize_tile(&tile, &mut target) > 0);
        }

        assert!(tile.is_empty());
        // left half untouched, right half cleared then rasterized
        assert!((0..8).all(|y| (0..4).all(|x| depth.get_pixel(x, y) == 0.0)));
        assert_eq!(depth.get_pixel(4, 0), 0.5);
        assert_eq!(depth.get_pixel(7, 7), DEPTH_FAR);
        assert!(gbuffer.get_pixel(0, 0).is_empty());
    }
}
