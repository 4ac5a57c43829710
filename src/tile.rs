use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{ivec2, IVec2};

use crate::clipper::ScreenVertex;
use crate::math::{edge_function, IRect};

/// Triangle record stored in a tile bin, ready for rasterization.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BinnedTriangle {
    /// Triangle bounding box clamped to the owning tile.
    pub bounds: IRect,
    /// Reciprocal of the signed double area, turns edge values into barycentric weights.
    pub inv_denom: f32,
    pub texture_id: u16,
    pub triangle_id: u32,
    pub vertices: [ScreenVertex; 3],
}

/// Fixed screen rectangle with a pre-allocated triangle bin.
///
/// Binning jobs append concurrently through the atomic cursor. The bin is only
/// read once every binning job has finished, and reset by the single job that
/// rasterizes the tile.
pub struct Tile {
    rect: IRect,
    slots: Box<[UnsafeCell<BinnedTriangle>]>,
    count: AtomicUsize,
}

// Each slot is written by exactly one reservation of `count`.
unsafe impl Sync for Tile {}

impl Tile {
    pub fn new(rect: IRect, capacity: usize) -> Tile {
        Tile {
            rect,
            slots: (0..capacity).map(|_| UnsafeCell::new(BinnedTriangle::default())).collect(),
            count: AtomicUsize::new(0),
        }
    }

    pub fn get_rect(&self) -> IRect {
        self.rect
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of records in the bin, never more than the capacity.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a record. Returns `false` and drops the record when the bin is full.
    pub fn push(&self, triangle: BinnedTriangle) -> bool {
        let slot = self.count.fetch_add(1, Ordering::AcqRel);
        match self.slots.get(slot) {
            Some(cell) => {
                // the fetch_add above reserved this slot for us alone
                unsafe { *cell.get() = triangle };
                true
            }
            None => false,
        }
    }

    /// The binned records.
    ///
    /// # Safety
    /// No `push` may run concurrently with the returned borrow.
    pub unsafe fn triangles(&self) -> &[BinnedTriangle] {
        std::slice::from_raw_parts(self.slots.as_ptr() as *const BinnedTriangle, self.len())
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }
}

/// What happened to one screen-space triangle in the binner.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOutcome {
    /// Back-facing, degenerate or entirely off screen.
    Culled,
    Binned { entries: usize, dropped: usize },
}

/// Screen partitioned into `tile_size` squares; the last row and column may be narrower.
pub struct TileGrid {
    width: usize,
    height: usize,
    tile_size: usize,
    tiles_x: usize,
    tiles_y: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: usize, height: usize, tile_size: usize, bin_capacity: usize) -> TileGrid {
        assert!(tile_size > 0, "tile size must be non-zero");

        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);
        let screen = IRect::from_xywh(0, 0, width as i32, height as i32);

        let mut tiles = Vec::with_capacity(tiles_x * tiles_y);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let rect = IRect::from_xywh(
                    (tx * tile_size) as i32,
                    (ty * tile_size) as i32,
                    tile_size as i32,
                    tile_size as i32,
                );
                tiles.push(Tile::new(rect.intersect(&screen), bin_capacity));
            }
        }

        TileGrid {
            width,
            height,
            tile_size,
            tiles_x,
            tiles_y,
            tiles,
        }
    }

    pub fn get_width(&self) -> usize {
        self.width
    }

    pub fn get_height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn tiles_x(&self) -> usize {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> usize {
        self.tiles_y
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, tx: usize, ty: usize) -> &Tile {
        &self.tiles[tx + ty * self.tiles_x]
    }

    pub fn reset(&self) {
        self.tiles.iter().for_each(Tile::reset);
    }

    /// Pixel bounding box of a screen triangle, clamped to the screen.
    pub fn bounds(&self, vertices: &[ScreenVertex; 3]) -> IRect {
        let [p0, p1, p2] = vertices.map(|v| v.xy());
        let lo = p0.min(p1).min(p2).floor();
        let hi = p0.max(p1).max(p2).ceil();

        let screen = IRect::from_xywh(0, 0, self.width as i32, self.height as i32);
        // saturate before converting so huge coordinates cannot wrap
        let limit = (self.width.max(self.height) + 1) as f32;
        let min = lo.clamp(glam::Vec2::splat(-1.0), glam::Vec2::splat(limit));
        let max = hi.clamp(glam::Vec2::splat(-1.0), glam::Vec2::splat(limit));
        IRect::new(ivec2(min.x as i32, min.y as i32), ivec2(max.x as i32, max.y as i32)).intersect(&screen)
    }

    /// Back-face culls the triangle and appends one record to every tile its
    /// bounding box overlaps.
    pub fn bin_triangle(&self, vertices: &[ScreenVertex; 3], texture_id: u16, triangle_id: u32) -> BinOutcome {
        let denom = edge_function(vertices[0].xy(), vertices[1].xy(), vertices[2].xy());
        // also rejects NaN
        if !(denom > 0.0) {
            return BinOutcome::Culled;
        }

        let bounds = self.bounds(vertices);
        if bounds.is_empty() {
            return BinOutcome::Culled;
        }

        let size = self.tile_size as i32;
        let first = bounds.min / size;
        let last = (bounds.max - IVec2::ONE) / size;

        let mut entries = 0;
        let mut dropped = 0;
        for ty in first.y..=last.y {
            for tx in first.x..=last.x {
                let tile = self.tile(tx as usize, ty as usize);
                let triangle = BinnedTriangle {
                    bounds: bounds.intersect(&tile.get_rect()),
                    inv_denom: 1.0 / denom,
                    texture_id,
                    triangle_id,
                    vertices: *vertices,
                };

                if tile.push(triangle) {
                    entries += 1;
                } else {
                    dropped += 1;
                }
            }
        }

        BinOutcome::Binned { entries, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec4;

    fn screen_triangle(points: [(f32, f32); 3]) -> [ScreenVertex; 3] {
        points.map(|(x, y)| ScreenVertex {
            position: vec4(x, y, 0.5, 1.0),
            ..ScreenVertex::default()
        })
    }

    #[test]
    fn grid_covers_a_ragged_screen() {
        let grid = TileGrid::new(100, 40, 32, 4);
        assert_eq!(grid.tiles_x(), 4);
        assert_eq!(grid.tiles_y(), 2);
        assert_eq!(grid.tile(3, 1).get_rect(), IRect::new(ivec2(96, 32), ivec2(100, 40)));
    }

    #[test]
    fn triangle_across_four_tiles_lands_in_each_once() {
        let grid = TileGrid::new(64, 64, 32, 8);
        let triangle = screen_triangle([(10.0, 10.0), (50.0, 10.0), (10.0, 50.0)]);

        let outcome = grid.bin_triangle(&triangle, 3, 17);
        assert_eq!(outcome, BinOutcome::Binned { entries: 4, dropped: 0 });

        let expected = [
            ((0, 0), IRect::new(ivec2(10, 10), ivec2(32, 32))),
            ((1, 0), IRect::new(ivec2(32, 10), ivec2(50, 32))),
            ((0, 1), IRect::new(ivec2(10, 32), ivec2(32, 50))),
            ((1, 1), IRect::new(ivec2(32, 32), ivec2(50, 50))),
        ];
        for ((tx, ty), rect) in expected {
            let tile = grid.tile(tx, ty);
            let binned = unsafe { tile.triangles() };
            assert_eq!(binned.len(), 1);
            assert_eq!(binned[0].bounds, rect);
            assert_eq!(binned[0].texture_id, 3);
            assert_eq!(binned[0].triangle_id, 17);
            assert_eq!(binned[0].inv_denom, 1.0 / 1600.0);
        }
    }

    #[test]
    fn back_facing_and_degenerate_triangles_are_culled() {
        let grid = TileGrid::new(64, 64, 32, 8);
        let back = screen_triangle([(10.0, 10.0), (10.0, 50.0), (50.0, 10.0)]);
        let flat = screen_triangle([(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);

        assert_eq!(grid.bin_triangle(&back, 0, 0), BinOutcome::Culled);
        assert_eq!(grid.bin_triangle(&flat, 0, 1), BinOutcome::Culled);
        assert!(grid.tiles().iter().all(Tile::is_empty));
    }

    #[test]
    fn off_screen_bounds_are_clamped() {
        let grid = TileGrid::new(64, 64, 32, 8);
        let triangle = screen_triangle([(-100.0, -100.0), (500.0, -100.0), (-100.0, 500.0)]);
        assert_eq!(grid.bounds(&triangle), IRect::from_xywh(0, 0, 64, 64));
    }

    #[test]
    fn full_bin_drops_and_reset_reopens_it() {
        let grid = TileGrid::new(32, 32, 32, 2);
        let triangle = screen_triangle([(1.0, 1.0), (30.0, 1.0), (1.0, 30.0)]);

        for id in 0..2 {
            assert_eq!(grid.bin_triangle(&triangle, 0, id), BinOutcome::Binned { entries: 1, dropped: 0 });
        }
        assert_eq!(grid.bin_triangle(&triangle, 0, 2), BinOutcome::Binned { entries: 0, dropped: 1 });

        let tile = grid.tile(0, 0);
        assert_eq!(tile.len(), 2);
        let ids: Vec<u32> = unsafe { tile.triangles() }.iter().map(|t| t.triangle_id).collect();
        assert_eq!(ids, vec![0, 1]);

        grid.reset();
        assert!(tile.is_empty());
        assert!(tile.push(BinnedTriangle::default()));
    }

    #[test]
    fn concurrent_pushes_fill_every_slot_once() {
        let tile = Tile::new(IRect::from_xywh(0, 0, 32, 32), 256);

        std::thread::scope(|s| {
            for t in 0..4u32 {
                let tile = &tile;
                s.spawn(move || {
                    for i in 0..100u32 {
                        tile.push(BinnedTriangle {
                            triangle_id: t * 100 + i,
                            ..BinnedTriangle::default()
                        });
                    }
                });
            }
        });

        let mut ids: Vec<u32> = unsafe { tile.triangles() }.iter().map(|t| t.triangle_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 256);
    }
}
