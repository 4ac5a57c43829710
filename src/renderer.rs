use std::ptr;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;

use crate::backbuffer::{ColorBuffer, DepthBuffer, GBuffer, SharedBuffer, NO_SURFACE};
use crate::clipper::{clip_triangle, ClipVertex};
use crate::color::Color;
use crate::geometry::GeometryScratch;
use crate::mesh::Mesh;
use crate::rasterizer::{rasterize_tile, TileTarget};
use crate::shader::shade_rows;
use crate::stats::{FrameCounters, FrameStats};
use crate::task_system::TaskSystem;
use crate::texture::Texture;
use crate::tile::{BinOutcome, TileGrid};

#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// Edge length of the square screen tiles, in pixels.
    pub tile_size: usize,
    /// Triangle records each tile can hold per frame.
    pub bin_capacity: usize,
    /// Rows per deferred shading job.
    pub strip_height: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            tile_size: 32,
            bin_capacity: 512,
            strip_height: 8,
        }
    }
}

/// Caller-owned buffers a frame renders into. All three must have the same size.
pub struct RenderTargets<'a> {
    pub color: &'a mut ColorBuffer,
    pub depth: &'a mut DepthBuffer,
    pub gbuffer: &'a mut GBuffer,
}

struct DrawCall<'a> {
    mesh: &'a Mesh,
    world: Mat4,
    texture_id: u16,
    base_triangle: u32,
}

pub struct Renderer {
    tasks: Arc<TaskSystem>,
    settings: RendererSettings,
    grid: TileGrid,
    // one arena per task participant, indexed by participant
    scratch: Vec<Mutex<GeometryScratch>>,
    fallback_texture: Texture,
    counters: FrameCounters,
}

impl Renderer {
    pub fn new(tasks: Arc<TaskSystem>, settings: RendererSettings) -> Renderer {
        let settings = RendererSettings {
            tile_size: settings.tile_size.max(1),
            bin_capacity: settings.bin_capacity,
            strip_height: settings.strip_height.max(1),
        };

        let scratch = (0..tasks.participant_count()).map(|_| Mutex::new(GeometryScratch::new())).collect();
        let fallback_texture = Texture::from_pixels(2, 2, vec![Color::from_u32(0x8080_8080); 4]).unwrap_or_default();

        Renderer {
            grid: TileGrid::new(0, 0, settings.tile_size, settings.bin_capacity),
            tasks,
            settings,
            scratch,
            fallback_texture,
            counters: FrameCounters::default(),
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn tasks(&self) -> &Arc<TaskSystem> {
        &self.tasks
    }

    /// Neutral grey texture used in place of empty textures and before any texture is set.
    pub fn fallback_texture(&self) -> &Texture {
        &self.fallback_texture
    }

    /// Starts recording a frame. Nothing is drawn until `Frame::end_draw`.
    pub fn begin_draw<'a>(&mut self, targets: RenderTargets<'a>, view: Mat4, proj: Mat4) -> Frame<'_, 'a> {
        let width = targets.color.get_width();
        let height = targets.color.get_height();
        assert!(
            targets.depth.get_width() == width
                && targets.depth.get_height() == height
                && targets.gbuffer.get_width() == width
                && targets.gbuffer.get_height() == height,
            "render targets must share one size"
        );

        Frame {
            renderer: self,
            targets,
            view_proj: proj * view,
            light: Vec3::Y,
            textures: vec![None],
            current_texture: 0,
            draws: Vec::new(),
            triangle_count: 0,
        }
    }

    fn prepare_grid(&mut self, width: usize, height: usize) {
        if self.grid.get_width() != width || self.grid.get_height() != height {
            log::debug!("rebuilding tile grid for {}x{}", width, height);
            self.grid = TileGrid::new(width, height, self.settings.tile_size, self.settings.bin_capacity);
        } else {
            self.grid.reset();
        }
    }
}

/// One frame being recorded. Everything passed in must outlive the frame.
pub struct Frame<'r, 'a> {
    renderer: &'r mut Renderer,
    targets: RenderTargets<'a>,
    view_proj: Mat4,
    light: Vec3,
    // `None` stands for the fallback texture
    textures: Vec<Option<&'a Texture>>,
    current_texture: u16,
    draws: Vec<DrawCall<'a>>,
    triangle_count: u32,
}

impl<'r, 'a> Frame<'r, 'a> {
    /// `direction` is the direction the light travels in.
    pub fn set_directional_light(&mut self, direction: Vec3) {
        self.light = -direction.normalize_or_zero();
    }

    /// Texture for subsequent draw calls. Empty textures render with the fallback.
    pub fn set_texture(&mut self, texture: &'a Texture) {
        if texture.is_empty() {
            self.current_texture = 0;
            return;
        }

        if let Some(id) = self.textures.iter().position(|t| matches!(t, Some(known) if ptr::eq(*known, texture))) {
            self.current_texture = id as u16;
            return;
        }

        if self.textures.len() >= NO_SURFACE as usize {
            log::warn!("too many textures in one frame, using the fallback");
            self.current_texture = 0;
            return;
        }

        self.current_texture = self.textures.len() as u16;
        self.textures.push(Some(texture));
    }

    pub fn draw_indexed(&mut self, mesh: &'a Mesh, world: Mat4) {
        let triangles = mesh.triangle_count() as u32;
        self.draws.push(DrawCall {
            mesh,
            world,
            texture_id: self.current_texture,
            base_triangle: self.triangle_count,
        });
        self.triangle_count = self.triangle_count.wrapping_add(triangles);
    }

    /// Runs the whole pipeline and returns once the color buffer is final.
    pub fn end_draw(self) -> FrameStats {
        let Frame {
            renderer,
            targets,
            view_proj,
            light,
            textures,
            draws,
            ..
        } = self;

        let width = targets.color.get_width();
        let height = targets.color.get_height();
        renderer.prepare_grid(width, height);
        renderer.counters.reset();

        let fallback = &renderer.fallback_texture;
        let textures: Vec<&Texture> = textures.iter().map(|t| t.unwrap_or(fallback)).collect();
        let textures = textures.as_slice();

        let grid = &renderer.grid;
        let counters = &renderer.counters;
        let scratch = renderer.scratch.as_slice();
        let strip_height = renderer.settings.strip_height;

        let color = SharedBuffer::new(targets.color);
        let depth = SharedBuffer::new(targets.depth);
        let gbuffer = SharedBuffer::new(targets.gbuffer);
        let (color, depth, gbuffer) = (&color, &depth, &gbuffer);
        let draws = draws.as_slice();

        renderer.tasks.scope(|s| {
            for draw in draws {
                s.push_job(move |participant| {
                    let mut scratch = scratch[participant].lock();
                    process_draw(draw, &view_proj, &mut scratch, grid, counters);
                });
            }

            if !s.push_barrier() {
                log::warn!("task queue full, frame stops after binning");
                return;
            }

            for tile in grid.tiles() {
                s.push_job(move |_| {
                    // tiles never overlap, and binning is over
                    let mut target = unsafe { TileTarget::new(tile.get_rect(), depth, gbuffer) };
                    FrameCounters::add(&counters.texels_written, rasterize_tile(tile, &mut target));
                });
            }

            if !s.push_barrier() {
                log::warn!("task queue full, frame stops before shading");
                return;
            }

            for y in (0..height).step_by(strip_height) {
                s.push_job(move |_| {
                    let rows = y..(y + strip_height).min(height);
                    // strips never overlap, and rasterization is over
                    let (src, dst) = unsafe { (gbuffer.rows(rows.clone()), color.rows_mut(rows)) };
                    FrameCounters::add(&counters.pixels_shaded, shade_rows(src, dst, width, textures, light));
                });
            }
        });

        let stats = counters.snapshot(draws.len());
        if stats.bin_overflow > 0 {
            log::warn!(
                "{} bin entries dropped this frame, bin capacity is {}",
                stats.bin_overflow,
                renderer.settings.bin_capacity
            );
        }
        stats
    }
}

/// Geometry, clipping and binning for one draw call.
fn process_draw(draw: &DrawCall, view_proj: &Mat4, scratch: &mut GeometryScratch, grid: &TileGrid, counters: &FrameCounters) {
    let mesh = draw.mesh;
    let world_view_proj = *view_proj * draw.world;
    scratch.transform(mesh, &draw.world, &world_view_proj);

    let positions = scratch.clip_positions();
    let normals = scratch.world_normals();
    let tex_coords = mesh.tex_coords();
    let vertex = |i: u16| {
        let i = i as usize;
        ClipVertex::new(positions[i], normals[i], tex_coords[i])
    };

    let width = grid.get_width() as f32;
    let height = grid.get_height() as f32;

    let mut clipped = 0;
    let mut culled = 0;
    let mut binned = 0;
    let mut entries = 0;
    let mut dropped = 0;

    for (local, indices) in mesh.indices().chunks_exact(3).enumerate() {
        let polygon = clip_triangle(vertex(indices[0]), vertex(indices[1]), vertex(indices[2]));
        if polygon.is_empty() {
            clipped += 1;
            continue;
        }

        let triangle_id = draw.base_triangle.wrapping_add(local as u32);
        let screen = polygon.to_screen(width, height);
        for triangle in screen.triangles() {
            match grid.bin_triangle(&triangle, draw.texture_id, triangle_id) {
                BinOutcome::Culled => culled += 1,
                BinOutcome::Binned { entries: e, dropped: d } => {
                    binned += 1;
                    entries += e;
                    dropped += d;
                }
            }
        }
    }

    FrameCounters::add(&counters.triangles_submitted, mesh.triangle_count());
    FrameCounters::add(&counters.triangles_clipped, clipped);
    FrameCounters::add(&counters.triangles_culled, culled);
    FrameCounters::add(&counters.triangles_binned, binned);
    FrameCounters::add(&counters.bin_entries, entries);
    FrameCounters::add(&counters.bin_overflow, dropped);
}
