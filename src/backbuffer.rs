use std::marker::PhantomData;
use std::ops::Range;
use std::ptr::NonNull;

use glam::{Vec2, Vec3};

use crate::color::Color;

/// Texture id stored in G-buffer texels that no triangle touched.
pub const NO_SURFACE: u16 = u16::MAX;

/// Far value every depth texel starts the frame with.
pub const DEPTH_FAR: f32 = 1.0;

/// Surface attributes written by the rasterizer and consumed by the deferred shader.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GBufferTexel {
    pub texture_id: u16,
    pub triangle_id: u32,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl GBufferTexel {
    pub const EMPTY: GBufferTexel = GBufferTexel {
        texture_id: NO_SURFACE,
        triangle_id: u32::MAX,
        normal: Vec3::ZERO,
        uv: Vec2::ZERO,
    };

    pub fn is_empty(&self) -> bool {
        self.texture_id == NO_SURFACE
    }
}

impl Default for GBufferTexel {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub type ColorBuffer = FrameBuffer<Color>;
pub type DepthBuffer = FrameBuffer<f32>;
pub type GBuffer = FrameBuffer<GBufferTexel>;

/// Row-major pixel surface owned by the caller and borrowed by the renderer for a frame.
#[derive(Debug, Clone)]
pub struct FrameBuffer<T> {
    width: usize,
    height: usize,
    pixels: Vec<T>,
}

impl<T: Copy> FrameBuffer<T> {
    pub fn new(width: usize, height: usize, fill: T) -> FrameBuffer<T> {
        FrameBuffer {
            width,
            height,
            pixels: vec![fill; width * height],
        }
    }

    pub fn clear(&mut self, value: T) {
        self.pixels.fill(value);
    }

    pub fn resize(&mut self, width: usize, height: usize, fill: T) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width * height, fill);
    }

    pub fn get_width(&self) -> usize {
        self.width
    }

    pub fn get_height(&self) -> usize {
        self.height
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[x + y * self.width]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[x + y * self.width] = value;
    }

    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.pixels
    }
}

/// A frame buffer shared between jobs that each own a disjoint pixel region.
///
/// Jobs write through raw row slices; the scheduler's barriers provide the
/// ordering between the writers of one phase and the readers of the next.
pub(crate) struct SharedBuffer<'a, T> {
    ptr: NonNull<T>,
    width: usize,
    height: usize,
    _borrow: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for SharedBuffer<'_, T> {}
unsafe impl<T: Send> Sync for SharedBuffer<'_, T> {}

impl<'a, T: Copy> SharedBuffer<'a, T> {
    pub(crate) fn new(buffer: &'a mut FrameBuffer<T>) -> Self {
        let width = buffer.width;
        let height = buffer.height;
        let ptr = NonNull::new(buffer.pixels.as_mut_ptr()).unwrap_or(NonNull::dangling());
        Self {
            ptr,
            width,
            height,
            _borrow: PhantomData,
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    /// Mutable view of `columns` on row `y`.
    ///
    /// # Safety
    /// No other live slice may overlap the requested pixels.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn row_mut(&self, y: usize, columns: Range<usize>) -> &mut [T] {
        assert!(y < self.height && columns.start <= columns.end && columns.end <= self.width);
        let start = y * self.width + columns.start;
        std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(start), columns.len())
    }

    /// Mutable reference to one pixel.
    ///
    /// # Safety
    /// No other live reference may point at the same pixel.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn pixel_mut(&self, x: usize, y: usize) -> &mut T {
        debug_assert!(x < self.width && y < self.height);
        &mut *self.ptr.as_ptr().add(x + y * self.width)
    }

    /// Mutable view of whole rows `rows`.
    ///
    /// # Safety
    /// No other live slice may overlap the requested rows.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn rows_mut(&self, rows: Range<usize>) -> &mut [T] {
        assert!(rows.start <= rows.end && rows.end <= self.height);
        let start = rows.start * self.width;
        std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(start), rows.len() * self.width)
    }

    /// Shared view of whole rows `rows`.
    ///
    /// # Safety
    /// No job may be writing the requested rows while the slice is alive.
    pub(crate) unsafe fn rows(&self, rows: Range<usize>) -> &[T] {
        assert!(rows.start <= rows.end && rows.end <= self.height);
        let start = rows.start * self.width;
        std::slice::from_raw_parts(self.ptr.as_ptr().add(start), rows.len() * self.width)
    }
}
