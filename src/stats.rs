use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-frame pipeline counters, as returned by `Frame::end_draw`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub triangles_submitted: usize,
    /// Triangles with nothing left after clipping.
    pub triangles_clipped: usize,
    /// Screen triangles rejected as back-facing, degenerate or off screen.
    pub triangles_culled: usize,
    pub triangles_binned: usize,
    pub bin_entries: usize,
    /// Bin entries dropped because a tile bin was full.
    pub bin_overflow: usize,
    pub texels_written: usize,
    pub pixels_shaded: usize,
}

impl FrameStats {
    /// Label/value pairs for an on-screen overlay.
    pub fn debug_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("draw calls", self.draw_calls.to_string()),
            ("triangles", self.triangles_submitted.to_string()),
            ("clipped", self.triangles_clipped.to_string()),
            ("culled", self.triangles_culled.to_string()),
            ("binned", self.triangles_binned.to_string()),
            ("bin entries", self.bin_entries.to_string()),
            ("bin overflow", self.bin_overflow.to_string()),
            ("texels", self.texels_written.to_string()),
            ("shaded", self.pixels_shaded.to_string()),
        ]
    }
}

/// Shared counters bumped by the pipeline jobs.
#[derive(Debug, Default)]
pub(crate) struct FrameCounters {
    pub triangles_submitted: AtomicUsize,
    pub triangles_clipped: AtomicUsize,
    pub triangles_culled: AtomicUsize,
    pub triangles_binned: AtomicUsize,
    pub bin_entries: AtomicUsize,
    pub bin_overflow: AtomicUsize,
    pub texels_written: AtomicUsize,
    pub pixels_shaded: AtomicUsize,
}

impl FrameCounters {
    #[inline]
    pub fn add(counter: &AtomicUsize, value: usize) {
        if value != 0 {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, draw_calls: usize) -> FrameStats {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        FrameStats {
            draw_calls,
            triangles_submitted: load(&self.triangles_submitted),
            triangles_clipped: load(&self.triangles_clipped),
            triangles_culled: load(&self.triangles_culled),
            triangles_binned: load(&self.triangles_binned),
            bin_entries: load(&self.bin_entries),
            bin_overflow: load(&self.bin_overflow),
            texels_written: load(&self.texels_written),
            pixels_shaded: load(&self.pixels_shaded),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.triangles_submitted,
            &self.triangles_clipped,
            &self.triangles_culled,
            &self.triangles_binned,
            &self.bin_entries,
            &self.bin_overflow,
            &self.texels_written,
            &self.pixels_shaded,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
