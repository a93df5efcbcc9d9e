//! Rendering statistics.

use std::ops::AddAssign;

/// Statistics from rendering one layer (or several, summed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Number of draw calls.
    pub draw_calls: u32,
    /// Number of instances drawn.
    pub instances: u32,
    /// Materials that bound their program and drew.
    pub materials_drawn: u32,
    /// Materials skipped because they had nothing to draw.
    pub materials_skipped: u32,
}

impl RenderStats {
    /// Counts one instanced draw.
    #[inline]
    pub fn record_draw(&mut self, instances: u32) {
        self.draw_calls += 1;
        self.instances += instances;
    }

    /// Average instances per draw call.
    #[must_use]
    pub fn batching_ratio(&self) -> f32 {
        if self.draw_calls > 0 {
            self.instances as f32 / self.draw_calls as f32
        } else {
            0.0
        }
    }

    /// Returns true if nothing was drawn.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.draw_calls == 0
    }
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, other: Self) {
        self.draw_calls += other.draw_calls;
        self.instances += other.instances;
        self.materials_drawn += other.materials_drawn;
        self.materials_skipped += other.materials_skipped;
    }
}
