//! Floating origin.
//!
//! World coordinates stay `f64` on the CPU. What reaches the GPU is always
//! relative to an integer origin that follows the camera in coarse steps, so
//! `f32` precision is spent near the viewer instead of near (0, 0, 0).

use std::sync::Arc;

use glam::{DVec3, IVec3, Vec3};
use parking_lot::RwLock;

use crate::config::OriginConfig;

/// Origin position tagged with the number of shifts so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct OriginSnapshot {
    /// Origin in world units.
    pub position: IVec3,
    /// Incremented on every shift.
    pub generation: u64,
}

/// A recenter that happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OriginShift {
    /// Previous origin.
    pub from: IVec3,
    /// New origin.
    pub to: IVec3,
}

impl OriginShift {
    /// How far the origin moved.
    #[must_use]
    pub fn delta(&self) -> IVec3 {
        self.to - self.from
    }
}

/// Shared, cheaply cloneable origin. All instancers of one material manager
/// hold the same origin.
#[derive(Clone, Debug, Default)]
pub struct FloatingOrigin {
    state: Arc<RwLock<OriginSnapshot>>,
}

impl FloatingOrigin {
    /// Creates an origin at (0, 0, 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current origin position.
    #[must_use]
    pub fn position(&self) -> IVec3 {
        self.state.read().position
    }

    /// Number of shifts so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Position and generation read together.
    #[must_use]
    pub fn snapshot(&self) -> OriginSnapshot {
        *self.state.read()
    }

    /// Converts a world position to origin-relative GPU coordinates.
    #[must_use]
    pub fn relative(&self, world: DVec3) -> Vec3 {
        (world - self.position().as_dvec3()).as_vec3()
    }

    /// Moves the origin. Setting the current position is a no-op.
    pub fn set(&self, position: IVec3) -> Option<OriginShift> {
        let mut state = self.state.write();
        if state.position == position {
            return None;
        }
        let shift = OriginShift {
            from: state.position,
            to: position,
        };
        state.position = position;
        state.generation += 1;
        Some(shift)
    }

    /// Recenters on the camera if it drifted past the threshold on any axis.
    ///
    /// The new origin is the camera position floored to the configured grid.
    pub fn follow(&self, camera: DVec3, config: &OriginConfig) -> Option<OriginShift> {
        let drift = (camera - self.position().as_dvec3()).abs();
        if drift.max_element() <= config.threshold {
            return None;
        }

        let grid = f64::from(config.grid.max(1));
        let snapped = (camera / grid).floor() * grid;
        let shift = self.set(snapped.as_ivec3())?;

        tracing::debug!(
            from = ?shift.from,
            to = ?shift.to,
            "floating origin shifted",
        );
        Some(shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OriginConfig {
        OriginConfig {
            threshold: 512.0,
            grid: 16,
        }
    }

    #[test]
    fn test_no_shift_within_threshold() {
        let origin = FloatingOrigin::new();
        assert!(origin.follow(DVec3::new(500.0, -511.0, 0.0), &config()).is_none());
        assert_eq!(origin.generation(), 0);
    }

    #[test]
    fn test_shift_snaps_to_grid() {
        let origin = FloatingOrigin::new();
        let shift = origin.follow(DVec3::new(600.0, 0.0, 0.0), &config()).unwrap();

        assert_eq!(shift.from, IVec3::ZERO);
        assert_eq!(shift.to, IVec3::new(592, 0, 0));
        assert_eq!(shift.delta(), IVec3::new(592, 0, 0));
        assert_eq!(origin.generation(), 1);

        // Same camera next frame: idempotent
        assert!(origin.follow(DVec3::new(600.0, 0.0, 0.0), &config()).is_none());
        assert_eq!(origin.generation(), 1);
    }

    #[test]
    fn test_negative_positions_floor() {
        let origin = FloatingOrigin::new();
        origin.follow(DVec3::new(-600.5, 0.0, 0.0), &config());
        assert_eq!(origin.position(), IVec3::new(-608, 0, 0));
    }

    #[test]
    fn test_relative_precision_far_from_zero() {
        let origin = FloatingOrigin::new();
        origin.set(IVec3::new(10_000_000, 0, 0));
        let rel = origin.relative(DVec3::new(10_000_000.25, 0.0, 0.0));
        assert_eq!(rel, Vec3::new(0.25, 0.0, 0.0));
    }

    #[test]
    fn test_clones_share_state() {
        let origin = FloatingOrigin::new();
        let other = origin.clone();
        origin.set(IVec3::splat(32));
        assert_eq!(other.position(), IVec3::splat(32));
        assert_eq!(other.snapshot().generation, 1);
    }
}
