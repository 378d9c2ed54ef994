//! Host view of per-lane state.
//!
//! Kernels encode "no value" as all-bits-set words; on the host those become
//! enums and options so the sentinels never leak into tracing logic.

use super::gpu_types::{INVALID_PIXEL, INVALID_PRIM_INDEX, RAY_DONE_DEPTH};

/// Bounce count of a lane's current path.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RayDepth {
    /// Path in flight after this many bounces.
    Active(u32),
    /// Path terminated; the lane may be restarted.
    Done,
}

impl RayDepth {
    pub const fn from_raw(raw: u32) -> Self {
        if raw == RAY_DONE_DEPTH { Self::Done } else { Self::Active(raw) }
    }

    #[cfg(test)]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Active(d) => d,
            Self::Done => RAY_DONE_DEPTH,
        }
    }

    #[cfg(test)]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// `None` for a miss.
pub const fn primitive_from_raw(raw: u32) -> Option<u32> {
    if raw == INVALID_PRIM_INDEX { None } else { Some(raw) }
}

/// `None` for a lane that owns no sample.
pub const fn pixel_from_raw(x: u32, y: u32) -> Option<(u32, u32)> {
    if x == INVALID_PIXEL { None } else { Some((x, y)) }
}

/// Snapshot of one lane, decoded from the device arrays.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LaneState {
    pub depth: RayDepth,
    pub rng: u32,
    /// Sphere hit by the last intersection pass.
    pub primitive: Option<u32>,
    /// Image pixel owning the lane's current sample.
    pub pixel: Option<(u32, u32)>,
    /// Sub-pixel jitter of the current sample.
    pub offset: (f32, f32),
    pub extent: f32,
}
