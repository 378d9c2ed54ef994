use crate::error::{RenderError, Result};

use super::camera::Camera;

/// Initial xorshift state of every lane.
pub const XORSHIFT_STATE_START: u32 = 52938;

/// Pixel reconstruction filter applied by the deposit stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FilterKind {
    /// Every sample weighs 1.
    #[default]
    Box,
    /// Weight falls off linearly with the jitter offset's distance from the
    /// pixel centre: `(1 - |2sx - 1|) * (1 - |2sy - 1|)`.
    Tent,
}

impl FilterKind {
    pub(crate) fn code(self) -> u32 {
        match self {
            Self::Box => 0,
            Self::Tent => 1,
        }
    }
}

/// Render configuration that is not part of the scene file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Initial RNG state of every lane. Must be non-zero (xorshift fixpoint).
    pub seed: u32,
    /// Paths terminate after this many bounces.
    pub max_depth: u32,
    /// Russian roulette starts after this many bounces.
    pub rr_depth: u32,
    /// Radiance returned by rays that escape the scene.
    pub background: [f32; 3],
    /// Offset applied along the normal when spawning secondary rays.
    pub ray_epsilon: f32,
    pub filter: FilterKind,
    pub camera: Camera,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            seed: XORSHIFT_STATE_START,
            max_depth: 8,
            rr_depth: 3,
            background: [0.0, 0.0, 0.0],
            ray_epsilon: 1e-4,
            filter: FilterKind::Box,
            camera: Camera::default(),
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<()> {
        if self.seed == 0 {
            return Err(RenderError::Settings("xorshift seed must be non-zero".into()));
        }
        if self.max_depth == 0 || self.max_depth == u32::MAX {
            return Err(RenderError::Settings(format!(
                "max_depth must be in 1..{}, got {}",
                u32::MAX,
                self.max_depth
            )));
        }
        if !(self.ray_epsilon >= 0.0 && self.ray_epsilon.is_finite()) {
            return Err(RenderError::Settings(format!(
                "ray_epsilon must be finite and non-negative, got {}",
                self.ray_epsilon
            )));
        }
        if self.background.iter().any(|c| !(c.is_finite() && *c >= 0.0)) {
            return Err(RenderError::Settings(format!(
                "background radiance must be finite and non-negative, got {:?}",
                self.background
            )));
        }
        if !(self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0) {
            return Err(RenderError::Settings(format!(
                "field of view must be in (0, 180) degrees, got {}",
                self.camera.fov_degrees
            )));
        }
        let (u, _, w) = self.camera.basis();
        if !(u.is_finite() && w.is_finite()) {
            return Err(RenderError::Settings(
                "camera eye, target and up vector are degenerate".into(),
            ));
        }
        Ok(())
    }
}
