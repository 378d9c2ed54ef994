//! `bytemuck` mirrors of the structs declared in the WGSL prelude.
//!
//! Every type here is `#[repr(C)]`, scalar-only and sized to a multiple of
//! 16 bytes where it is bound as a uniform. Changing a layout requires the
//! matching change in `shaders/prelude.wgsl` and a bump of
//! [`super::program::KERNEL_ABI_VERSION`].

use bytemuck::{Pod, Zeroable};

/// Device bit pattern for "path terminated, lane may be restarted".
pub const RAY_DONE_DEPTH: u32 = u32::MAX;
/// Device bit pattern for "ray hit nothing".
pub const INVALID_PRIM_INDEX: u32 = u32::MAX;
/// Device bit pattern for "lane owns no sample".
pub const INVALID_PIXEL: u32 = u32::MAX;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub center_x: f32,
    pub center_y: f32,
    pub center_z: f32,
    pub radius: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub rho_r: f32,
    pub rho_g: f32,
    pub rho_b: f32,
    pub emission_r: f32,
    pub emission_g: f32,
    pub emission_b: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuCamera {
    pub eye_x: f32,
    pub eye_y: f32,
    pub eye_z: f32,
    pub u_x: f32,
    pub u_y: f32,
    pub u_z: f32,
    pub v_x: f32,
    pub v_y: f32,
    pub v_z: f32,
    pub w_x: f32,
    pub w_y: f32,
    pub w_z: f32,
    pub bottom: f32,
    pub left: f32,
    pub image_width: u32,
    pub image_height: u32,
    pub inv_width: f32,
    pub inv_height: f32,
    pub _pad: [u32; 2],
}

/// Render-wide constants, uploaded once per render.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RenderParams {
    pub seed: u32,
    pub max_depth: u32,
    pub rr_depth: u32,
    pub num_spheres: u32,
    pub background_r: f32,
    pub background_g: f32,
    pub background_b: f32,
    pub ray_epsilon: f32,
    /// 0 = box, 1 = tent.
    pub filter_kind: u32,
    pub num_materials: u32,
    pub _pad: [u32; 2],
}

/// Per-tile arguments, written right before a tile's dispatches.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct TileParams {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_samples: u32,
    /// Pixels in this region (`width * height`).
    pub total_pixels: u32,
    /// Samples in this region; the convergence target.
    pub total_samples: u32,
    /// Lanes allocated for the pipeline's full-size tile.
    pub lane_count: u32,
    pub _pad: [u32; 2],
}

/// Device-side coordination counters.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Counters {
    /// Samples whose contribution has been deposited and retired.
    pub samples_done: u32,
    /// Next unclaimed sample slot.
    pub next_slot: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_wgsl() {
        assert_eq!(size_of::<GpuSphere>(), 16);
        assert_eq!(size_of::<GpuMaterial>(), 24);
        assert_eq!(size_of::<GpuCamera>(), 80);
        assert_eq!(size_of::<RenderParams>(), 48);
        assert_eq!(size_of::<TileParams>(), 48);
        assert_eq!(size_of::<Counters>(), 8);
    }

    #[test]
    fn sentinels_are_all_bits_set() {
        assert_eq!(RAY_DONE_DEPTH, !0);
        assert_eq!(INVALID_PRIM_INDEX, !0);
        assert_eq!(INVALID_PIXEL, !0);
    }
}
