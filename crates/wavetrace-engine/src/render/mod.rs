//! Wavefront path tracing on the compute device.
//!
//! A render is split into tiles. Each tile runs through a fixed chain of
//! kernels (restart, intersect, shade, update, deposit) until every sample
//! slot of the tile has been traced and deposited.
//!
//! Convention:
//! - Image pixel `(0, 0)` is the bottom-left of the image plane.
//! - All per-lane state lives in structure-of-arrays device buffers, one
//!   buffer per scalar field.

mod buffers;
mod camera;
mod context;
mod film;
mod gpu_types;
mod kernels;
mod lane;
mod launch;
mod pipeline;
mod program;
mod queue;
mod readback;
mod scene_buffers;
mod settings;
mod tile;

/// Widest storage-buffer argument list of any kernel stage.
pub const MAX_STORAGE_BINDINGS_PER_KERNEL: u32 = 24;

pub use buffers::{DeviceArray, Intersections, Pixels, Rays, Samples, TracingBuffers};
pub use camera::Camera;
pub use context::RenderingContext;
pub use film::{to_byte, Film, TilePixels};
pub use gpu_types::{
    Counters, GpuCamera, GpuMaterial, GpuSphere, RenderParams, TileParams, INVALID_PIXEL,
    INVALID_PRIM_INDEX, RAY_DONE_DEPTH,
};
pub use kernels::{Kernel, KernelSet};
pub use lane::{pixel_from_raw, primitive_from_raw, LaneState, RayDepth};
pub use launch::LaunchConfig;
pub use pipeline::{iteration_limit, PipelineSnapshot, TilePipeline, TileStats};
pub use program::{ArgKind, ArgSpec, KernelProgram, KernelStage, KERNEL_ABI_VERSION};
pub use queue::{Command, CommandRecord, Event, KernelQueue};
pub use readback::StagingBuffer;
pub use scene_buffers::SceneBuffers;
pub use settings::{FilterKind, RenderSettings, XORSHIFT_STATE_START};
pub use tile::{tile_regions, TileDescription, TileRegion};
