//! Device-resident structure-of-arrays working set.
//!
//! One [`DeviceArray`] per scalar field, all indexed by the same lane (or
//! pixel) index. Arrays are allocated once and never resized; dropping an
//! array destroys its buffer, so a partially built set releases whatever it
//! already allocated when a later allocation fails.

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::device::ComputeContext;
use crate::error::Result;

/// Usage shared by every working-set array.
const ARRAY_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

// ── DeviceArray ───────────────────────────────────────────────────────────

/// A typed storage buffer holding `len` elements of `T`.
pub struct DeviceArray<T> {
    buffer: wgpu::Buffer,
    len: u64,
    label: &'static str,
    _marker: PhantomData<T>,
}

impl<T: Pod> DeviceArray<T> {
    /// Allocates an uninitialised array.
    ///
    /// Empty arrays are padded to one element; zero-sized storage bindings
    /// are invalid.
    #[track_caller]
    pub fn new(ctx: &ComputeContext, label: &'static str, len: u64) -> Result<Self> {
        let size = Self::byte_size(len);
        ctx.check_buffer_size(label, size)?;

        let buffer = ctx.scoped(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: ARRAY_USAGE,
                mapped_at_creation: false,
            })
        })?;
        log::trace!("allocated {} ({} x {} bytes)", label, len, size_of::<T>());

        Ok(Self { buffer, len, label, _marker: PhantomData })
    }

    /// Allocates an array initialised from host data in one call.
    #[track_caller]
    pub fn from_slice(
        ctx: &ComputeContext,
        label: &'static str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> Result<Self> {
        use wgpu::util::DeviceExt;

        let len = data.len() as u64;
        let size = Self::byte_size(len);
        ctx.check_buffer_size(label, size)?;

        let padding;
        let contents: &[u8] = if data.is_empty() {
            padding = vec![0u8; size as usize];
            &padding
        } else {
            bytemuck::cast_slice(data)
        };

        let buffer = ctx.scoped(|device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
        })?;
        log::trace!("uploaded {} ({} elements)", label, len);

        Ok(Self { buffer, len, label, _marker: PhantomData })
    }

    fn byte_size(len: u64) -> u64 {
        len.max(1) * size_of::<T>() as u64
    }
}

impl<T> DeviceArray<T> {
    /// Logical element count (0 for a padded empty array).
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of `len` elements, in bytes.
    pub fn byte_len(&self) -> u64 {
        self.len * size_of::<T>() as u64
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> Drop for DeviceArray<T> {
    fn drop(&mut self) {
        self.buffer.destroy();
        log::trace!("released {}", self.label);
    }
}

impl<T> std::fmt::Debug for DeviceArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceArray")
            .field("label", &self.label)
            .field("len", &self.len)
            .finish()
    }
}

// ── Groups ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Rays {
    pub origin_x: DeviceArray<f32>,
    pub origin_y: DeviceArray<f32>,
    pub origin_z: DeviceArray<f32>,
    pub direction_x: DeviceArray<f32>,
    pub direction_y: DeviceArray<f32>,
    pub direction_z: DeviceArray<f32>,
    pub extent: DeviceArray<f32>,
    /// Bounce count or [`super::RAY_DONE_DEPTH`].
    pub depth: DeviceArray<u32>,
}

impl Rays {
    fn new(ctx: &ComputeContext, n: u64) -> Result<Self> {
        Ok(Self {
            origin_x: DeviceArray::new(ctx, "ray.origin_x", n)?,
            origin_y: DeviceArray::new(ctx, "ray.origin_y", n)?,
            origin_z: DeviceArray::new(ctx, "ray.origin_z", n)?,
            direction_x: DeviceArray::new(ctx, "ray.direction_x", n)?,
            direction_y: DeviceArray::new(ctx, "ray.direction_y", n)?,
            direction_z: DeviceArray::new(ctx, "ray.direction_z", n)?,
            extent: DeviceArray::new(ctx, "ray.extent", n)?,
            depth: DeviceArray::new(ctx, "ray.depth", n)?,
        })
    }
}

#[derive(Debug)]
pub struct Intersections {
    pub hit_x: DeviceArray<f32>,
    pub hit_y: DeviceArray<f32>,
    pub hit_z: DeviceArray<f32>,
    pub normal_x: DeviceArray<f32>,
    pub normal_y: DeviceArray<f32>,
    pub normal_z: DeviceArray<f32>,
    pub uv_s: DeviceArray<f32>,
    pub uv_t: DeviceArray<f32>,
    pub wo_x: DeviceArray<f32>,
    pub wo_y: DeviceArray<f32>,
    pub wo_z: DeviceArray<f32>,
    /// Sphere index or [`super::INVALID_PRIM_INDEX`].
    pub prim: DeviceArray<u32>,
}

impl Intersections {
    fn new(ctx: &ComputeContext, n: u64) -> Result<Self> {
        Ok(Self {
            hit_x: DeviceArray::new(ctx, "isect.hit_x", n)?,
            hit_y: DeviceArray::new(ctx, "isect.hit_y", n)?,
            hit_z: DeviceArray::new(ctx, "isect.hit_z", n)?,
            normal_x: DeviceArray::new(ctx, "isect.normal_x", n)?,
            normal_y: DeviceArray::new(ctx, "isect.normal_y", n)?,
            normal_z: DeviceArray::new(ctx, "isect.normal_z", n)?,
            uv_s: DeviceArray::new(ctx, "isect.uv_s", n)?,
            uv_t: DeviceArray::new(ctx, "isect.uv_t", n)?,
            wo_x: DeviceArray::new(ctx, "isect.wo_x", n)?,
            wo_y: DeviceArray::new(ctx, "isect.wo_y", n)?,
            wo_z: DeviceArray::new(ctx, "isect.wo_z", n)?,
            prim: DeviceArray::new(ctx, "isect.prim", n)?,
        })
    }
}

#[derive(Debug)]
pub struct Samples {
    pub li_r: DeviceArray<f32>,
    pub li_g: DeviceArray<f32>,
    pub li_b: DeviceArray<f32>,
    pub beta_r: DeviceArray<f32>,
    pub beta_g: DeviceArray<f32>,
    pub beta_b: DeviceArray<f32>,
    /// Owning pixel, or [`super::INVALID_PIXEL`] for an idle lane.
    pub pixel_x: DeviceArray<u32>,
    pub pixel_y: DeviceArray<u32>,
    pub offset_x: DeviceArray<f32>,
    pub offset_y: DeviceArray<f32>,
    /// `samples_done` / `next_slot`, a single [`super::Counters`].
    pub counters: DeviceArray<super::Counters>,
}

impl Samples {
    fn new(ctx: &ComputeContext, n: u64) -> Result<Self> {
        Ok(Self {
            li_r: DeviceArray::new(ctx, "sample.li_r", n)?,
            li_g: DeviceArray::new(ctx, "sample.li_g", n)?,
            li_b: DeviceArray::new(ctx, "sample.li_b", n)?,
            beta_r: DeviceArray::new(ctx, "sample.beta_r", n)?,
            beta_g: DeviceArray::new(ctx, "sample.beta_g", n)?,
            beta_b: DeviceArray::new(ctx, "sample.beta_b", n)?,
            pixel_x: DeviceArray::new(ctx, "sample.pixel_x", n)?,
            pixel_y: DeviceArray::new(ctx, "sample.pixel_y", n)?,
            offset_x: DeviceArray::new(ctx, "sample.offset_x", n)?,
            offset_y: DeviceArray::new(ctx, "sample.offset_y", n)?,
            counters: DeviceArray::new(ctx, "sample.counters", 1)?,
        })
    }
}

/// Per-pixel reduction target. Accumulated with atomic float adds, so the
/// buffers hold `f32` bit patterns.
#[derive(Debug)]
pub struct Pixels {
    pub r: DeviceArray<f32>,
    pub g: DeviceArray<f32>,
    pub b: DeviceArray<f32>,
    pub weight: DeviceArray<f32>,
}

impl Pixels {
    fn new(ctx: &ComputeContext, n: u64) -> Result<Self> {
        Ok(Self {
            r: DeviceArray::new(ctx, "pixel.r", n)?,
            g: DeviceArray::new(ctx, "pixel.g", n)?,
            b: DeviceArray::new(ctx, "pixel.b", n)?,
            weight: DeviceArray::new(ctx, "pixel.weight", n)?,
        })
    }

    pub fn channels(&self) -> [&DeviceArray<f32>; 4] {
        [&self.r, &self.g, &self.b, &self.weight]
    }
}

// ── Buffer set ────────────────────────────────────────────────────────────

/// Every per-lane and per-pixel array of one tile pipeline.
#[derive(Debug)]
pub struct TracingBuffers {
    pub rays: Rays,
    pub intersections: Intersections,
    pub samples: Samples,
    pub pixels: Pixels,
    /// One xorshift state per lane.
    pub rng: DeviceArray<u32>,
    num_pixels: u64,
    num_lanes: u64,
}

impl TracingBuffers {
    /// Allocates the full set. On error nothing stays allocated.
    pub fn new(ctx: &ComputeContext, num_pixels: u64, num_lanes: u64) -> Result<Self> {
        let buffers = Self {
            rays: Rays::new(ctx, num_lanes)?,
            intersections: Intersections::new(ctx, num_lanes)?,
            samples: Samples::new(ctx, num_lanes)?,
            pixels: Pixels::new(ctx, num_pixels)?,
            rng: DeviceArray::new(ctx, "sample.rng", num_lanes)?,
            num_pixels,
            num_lanes,
        };
        log::debug!("tracing buffers: {} lanes, {} pixels", num_lanes, num_pixels);
        Ok(buffers)
    }

    pub fn num_pixels(&self) -> u64 {
        self.num_pixels
    }

    pub fn num_lanes(&self) -> u64 {
        self.num_lanes
    }

    /// Looks up a per-lane or per-pixel array by its kernel argument name.
    pub(crate) fn by_name(&self, name: &str) -> Option<&wgpu::Buffer> {
        let (r, i, s, p) = (&self.rays, &self.intersections, &self.samples, &self.pixels);
        let buffer = match name {
            "origin_x" => r.origin_x.buffer(),
            "origin_y" => r.origin_y.buffer(),
            "origin_z" => r.origin_z.buffer(),
            "direction_x" => r.direction_x.buffer(),
            "direction_y" => r.direction_y.buffer(),
            "direction_z" => r.direction_z.buffer(),
            "extent" => r.extent.buffer(),
            "depth" => r.depth.buffer(),
            "hit_x" => i.hit_x.buffer(),
            "hit_y" => i.hit_y.buffer(),
            "hit_z" => i.hit_z.buffer(),
            "normal_x" => i.normal_x.buffer(),
            "normal_y" => i.normal_y.buffer(),
            "normal_z" => i.normal_z.buffer(),
            "uv_s" => i.uv_s.buffer(),
            "uv_t" => i.uv_t.buffer(),
            "wo_x" => i.wo_x.buffer(),
            "wo_y" => i.wo_y.buffer(),
            "wo_z" => i.wo_z.buffer(),
            "prim" => i.prim.buffer(),
            "li_r" => s.li_r.buffer(),
            "li_g" => s.li_g.buffer(),
            "li_b" => s.li_b.buffer(),
            "beta_r" => s.beta_r.buffer(),
            "beta_g" => s.beta_g.buffer(),
            "beta_b" => s.beta_b.buffer(),
            "pixel_x" => s.pixel_x.buffer(),
            "pixel_y" => s.pixel_y.buffer(),
            "offset_x" => s.offset_x.buffer(),
            "offset_y" => s.offset_y.buffer(),
            "counters" => s.counters.buffer(),
            "accum_r" => p.r.buffer(),
            "accum_g" => p.g.buffer(),
            "accum_b" => p.b.buffer(),
            "accum_weight" => p.weight.buffer(),
            "rng" => self.rng.buffer(),
            _ => return None,
        };
        Some(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;

    #[test]
    fn lane_and_pixel_arrays_have_matching_lengths() {
        let Some(ctx) = test_context() else { return };
        let set = TracingBuffers::new(&ctx, 12, 48).unwrap();

        let lanes = [
            set.rays.origin_x.len(),
            set.rays.depth.len(),
            set.intersections.prim.len(),
            set.intersections.uv_t.len(),
            set.samples.li_b.len(),
            set.samples.pixel_y.len(),
            set.rng.len(),
        ];
        assert!(lanes.iter().all(|&n| n == 48), "{lanes:?}");
        assert!(set.pixels.channels().iter().all(|c| c.len() == 12));
        assert_eq!(set.samples.counters.len(), 1);
    }

    #[test]
    fn oversized_set_fails_cleanly() {
        let Some(ctx) = test_context() else { return };
        let lanes = ctx.caps().max_array_bytes() / 4 + 1;
        let err = TracingBuffers::new(&ctx, 1, lanes).unwrap_err();
        assert!(matches!(
            err.device_status(),
            Some(crate::error::DeviceStatus::BufferTooLarge { .. })
        ));
    }

    #[test]
    fn every_kernel_argument_resolves() {
        let Some(ctx) = test_context() else { return };
        let set = TracingBuffers::new(&ctx, 1, 1).unwrap();
        assert!(set.by_name("accum_weight").is_some());
        assert!(set.by_name("spheres").is_none());
    }
}
