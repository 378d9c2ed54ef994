//! The per-tile convergence loop.
//!
//! ```text
//!   fill(pixels)   fill(counters)   Initialise
//!        \               |              /
//!         +--------> RestartSample <---+----------------------+
//!                        |                                    |
//!               read back samples_done ── done? ──> exit       |
//!                        |                                    |
//!                    Intersect -> SampleBRDF -> UpdateRadiance -> DepositSamples
//! ```
//!
//! Every arrow is an explicit event dependency. The `samples_done` read-back
//! is the only point where the host waits for the device during the loop.

use bytemuck::Pod;

use crate::device::ComputeContext;
use crate::error::{DeviceStatus, RenderError, Result};

use super::buffers::{DeviceArray, TracingBuffers};
use super::film::TilePixels;
use super::gpu_types::{Counters, TileParams};
use super::kernels::KernelSet;
use super::lane::{pixel_from_raw, primitive_from_raw, LaneState, RayDepth};
use super::program::KernelStage;
use super::queue::{Event, KernelQueue};
use super::readback::{to_vec, StagingBuffer};
use super::scene_buffers::SceneBuffers;
use super::settings::RenderSettings;
use super::tile::{TileDescription, TileRegion};

/// Outcome of one rendered region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TileStats {
    /// RestartSample dispatches, i.e. loop iterations.
    pub iterations: u64,
    /// Final value of the device counter.
    pub samples_done: u32,
    /// Kernel dispatches recorded for the region.
    pub dispatches: u64,
}

/// Device state captured by [`TilePipeline::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub lanes: Vec<LaneState>,
    pub counters: Counters,
}

/// Drives tiles through the kernel set until every sample is deposited.
///
/// Owns the working buffers and compiled kernels for one tile size; regions
/// up to that size are rendered one after another with the same resources.
pub struct TilePipeline<'a> {
    ctx: &'a ComputeContext,
    scene: &'a SceneBuffers,
    tile: TileDescription,
    max_depth: u32,
    kernels: KernelSet,
    buffers: TracingBuffers,
    queue: KernelQueue<'a>,
    counter_staging: StagingBuffer,
    pixel_staging: StagingBuffer,
    /// Most recent command that writes tracing state.
    last: Option<Event>,
}

impl<'a> TilePipeline<'a> {
    pub fn new(
        ctx: &'a ComputeContext,
        scene: &'a SceneBuffers,
        tile: TileDescription,
        settings: &RenderSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if tile.width == 0 || tile.height == 0 || tile.pixel_samples == 0 {
            return Err(RenderError::Settings(format!("empty tile {:?}", tile)));
        }

        let lanes = tile.total_samples();
        // Slot claims may overshoot the target by up to one lane count.
        if lanes > u64::from(u32::MAX / 2) {
            return Err(RenderError::Settings(format!(
                "tile {}x{} with {} samples per pixel needs {} lanes, at most {} are supported",
                tile.width,
                tile.height,
                tile.pixel_samples,
                lanes,
                u32::MAX / 2
            )));
        }

        let buffers = TracingBuffers::new(ctx, tile.total_pixels(), lanes)?;
        let kernels = KernelSet::new(ctx, scene, &buffers, settings)?;
        let counter_staging =
            StagingBuffer::new(ctx, "readback.counters", size_of::<Counters>() as u64)?;
        let pixel_staging = StagingBuffer::new(ctx, "readback.pixels", tile.total_pixels() * 4)?;

        Ok(Self {
            ctx,
            scene,
            tile,
            max_depth: settings.max_depth,
            kernels,
            buffers,
            queue: KernelQueue::new(ctx),
            counter_staging,
            pixel_staging,
            last: None,
        })
    }

    pub fn tile(&self) -> TileDescription {
        self.tile
    }

    pub fn kernels(&self) -> &KernelSet {
        &self.kernels
    }

    pub fn buffers(&self) -> &TracingBuffers {
        &self.buffers
    }

    /// Commands recorded so far, with their dependencies.
    pub fn queue(&self) -> &KernelQueue<'a> {
        &self.queue
    }

    // ── Loop ──────────────────────────────────────────────────────────────

    /// Renders one region to convergence, leaving its radiance and weights in
    /// the pixel buffers.
    pub fn render_region(&mut self, region: TileRegion) -> Result<TileStats> {
        let target = self.region_samples(&region)?;
        self.queue.clear_log();

        let max_iterations = iteration_limit(self.max_depth, target, self.buffers.num_lanes());

        let mut waits = self.prepare(region)?;
        let mut iterations = 0u64;
        let samples_done = loop {
            iterations += 1;
            let restart = self.dispatch(KernelStage::RestartSample, &waits)?;

            let done = self.read_samples_done(restart)?;
            log::debug!(
                "tile ({}, {}) iteration {}: {}/{} samples",
                region.x,
                region.y,
                iterations,
                done,
                target
            );
            if done >= target {
                if done > target {
                    log::warn!("samples_done overshot: {} > {}", done, target);
                }
                break done;
            }
            if iterations >= max_iterations {
                return Err(RenderError::Stalled { iterations, samples_done: done, target });
            }

            let intersect = self.dispatch(KernelStage::Intersect, &[restart])?;
            let shade = self.dispatch(KernelStage::SampleBrdf, &[intersect])?;
            let update = self.dispatch(KernelStage::UpdateRadiance, &[shade])?;
            let deposit = self.dispatch(KernelStage::DepositSamples, &[update])?;
            waits = vec![deposit];
        };

        let dispatches = self
            .queue
            .dependency_log()
            .iter()
            .filter(|r| matches!(r.command, super::queue::Command::Dispatch(_)))
            .count() as u64;

        Ok(TileStats { iterations, samples_done, dispatches })
    }

    /// Zero-fills the pixel accumulators and weights.
    pub fn zero_pixels(&mut self) -> Result<Event> {
        let channels = self.buffers.pixels.channels().map(DeviceArray::buffer);
        let event = self.queue.fill_zero(&channels, &[])?;
        self.last = Some(event);
        Ok(event)
    }

    /// Writes the region uniform, clears accumulators and counters, and
    /// resets every lane. Returns the events the first restart waits on.
    fn prepare(&mut self, region: TileRegion) -> Result<Vec<Event>> {
        let (image_width, image_height) = self.scene.image_size();
        let params = TileParams {
            origin_x: region.x,
            origin_y: region.y,
            width: region.width,
            height: region.height,
            image_width,
            image_height,
            pixel_samples: self.tile.pixel_samples,
            total_pixels: region.pixel_count() as u32,
            total_samples: self.region_samples(&region)?,
            lane_count: self.buffers.num_lanes() as u32,
            _pad: [0; 2],
        };
        // Everything recorded earlier must reach the device before the
        // uniform changes.
        self.queue.flush();
        self.kernels.set_tile(self.ctx.queue(), &params);

        let pixels = self.zero_pixels()?;
        let counters = self.queue.fill_zero(&[self.buffers.samples.counters.buffer()], &[])?;
        let initialised = self.dispatch(KernelStage::Initialise, &[])?;
        Ok(vec![pixels, counters, initialised])
    }

    fn dispatch(&mut self, stage: KernelStage, waits: &[Event]) -> Result<Event> {
        let event = self.queue.enqueue(self.kernels.kernel(stage), waits)?;
        self.last = Some(event);
        Ok(event)
    }

    fn region_samples(&self, region: &TileRegion) -> Result<u32> {
        let (image_width, image_height) = self.scene.image_size();
        let fits_tile = region.width <= self.tile.width && region.height <= self.tile.height;
        let fits_image = u64::from(region.x) + u64::from(region.width) <= u64::from(image_width)
            && u64::from(region.y) + u64::from(region.height) <= u64::from(image_height);
        if region.pixel_count() == 0 || !fits_tile || !fits_image {
            return Err(RenderError::Settings(format!(
                "region {:?} does not fit the {}x{} tile inside the {}x{} image",
                region, self.tile.width, self.tile.height, image_width, image_height
            )));
        }
        // Bounded by the lane count, which was checked against u32 at construction.
        Ok((region.pixel_count() * u64::from(self.tile.pixel_samples)) as u32)
    }

    // ── Read-back ─────────────────────────────────────────────────────────

    /// Blocks until `after` has executed and returns the device counter.
    fn read_samples_done(&mut self, after: Event) -> Result<u32> {
        Ok(self.read_counters(after)?.samples_done)
    }

    fn read_counters(&mut self, after: Event) -> Result<Counters> {
        let size = size_of::<Counters>() as u64;
        self.queue.copy(
            self.buffers.samples.counters.buffer(),
            self.counter_staging.buffer(),
            size,
            &[after],
        )?;
        self.queue.flush();
        let counters = self.counter_staging.read(self.ctx, size, to_vec::<Counters>)?;
        Ok(counters.first().copied().unwrap_or_default())
    }

    /// Reads the accumulators of `region` (the region last rendered).
    pub fn read_pixels(&mut self, region: TileRegion) -> Result<TilePixels> {
        self.region_samples(&region)?;
        let n = region.pixel_count();
        let waits: Vec<Event> = self.last.into_iter().collect();

        let mut channels = Vec::with_capacity(4);
        for channel in self.buffers.pixels.channels() {
            channels.push(read_array(self.ctx, &mut self.queue, &waits, channel, &self.pixel_staging, n)?);
        }
        let [r, g, b, weight]: [Vec<f32>; 4] = channels
            .try_into()
            .map_err(|_| RenderError::Settings("pixel read-back lost a channel".into()))?;

        Ok(TilePixels { region, r, g, b, weight })
    }

    /// Reads back every lane's state and the counters, for diagnostics.
    pub fn snapshot(&mut self) -> Result<PipelineSnapshot> {
        let n = self.buffers.num_lanes();
        let staging = StagingBuffer::new(self.ctx, "readback.snapshot", n * 4)?;
        let waits: Vec<Event> = self.last.into_iter().collect();

        let (ctx, q, b) = (self.ctx, &mut self.queue, &self.buffers);
        let depth: Vec<u32> = read_array(ctx, q, &waits, &b.rays.depth, &staging, n)?;
        let extent: Vec<f32> = read_array(ctx, q, &waits, &b.rays.extent, &staging, n)?;
        let rng: Vec<u32> = read_array(ctx, q, &waits, &b.rng, &staging, n)?;
        let prim: Vec<u32> = read_array(ctx, q, &waits, &b.intersections.prim, &staging, n)?;
        let px: Vec<u32> = read_array(ctx, q, &waits, &b.samples.pixel_x, &staging, n)?;
        let py: Vec<u32> = read_array(ctx, q, &waits, &b.samples.pixel_y, &staging, n)?;
        let ox: Vec<f32> = read_array(ctx, q, &waits, &b.samples.offset_x, &staging, n)?;
        let oy: Vec<f32> = read_array(ctx, q, &waits, &b.samples.offset_y, &staging, n)?;

        let lanes = (0..n as usize)
            .map(|i| LaneState {
                depth: RayDepth::from_raw(depth[i]),
                rng: rng[i],
                primitive: primitive_from_raw(prim[i]),
                pixel: pixel_from_raw(px[i], py[i]),
                offset: (ox[i], oy[i]),
                extent: extent[i],
            })
            .collect();

        let counters = match self.last {
            Some(after) => self.read_counters(after)?,
            None => Counters::default(),
        };
        Ok(PipelineSnapshot { lanes, counters })
    }
}

/// Loop iterations after which a region counts as stalled.
///
/// A path lives at most `max_depth + 1` iterations (its last one deposits),
/// and lanes work through the target in `ceil(target / lanes)` waves. One
/// extra wave covers lanes that pick up a slot late.
pub fn iteration_limit(max_depth: u32, target: u32, lanes: u64) -> u64 {
    let waves = u64::from(target).div_ceil(lanes.max(1)).max(1);
    (u64::from(max_depth) + 1) * (waves + 1) + 1
}

/// Copies the first `len` elements of `array` through `staging` to the host.
fn read_array<T: Pod>(
    ctx: &ComputeContext,
    queue: &mut KernelQueue<'_>,
    waits: &[Event],
    array: &DeviceArray<T>,
    staging: &StagingBuffer,
    len: u64,
) -> Result<Vec<T>> {
    let bytes = len * size_of::<T>() as u64;
    if bytes > array.byte_len() {
        return Err(RenderError::device(DeviceStatus::BufferTooLarge {
            label: array.label().to_string(),
            size: bytes,
            max: array.byte_len(),
        }));
    }
    queue.copy(array.buffer(), staging.buffer(), bytes, waits)?;
    queue.flush();
    staging.read(ctx, bytes, to_vec::<T>)
}

impl std::fmt::Debug for TilePipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilePipeline")
            .field("tile", &self.tile)
            .field("lanes", &self.buffers.num_lanes())
            .field("queue", &self.queue)
            .finish()
    }
}
