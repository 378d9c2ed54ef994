//! Compiled pipeline stages with their long-lived arguments bound.

use wgpu::util::DeviceExt;

use crate::device::ComputeContext;
use crate::error::{DeviceStatus, RenderError, Result};

use super::buffers::TracingBuffers;
use super::gpu_types::{RenderParams, TileParams};
use super::launch::LaunchConfig;
use super::program::{self, ArgKind, KernelStage};
use super::scene_buffers::SceneBuffers;
use super::settings::RenderSettings;

/// One compiled stage: pipeline, bound arguments and launch geometry.
#[derive(Debug)]
pub struct Kernel {
    pub stage: KernelStage,
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group: wgpu::BindGroup,
    pub launch: LaunchConfig,
}

/// Every stage of the wavefront pipeline, built for one buffer set.
///
/// Scene data, render parameters and all working arrays are bound once here.
/// The tile rectangle is the only per-call argument: it lives in a uniform
/// written by [`KernelSet::set_tile`] right before a tile's dispatches.
#[derive(Debug)]
pub struct KernelSet {
    kernels: Vec<Kernel>,
    /// Bound by every stage; only tests read it back.
    #[cfg_attr(not(test), allow(dead_code))]
    params: wgpu::Buffer,
    tile: wgpu::Buffer,
}

impl KernelSet {
    pub fn new(
        ctx: &ComputeContext,
        scene: &SceneBuffers,
        buffers: &TracingBuffers,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let caps = ctx.caps();

        let widest = KernelStage::ALL
            .iter()
            .map(|s| s.storage_binding_count())
            .max()
            .unwrap_or(0);
        if widest > caps.max_storage_buffers_per_stage {
            return Err(RenderError::device(DeviceStatus::LimitUnsupported {
                limit: "max_storage_buffers_per_shader_stage",
                required: u64::from(widest),
                available: u64::from(caps.max_storage_buffers_per_stage),
            }));
        }

        let render_params = RenderParams {
            seed: settings.seed,
            max_depth: settings.max_depth,
            rr_depth: settings.rr_depth,
            num_spheres: scene.num_spheres(),
            background_r: settings.background[0],
            background_g: settings.background[1],
            background_b: settings.background[2],
            ray_epsilon: settings.ray_epsilon,
            filter_kind: settings.filter.code(),
            num_materials: scene.num_materials(),
            _pad: [0; 2],
        };

        let (params, tile) = ctx.scoped(|device| {
            let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kernel.params"),
                contents: bytemuck::bytes_of(&render_params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let tile = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("kernel.tile"),
                size: size_of::<TileParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            (params, tile)
        })?;

        let mut kernels = Vec::with_capacity(KernelStage::ALL.len());
        for stage in KernelStage::ALL {
            let args = Arguments { scene, buffers, params: &params, tile: &tile };
            kernels.push(build_kernel(ctx, stage, &args, buffers.num_lanes())?);
        }

        Ok(Self { kernels, params, tile })
    }

    pub fn kernel(&self, stage: KernelStage) -> &Kernel {
        &self.kernels[stage.index()]
    }

    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    /// Writes the per-call tile argument.
    ///
    /// Takes effect at the next submission, ahead of the commands it carries.
    pub fn set_tile(&self, queue: &wgpu::Queue, tile: &TileParams) {
        queue.write_buffer(&self.tile, 0, bytemuck::bytes_of(tile));
    }

    /// Render-wide constants shared by every stage.
    #[cfg(test)]
    pub(crate) fn params_buffer(&self) -> &wgpu::Buffer {
        &self.params
    }
}

/// Name lookup over everything a kernel may bind.
struct Arguments<'b> {
    scene: &'b SceneBuffers,
    buffers: &'b TracingBuffers,
    params: &'b wgpu::Buffer,
    tile: &'b wgpu::Buffer,
}

impl<'b> Arguments<'b> {
    fn resolve(&self, name: &str) -> Option<&'b wgpu::Buffer> {
        match name {
            "params" => Some(self.params),
            "tile" => Some(self.tile),
            _ => self.scene.by_name(name).or_else(|| self.buffers.by_name(name)),
        }
    }
}

fn build_kernel(
    ctx: &ComputeContext,
    stage: KernelStage,
    args: &Arguments<'_>,
    lanes: u64,
) -> Result<Kernel> {
    let caps = ctx.caps();
    let program = program::build(stage)?;
    let signature = stage.signature();

    let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = signature
        .iter()
        .enumerate()
        .map(|(slot, arg_spec)| wgpu::BindGroupLayoutEntry {
            binding: slot as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: match arg_spec.kind {
                    ArgKind::Uniform => wgpu::BufferBindingType::Uniform,
                    ArgKind::ReadOnly => wgpu::BufferBindingType::Storage { read_only: true },
                    ArgKind::ReadWrite => wgpu::BufferBindingType::Storage { read_only: false },
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();

    let mut bind_entries = Vec::with_capacity(signature.len());
    for (slot, arg_spec) in signature.iter().enumerate() {
        let buffer = args.resolve(arg_spec.name).ok_or_else(|| RenderError::Compile {
            kernel: stage.entry_point().to_string(),
            log: format!("no host buffer provides argument '{}'", arg_spec.name),
        })?;
        bind_entries.push(wgpu::BindGroupEntry {
            binding: slot as u32,
            resource: buffer.as_entire_binding(),
        });
    }

    let kernel_max = stage.max_work_group_size().min(caps.max_work_group_size);
    let launch = LaunchConfig::new(
        lanes,
        kernel_max,
        caps.preferred_work_group_multiple,
        caps.max_work_groups_per_dimension,
    )?;

    let constants = [("WORKGROUP_SIZE", f64::from(launch.local_size))];
    let (pipeline, bind_group) = ctx.scoped(|device| {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(stage.entry_point()),
            entries: &layout_entries,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(stage.entry_point()),
            layout: &bind_group_layout,
            entries: &bind_entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(stage.entry_point()),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.entry_point()),
            source: wgpu::ShaderSource::Wgsl(program.source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(stage.entry_point()),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(stage.entry_point()),
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &constants,
                zero_initialize_workgroup_memory: false,
            },
            cache: None,
        });
        (pipeline, bind_group)
    })?;

    log::debug!(
        "kernel {}: local {}, global {}, groups {:?}",
        stage,
        launch.local_size,
        launch.global_size,
        launch.work_groups
    );

    Ok(Kernel { stage, pipeline, bind_group, launch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;
    use crate::render::camera::Camera;

    #[test]
    fn builds_every_stage_with_valid_launch_sizes() {
        let Some(ctx) = test_context() else { return };
        let scene = wavetrace_scene::parse_str("4 4 4 4 2  1  1 1 1 0 0 0  1  0 0 0 1 0").unwrap();
        let scene_buffers = SceneBuffers::new(&ctx, &scene, &Camera::default()).unwrap();
        let buffers = TracingBuffers::new(&ctx, 16, 32).unwrap();
        let set = KernelSet::new(&ctx, &scene_buffers, &buffers, &RenderSettings::default()).unwrap();

        assert_eq!(set.kernels().len(), KernelStage::ALL.len());
        assert_eq!(set.params_buffer().size(), size_of::<RenderParams>() as u64);
        for stage in KernelStage::ALL {
            let kernel = set.kernel(stage);
            assert_eq!(kernel.stage, stage);
            assert!(kernel.launch.local_size <= stage.max_work_group_size());
            assert!(kernel.launch.global_size >= 32);
            assert_eq!(kernel.launch.global_size % u64::from(kernel.launch.local_size), 0);
        }
    }
}
