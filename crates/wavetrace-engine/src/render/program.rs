//! Kernel sources, their argument signatures and the host-side build step.
//!
//! Each stage is compiled as its own WGSL module: the shared prelude plus the
//! helpers and entry point of that stage. Before a module reaches wgpu it is
//! parsed and validated by naga so a broken kernel produces a readable
//! diagnostic instead of a device-lost panic, and its resource bindings are
//! compared against [`KernelStage::signature`].

use crate::error::{RenderError, Result};

/// Version of the host/kernel argument layout.
///
/// Must match `KERNEL_ABI_VERSION` in `shaders/prelude.wgsl`.
pub const KERNEL_ABI_VERSION: u32 = 1;

const PRELUDE: &str = include_str!("shaders/prelude.wgsl");
const CAMERA: &str = include_str!("shaders/camera.wgsl");
const SPHERE: &str = include_str!("shaders/sphere.wgsl");
const INITIALISE: &str = include_str!("shaders/initialise.wgsl");
const RESTART_SAMPLE: &str = include_str!("shaders/restart_sample.wgsl");
const INTERSECT: &str = include_str!("shaders/intersect.wgsl");
const SAMPLE_BRDF: &str = include_str!("shaders/sample_brdf.wgsl");
const UPDATE_RADIANCE: &str = include_str!("shaders/update_radiance.wgsl");
const DEPOSIT_SAMPLES: &str = include_str!("shaders/deposit_samples.wgsl");

// ── Stages ────────────────────────────────────────────────────────────────

/// One stage of the wavefront pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KernelStage {
    Initialise,
    RestartSample,
    Intersect,
    SampleBrdf,
    UpdateRadiance,
    DepositSamples,
}

impl KernelStage {
    pub const ALL: [KernelStage; 6] = [
        Self::Initialise,
        Self::RestartSample,
        Self::Intersect,
        Self::SampleBrdf,
        Self::UpdateRadiance,
        Self::DepositSamples,
    ];

    /// Entry point name exported by the kernel module.
    pub const fn entry_point(self) -> &'static str {
        match self {
            Self::Initialise => "Initialise",
            Self::RestartSample => "RestartSample",
            Self::Intersect => "Intersect",
            Self::SampleBrdf => "SampleBRDF",
            Self::UpdateRadiance => "UpdateRadiance",
            Self::DepositSamples => "DepositSamples",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Upper bound on this stage's work-group size, before device limits.
    ///
    /// Intersection and shading keep many values live per lane.
    pub const fn max_work_group_size(self) -> u32 {
        match self {
            Self::Intersect | Self::SampleBrdf => 128,
            _ => 256,
        }
    }

    /// Stages that write what this stage reads. A dispatch must wait on at
    /// least one of them; the first stage reads nothing and waits on nothing.
    pub const fn inputs(self) -> &'static [KernelStage] {
        match self {
            Self::Initialise => &[],
            Self::RestartSample => &[Self::Initialise, Self::DepositSamples],
            Self::Intersect => &[Self::RestartSample],
            Self::SampleBrdf => &[Self::Intersect],
            Self::UpdateRadiance => &[Self::SampleBrdf],
            Self::DepositSamples => &[Self::UpdateRadiance],
        }
    }

    fn sources(self) -> &'static [&'static str] {
        match self {
            Self::Initialise => &[PRELUDE, INITIALISE],
            Self::RestartSample => &[PRELUDE, CAMERA, RESTART_SAMPLE],
            Self::Intersect => &[PRELUDE, SPHERE, INTERSECT],
            Self::SampleBrdf => &[PRELUDE, SAMPLE_BRDF],
            Self::UpdateRadiance => &[PRELUDE, UPDATE_RADIANCE],
            Self::DepositSamples => &[PRELUDE, DEPOSIT_SAMPLES],
        }
    }

    /// Complete WGSL source of this stage's module.
    pub fn source(self) -> String {
        self.sources().join("\n")
    }

    /// Argument list, in binding order (`@group(0) @binding(i)`).
    pub fn signature(self) -> &'static [ArgSpec] {
        use ArgKind::{ReadOnly as R, ReadWrite as W, Uniform as U};
        match self {
            Self::Initialise => const { &[
                arg("params", U),
                arg("tile", U),
                arg("rng", W),
                arg("depth", W),
                arg("pixel_x", W),
            ] },
            Self::RestartSample => const { &[
                arg("params", U),
                arg("tile", U),
                arg("camera", U),
                arg("counters", W),
                arg("depth", W),
                arg("rng", W),
                arg("pixel_x", W),
                arg("pixel_y", W),
                arg("offset_x", W),
                arg("offset_y", W),
                arg("origin_x", W),
                arg("origin_y", W),
                arg("origin_z", W),
                arg("direction_x", W),
                arg("direction_y", W),
                arg("direction_z", W),
                arg("extent", W),
                arg("li_r", W),
                arg("li_g", W),
                arg("li_b", W),
                arg("beta_r", W),
                arg("beta_g", W),
                arg("beta_b", W),
            ] },
            Self::Intersect => const { &[
                arg("params", U),
                arg("tile", U),
                arg("spheres", R),
                arg("depth", R),
                arg("origin_x", R),
                arg("origin_y", R),
                arg("origin_z", R),
                arg("direction_x", R),
                arg("direction_y", R),
                arg("direction_z", R),
                arg("extent", W),
                arg("hit_x", W),
                arg("hit_y", W),
                arg("hit_z", W),
                arg("normal_x", W),
                arg("normal_y", W),
                arg("normal_z", W),
                arg("uv_s", W),
                arg("uv_t", W),
                arg("wo_x", W),
                arg("wo_y", W),
                arg("wo_z", W),
                arg("prim", W),
            ] },
            Self::SampleBrdf => const { &[
                arg("params", U),
                arg("tile", U),
                arg("material_index", R),
                arg("materials", R),
                arg("depth", R),
                arg("prim", R),
                arg("hit_x", R),
                arg("hit_y", R),
                arg("hit_z", R),
                arg("normal_x", R),
                arg("normal_y", R),
                arg("normal_z", R),
                arg("li_r", W),
                arg("li_g", W),
                arg("li_b", W),
                arg("beta_r", W),
                arg("beta_g", W),
                arg("beta_b", W),
                arg("origin_x", W),
                arg("origin_y", W),
                arg("origin_z", W),
                arg("direction_x", W),
                arg("direction_y", W),
                arg("direction_z", W),
                arg("extent", W),
                arg("rng", W),
            ] },
            Self::UpdateRadiance => const { &[
                arg("params", U),
                arg("tile", U),
                arg("depth", W),
                arg("prim", R),
                arg("li_r", W),
                arg("li_g", W),
                arg("li_b", W),
                arg("beta_r", W),
                arg("beta_g", W),
                arg("beta_b", W),
                arg("rng", W),
            ] },
            Self::DepositSamples => const { &[
                arg("params", U),
                arg("tile", U),
                arg("depth", R),
                arg("pixel_x", R),
                arg("pixel_y", R),
                arg("offset_x", R),
                arg("offset_y", R),
                arg("li_r", R),
                arg("li_g", R),
                arg("li_b", R),
                arg("accum_r", W),
                arg("accum_g", W),
                arg("accum_b", W),
                arg("accum_weight", W),
            ] },
        }
    }

    /// Storage buffers (not uniforms) this stage binds.
    pub fn storage_binding_count(self) -> u32 {
        self.signature()
            .iter()
            .filter(|a| a.kind != ArgKind::Uniform)
            .count() as u32
    }
}

impl std::fmt::Display for KernelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entry_point())
    }
}

// ── Signatures ────────────────────────────────────────────────────────────

/// How a kernel argument is bound.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ArgKind {
    Uniform,
    ReadOnly,
    ReadWrite,
}

/// One kernel argument: the WGSL variable name and its binding type.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
}

const fn arg(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec { name, kind }
}

// ── Build ─────────────────────────────────────────────────────────────────

/// A validated kernel module, ready for `create_shader_module`.
#[derive(Debug)]
pub struct KernelProgram {
    pub stage: KernelStage,
    pub source: String,
}

/// Parses, validates and ABI-checks one stage.
///
/// Every failure is a [`RenderError::Compile`] carrying the complete
/// diagnostic text.
pub fn build(stage: KernelStage) -> Result<KernelProgram> {
    let source = stage.source();
    let file = format!("{}.wgsl", stage.entry_point());
    let fail = |log: String| RenderError::Compile { kernel: stage.entry_point().to_string(), log };

    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|e| fail(e.emit_to_string_with_path(&source, &file)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| fail(e.emit_to_string_with_path(&source, &file)))?;

    check_abi(stage, &source, &module).map_err(fail)?;

    log::debug!("kernel {} validated ({} bytes of WGSL)", stage, source.len());
    Ok(KernelProgram { stage, source })
}

fn declared_abi_version(source: &str) -> Option<u32> {
    source.lines().find_map(|line| {
        let value = line.trim().strip_prefix("const KERNEL_ABI_VERSION: u32 =")?;
        value.trim().trim_end_matches(';').trim_end_matches('u').parse().ok()
    })
}

fn check_abi(stage: KernelStage, source: &str, module: &naga::Module) -> std::result::Result<(), String> {
    match declared_abi_version(source) {
        Some(KERNEL_ABI_VERSION) => {}
        Some(v) => {
            return Err(format!(
                "kernel ABI version {} does not match host version {}",
                v, KERNEL_ABI_VERSION
            ))
        }
        None => return Err("kernel source does not declare KERNEL_ABI_VERSION".into()),
    }

    let entry = stage.entry_point();
    let ep = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry)
        .ok_or_else(|| format!("entry point '{}' not found", entry))?;
    if ep.stage != naga::ShaderStage::Compute {
        return Err(format!("entry point '{}' is not a compute shader", entry));
    }

    let signature = stage.signature();
    let mut seen = vec![false; signature.len()];
    let mut problems = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let slot = binding.binding as usize;

        let Some(expected) = signature.get(slot).filter(|_| binding.group == 0) else {
            problems.push(format!(
                "'{}' at @group({}) @binding({}) has no host argument",
                name, binding.group, binding.binding
            ));
            continue;
        };
        seen[slot] = true;

        if expected.name != name {
            problems.push(format!(
                "@binding({}) is '{}' in the kernel but '{}' on the host",
                slot, name, expected.name
            ));
        }

        let kind = match var.space {
            naga::AddressSpace::Uniform => Some(ArgKind::Uniform),
            naga::AddressSpace::Storage { access } if access.contains(naga::StorageAccess::STORE) => {
                Some(ArgKind::ReadWrite)
            }
            naga::AddressSpace::Storage { .. } => Some(ArgKind::ReadOnly),
            _ => None,
        };
        if kind != Some(expected.kind) {
            problems.push(format!(
                "'{}' is bound as {:?} on the host but declared as {:?}",
                name, expected.kind, var.space
            ));
        }
    }

    for (slot, arg_spec) in signature.iter().enumerate() {
        if !seen[slot] {
            problems.push(format!("host argument '{}' (@binding({})) is not declared", arg_spec.name, slot));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_builds() {
        for stage in KernelStage::ALL {
            if let Err(e) = build(stage) {
                panic!("{}", e);
            }
        }
    }

    #[test]
    fn prelude_declares_host_abi_version() {
        assert_eq!(declared_abi_version(PRELUDE), Some(KERNEL_ABI_VERSION));
    }

    #[test]
    fn every_stage_is_reachable_from_initialise() {
        for stage in KernelStage::ALL {
            let mut current = stage;
            let mut steps = 0;
            while let Some(&previous) = current.inputs().first() {
                assert!(previous.index() < current.index(), "{current} reads from {previous}");
                current = previous;
                steps += 1;
            }
            assert_eq!(current, KernelStage::Initialise);
            assert_eq!(steps, stage.index());
        }
        assert!(KernelStage::RestartSample.inputs().contains(&KernelStage::DepositSamples));
    }

    #[test]
    fn entry_points_are_distinct() {
        let mut names: Vec<_> = KernelStage::ALL.iter().map(|s| s.entry_point()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), KernelStage::ALL.len());
    }

    #[test]
    fn storage_budget_covers_every_stage() {
        let widest = KernelStage::ALL.iter().map(|s| s.storage_binding_count()).max();
        assert_eq!(widest, Some(crate::render::MAX_STORAGE_BINDINGS_PER_KERNEL));
    }

    #[test]
    fn signatures_are_static_and_unique() {
        for stage in KernelStage::ALL {
            let args: &'static [ArgSpec] = stage.signature();
            assert_eq!(args[0], ArgSpec { name: "params", kind: ArgKind::Uniform }, "{stage}");
            let mut names: Vec<_> = args.iter().map(|a| a.name).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), args.len(), "{stage} binds a name twice");
        }
        assert_eq!(KernelStage::Initialise.signature().len(), 5);
        assert_eq!(KernelStage::SampleBrdf.signature().len(), 26);
    }

    #[test]
    fn stage_indices_follow_declaration_order() {
        for (i, stage) in KernelStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn mismatched_binding_is_reported() {
        let source = KernelStage::Initialise.source().replace("pixel_x", "pixel_u");
        let module = naga::front::wgsl::parse_str(&source).unwrap();
        let log = check_abi(KernelStage::Initialise, &source, &module).unwrap_err();
        assert!(log.contains("'pixel_u'"), "{log}");
        assert!(log.contains("'pixel_x'"), "{log}");
    }

    #[test]
    fn stale_abi_version_is_reported() {
        let source = KernelStage::Initialise
            .source()
            .replace("const KERNEL_ABI_VERSION: u32 = 1u;", "const KERNEL_ABI_VERSION: u32 = 0u;");
        let module = naga::front::wgsl::parse_str(&source).unwrap();
        let log = check_abi(KernelStage::Initialise, &source, &module).unwrap_err();
        assert!(log.contains("does not match"), "{log}");
    }

    #[test]
    fn syntax_error_carries_diagnostic() {
        let source = "fn broken( {";
        let err = naga::front::wgsl::parse_str(source).unwrap_err();
        let text = err.emit_to_string_with_path(source, "broken.wgsl");
        assert!(text.contains("broken.wgsl"), "{text}");
    }
}
