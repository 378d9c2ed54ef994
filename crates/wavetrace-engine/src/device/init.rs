/// Which adapter to ask wgpu for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum AdapterPreference {
    /// Discrete GPU when available.
    #[default]
    HighPerformance,
    /// Integrated GPU when available.
    LowPower,
    /// Software adapter (e.g. lavapipe/WARP). Slow, but always deterministic.
    Fallback,
}

impl AdapterPreference {
    /// Parses the names accepted on the command line / environment.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "high-performance" | "high" | "discrete" => Some(Self::HighPerformance),
            "low-power" | "low" | "integrated" => Some(Self::LowPower),
            "fallback" | "software" | "cpu" => Some(Self::Fallback),
            _ => None,
        }
    }

    pub(crate) fn power_preference(self) -> wgpu::PowerPreference {
        match self {
            Self::HighPerformance => wgpu::PowerPreference::HighPerformance,
            Self::LowPower | Self::Fallback => wgpu::PowerPreference::LowPower,
        }
    }
}

/// Initialization parameters for the compute device.
///
/// Keep this structure small. Add flags only when a concrete backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct ComputeInit {
    /// Adapter selection.
    pub adapter: AdapterPreference,

    /// Backends wgpu may pick from.
    pub backends: wgpu::Backends,

    /// Overrides the vendor-derived preferred work-group multiple.
    ///
    /// Useful on drivers whose SIMD width differs from the vendor default.
    pub preferred_work_group_multiple: Option<u32>,

    /// Minimum number of storage buffers a kernel stage must be able to bind.
    ///
    /// The kernel set checks its own requirement again at construction; this
    /// only decides what is requested from the adapter.
    pub min_storage_buffers_per_stage: u32,
}

impl Default for ComputeInit {
    fn default() -> Self {
        Self {
            adapter: AdapterPreference::HighPerformance,
            backends: wgpu::Backends::PRIMARY,
            preferred_work_group_multiple: None,
            min_storage_buffers_per_stage: crate::render::MAX_STORAGE_BINDINGS_PER_KERNEL,
        }
    }
}
