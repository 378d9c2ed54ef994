/// PCI vendor ids with a well-known SIMD width.
const VENDOR_NVIDIA: u32 = 0x10de;
const VENDOR_AMD: u32 = 0x1002;
const VENDOR_INTEL: u32 = 0x8086;
const VENDOR_APPLE: u32 = 0x106b;

/// Device capabilities consumed by launch sizing and buffer allocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceCaps {
    /// Work-group sizes should be a multiple of this (warp / wavefront width).
    pub preferred_work_group_multiple: u32,
    /// Largest number of invocations in one 1-D work-group.
    pub max_work_group_size: u32,
    /// Largest work-group count along one dispatch dimension.
    pub max_work_groups_per_dimension: u32,
    /// Storage buffers one kernel may bind.
    pub max_storage_buffers_per_stage: u32,
    /// Largest storage binding, in bytes.
    pub max_storage_binding_size: u64,
    /// Largest buffer allocation, in bytes.
    pub max_buffer_size: u64,
}

impl DeviceCaps {
    /// Derives capabilities from the device limits and adapter info.
    pub fn new(
        limits: &wgpu::Limits,
        info: &wgpu::AdapterInfo,
        preferred_override: Option<u32>,
    ) -> Self {
        Self::for_vendor(limits, info.vendor, info.device_type, preferred_override)
    }

    /// [`DeviceCaps::new`] from the raw PCI vendor id and device type.
    pub fn for_vendor(
        limits: &wgpu::Limits,
        vendor: u32,
        device_type: wgpu::DeviceType,
        preferred_override: Option<u32>,
    ) -> Self {
        let max_work_group_size = limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x)
            .max(1);

        let preferred = preferred_override
            .filter(|&m| m > 0)
            .unwrap_or_else(|| vendor_simd_width(vendor, device_type));

        Self {
            preferred_work_group_multiple: preferred,
            max_work_group_size,
            max_work_groups_per_dimension: limits.max_compute_workgroups_per_dimension.max(1),
            max_storage_buffers_per_stage: limits.max_storage_buffers_per_shader_stage,
            max_storage_binding_size: u64::from(limits.max_storage_buffer_binding_size),
            max_buffer_size: limits.max_buffer_size,
        }
    }

    /// Largest storage array that can be allocated and bound in one piece.
    pub fn max_array_bytes(&self) -> u64 {
        self.max_storage_binding_size.min(self.max_buffer_size)
    }
}

fn vendor_simd_width(vendor: u32, device_type: wgpu::DeviceType) -> u32 {
    if device_type == wgpu::DeviceType::Cpu {
        return 1;
    }
    match vendor {
        VENDOR_NVIDIA => 32,
        VENDOR_AMD => 64,
        VENDOR_INTEL => 16,
        VENDOR_APPLE => 32,
        _ => 32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPU: wgpu::DeviceType = wgpu::DeviceType::DiscreteGpu;

    #[test]
    fn vendor_widths() {
        let limits = wgpu::Limits::default();
        let caps = |v| DeviceCaps::for_vendor(&limits, v, GPU, None);
        assert_eq!(caps(VENDOR_NVIDIA).preferred_work_group_multiple, 32);
        assert_eq!(caps(VENDOR_AMD).preferred_work_group_multiple, 64);
        assert_eq!(caps(VENDOR_INTEL).preferred_work_group_multiple, 16);
        assert_eq!(caps(VENDOR_APPLE).preferred_work_group_multiple, 32);
        assert_eq!(caps(0x1234).preferred_work_group_multiple, 32);
    }

    #[test]
    fn cpu_adapters_prefer_scalar_groups() {
        let caps =
            DeviceCaps::for_vendor(&wgpu::Limits::default(), VENDOR_INTEL, wgpu::DeviceType::Cpu, None);
        assert_eq!(caps.preferred_work_group_multiple, 1);
    }

    #[test]
    fn override_wins_unless_zero() {
        let limits = wgpu::Limits::default();
        assert_eq!(DeviceCaps::for_vendor(&limits, VENDOR_AMD, GPU, Some(8)).preferred_work_group_multiple, 8);
        assert_eq!(DeviceCaps::for_vendor(&limits, VENDOR_AMD, GPU, Some(0)).preferred_work_group_multiple, 64);
    }

    #[test]
    fn max_group_is_min_of_invocations_and_x() {
        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: 1024,
            max_compute_workgroup_size_x: 512,
            ..wgpu::Limits::default()
        };
        let caps = DeviceCaps::for_vendor(&limits, 0, GPU, None);
        assert_eq!(caps.max_work_group_size, 512);
    }

    #[test]
    fn array_bytes_respect_both_limits() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 1 << 20,
            max_buffer_size: 1 << 30,
            ..wgpu::Limits::default()
        };
        assert_eq!(DeviceCaps::for_vendor(&limits, 0, GPU, None).max_array_bytes(), 1 << 20);
    }
}
