//! Work-group sizing for kernel dispatches.

use crate::error::{DeviceStatus, RenderError, Result};

/// Rounds `value` up to the next multiple of `multiple`.
pub const fn round_up(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

/// Rounds `value` down to a multiple of `multiple`.
pub const fn round_down(value: u32, multiple: u32) -> u32 {
    if multiple == 0 {
        return value;
    }
    value / multiple * multiple
}

/// Launch geometry of one kernel stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LaunchConfig {
    /// Elements the kernel must cover.
    pub elements: u64,
    /// Work-group size (`@workgroup_size`).
    pub local_size: u32,
    /// `elements` rounded up to a multiple of `local_size`.
    pub global_size: u64,
    /// Work-group counts passed to `dispatch_workgroups`.
    ///
    /// Folded into two dimensions when one dimension would exceed the device
    /// limit; kernels recover the linear index from `num_workgroups`.
    pub work_groups: [u32; 2],
}

impl LaunchConfig {
    /// Sizes a dispatch over `elements` items.
    ///
    /// The local size is `kernel_max` rounded down to a multiple of
    /// `preferred_multiple`. If the preferred multiple is larger than the
    /// kernel maximum, the maximum itself is used.
    #[track_caller]
    pub fn new(
        elements: u64,
        kernel_max: u32,
        preferred_multiple: u32,
        max_groups_per_dimension: u32,
    ) -> Result<Self> {
        let kernel_max = kernel_max.max(1);
        let local_size = match round_down(kernel_max, preferred_multiple) {
            0 => kernel_max,
            n => n,
        };

        let global_size = round_up(elements, u64::from(local_size));
        let groups = global_size / u64::from(local_size);
        let max_dim = u64::from(max_groups_per_dimension.max(1));

        let (x, y) = if groups <= max_dim {
            (groups, 1)
        } else {
            let y = groups.div_ceil(max_dim);
            (groups.div_ceil(y), y)
        };

        if y > max_dim {
            return Err(RenderError::device(DeviceStatus::DispatchTooLarge {
                elements,
                max_groups: max_dim * max_dim,
            }));
        }

        Ok(Self {
            elements,
            local_size,
            global_size,
            // Both fit: x <= max_dim and y <= max_dim, max_dim comes from a u32.
            work_groups: [x as u32, y as u32],
        })
    }

    /// Number of invocations actually launched (may exceed `global_size`
    /// after 2-D folding).
    pub fn launched_invocations(&self) -> u64 {
        u64::from(self.work_groups[0]) * u64::from(self.work_groups[1]) * u64::from(self.local_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_helpers() {
        assert_eq!(round_up(0, 64), 0);
        assert_eq!(round_up(1, 64), 64);
        assert_eq!(round_up(64, 64), 64);
        assert_eq!(round_up(65, 64), 128);
        assert_eq!(round_down(256, 64), 256);
        assert_eq!(round_down(100, 32), 96);
        assert_eq!(round_down(31, 32), 0);
    }

    #[test]
    fn local_is_multiple_and_global_covers() {
        for preferred in [1u32, 8, 16, 32, 64] {
            for kernel_max in [64u32, 100, 256, 1000, 1024] {
                for elements in [1u64, 7, 64, 65, 1000, 307_200, 1 << 22] {
                    let cfg = LaunchConfig::new(elements, kernel_max, preferred, 65_535).unwrap();
                    assert!(cfg.local_size <= kernel_max);
                    assert_eq!(cfg.local_size % preferred, 0);
                    assert!(cfg.global_size >= elements);
                    assert_eq!(cfg.global_size % u64::from(cfg.local_size), 0);
                    assert!(cfg.global_size - elements < u64::from(cfg.local_size));
                    assert!(cfg.launched_invocations() >= cfg.global_size);
                }
            }
        }
    }

    #[test]
    fn preferred_larger_than_max_uses_max() {
        let cfg = LaunchConfig::new(100, 48, 64, 65_535).unwrap();
        assert_eq!(cfg.local_size, 48);
        assert_eq!(cfg.global_size, 144);
    }

    #[test]
    fn folds_into_two_dimensions() {
        let cfg = LaunchConfig::new(1000 * 64, 64, 64, 100).unwrap();
        assert_eq!(cfg.work_groups, [100, 10]);

        let cfg = LaunchConfig::new(1001 * 64, 64, 64, 100).unwrap();
        assert_eq!(cfg.work_groups[1], 11);
        assert!(cfg.launched_invocations() >= 1001 * 64);
    }

    #[test]
    fn too_many_groups_is_a_device_error() {
        let err = LaunchConfig::new(10_001, 1, 1, 100).unwrap_err();
        assert!(matches!(
            err.device_status(),
            Some(DeviceStatus::DispatchTooLarge { elements: 10_001, max_groups: 10_000 })
        ));
    }
}
