use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{DeviceStatus, RenderError, Result};

use super::{AdapterPreference, ComputeInit, DeviceCaps};

/// Owns the wgpu objects every render needs.
///
/// This is the headless compute context:
/// - creates and stores Instance/Adapter/Device/Queue
/// - derives [`DeviceCaps`] from the granted limits
/// - waits on the queue for blocking read-backs
/// - turns wgpu error reports into [`RenderError::Device`]
pub struct ComputeContext {
    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Capabilities used for launch sizing and allocation checks.
    caps: DeviceCaps,

    /// First error wgpu reported outside any error scope.
    uncaptured: Arc<Mutex<Option<DeviceStatus>>>,
}

impl ComputeContext {
    /// Creates a compute context.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: ComputeInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.adapter.power_preference(),
                compatible_surface: None,
                force_fallback_adapter: init.adapter == AdapterPreference::Fallback,
            })
            .await
            .map_err(|e| RenderError::device(DeviceStatus::AdapterUnavailable(e.to_string())))?;

        let info = adapter.get_info();
        log::info!(
            "compute adapter: {} ({:?}, {:?}, vendor 0x{:04x})",
            info.name,
            info.device_type,
            info.backend,
            info.vendor
        );

        // Ask for everything the adapter offers; the kernel set checks the
        // limits it actually depends on.
        let available = adapter.limits();
        let required = u64::from(init.min_storage_buffers_per_stage);
        let granted = u64::from(available.max_storage_buffers_per_shader_stage);
        if granted < required {
            return Err(RenderError::device(DeviceStatus::LimitUnsupported {
                limit: "max_storage_buffers_per_shader_stage",
                required,
                available: granted,
            }));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("wavetrace device"),
                required_features: wgpu::Features::empty(),
                required_limits: available.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RenderError::device(DeviceStatus::DeviceRequestFailed(e.to_string())))?;

        // Without a handler wgpu panics on errors nobody scoped.
        let uncaptured = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&uncaptured);
        device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
            log::error!("device error: {}", err);
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert(DeviceStatus::from(err));
        }));

        let caps = DeviceCaps::new(&device.limits(), &info, init.preferred_work_group_multiple);
        log::debug!("device caps: {:?}", caps);

        Ok(Self { adapter, device, queue, caps, uncaptured })
    }

    /// Blocking variant of [`ComputeContext::new`].
    pub fn new_blocking(init: ComputeInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Blocks until all submitted work has completed.
    ///
    /// Also reports any error the device raised outside an error scope since
    /// the last call.
    #[track_caller]
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::device(DeviceStatus::PollFailed(e.to_string())))?;
        match self.take_device_error() {
            Some(status) => Err(RenderError::device(status)),
            None => Ok(()),
        }
    }

    /// Takes the pending uncaptured device error, if any.
    pub fn take_device_error(&self) -> Option<DeviceStatus> {
        self.uncaptured.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Runs `f` inside out-of-memory and validation error scopes.
    ///
    /// Resource creation goes through here so a failed allocation or a
    /// rejected descriptor comes back as a status instead of a panic.
    #[track_caller]
    pub fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        let oom = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(validation.pop());
        let oom = pollster::block_on(oom.pop());
        match oom.or(validation) {
            Some(err) => Err(RenderError::device(DeviceStatus::from(err))),
            None => Ok(value),
        }
    }

    /// Rejects allocations the device cannot create or bind in one piece.
    #[track_caller]
    pub fn check_buffer_size(&self, label: &str, size: u64) -> Result<()> {
        let max = self.caps.max_array_bytes();
        if size > max {
            return Err(RenderError::device(DeviceStatus::BufferTooLarge {
                label: label.to_string(),
                size,
                max,
            }));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeContext")
            .field("adapter", &self.adapter.get_info().name)
            .field("caps", &self.caps)
            .finish()
    }
}

/// Shared helper for tests that need a real device.
///
/// Returns `None` (and logs why) when the machine has no usable adapter, so
/// GPU tests skip instead of failing on headless CI.
#[cfg(test)]
pub(crate) fn test_context() -> Option<ComputeContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    for adapter in [AdapterPreference::HighPerformance, AdapterPreference::Fallback] {
        let init = ComputeInit { adapter, ..ComputeInit::default() };
        match ComputeContext::new_blocking(init) {
            Ok(ctx) => return Some(ctx),
            Err(e) => log::warn!("no {:?} compute device: {}", adapter, e),
        }
    }
    eprintln!("skipping GPU test: no compute adapter available");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_reports_invalid_descriptors() {
        let Some(ctx) = test_context() else { return };
        // MAP_READ may only be combined with COPY_DST.
        let err = ctx
            .scoped(|device| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("bad usage"),
                    size: 16,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
                    mapped_at_creation: false,
                })
            })
            .unwrap_err();
        assert!(matches!(err.device_status(), Some(DeviceStatus::Validation(_))), "{err}");
        assert!(err.to_string().contains("context.rs"), "{err}");

        // Scopes are balanced: later work is unaffected.
        let ok = ctx.scoped(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("fine"),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(ok.is_ok());
        ctx.wait_idle().unwrap();
    }

    #[test]
    fn uncaptured_errors_surface_on_wait() {
        let Some(ctx) = test_context() else { return };
        let _bad = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("unscoped bad usage"),
            size: 16,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let err = ctx.wait_idle().unwrap_err();
        assert!(matches!(err.device_status(), Some(DeviceStatus::Validation(_))), "{err}");
        // Reported once.
        assert!(ctx.take_device_error().is_none());
        ctx.wait_idle().unwrap();
    }
}
