//! Error types for the rendering engine.

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error;

/// Status reported by a failing device-API call.
///
/// Codes are stable so logs can be grepped and compared across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    /// No adapter matched the requested preference.
    AdapterUnavailable(String),
    /// The adapter refused to create a logical device.
    DeviceRequestFailed(String),
    /// The adapter cannot provide a limit the renderer requires.
    LimitUnsupported { limit: &'static str, required: u64, available: u64 },
    /// A single allocation would exceed the device's buffer or binding size.
    BufferTooLarge { label: String, size: u64, max: u64 },
    /// A dispatch needs more work-groups than the device can launch.
    DispatchTooLarge { elements: u64, max_groups: u64 },
    /// A wait list referenced an event issued by a different queue.
    ForeignEvent { event: u64 },
    /// Mapping a staging buffer for read-back failed.
    MapFailed(String),
    /// Waiting for the queue failed.
    PollFailed(String),
    /// The device ran out of memory creating a resource.
    OutOfMemory(String),
    /// The device rejected a call as invalid.
    Validation(String),
    /// The driver failed for a reason outside the API's error model.
    Internal(String),
    /// A dispatch did not wait on any stage that produces its inputs.
    MissingDependency { kernel: &'static str },
}

impl DeviceStatus {
    /// Numeric status code.
    pub fn code(&self) -> i32 {
        match self {
            Self::AdapterUnavailable(_) => -1,
            Self::DeviceRequestFailed(_) => -2,
            Self::LimitUnsupported { .. } => -3,
            Self::BufferTooLarge { .. } => -4,
            Self::DispatchTooLarge { .. } => -5,
            Self::ForeignEvent { .. } => -6,
            Self::MapFailed(_) => -7,
            Self::PollFailed(_) => -8,
            Self::OutOfMemory(_) => -9,
            Self::Validation(_) => -10,
            Self::Internal(_) => -11,
            Self::MissingDependency { .. } => -12,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterUnavailable(msg) => write!(f, "no suitable compute adapter: {}", msg),
            Self::DeviceRequestFailed(msg) => write!(f, "device request failed: {}", msg),
            Self::LimitUnsupported { limit, required, available } => write!(
                f,
                "device limit {} is {} but {} is required",
                limit, available, required
            ),
            Self::BufferTooLarge { label, size, max } => write!(
                f,
                "buffer '{}' needs {} bytes, device maximum is {}",
                label, size, max
            ),
            Self::DispatchTooLarge { elements, max_groups } => write!(
                f,
                "{} elements cannot be covered by at most {} work-groups",
                elements, max_groups
            ),
            Self::ForeignEvent { event } => {
                write!(f, "event #{} was issued by a different queue", event)
            }
            Self::MapFailed(msg) => write!(f, "buffer map failed: {}", msg),
            Self::PollFailed(msg) => write!(f, "queue wait failed: {}", msg),
            Self::OutOfMemory(msg) => write!(f, "out of device memory: {}", msg),
            Self::Validation(msg) => write!(f, "validation failed: {}", msg),
            Self::Internal(msg) => write!(f, "internal device error: {}", msg),
            Self::MissingDependency { kernel } => {
                write!(f, "{} does not wait on any kernel it reads from", kernel)
            }
        }
    }
}

impl From<wgpu::Error> for DeviceStatus {
    fn from(err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { source } => Self::OutOfMemory(source.to_string()),
            wgpu::Error::Validation { description, .. } => Self::Validation(description),
            wgpu::Error::Internal { description, .. } => Self::Internal(description),
        }
    }
}

/// Main error type for rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A device-API call failed.
    #[error("device error {} at {location}: {status}", .status.code())]
    Device {
        status: DeviceStatus,
        location: &'static Location<'static>,
    },

    /// A kernel failed to compile or does not match the host's argument layout.
    #[error("kernel '{kernel}' failed to build:\n{log}")]
    Compile { kernel: String, log: String },

    /// The scene cannot be rendered as described.
    #[error("invalid scene: {0}")]
    Scene(String),

    /// The render settings are inconsistent.
    #[error("invalid render settings: {0}")]
    Settings(String),

    /// A tile stopped making progress.
    #[error(
        "tile did not converge after {iterations} iterations ({samples_done}/{target} samples done)"
    )]
    Stalled { iterations: u64, samples_done: u32, target: u32 },

    /// Encoding or writing the output image failed.
    #[error("failed to write image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Builds a device error tagged with the caller's source location.
    #[track_caller]
    pub fn device(status: DeviceStatus) -> Self {
        Self::Device { status, location: Location::caller() }
    }

    /// Status code of a device error, if this is one.
    pub fn device_status(&self) -> Option<&DeviceStatus> {
        match self {
            Self::Device { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_records_call_site() {
        let err = RenderError::device(DeviceStatus::MapFailed("lost".into()));
        let text = err.to_string();
        assert!(text.contains("error.rs"), "{}", text);
        assert!(text.contains("-7"), "{}", text);
        assert!(text.contains("buffer map failed: lost"), "{}", text);
    }

    #[test]
    fn compile_error_keeps_full_log() {
        let log = "error: expected ';'\n  ┌─ restart_sample:12:5\n".to_string();
        let err = RenderError::Compile { kernel: "RestartSample".into(), log: log.clone() };
        assert!(err.to_string().ends_with(&log));
    }

    #[test]
    fn status_codes_are_distinct() {
        let codes = [
            DeviceStatus::AdapterUnavailable(String::new()).code(),
            DeviceStatus::DeviceRequestFailed(String::new()).code(),
            DeviceStatus::LimitUnsupported { limit: "x", required: 1, available: 0 }.code(),
            DeviceStatus::BufferTooLarge { label: String::new(), size: 1, max: 0 }.code(),
            DeviceStatus::DispatchTooLarge { elements: 1, max_groups: 0 }.code(),
            DeviceStatus::ForeignEvent { event: 0 }.code(),
            DeviceStatus::MapFailed(String::new()).code(),
            DeviceStatus::PollFailed(String::new()).code(),
            DeviceStatus::OutOfMemory(String::new()).code(),
            DeviceStatus::Validation(String::new()).code(),
            DeviceStatus::Internal(String::new()).code(),
            DeviceStatus::MissingDependency { kernel: "x" }.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn wgpu_errors_map_to_statuses() {
        let validation = wgpu::Error::Validation {
            source: "bad usage".into(),
            description: "buffer usages conflict".into(),
        };
        assert_eq!(
            DeviceStatus::from(validation),
            DeviceStatus::Validation("buffer usages conflict".into())
        );

        let oom = wgpu::Error::OutOfMemory { source: "heap exhausted".into() };
        let status = DeviceStatus::from(oom);
        assert_eq!(status.code(), -9);
        assert!(status.to_string().contains("heap exhausted"), "{status}");
    }
}
