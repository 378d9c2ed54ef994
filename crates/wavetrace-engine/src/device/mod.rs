//! Compute device acquisition.
//!
//! Owns adapter selection and the wgpu device/queue pair. Everything above
//! this module talks to the device through [`ComputeContext`].

mod caps;
mod context;
mod init;

pub use caps::DeviceCaps;
pub use context::ComputeContext;
pub use init::{AdapterPreference, ComputeInit};

#[cfg(test)]
pub(crate) use context::test_context;
