//! Wavetrace engine crate.
//!
//! A tile-based wavefront path tracer for sphere scenes, running on wgpu
//! compute. This crate owns the device context, the structure-of-arrays
//! working buffers, the WGSL kernel set and the per-tile convergence loop.
//!
//! ```no_run
//! use wavetrace_engine::device::ComputeInit;
//! use wavetrace_engine::render::{RenderSettings, RenderingContext};
//!
//! let scene = wavetrace_scene::load("scene.txt")?;
//! let renderer = RenderingContext::new(ComputeInit::default(), RenderSettings::default())?;
//! renderer.render(&scene, "output.png".as_ref())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod error;
pub mod logging;
pub mod render;

pub use error::{DeviceStatus, RenderError, Result};
