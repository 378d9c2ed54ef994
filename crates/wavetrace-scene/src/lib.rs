//! Lexer, parser and data model for the **wavetrace scene format**.
//!
//! This crate is intentionally dependency-free so scenes can be validated by
//! tooling without pulling in any GPU code.
//!
//! # Format
//!
//! Whitespace-separated numbers, `//` starts a line comment:
//!
//! ```text
//! image_width image_height
//! tile_width tile_height
//! pixel_samples
//! num_materials
//!   rho_r rho_g rho_b emission_r emission_g emission_b     (per material)
//! num_spheres
//!   cx cy cz radius material_index                         (per sphere)
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use wavetrace_scene::parse_str;
//!
//! let scene = parse_str("64 48  64 48  4  1  0.8 0.8 0.8 0 0 0  1  0 0 0 1 0").unwrap();
//! assert_eq!(scene.spheres.len(), 1);
//! assert_eq!(scene.pixel_samples, 4);
//! ```

pub mod description;
pub mod error;
pub mod lexer;
pub mod parser;

use std::path::Path;

pub use description::{Material, SceneDescription, Sphere};
pub use error::{LoadError, LoadErrorKind, ParseError};
pub use parser::parse_str;

/// Read and parse a scene file. Errors always carry `path`.
pub fn load(path: impl AsRef<Path>) -> Result<SceneDescription, LoadError> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    parse_str(&src).map_err(|e| LoadError::parse(path, e))
}
