//! Math library for the Tetra renderer
//!
//! This crate provides the small set of vector and matrix types shared by the
//! geometry and rendering crates.
//!
//! ## Core Types
//!
//! - [`Vec3`] - 3D vector with x, y, z components
//! - [`Mat4`] - 4x4 column-major matrix, laid out the way WGSL expects it

mod vec3;
pub mod mat4;

pub use vec3::Vec3;
pub use mat4::Mat4;
