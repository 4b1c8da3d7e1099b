//! Application systems
//!
//! The host is split into a window system, a render system that owns the GPU
//! side, and the GPU-free geometry step that turns the configured surface into
//! a topology.

mod geometry;
mod render;
mod window;

pub use geometry::{build_topology, floor_height, MeshSummary};
pub use render::RenderSystem;
pub use window::{WindowError, WindowSystem};
