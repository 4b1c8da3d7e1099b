//! Deferred tetra rendering library
//!
//! This crate provides the wgpu side of the renderer: uploading a tetra batch
//! and drawing it through a deferred pipeline with light volumes, scalable
//! ambient obscurance, and FXAA.
//!
//! ## Key Components
//!
//! - [`context::RenderContext`] - WGPU device, queue, and surface management
//! - [`camera::Camera`] - perspective orbit camera
//! - [`batch::TetraBatch`] - GPU buffers and indirect draws of one batch
//! - [`targets::RenderTargets`] - off-screen targets, reallocated on resize
//! - [`pipeline::FramePlan`] - which stages run this frame
//! - [`deferred::DeferredRenderer`] - records a frame

pub mod context;
pub mod camera;
pub mod batch;
pub mod targets;
pub mod pipeline;
pub mod deferred;
pub mod scope;
mod error;

pub use error::RenderError;

// Re-export the main entry points for convenience
pub use batch::{DrawStrategy, TetraBatch};
pub use camera::Camera;
pub use context::{request_device, DeviceCapabilities, RenderContext};
pub use deferred::{DeferredRenderer, SaoSettings};
pub use pipeline::{FrameFlags, FramePlan, Stage};
