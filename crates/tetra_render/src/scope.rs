//! Scoped GPU state
//!
//! Two scoped constructs used by every stage:
//!
//! - [`EncoderScope`] pushes a debug group on creation and pops it on drop, so
//!   every stage's commands stay grouped even on an early return.
//! - [`capture_errors`] runs a resource constructor inside validation and
//!   out-of-memory error scopes and turns a failure into `None`.

use std::ops::{Deref, DerefMut};

use crate::RenderError;

/// A command encoder borrowed for the duration of one stage
pub struct EncoderScope<'a> {
    encoder: &'a mut wgpu::CommandEncoder,
}

impl<'a> EncoderScope<'a> {
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, label: &str) -> Self {
        encoder.push_debug_group(label);
        Self { encoder }
    }
}

impl Deref for EncoderScope<'_> {
    type Target = wgpu::CommandEncoder;

    fn deref(&self) -> &Self::Target {
        self.encoder
    }
}

impl DerefMut for EncoderScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.encoder
    }
}

impl Drop for EncoderScope<'_> {
    fn drop(&mut self) {
        self.encoder.pop_debug_group();
    }
}

/// Run `create` inside error scopes, returning the error wgpu reported if any
pub fn try_create<T>(
    device: &wgpu::Device,
    what: &str,
    create: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());

    match validation.or(oom) {
        Some(err) => Err(RenderError::Allocation {
            what: what.to_string(),
            reason: err.to_string(),
        }),
        None => Ok(value),
    }
}

/// Like [`try_create`], logging the failure and yielding a null handle
pub fn capture_errors<T>(
    device: &wgpu::Device,
    what: &str,
    create: impl FnOnce() -> T,
) -> Option<T> {
    try_create(device, what, create)
        .inspect_err(|e| log::error!("{}", e))
        .ok()
}
