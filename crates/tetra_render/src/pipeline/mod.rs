//! Deferred pipeline components
//!
//! This module contains the stage planner, the uniform layouts, and the
//! shader programs of the deferred renderer.

pub mod frame_plan;
pub mod types;
pub mod programs;

// Re-export the stage planner
pub use frame_plan::{
    FrameFlags, FrameInputs, FramePlan, PingPong, PlannedStage, ProgramMask, SkipReason,
    SkippedStage, Stage, TargetMask,
};

// Re-export types
pub use types::{
    BlurUniforms, CompositeUniforms, CszUniforms, FxaaUniforms, GBufferUniforms, GpuLight,
    LightUniforms, MarkerInstance, MeshVertex, SaoUniforms,
};

// Re-export programs
pub use programs::{FullscreenProgram, GBufferProgram, Input, LightVolumeProgram, Programs};
