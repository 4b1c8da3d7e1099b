//! Per-frame stage planning
//!
//! [`FramePlan::build`] decides, from the targets and programs that exist and
//! the renderer flags, which stages run this frame and which ping-pong slot each
//! one reads and writes. It touches no GPU state, so the whole stage machine is
//! testable on its own; the renderer just walks the plan.
//!
//! Stage order is fixed:
//!
//! ```text
//! GBuffer -> LightAccumulation -> ClipSpaceZ -> AmbientOcclusion
//!         -> AoBlurHorizontal -> AoBlurVertical
//!         -> Composite | DebugTiles -> [AoOverlay] -> Final
//! ```

use bitflags::bitflags;

bitflags! {
    /// Render target slots that are currently allocated
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TargetMask: u32 {
        const ALBEDO          = 1 << 0;
        const NORMAL_EMISSIVE = 1 << 1;
        const POSITION        = 1 << 2;
        const DEPTH           = 1 << 3;
        const PING_PONG_0     = 1 << 4;
        const PING_PONG_1     = 1 << 5;
        const AO_0            = 1 << 6;
        const AO_1            = 1 << 7;
        const CSZ             = 1 << 8;

        const GBUFFER_COLOR = Self::ALBEDO.bits() | Self::NORMAL_EMISSIVE.bits() | Self::POSITION.bits();
        const GBUFFER = Self::GBUFFER_COLOR.bits() | Self::DEPTH.bits();
        const PING_PONG = Self::PING_PONG_0.bits() | Self::PING_PONG_1.bits();
    }
}

bitflags! {
    /// Shader programs that compiled successfully
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ProgramMask: u32 {
        const TETRA_GBUFFER = 1 << 0;
        const SCENE_GBUFFER = 1 << 1;
        const LIGHT_VOLUME  = 1 << 2;
        const CLIP_SPACE_Z  = 1 << 3;
        const CSZ_MINIFY    = 1 << 4;
        const SAO           = 1 << 5;
        const BLUR          = 1 << 6;
        const COMPOSITE     = 1 << 7;
        const DEBUG_TILES   = 1 << 8;
        const AO_OVERLAY    = 1 << 9;
        const FXAA          = 1 << 10;
    }
}

bitflags! {
    /// Renderer toggles
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u32 {
        /// Show the G-buffer channels instead of the lit image
        const DEBUG_MODE  = 1 << 0;
        const DRAW_FLOOR  = 1 << 1;
        /// Draw light markers as emissive spheres
        const DRAW_LIGHTS = 1 << 2;
        /// Overwrite the image with the raw AO buffer
        const DRAW_AO     = 1 << 3;
    }
}

impl Default for FrameFlags {
    fn default() -> Self {
        FrameFlags::DRAW_FLOOR | FrameFlags::DRAW_LIGHTS
    }
}

/// One step of the deferred pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    GBuffer,
    LightAccumulation,
    ClipSpaceZ,
    AmbientOcclusion,
    AoBlurHorizontal,
    AoBlurVertical,
    Composite,
    DebugTiles,
    AoOverlay,
    Final,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::GBuffer => "G-Buffer",
            Stage::LightAccumulation => "L-Buffer",
            Stage::ClipSpaceZ => "Clip Space Z",
            Stage::AmbientOcclusion => "SAO",
            Stage::AoBlurHorizontal => "SAO Blur H",
            Stage::AoBlurVertical => "SAO Blur V",
            Stage::Composite => "Composite",
            Stage::DebugTiles => "Debug Tiles",
            Stage::AoOverlay => "AO Overlay",
            Stage::Final => "FXAA",
        }
    }

    /// Targets the stage reads or writes, ping-pong pair included
    pub fn required_targets(self) -> TargetMask {
        match self {
            Stage::GBuffer => TargetMask::GBUFFER,
            Stage::LightAccumulation => TargetMask::GBUFFER_COLOR | TargetMask::PING_PONG,
            Stage::ClipSpaceZ => TargetMask::DEPTH | TargetMask::CSZ,
            Stage::AmbientOcclusion => TargetMask::CSZ | TargetMask::AO_0,
            Stage::AoBlurHorizontal | Stage::AoBlurVertical => TargetMask::AO_0 | TargetMask::AO_1,
            Stage::Composite => TargetMask::GBUFFER_COLOR | TargetMask::PING_PONG | TargetMask::AO_0,
            Stage::DebugTiles => TargetMask::GBUFFER_COLOR | TargetMask::PING_PONG,
            Stage::AoOverlay => TargetMask::AO_0 | TargetMask::PING_PONG,
            Stage::Final => TargetMask::PING_PONG,
        }
    }

    /// Program without which the stage cannot run
    ///
    /// The G-buffer stage always runs; each of its draws checks its own program.
    pub fn required_program(self) -> ProgramMask {
        match self {
            Stage::GBuffer => ProgramMask::empty(),
            Stage::LightAccumulation => ProgramMask::LIGHT_VOLUME,
            Stage::ClipSpaceZ => ProgramMask::CLIP_SPACE_Z,
            Stage::AmbientOcclusion => ProgramMask::SAO,
            Stage::AoBlurHorizontal | Stage::AoBlurVertical => ProgramMask::BLUR,
            Stage::Composite => ProgramMask::COMPOSITE,
            Stage::DebugTiles => ProgramMask::DEBUG_TILES,
            Stage::AoOverlay => ProgramMask::AO_OVERLAY,
            Stage::Final => ProgramMask::FXAA,
        }
    }

    /// Whether the stage writes a new ping-pong result
    pub fn writes_ping_pong(self) -> bool {
        matches!(
            self,
            Stage::LightAccumulation | Stage::Composite | Stage::DebugTiles | Stage::AoOverlay
        )
    }
}

/// Why a stage did not run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    MissingTargets(TargetMask),
    MissingProgram(ProgramMask),
    /// No stage wrote a ping-pong slot this frame
    NothingToPresent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SkippedStage {
    pub stage: Stage,
    pub reason: SkipReason,
}

/// A stage that runs, with its ping-pong slots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub ping_pong_read: Option<usize>,
    pub ping_pong_write: Option<usize>,
}

/// Ping-pong bookkeeping: `current` is the slot the next stage writes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingPong {
    current: usize,
    last_written: Option<usize>,
}

impl PingPong {
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn previous(&self) -> usize {
        (self.current + 1) % 2
    }

    #[inline]
    pub fn last_written(&self) -> Option<usize> {
        self.last_written
    }

    /// Claim the current slot for writing and toggle
    pub fn write(&mut self) -> usize {
        let slot = self.current;
        self.last_written = Some(slot);
        self.current = (self.current + 1) % 2;
        slot
    }
}

/// What is available this frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInputs {
    pub targets: TargetMask,
    pub programs: ProgramMask,
    pub flags: FrameFlags,
}

/// Ordered stages for one frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FramePlan {
    pub stages: Vec<PlannedStage>,
    pub skipped: Vec<SkippedStage>,
}

impl FramePlan {
    pub fn build(inputs: &FrameInputs) -> Self {
        let mut plan = FramePlan::default();
        let mut ping_pong = PingPong::default();

        let mut sequence = vec![
            Stage::GBuffer,
            Stage::LightAccumulation,
            Stage::ClipSpaceZ,
            Stage::AmbientOcclusion,
            Stage::AoBlurHorizontal,
            Stage::AoBlurVertical,
        ];
        if inputs.flags.contains(FrameFlags::DEBUG_MODE) {
            sequence.push(Stage::DebugTiles);
        } else {
            sequence.push(Stage::Composite);
        }
        if inputs.flags.contains(FrameFlags::DRAW_AO) {
            sequence.push(Stage::AoOverlay);
        }
        sequence.push(Stage::Final);

        for stage in sequence {
            if let Some(reason) = Self::check(stage, inputs) {
                plan.skipped.push(SkippedStage { stage, reason });
                continue;
            }

            let planned = match stage {
                Stage::Composite => {
                    let read = ping_pong.previous();
                    PlannedStage {
                        stage,
                        ping_pong_read: Some(read),
                        ping_pong_write: Some(ping_pong.write()),
                    }
                }
                Stage::Final => match ping_pong.last_written() {
                    Some(read) => PlannedStage {
                        stage,
                        ping_pong_read: Some(read),
                        ping_pong_write: None,
                    },
                    None => {
                        plan.skipped.push(SkippedStage {
                            stage,
                            reason: SkipReason::NothingToPresent,
                        });
                        continue;
                    }
                },
                s if s.writes_ping_pong() => PlannedStage {
                    stage,
                    ping_pong_read: None,
                    ping_pong_write: Some(ping_pong.write()),
                },
                _ => PlannedStage {
                    stage,
                    ping_pong_read: None,
                    ping_pong_write: None,
                },
            };
            plan.stages.push(planned);
        }

        plan
    }

    fn check(stage: Stage, inputs: &FrameInputs) -> Option<SkipReason> {
        let missing_targets = stage.required_targets() - inputs.targets;
        if !missing_targets.is_empty() {
            return Some(SkipReason::MissingTargets(missing_targets));
        }
        let missing_program = stage.required_program() - inputs.programs;
        if !missing_program.is_empty() {
            return Some(SkipReason::MissingProgram(missing_program));
        }
        None
    }

    /// Stages in execution order
    pub fn stage_order(&self) -> Vec<Stage> {
        self.stages.iter().map(|s| s.stage).collect()
    }

    pub fn runs(&self, stage: Stage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }

    pub fn get(&self, stage: Stage) -> Option<&PlannedStage> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything(flags: FrameFlags) -> FrameInputs {
        FrameInputs {
            targets: TargetMask::all(),
            programs: ProgramMask::all(),
            flags,
        }
    }

    #[test]
    fn test_normal_mode_sequence() {
        let plan = FramePlan::build(&everything(FrameFlags::default()));
        assert_eq!(
            plan.stage_order(),
            vec![
                Stage::GBuffer,
                Stage::LightAccumulation,
                Stage::ClipSpaceZ,
                Stage::AmbientOcclusion,
                Stage::AoBlurHorizontal,
                Stage::AoBlurVertical,
                Stage::Composite,
                Stage::Final,
            ]
        );
        assert!(plan.skipped.is_empty());

        let light = plan.get(Stage::LightAccumulation).unwrap();
        assert_eq!(light.ping_pong_write, Some(0));
        let composite = plan.get(Stage::Composite).unwrap();
        assert_eq!(composite.ping_pong_read, Some(0));
        assert_eq!(composite.ping_pong_write, Some(1));
        assert_eq!(plan.get(Stage::Final).unwrap().ping_pong_read, Some(1));
    }

    #[test]
    fn test_debug_mode_replaces_composite() {
        let plan = FramePlan::build(&everything(FrameFlags::DEBUG_MODE));
        assert!(plan.runs(Stage::DebugTiles));
        assert!(!plan.runs(Stage::Composite));
        assert_eq!(plan.get(Stage::DebugTiles).unwrap().ping_pong_write, Some(1));
        assert_eq!(plan.get(Stage::Final).unwrap().ping_pong_read, Some(1));
    }

    #[test]
    fn test_ao_overlay_is_presented() {
        let plan = FramePlan::build(&everything(FrameFlags::DRAW_AO));
        let overlay = plan.get(Stage::AoOverlay).unwrap();
        assert_eq!(overlay.ping_pong_write, Some(0));
        assert_eq!(plan.get(Stage::Final).unwrap().ping_pong_read, Some(0));
        assert_eq!(plan.stage_order().last(), Some(&Stage::Final));
    }

    #[test]
    fn test_writes_alternate_slots() {
        for flags in [
            FrameFlags::empty(),
            FrameFlags::DEBUG_MODE,
            FrameFlags::DRAW_AO,
            FrameFlags::DEBUG_MODE | FrameFlags::DRAW_AO,
        ] {
            let plan = FramePlan::build(&everything(flags));
            let writes: Vec<usize> = plan.stages.iter().filter_map(|s| s.ping_pong_write).collect();
            for pair in writes.windows(2) {
                assert_ne!(pair[0], pair[1], "{:?}", flags);
            }
            let last = *writes.last().unwrap();
            assert_eq!(plan.get(Stage::Final).unwrap().ping_pong_read, Some(last));
        }
    }

    #[test]
    fn test_missing_program_leaves_index_untouched() {
        let inputs = FrameInputs {
            programs: ProgramMask::all() - ProgramMask::LIGHT_VOLUME,
            ..everything(FrameFlags::empty())
        };
        let plan = FramePlan::build(&inputs);

        assert!(!plan.runs(Stage::LightAccumulation));
        assert_eq!(
            plan.skipped,
            vec![SkippedStage {
                stage: Stage::LightAccumulation,
                reason: SkipReason::MissingProgram(ProgramMask::LIGHT_VOLUME),
            }]
        );
        // Composite reads the stale slot and writes slot 0
        let composite = plan.get(Stage::Composite).unwrap();
        assert_eq!(composite.ping_pong_read, Some(1));
        assert_eq!(composite.ping_pong_write, Some(0));
        assert_eq!(plan.get(Stage::Final).unwrap().ping_pong_read, Some(0));
    }

    #[test]
    fn test_missing_ao_target_skips_ao_chain() {
        let inputs = FrameInputs {
            targets: TargetMask::all() - TargetMask::AO_0,
            ..everything(FrameFlags::DRAW_AO)
        };
        let plan = FramePlan::build(&inputs);

        for stage in [
            Stage::AmbientOcclusion,
            Stage::AoBlurHorizontal,
            Stage::AoBlurVertical,
            Stage::Composite,
            Stage::AoOverlay,
        ] {
            assert!(!plan.runs(stage), "{:?} should be skipped", stage);
        }
        // The light result is still presented
        assert_eq!(plan.get(Stage::Final).unwrap().ping_pong_read, Some(0));
    }

    #[test]
    fn test_missing_ping_pong_skips_final() {
        let inputs = FrameInputs {
            targets: TargetMask::all() - TargetMask::PING_PONG_1,
            ..everything(FrameFlags::empty())
        };
        let plan = FramePlan::build(&inputs);
        assert!(!plan.runs(Stage::Final));
        assert!(plan.runs(Stage::GBuffer));
        assert!(plan.runs(Stage::AmbientOcclusion));
    }

    #[test]
    fn test_nothing_to_present() {
        let inputs = FrameInputs {
            programs: ProgramMask::FXAA,
            ..everything(FrameFlags::empty())
        };
        let plan = FramePlan::build(&inputs);
        assert_eq!(plan.stage_order(), vec![Stage::GBuffer]);
        assert!(plan.skipped.contains(&SkippedStage {
            stage: Stage::Final,
            reason: SkipReason::NothingToPresent,
        }));
    }

    #[test]
    fn test_no_targets_at_all() {
        let inputs = FrameInputs {
            targets: TargetMask::empty(),
            ..everything(FrameFlags::empty())
        };
        let plan = FramePlan::build(&inputs);
        assert!(plan.stages.is_empty());
        assert_eq!(plan.skipped.len(), 8);
    }

    #[test]
    fn test_ping_pong_toggle() {
        let mut pp = PingPong::default();
        assert_eq!(pp.last_written(), None);
        assert_eq!(pp.write(), 0);
        assert_eq!(pp.previous(), 0);
        assert_eq!(pp.write(), 1);
        assert_eq!(pp.current(), 0);
        assert_eq!(pp.last_written(), Some(1));
    }
}
