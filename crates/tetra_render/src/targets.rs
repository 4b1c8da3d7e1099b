//! Render targets manager
//!
//! Owns every off-screen target of the deferred pipeline:
//!
//! | Slot | Format | Size |
//! |---|---|---|
//! | albedo | `Rgb10a2Unorm` | viewport |
//! | normal + emissive | `Rgba16Float` | viewport |
//! | view-space position | `Rgba16Float` | viewport |
//! | depth | `Depth32Float` | viewport |
//! | ping-pong 0/1 | `Rgba16Float` | viewport |
//! | AO 0/1 | `Rg32Float` | viewport / 2 |
//! | clip-space Z | `R32Float`, 5 mips | viewport |
//!
//! Adapters that cannot render to 32-bit float textures get `Rg16Float` and
//! `R16Float` instead (see [`TargetFormats`]).
//!
//! Allocation goes through [`TargetAllocator`] so the slot bookkeeping can be
//! exercised without a GPU. A failed allocation leaves its slot empty; the
//! frame planner then skips every stage that needs it.

use crate::pipeline::TargetMask;
use crate::scope::try_create;
use crate::RenderError;

/// Mip levels of the clip-space Z target
pub const CSZ_MIP_LEVELS: u32 = 5;

pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgb10a2Unorm;
pub const DATA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const PING_PONG_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Float;
pub const CSZ_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const AO_FALLBACK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;
pub const CSZ_FALLBACK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

/// Formats of the targets whose preferred format is not always renderable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetFormats {
    pub ao: wgpu::TextureFormat,
    pub csz: wgpu::TextureFormat,
}

impl Default for TargetFormats {
    fn default() -> Self {
        Self {
            ao: AO_FORMAT,
            csz: CSZ_FORMAT,
        }
    }
}

impl TargetFormats {
    /// Prefer 32-bit floats, falling back to 16-bit where `renderable` refuses them
    ///
    /// If neither is renderable the preferred format is kept and allocation
    /// failure disables the stages as usual.
    pub fn select(renderable: impl Fn(wgpu::TextureFormat) -> bool) -> Self {
        let pick = |preferred, fallback| {
            if !renderable(preferred) && renderable(fallback) {
                fallback
            } else {
                preferred
            }
        };
        Self {
            ao: pick(AO_FORMAT, AO_FALLBACK_FORMAT),
            csz: pick(CSZ_FORMAT, CSZ_FALLBACK_FORMAT),
        }
    }
}

/// One off-screen target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    Albedo,
    NormalEmissive,
    Position,
    Depth,
    PingPong0,
    PingPong1,
    Ao0,
    Ao1,
    Csz,
}

impl TargetSlot {
    pub const ALL: [TargetSlot; 9] = [
        TargetSlot::Albedo,
        TargetSlot::NormalEmissive,
        TargetSlot::Position,
        TargetSlot::Depth,
        TargetSlot::PingPong0,
        TargetSlot::PingPong1,
        TargetSlot::Ao0,
        TargetSlot::Ao1,
        TargetSlot::Csz,
    ];

    /// Ping-pong slot by index (0 or 1)
    pub fn ping_pong(index: usize) -> Self {
        if index % 2 == 0 {
            TargetSlot::PingPong0
        } else {
            TargetSlot::PingPong1
        }
    }

    pub fn mask(self) -> TargetMask {
        match self {
            TargetSlot::Albedo => TargetMask::ALBEDO,
            TargetSlot::NormalEmissive => TargetMask::NORMAL_EMISSIVE,
            TargetSlot::Position => TargetMask::POSITION,
            TargetSlot::Depth => TargetMask::DEPTH,
            TargetSlot::PingPong0 => TargetMask::PING_PONG_0,
            TargetSlot::PingPong1 => TargetMask::PING_PONG_1,
            TargetSlot::Ao0 => TargetMask::AO_0,
            TargetSlot::Ao1 => TargetMask::AO_1,
            TargetSlot::Csz => TargetMask::CSZ,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetSlot::Albedo => "GBuffer Albedo",
            TargetSlot::NormalEmissive => "GBuffer Normal Emissive",
            TargetSlot::Position => "GBuffer Position",
            TargetSlot::Depth => "GBuffer Depth",
            TargetSlot::PingPong0 => "PingPong 0",
            TargetSlot::PingPong1 => "PingPong 1",
            TargetSlot::Ao0 => "AO 0",
            TargetSlot::Ao1 => "AO 1",
            TargetSlot::Csz => "Clip Space Z",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Everything needed to allocate one target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub slot: TargetSlot,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

/// Size of the AO pair for a given G-buffer size
///
/// Halved with integer division, never below one texel.
pub fn ao_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Describe a slot for a viewport of `width` x `height`
pub fn describe(slot: TargetSlot, width: u32, height: u32, formats: &TargetFormats) -> TargetDesc {
    let (width, height) = (width.max(1), height.max(1));
    let (format, (w, h), mip_levels) = match slot {
        TargetSlot::Albedo => (ALBEDO_FORMAT, (width, height), 1),
        TargetSlot::NormalEmissive | TargetSlot::Position => (DATA_FORMAT, (width, height), 1),
        TargetSlot::Depth => (DEPTH_FORMAT, (width, height), 1),
        TargetSlot::PingPong0 | TargetSlot::PingPong1 => (PING_PONG_FORMAT, (width, height), 1),
        TargetSlot::Ao0 | TargetSlot::Ao1 => (formats.ao, ao_size(width, height), 1),
        TargetSlot::Csz => {
            // A mip chain can never be longer than log2 of the largest side
            let max_mips = 32 - width.max(height).leading_zeros();
            (formats.csz, (width, height), CSZ_MIP_LEVELS.min(max_mips))
        }
    };
    TargetDesc { slot, format, width: w, height: h, mip_levels }
}

/// Creates target storage
pub trait TargetAllocator {
    type Target;

    fn allocate(&mut self, desc: &TargetDesc) -> Result<Self::Target, RenderError>;
}

/// Exclusive owner of every target slot
pub struct RenderTargets<T> {
    slots: [Option<T>; 9],
    size: (u32, u32),
    formats: TargetFormats,
}

impl<T> Default for RenderTargets<T> {
    fn default() -> Self {
        Self {
            slots: Default::default(),
            size: (0, 0),
            formats: TargetFormats::default(),
        }
    }
}

impl<T> RenderTargets<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets allocated with `formats` for the AO pair and clip-space Z
    pub fn with_formats(formats: TargetFormats) -> Self {
        Self {
            formats,
            ..Self::default()
        }
    }

    pub fn formats(&self) -> TargetFormats {
        self.formats
    }

    /// Reallocate every slot for a new viewport size
    ///
    /// Each old target is released before its replacement is allocated.
    pub fn resize<A>(&mut self, allocator: &mut A, width: u32, height: u32)
    where
        A: TargetAllocator<Target = T>,
    {
        for slot in TargetSlot::ALL {
            self.slots[slot.index()] = None;
            let desc = describe(slot, width, height, &self.formats);
            self.slots[slot.index()] = match allocator.allocate(&desc) {
                Ok(target) => Some(target),
                Err(e) => {
                    log::error!("{}; stages using it are disabled", e);
                    None
                }
            };
        }
        self.size = (width.max(1), height.max(1));
        log::info!(
            "Render targets allocated at {}x{} ({} of {} slots)",
            self.size.0,
            self.size.1,
            self.slots.iter().filter(|s| s.is_some()).count(),
            self.slots.len()
        );
    }

    #[inline]
    pub fn get(&self, slot: TargetSlot) -> Option<&T> {
        self.slots[slot.index()].as_ref()
    }

    /// G-buffer size
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Which slots currently hold a target
    pub fn mask(&self) -> TargetMask {
        TargetSlot::ALL
            .iter()
            .filter(|slot| self.get(**slot).is_some())
            .fold(TargetMask::empty(), |mask, slot| mask | slot.mask())
    }
}

/// A GPU texture with its views
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    /// View over every mip level
    pub view: wgpu::TextureView,
    /// One view per mip level, empty for single-level targets
    pub mip_views: Vec<wgpu::TextureView>,
}

/// Allocates targets on a device, reporting failures through error scopes
pub struct GpuAllocator<'a> {
    pub device: &'a wgpu::Device,
}

impl TargetAllocator for GpuAllocator<'_> {
    type Target = GpuTarget;

    fn allocate(&mut self, desc: &TargetDesc) -> Result<GpuTarget, RenderError> {
        let device = self.device;
        try_create(device, desc.slot.label(), || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.slot.label()),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: desc.mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let mip_views = if desc.mip_levels > 1 {
                (0..desc.mip_levels)
                    .map(|level| {
                        texture.create_view(&wgpu::TextureViewDescriptor {
                            label: Some("Clip Space Z Mip"),
                            base_mip_level: level,
                            mip_level_count: Some(1),
                            ..Default::default()
                        })
                    })
                    .collect()
            } else {
                Vec::new()
            };
            GpuTarget { texture, view, mip_views }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    type Live = Rc<RefCell<HashMap<TargetSlot, usize>>>;

    struct Counted {
        slot: TargetSlot,
        desc: TargetDesc,
        live: Live,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            *self.live.borrow_mut().get_mut(&self.slot).unwrap() -= 1;
        }
    }

    #[derive(Default)]
    struct CountingAllocator {
        live: Live,
        fail: Vec<TargetSlot>,
    }

    impl TargetAllocator for CountingAllocator {
        type Target = Counted;

        fn allocate(&mut self, desc: &TargetDesc) -> Result<Counted, RenderError> {
            if self.fail.contains(&desc.slot) {
                return Err(RenderError::Allocation {
                    what: desc.slot.label().to_string(),
                    reason: "forced".to_string(),
                });
            }
            let mut live = self.live.borrow_mut();
            let count = live.entry(desc.slot).or_insert(0);
            assert_eq!(*count, 0, "{:?} allocated while a previous one is live", desc.slot);
            *count += 1;
            Ok(Counted { slot: desc.slot, desc: *desc, live: self.live.clone() })
        }
    }

    #[test]
    fn test_resize_never_leaks() {
        let mut alloc = CountingAllocator::default();
        let mut targets = RenderTargets::new();

        for (w, h) in [(800, 600), (1920, 1080), (3, 1), (1, 1), (1024, 768)] {
            targets.resize(&mut alloc, w, h);
            for slot in TargetSlot::ALL {
                assert_eq!(alloc.live.borrow()[&slot], 1, "{:?} at {}x{}", slot, w, h);
            }
        }

        drop(targets);
        assert!(alloc.live.borrow().values().all(|&n| n == 0));
    }

    #[test]
    fn test_ao_is_half_gbuffer() {
        let mut alloc = CountingAllocator::default();
        let mut targets = RenderTargets::new();

        for (w, h) in [(800, 600), (1001, 777), (1, 1)] {
            targets.resize(&mut alloc, w, h);
            let albedo = &targets.get(TargetSlot::Albedo).unwrap().desc;
            for slot in [TargetSlot::Ao0, TargetSlot::Ao1] {
                let ao = &targets.get(slot).unwrap().desc;
                assert_eq!((ao.width, ao.height), ao_size(albedo.width, albedo.height));
            }
        }
        assert_eq!(ao_size(1001, 777), (500, 388));
        assert_eq!(ao_size(1, 1), (1, 1));
    }

    #[test]
    fn test_formats() {
        let formats = TargetFormats::default();
        assert_eq!(describe(TargetSlot::Albedo, 8, 8, &formats).format, ALBEDO_FORMAT);
        assert_eq!(describe(TargetSlot::Position, 8, 8, &formats).format, DATA_FORMAT);
        assert_eq!(describe(TargetSlot::Depth, 8, 8, &formats).format, DEPTH_FORMAT);
        assert_eq!(describe(TargetSlot::Ao1, 8, 8, &formats).format, AO_FORMAT);
        let csz = describe(TargetSlot::Csz, 640, 480, &formats);
        assert_eq!(csz.format, CSZ_FORMAT);
        assert_eq!(csz.mip_levels, CSZ_MIP_LEVELS);
        // Tiny viewports get a shorter chain
        assert_eq!(describe(TargetSlot::Csz, 4, 2, &formats).mip_levels, 3);
    }

    #[test]
    fn test_select_formats() {
        assert_eq!(TargetFormats::select(|_| true), TargetFormats::default());

        // Downlevel adapters refuse 32-bit float attachments
        let downlevel = TargetFormats::select(|f| f != AO_FORMAT && f != CSZ_FORMAT);
        assert_eq!(downlevel.ao, AO_FALLBACK_FORMAT);
        assert_eq!(downlevel.csz, CSZ_FALLBACK_FORMAT);

        // Nothing renderable keeps the preferred formats
        assert_eq!(TargetFormats::select(|_| false), TargetFormats::default());
    }

    #[test]
    fn test_fallback_formats_reach_allocator() {
        let formats = TargetFormats {
            ao: AO_FALLBACK_FORMAT,
            csz: CSZ_FALLBACK_FORMAT,
        };
        let mut alloc = CountingAllocator::default();
        let mut targets = RenderTargets::with_formats(formats);
        targets.resize(&mut alloc, 64, 32);

        assert_eq!(targets.get(TargetSlot::Ao0).unwrap().desc.format, AO_FALLBACK_FORMAT);
        assert_eq!(targets.get(TargetSlot::Csz).unwrap().desc.format, CSZ_FALLBACK_FORMAT);
        assert_eq!(targets.get(TargetSlot::Albedo).unwrap().desc.format, ALBEDO_FORMAT);
        assert_eq!(targets.mask(), TargetMask::all());
    }

    #[test]
    fn test_failed_slot_is_empty() {
        let mut alloc = CountingAllocator {
            fail: vec![TargetSlot::Ao1],
            ..Default::default()
        };
        let mut targets = RenderTargets::new();
        targets.resize(&mut alloc, 64, 64);

        assert!(targets.get(TargetSlot::Ao1).is_none());
        assert!(targets.get(TargetSlot::Ao0).is_some());
        assert!(!targets.mask().contains(TargetMask::AO_1));
        assert!(targets.mask().contains(TargetMask::GBUFFER));
    }

    #[test]
    fn test_ping_pong_slot() {
        assert_eq!(TargetSlot::ping_pong(0), TargetSlot::PingPong0);
        assert_eq!(TargetSlot::ping_pong(1), TargetSlot::PingPong1);
        assert_eq!(TargetSlot::ping_pong(2), TargetSlot::PingPong0);
    }
}
