#[cfg(any(feature = "bc6h", feature = "bc7"))]
use bytemuck::{Pod, Zeroable};

/// Quality tier for the encoders.
///
/// Each tier maps to format specific internal presets: refinement iteration
/// counts for BC1-5, the mode/partition search breadth for BC6H and BC7.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Default)]
pub enum Quality {
    /// Fastest encoding, lowest quality.
    Lowest,
    /// Balanced default.
    #[default]
    Medium,
    /// Slowest encoding, highest quality.
    Highest,
}

/// Settings for the encode entry point.
#[derive(Copy, Clone, Debug)]
pub struct CompressionSettings {
    /// Quality tier, mapped to format specific presets.
    pub quality: Quality,
    /// Which channel of the 4-channel source feeds BC4 encoding (0-3).
    pub bc4_source_channel: usize,
    /// Which two channels of the source feed BC5's two sub-blocks (0-3 each).
    pub bc5_source_channels: (usize, usize),
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality: Quality::Medium,
            bc4_source_channel: 0,
            bc5_source_channels: (0, 1),
        }
    }
}

impl CompressionSettings {
    /// Settings with the given quality and default channel selections.
    pub fn with_quality(quality: Quality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }
}

/// Internal search breadth knobs for the BC6H encoder.
#[cfg(feature = "bc6h")]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct BC6HSettings {
    pub(crate) slow_mode: u32,
    pub(crate) fast_mode: u32,
    pub(crate) refine_iterations_1p: u32,
    pub(crate) refine_iterations_2p: u32,
    pub(crate) fast_skip_threshold: u32,
}

#[cfg(feature = "bc6h")]
impl BC6HSettings {
    pub(crate) const fn very_fast() -> Self {
        Self {
            slow_mode: false as _,
            fast_mode: true as _,
            fast_skip_threshold: 0,
            refine_iterations_1p: 0,
            refine_iterations_2p: 0,
        }
    }

    pub(crate) const fn basic() -> Self {
        Self {
            slow_mode: false as _,
            fast_mode: false as _,
            fast_skip_threshold: 4,
            refine_iterations_1p: 2,
            refine_iterations_2p: 2,
        }
    }

    pub(crate) const fn very_slow() -> Self {
        Self {
            slow_mode: true as _,
            fast_mode: false as _,
            fast_skip_threshold: 32,
            refine_iterations_1p: 2,
            refine_iterations_2p: 2,
        }
    }

    pub(crate) const fn from_quality(quality: Quality) -> Self {
        match quality {
            Quality::Lowest => Self::very_fast(),
            Quality::Medium => Self::basic(),
            Quality::Highest => Self::very_slow(),
        }
    }
}

/// Internal search breadth knobs for the BC7 encoder. All presets carry the
/// alpha channel; opaque sources simply produce a zero opaque error.
#[cfg(feature = "bc7")]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct BC7Settings {
    pub(crate) refine_iterations: [u32; 8],
    pub(crate) mode_selection: [u32; 4],
    pub(crate) skip_mode2: u32,
    pub(crate) fast_skip_threshold_mode1: u32,
    pub(crate) fast_skip_threshold_mode3: u32,
    pub(crate) fast_skip_threshold_mode7: u32,
    pub(crate) mode45_channel0: u32,
    pub(crate) refine_iterations_channel: u32,
}

#[cfg(feature = "bc7")]
impl BC7Settings {
    pub(crate) const fn alpha_ultra_fast() -> Self {
        Self {
            mode_selection: [false as _, false as _, true as _, true as _],
            skip_mode2: true as _,
            fast_skip_threshold_mode1: 0,
            fast_skip_threshold_mode3: 0,
            fast_skip_threshold_mode7: 4,
            mode45_channel0: 3,
            refine_iterations_channel: 1,
            refine_iterations: [2, 1, 2, 1, 1, 1, 2, 2],
        }
    }

    pub(crate) const fn alpha_basic() -> Self {
        Self {
            mode_selection: [true as _, true as _, true as _, true as _],
            skip_mode2: true as _,
            fast_skip_threshold_mode1: 12,
            fast_skip_threshold_mode3: 8,
            fast_skip_threshold_mode7: 8,
            mode45_channel0: 0,
            refine_iterations_channel: 2,
            refine_iterations: [2, 2, 2, 2, 2, 2, 2, 2],
        }
    }

    pub(crate) const fn alpha_slow() -> Self {
        Self {
            mode_selection: [true as _, true as _, true as _, true as _],
            skip_mode2: false as _,
            fast_skip_threshold_mode1: 64,
            fast_skip_threshold_mode3: 64,
            fast_skip_threshold_mode7: 64,
            mode45_channel0: 0,
            refine_iterations_channel: 4,
            refine_iterations: [4, 4, 4, 4, 4, 4, 4, 4],
        }
    }

    pub(crate) const fn from_quality(quality: Quality) -> Self {
        match quality {
            Quality::Lowest => Self::alpha_ultra_fast(),
            Quality::Medium => Self::alpha_basic(),
            Quality::Highest => Self::alpha_slow(),
        }
    }
}
