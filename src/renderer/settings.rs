//! Render Loop Settings
//!
//! [`RenderMainSettings`] is consumed once by
//! [`RenderMain::new`](crate::renderer::RenderMain::new).
//! [`TemporalSuperSamplingMode`] is the per-view temporal supersampling
//! override, which may change at any time.
//!
//! # Example
//!
//! ```rust,ignore
//! use viewer_compositor::renderer::{RenderMainSettings, TemporalSuperSamplingMode};
//!
//! // Heavier accumulation, no shadows
//! let settings = RenderMainSettings {
//!     shadow: false,
//!     temporal_frames: 60,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use super::passes::shadow::{DEFAULT_PCF_KERNEL_COUNT, DEFAULT_PCF_KERNEL_SIZE};
use super::passes::temporal::DEFAULT_TSS_FRAMES;

// ---------------------------------------------------------------------------
// TemporalSuperSamplingMode
// ---------------------------------------------------------------------------

/// Whether a view accumulates jittered frames.
///
/// | Mode            | Temporal supersampling runs when |
/// |-----------------|----------------------------------|
/// | `Auto`          | post effects are enabled         |
/// | `Forced(true)`  | always                           |
/// | `Forced(false)` | never                            |
///
/// Serialized as `"auto"`, `true` or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "ModeRepr", into = "ModeRepr")]
pub enum TemporalSuperSamplingMode {
    #[default]
    Auto,
    Forced(bool),
}

impl TemporalSuperSamplingMode {
    /// Resolves the mode against the post-effect switch.
    #[inline]
    #[must_use]
    pub fn resolve(self, post_effect_enabled: bool) -> bool {
        match self {
            Self::Auto => post_effect_enabled,
            Self::Forced(enabled) => enabled,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Flag(bool),
    Text(String),
}

impl TryFrom<ModeRepr> for TemporalSuperSamplingMode {
    type Error = String;

    fn try_from(repr: ModeRepr) -> Result<Self, Self::Error> {
        match repr {
            ModeRepr::Flag(enabled) => Ok(Self::Forced(enabled)),
            ModeRepr::Text(text) if text == "auto" => Ok(Self::Auto),
            ModeRepr::Text(text) => Err(format!("expected \"auto\" or a boolean, got \"{text}\"")),
        }
    }
}

impl From<TemporalSuperSamplingMode> for ModeRepr {
    fn from(mode: TemporalSuperSamplingMode) -> Self {
        match mode {
            TemporalSuperSamplingMode::Auto => Self::Text("auto".to_string()),
            TemporalSuperSamplingMode::Forced(enabled) => Self::Flag(enabled),
        }
    }
}

// ---------------------------------------------------------------------------
// RenderMainSettings
// ---------------------------------------------------------------------------

/// Construction-time configuration of a [`RenderMain`](crate::renderer::RenderMain).
///
/// | Field                | Description                                | Default |
/// |----------------------|--------------------------------------------|---------|
/// | `shadow`             | Render the shadow map on fresh frames      | `true`  |
/// | `pcf_kernel_count`   | Rotating PCF kernels                       | 30      |
/// | `pcf_kernel_size`    | Offsets per PCF kernel                     | 6       |
/// | `temporal_frames`    | Jittered frames to TSS convergence         | 30      |
/// | `accumulation_cap`   | Frames to convergence without TSS          | 30      |
/// | `clear_color`        | Clear color of the scene targets           | black   |
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMainSettings {
    pub shadow: bool,
    pub pcf_kernel_count: usize,
    pub pcf_kernel_size: usize,
    pub temporal_frames: usize,
    pub accumulation_cap: u32,
    pub clear_color: [f32; 4],
}

impl Default for RenderMainSettings {
    fn default() -> Self {
        Self {
            shadow: true,
            pcf_kernel_count: DEFAULT_PCF_KERNEL_COUNT,
            pcf_kernel_size: DEFAULT_PCF_KERNEL_SIZE,
            temporal_frames: DEFAULT_TSS_FRAMES,
            accumulation_cap: 30,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
