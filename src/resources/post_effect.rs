//! Declarative Post-Effect Configuration
//!
//! [`PostEffectConfig`] is the serde view of the viewer's option document:
//!
//! ```json
//! {
//!   "enable": true,
//!   "bloom": { "enable": true, "intensity": 0.1 },
//!   "depthOfField": { "enable": false, "focalRange": 3, "fstop": 1.4, "quality": "medium" },
//!   "screenSpaceAmbientOcclusion": { "enable": true, "radius": 1.5, "quality": "high" },
//!   "screenSpaceReflection": { "enable": false, "maxRoughness": 0.8 },
//!   "FXAA": { "enable": false },
//!   "colorCorrection": { "enable": true, "exposure": 0, "contrast": 1.0 },
//!   "edge": { "enable": false, "color": [0.0, 0.0, 0.0, 1.0] }
//! }
//! ```
//!
//! Every field is optional. An absent key means "leave as is", which is how
//! [`RenderMain::set_post_effect`](crate::renderer::RenderMain::set_post_effect)
//! applies a partial document without resetting anything it does not mention.

use serde::{Deserialize, Serialize};

use crate::backend::TextureId;
use crate::renderer::TemporalSuperSamplingMode;

/// Root of the post-effect option document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostEffectConfig {
    /// Master switch for the whole post-processing path.
    pub enable: Option<bool>,
    pub bloom: Option<BloomConfig>,
    pub depth_of_field: Option<DepthOfFieldConfig>,
    pub screen_space_ambient_occlusion: Option<SsaoConfig>,
    pub screen_space_reflection: Option<SsrConfig>,
    #[serde(rename = "FXAA")]
    pub fxaa: Option<FxaaConfig>,
    pub color_correction: Option<ColorCorrectionConfig>,
    pub edge: Option<EdgeConfig>,
    pub temporal_super_sampling: Option<TemporalSuperSamplingConfig>,
}

impl PostEffectConfig {
    /// Parses a JSON option document.
    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BloomConfig {
    pub enable: Option<bool>,
    pub intensity: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthOfFieldConfig {
    pub enable: Option<bool>,
    pub focal_distance: Option<f32>,
    pub focal_range: Option<f32>,
    pub blur_radius: Option<f32>,
    pub fstop: Option<f32>,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SsaoConfig {
    pub enable: Option<bool>,
    pub radius: Option<f32>,
    pub quality: Option<String>,
    pub intensity: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SsrConfig {
    pub enable: Option<bool>,
    pub quality: Option<String>,
    pub max_roughness: Option<f32>,
    pub physical: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxaaConfig {
    pub enable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorCorrectionConfig {
    pub enable: Option<bool>,
    pub exposure: Option<f32>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    /// An already uploaded 3D lookup texture.
    pub lookup_texture: Option<TextureId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub enable: Option<bool>,
    pub color: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalSuperSamplingConfig {
    pub enable: Option<TemporalSuperSamplingMode>,
}
