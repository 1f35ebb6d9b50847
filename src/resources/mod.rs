//! CPU-side resource definitions.
//!
//! Nothing here touches the GPU:
//! - [`ShaderDefines`]: per-stage macro sets
//! - [`QualityTier`]: coarse quality lookup tables
//! - [`params`]: typed effect parameter names and values
//! - [`post_effect`]: the declarative post-effect option document

pub mod params;
pub mod post_effect;
pub mod quality;
pub mod shader_defines;

pub use params::{
    BloomParam, ColorCorrectionParam, DofParam, EdgeParam, ParamValue, SsaoParam, SsrParam,
};
pub use post_effect::{
    BloomConfig, ColorCorrectionConfig, DepthOfFieldConfig, EdgeConfig, FxaaConfig,
    PostEffectConfig, SsaoConfig, SsrConfig, TemporalSuperSamplingConfig,
};
pub use quality::{QualityTier, UnknownQualityTier};
pub use shader_defines::ShaderDefines;
