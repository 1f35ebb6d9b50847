//! Effect passes owned by the compositor and the render loop.

pub mod gbuffer;
pub mod history;
pub mod shadow;
pub mod ssao;
pub mod ssr;
pub mod temporal;

pub use gbuffer::GBuffer;
pub use history::HistoryBuffer;
pub use shadow::ShadowMapPass;
pub use ssao::SsaoPass;
pub use ssr::{history_blend_weights, BlendWeights, SsrPass};
pub use temporal::TemporalSuperSampling;
