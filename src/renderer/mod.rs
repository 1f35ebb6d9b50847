//! Post-Processing Renderer
//!
//! # Layers
//!
//! ```text
//! RenderMain                 per-view frame policy (fresh vs. accumulating)
//!   ├── ShadowMapPass        rotating PCF kernels
//!   ├── TemporalSuperSampling
//!   └── EffectCompositor     effect toggles and parameters
//!         ├── GBuffer / SsaoPass / SsrPass
//!         └── EffectGraph    node graph, chain splicing, texture pool
//!                └── FullscreenPass ──► RenderBackend
//! ```
//!
//! Everything here is single-threaded and frame-synchronous. Ordering inside
//! [`RenderMain::render`] and [`EffectCompositor::composite`] is fixed.

pub mod compositor;
pub mod graph;
pub mod pass;
pub mod passes;
pub mod render_main;
pub mod sampling;
pub mod settings;
pub mod texture_pool;

pub use compositor::{EffectCompositor, EffectFlags};
pub use graph::{EffectGraph, GraphTemplate, NodeId};
pub use pass::FullscreenPass;
pub use passes::{
    history_blend_weights, BlendWeights, GBuffer, HistoryBuffer, ShadowMapPass, SsaoPass, SsrPass,
    TemporalSuperSampling,
};
pub use render_main::RenderMain;
pub use sampling::PoissonKernelProvider;
pub use settings::{RenderMainSettings, TemporalSuperSamplingMode};
pub use texture_pool::TexturePool;
