#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Post-processing compositor and temporal accumulation for a model viewer.
//!
//! The hosting engine implements [`backend::RenderBackend`]; this crate
//! decides which passes run, in which order, with which parameters.

pub mod backend;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use backend::{RenderBackend, RenderTarget, TextureId};
pub use errors::{CompositorError, Result};
pub use renderer::{EffectCompositor, RenderMain, RenderMainSettings, TemporalSuperSamplingMode};
pub use resources::{ParamValue, PostEffectConfig, QualityTier};
pub use scene::{Camera, Scene, Viewport};
