//! Post-processing node graph.
//!
//! - [`GraphTemplate`]: declarative description, loaded from JSON
//! - [`EffectGraph`]: the live graph, its resolution and rendering
//! - chain splicing for the optional tail nodes (edge, FXAA)

mod chain;
pub mod graph;
pub mod node;
pub mod template;

pub use graph::{EffectGraph, ExternalTextures};
pub use node::{
    EffectNode, ExternalTexture, InputSource, NodeId, NodeKind, NodeTarget, OutputDesc, PinFormat,
};
pub use template::{GraphTemplate, InputRef, NodeTemplate, TemplateNodeKind, TemplateValue};

/// Output pin read when an input names no pin.
pub const DEFAULT_PIN: &str = "color";

/// Input slot through which chain nodes receive their predecessor.
pub const CHAIN_INPUT_SLOT: &str = "texture";
