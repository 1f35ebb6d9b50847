//! Error Types
//!
//! This module defines the error types used by the compositor.
//!
//! # Overview
//!
//! Errors only exist at **construction time**: loading and validating the
//! declarative effect-graph template. Once an [`EffectCompositor`] or
//! [`RenderMain`] has been built, the per-frame API is best-effort and never
//! fails; malformed parameters are ignored or coerced to a documented default.
//!
//! [`EffectCompositor`]: crate::renderer::EffectCompositor
//! [`RenderMain`]: crate::renderer::RenderMain
//!
//! # Usage
//!
//! ```rust,ignore
//! use viewer_compositor::errors::{CompositorError, Result};
//!
//! fn load() -> Result<GraphTemplate> {
//!     GraphTemplate::from_json(include_str!("graph.json"))
//! }
//! ```

use thiserror::Error;

/// The main error type for the compositor.
#[derive(Error, Debug)]
pub enum CompositorError {
    // ========================================================================
    // Template Parsing Errors
    // ========================================================================
    /// The template document is not valid JSON or does not match the schema.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Two nodes in the template share the same name.
    #[error("Duplicate node name in effect graph: {0}")]
    DuplicateNode(String),

    /// An input refers to a node that is not declared in the template.
    #[error("Node '{node}' input '{slot}' references unknown node '{target}'")]
    UnknownInputNode {
        /// Node owning the input slot
        node: String,
        /// Input slot name
        slot: String,
        /// Referenced node name
        target: String,
    },

    /// An input refers to an output pin the upstream node does not declare.
    #[error("Node '{node}' input '{slot}' references unknown pin '{pin}' on '{target}'")]
    UnknownOutputPin {
        /// Node owning the input slot
        node: String,
        /// Input slot name
        slot: String,
        /// Referenced node name
        target: String,
        /// Referenced pin name
        pin: String,
    },

    /// A node the compositor depends on is missing from the template.
    #[error("Effect graph is missing required node: {0}")]
    MissingNode(String),

    /// A pass node does not declare which shader it runs.
    #[error("Pass node '{0}' has no shader binding")]
    MissingShader(String),

    /// The template wiring contains a cycle.
    #[error("Effect graph contains a cycle through node: {0}")]
    CyclicGraph(String),

    /// The final chain is empty or malformed.
    #[error("Invalid final chain: {0}")]
    InvalidChain(String),
}

/// Alias for `Result<T, CompositorError>`.
pub type Result<T> = std::result::Result<T, CompositorError>;
