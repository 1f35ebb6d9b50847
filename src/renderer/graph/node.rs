//! Effect Graph Nodes
//!
//! A node is either a **texture node**, whose output is a texture assigned
//! from outside (the scene color feeding the graph), or a **pass node**, which
//! runs one fullscreen shader over its inputs.
//!
//! Nodes are addressed by [`NodeId`]. The name from the template is a label;
//! it is only used to look nodes up once, at wiring time, and in logs.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::backend::TextureId;
use crate::renderer::pass::FullscreenPass;

slotmap::new_key_type! {
    /// Stable identity of a node for the lifetime of its graph.
    pub struct NodeId;
}

/// Textures produced outside the graph that nodes may sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExternalTexture {
    SceneDepth,
    GBufferNormal,
    GBufferDepth,
}

/// What feeds an input slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    /// Output pin `pin` of another node.
    Node { node: NodeId, pin: String },
    External(ExternalTexture),
}

impl InputSource {
    /// The default `color` pin of `node`.
    #[must_use]
    pub fn node(node: NodeId) -> Self {
        Self::Node {
            node,
            pin: super::DEFAULT_PIN.to_string(),
        }
    }

    #[must_use]
    pub fn upstream(&self) -> Option<NodeId> {
        match self {
            Self::Node { node, .. } => Some(*node),
            Self::External(_) => None,
        }
    }
}

/// Storage format of an output pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinFormat {
    Rgba8,
    #[default]
    Rgba16Float,
    R16Float,
}

impl PinFormat {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::R16Float => wgpu::TextureFormat::R16Float,
        }
    }
}

/// Allocation parameters of an output pin.
///
/// The texture size is `viewport × dpr × scale`, re-derived on every graph
/// render.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputDesc {
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub format: PinFormat,
}

fn default_scale() -> f32 {
    1.0
}

impl Default for OutputDesc {
    fn default() -> Self {
        Self {
            scale: 1.0,
            format: PinFormat::default(),
        }
    }
}

impl OutputDesc {
    /// Texture size for a render surface of `width × height` device pixels.
    #[must_use]
    pub fn size_for(&self, width: u32, height: u32) -> (u32, u32) {
        let w = (width as f32 * self.scale).round() as u32;
        let h = (height as f32 * self.scale).round() as u32;
        (w.max(1), h.max(1))
    }
}

/// Where a node renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeTarget {
    /// Pooled intermediate textures, one per output pin.
    #[default]
    Texture,
    /// The externally supplied final target. Only the chain tail has this.
    Final,
}

#[derive(Debug)]
pub enum NodeKind {
    Texture(Option<TextureId>),
    Pass(FullscreenPass),
}

#[derive(Debug)]
pub struct EffectNode {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    /// Input slots in declaration order.
    pub(crate) inputs: SmallVec<[(String, Option<InputSource>); 4]>,
    /// Output pins in declaration order; bound as attachments in this order.
    pub(crate) outputs: SmallVec<[(String, OutputDesc); 1]>,
    pub(crate) target: NodeTarget,
}

impl EffectNode {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn is_texture_node(&self) -> bool {
        matches!(self.kind, NodeKind::Texture(_))
    }

    #[must_use]
    pub fn pass(&self) -> Option<&FullscreenPass> {
        match &self.kind {
            NodeKind::Pass(pass) => Some(pass),
            NodeKind::Texture(_) => None,
        }
    }

    pub fn pass_mut(&mut self) -> Option<&mut FullscreenPass> {
        match &mut self.kind {
            NodeKind::Pass(pass) => Some(pass),
            NodeKind::Texture(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> NodeTarget {
        self.target
    }

    #[must_use]
    pub fn input(&self, slot: &str) -> Option<&InputSource> {
        self.inputs
            .iter()
            .find(|(name, _)| name == slot)
            .and_then(|(_, source)| source.as_ref())
    }

    #[must_use]
    pub fn has_input_slot(&self, slot: &str) -> bool {
        self.inputs.iter().any(|(name, _)| name == slot)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&str, Option<&InputSource>)> {
        self.inputs.iter().map(|(name, source)| (name.as_str(), source.as_ref()))
    }

    #[must_use]
    pub fn output_index(&self, pin: &str) -> Option<usize> {
        self.outputs.iter().position(|(name, _)| name == pin)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &OutputDesc)> {
        self.outputs.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    /// Sets (or adds) an input slot. Returns the previous source.
    pub(crate) fn set_input(&mut self, slot: &str, source: Option<InputSource>) -> Option<InputSource> {
        if let Some((_, current)) = self.inputs.iter_mut().find(|(name, _)| name == slot) {
            std::mem::replace(current, source)
        } else {
            self.inputs.push((slot.to_string(), source));
            None
        }
    }

    /// Nodes this node reads from.
    pub(crate) fn upstream(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .filter_map(|(_, source)| source.as_ref().and_then(InputSource::upstream))
    }
}
