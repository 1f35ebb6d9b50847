//! Effect Graph
//!
//! A DAG of [`EffectNode`]s built once from a [`GraphTemplate`]. Wiring may
//! change at runtime (composite inputs, chain splicing); node identity never
//! does.
//!
//! # Rendering
//!
//! ```text
//!   dirty? ──► resolve(): post-order walk from the chain tail
//!                 │
//!                 ▼
//!   for node in order:
//!       bind inputs   (upstream outputs / external textures / unset)
//!       pick target   (pooled textures sized viewport × dpr × scale,
//!                      or the caller's final target for the tail)
//!       draw
//!                 │
//!                 ▼
//!   pool.reset() + trim()
//! ```
//!
//! Only nodes reachable from the tail run, so a disabled bloom branch costs
//! nothing once the composite node stops reading it.

use glam::Vec2;
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;

use super::node::{
    EffectNode, ExternalTexture, InputSource, NodeId, NodeKind, NodeTarget, OutputDesc,
};
use super::template::{GraphTemplate, InputRef, TemplateNodeKind};
use super::CHAIN_INPUT_SLOT;
use crate::backend::{
    PassDesc, RenderBackend, RenderTarget, ShaderStage, TextureDesc, TextureId, UniformValue,
};
use crate::errors::{CompositorError, Result};
use crate::renderer::pass::FullscreenPass;
use crate::renderer::texture_pool::TexturePool;
use crate::scene::Viewport;

/// Free pooled textures unused for this many renders are destroyed.
const POOL_MAX_IDLE_FRAMES: u32 = 2;

/// Textures produced outside the graph for this render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExternalTextures {
    pub scene_depth: Option<TextureId>,
    pub gbuffer_normal: Option<TextureId>,
    pub gbuffer_depth: Option<TextureId>,
}

impl ExternalTextures {
    #[must_use]
    pub fn get(&self, kind: ExternalTexture) -> Option<TextureId> {
        match kind {
            ExternalTexture::SceneDepth => self.scene_depth,
            ExternalTexture::GBufferNormal => self.gbuffer_normal,
            ExternalTexture::GBufferDepth => self.gbuffer_depth,
        }
    }
}

#[derive(Debug)]
pub struct EffectGraph {
    pub(super) nodes: SlotMap<NodeId, EffectNode>,
    pub(super) names: FxHashMap<String, NodeId>,
    pub(super) chain: Vec<NodeId>,
    pub(super) chain_live: Vec<bool>,
    pub(super) order: Vec<NodeId>,
    pub(super) dirty: bool,
    pool: TexturePool,
    outputs: SecondaryMap<NodeId, SmallVec<[TextureId; 2]>>,
    resolved_targets: SecondaryMap<NodeId, RenderTarget>,
}

impl EffectGraph {
    /// Builds the graph and one backend pass per pass node.
    ///
    /// Only the head of the final chain starts live; the optional chain
    /// nodes are spliced in later.
    pub fn from_template(backend: &mut dyn RenderBackend, template: &GraphTemplate) -> Result<Self> {
        template.validate()?;

        let mut nodes = SlotMap::with_key();
        let mut names = FxHashMap::default();

        for node in &template.nodes {
            let kind = match (node.kind, node.shader.as_deref()) {
                (TemplateNodeKind::Texture, _) => NodeKind::Texture(None),
                (TemplateNodeKind::Pass, Some(shader)) => {
                    let mut pass = FullscreenPass::new(backend, &PassDesc::new(&node.name, shader));
                    for (name, value) in &node.parameters {
                        pass.set_uniform(name, value.to_uniform());
                    }
                    for (name, value) in &node.defines {
                        pass.define(ShaderStage::Fragment, name, value.as_deref());
                    }
                    NodeKind::Pass(pass)
                }
                (TemplateNodeKind::Pass, None) => {
                    return Err(CompositorError::MissingShader(node.name.clone()));
                }
            };
            let outputs = node
                .outputs
                .iter()
                .map(|(pin, desc)| (pin.clone(), *desc))
                .collect::<SmallVec<[(String, OutputDesc); 1]>>();
            let id = nodes.insert(EffectNode {
                name: node.name.clone(),
                kind,
                inputs: SmallVec::new(),
                outputs,
                target: NodeTarget::Texture,
            });
            names.insert(node.name.clone(), id);
        }

        for node in &template.nodes {
            let id = names[&node.name];
            for (slot, input) in &node.inputs {
                let source = input.as_ref().map(|input| match input {
                    InputRef::Node { node, pin } => InputSource::Node {
                        node: names[node],
                        pin: pin.clone(),
                    },
                    InputRef::External { external } => InputSource::External(*external),
                });
                nodes[id].set_input(slot, source);
            }
        }

        let chain: Vec<NodeId> = template.final_chain.iter().map(|name| names[name]).collect();
        let mut chain_live = vec![false; chain.len()];
        chain_live[0] = true;
        nodes[chain[0]].target = NodeTarget::Final;
        for &id in chain.iter().skip(1) {
            nodes[id].set_input(CHAIN_INPUT_SLOT, None);
        }

        log::debug!(
            "effect graph built: {} nodes, chain [{}]",
            nodes.len(),
            template.final_chain.join(" → ")
        );

        Ok(Self {
            nodes,
            names,
            chain,
            chain_live,
            order: Vec::new(),
            dirty: true,
            pool: TexturePool::new(),
            outputs: SecondaryMap::new(),
            resolved_targets: SecondaryMap::new(),
        })
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[must_use]
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Like [`node_id`](Self::node_id), but a missing node is an error.
    pub fn require(&self, name: &str) -> Result<NodeId> {
        self.node_id(name)
            .ok_or_else(|| CompositorError::MissingNode(name.to_string()))
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&EffectNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut EffectNode> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(EffectNode::name)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys()
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    /// Connects (or with `None`, disconnects) an input slot.
    pub fn set_input(&mut self, node: NodeId, slot: &str, source: Option<InputSource>) {
        if let Some(n) = self.nodes.get_mut(node) {
            if n.input(slot) != source.as_ref() {
                n.set_input(slot, source);
                self.dirty = true;
            }
        }
    }

    #[must_use]
    pub fn input(&self, node: NodeId, slot: &str) -> Option<&InputSource> {
        self.nodes.get(node).and_then(|n| n.input(slot))
    }

    #[must_use]
    pub fn target(&self, node: NodeId) -> Option<NodeTarget> {
        self.nodes.get(node).map(EffectNode::target)
    }

    // ========================================================================
    // Parameters & defines
    // ========================================================================

    pub fn set_parameter(&mut self, node: NodeId, name: &str, value: impl Into<UniformValue>) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        match &mut n.kind {
            NodeKind::Pass(pass) => pass.set_uniform(name, value),
            NodeKind::Texture(_) => {
                log::warn!("parameter '{name}' ignored on texture node '{}'", n.name);
            }
        }
    }

    pub fn unset_parameter(&mut self, node: NodeId, name: &str) {
        if let Some(pass) = self.nodes.get_mut(node).and_then(EffectNode::pass_mut) {
            pass.unset_uniform(name);
        }
    }

    #[must_use]
    pub fn parameter(&self, node: NodeId, name: &str) -> Option<&UniformValue> {
        self.nodes
            .get(node)
            .and_then(EffectNode::pass)
            .and_then(|pass| pass.uniform(name))
    }

    pub fn define(&mut self, node: NodeId, stage: ShaderStage, name: &str, value: Option<&str>) {
        if let Some(pass) = self.nodes.get_mut(node).and_then(EffectNode::pass_mut) {
            pass.define(stage, name, value);
        }
    }

    pub fn undefine(&mut self, node: NodeId, stage: ShaderStage, name: &str) {
        if let Some(pass) = self.nodes.get_mut(node).and_then(EffectNode::pass_mut) {
            pass.undefine(stage, name);
        }
    }

    #[must_use]
    pub fn is_defined(&self, node: NodeId, stage: ShaderStage, name: &str) -> bool {
        self.nodes
            .get(node)
            .and_then(EffectNode::pass)
            .is_some_and(|pass| pass.is_defined(stage, name))
    }

    /// Assigns the texture a texture node outputs.
    pub fn set_node_texture(&mut self, node: NodeId, texture: Option<TextureId>) {
        if let Some(n) = self.nodes.get_mut(node) {
            match &mut n.kind {
                NodeKind::Texture(current) => *current = texture,
                NodeKind::Pass(_) => log::warn!("'{}' is a pass node, texture not assigned", n.name),
            }
        }
    }

    #[must_use]
    pub fn node_texture(&self, node: NodeId) -> Option<TextureId> {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(NodeKind::Texture(texture)) => *texture,
            _ => None,
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Forces re-resolution before the next render.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Execution order of the nodes reachable from the tail, dependencies first.
    pub fn resolve(&mut self) -> Result<&[NodeId]> {
        if self.dirty {
            let mut order = Vec::with_capacity(self.nodes.len());
            let mut visiting = SecondaryMap::new();
            self.visit(self.tail(), &mut visiting, &mut order)?;
            log::debug!(
                "effect graph resolved: {}",
                order
                    .iter()
                    .filter_map(|id| self.name(*id))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            self.order = order;
            self.dirty = false;
        }
        Ok(&self.order)
    }

    fn visit(
        &self,
        id: NodeId,
        marks: &mut SecondaryMap<NodeId, bool>,
        order: &mut Vec<NodeId>,
    ) -> Result<()> {
        match marks.get(id).copied() {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(CompositorError::CyclicGraph(
                    self.name(id).unwrap_or_default().to_string(),
                ));
            }
            None => {}
        }
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        marks.insert(id, false);
        for upstream in node.upstream() {
            self.visit(upstream, marks, order)?;
        }
        marks.insert(id, true);
        order.push(id);
        Ok(())
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Renders every reachable node; the tail draws into `final_target`.
    ///
    /// Output sizes are derived from `viewport` on every call.
    pub fn render(
        &mut self,
        backend: &mut dyn RenderBackend,
        viewport: &Viewport,
        externals: &ExternalTextures,
        final_target: &RenderTarget,
    ) {
        if let Err(err) = self.resolve() {
            log::error!("effect graph not rendered: {err}");
            return;
        }

        let (width, height) = viewport.physical_size();
        self.outputs.clear();
        self.resolved_targets.clear();

        for index in 0..self.order.len() {
            let id = self.order[index];
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let bindings: SmallVec<[Option<TextureId>; 4]> = node
                .inputs
                .iter()
                .map(|(_, source)| self.input_texture(source.as_ref(), externals))
                .collect();

            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let EffectNode {
                name,
                kind,
                inputs,
                outputs,
                target,
            } = node;

            let pass = match kind {
                NodeKind::Texture(texture) => {
                    match texture {
                        Some(t) => {
                            self.outputs.insert(id, SmallVec::from_elem(*t, outputs.len().max(1)));
                        }
                        None => log::warn!("texture node '{name}' has no texture this frame"),
                    }
                    continue;
                }
                NodeKind::Pass(pass) => pass,
            };

            for ((slot, _), texture) in inputs.iter().zip(bindings) {
                match texture {
                    Some(t) => pass.set_uniform(slot, t),
                    None => pass.unset_uniform(slot),
                }
            }

            let render_target = match target {
                NodeTarget::Final => {
                    pass.set_uniform("textureSize", Vec2::new(width as f32, height as f32));
                    final_target.clone()
                }
                NodeTarget::Texture => {
                    let mut attachments: SmallVec<[TextureId; 2]> = SmallVec::new();
                    let mut size = (width, height);
                    for (_, desc) in outputs.iter() {
                        size = desc.size_for(width, height);
                        let texture_desc =
                            TextureDesc::color("effect_graph_output", size.0, size.1, desc.format.to_wgpu());
                        attachments.push(self.pool.allocate(backend, &texture_desc));
                    }
                    pass.set_uniform("textureSize", Vec2::new(size.0 as f32, size.1 as f32));
                    self.outputs.insert(id, attachments.clone());
                    RenderTarget::Textures(attachments)
                }
            };

            log::trace!("effect graph: {name} → {render_target:?}");
            pass.render(backend, &render_target);
            self.resolved_targets.insert(id, render_target);
        }

        self.pool.reset();
        self.pool.trim(backend, POOL_MAX_IDLE_FRAMES);
    }

    fn input_texture(
        &self,
        source: Option<&InputSource>,
        externals: &ExternalTextures,
    ) -> Option<TextureId> {
        match source? {
            InputSource::Node { node, pin } => {
                let index = self.nodes.get(*node)?.output_index(pin).unwrap_or(0);
                self.outputs.get(*node)?.get(index).copied()
            }
            InputSource::External(kind) => externals.get(*kind),
        }
    }

    /// Where `node` rendered during the last [`render`](Self::render).
    #[must_use]
    pub fn resolved_target(&self, node: NodeId) -> Option<&RenderTarget> {
        self.resolved_targets.get(node)
    }

    /// Texture produced by `node` on `pin` during the last render.
    ///
    /// Pooled textures are recycled at the end of the render, so this is only
    /// meaningful for inspection.
    #[must_use]
    pub fn output_texture(&self, node: NodeId, pin: &str) -> Option<TextureId> {
        let index = self.nodes.get(node)?.output_index(pin)?;
        self.outputs.get(node)?.get(index).copied()
    }

    /// Number of textures held by the intermediate pool.
    #[must_use]
    pub fn pooled_texture_count(&self) -> usize {
        self.pool.total_texture_count()
    }

    /// Releases every pass and pooled texture.
    pub fn dispose(mut self, backend: &mut dyn RenderBackend) {
        self.pool.dispose(backend);
        for (_, node) in self.nodes.drain() {
            if let NodeKind::Pass(pass) = node.kind {
                pass.dispose(backend);
            }
        }
    }
}
