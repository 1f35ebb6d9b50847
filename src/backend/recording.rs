//! Headless Recording Backend
//!
//! A [`RenderBackend`] that allocates handles, tracks which resources are
//! alive, mirrors the uniform/define state of every pass and keeps an ordered
//! log of submitted commands. No GPU is involved.
//!
//! Used by the integration tests to assert pass ordering and resource
//! lifetimes, and handy for dry-running a graph template.

use glam::Vec2;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    FramebufferId, GBufferTargets, PassDesc, PassId, RenderBackend, RenderTarget, ShaderStage,
    TextureDesc, TextureId, UniformValue,
};
use crate::scene::{Camera, Scene, Viewport};

/// One submitted backend command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    DrawPass { pass: PassId, label: String, target: RenderTarget },
    Clear { target: RenderTarget, color: [f32; 4] },
    RenderScene { target: RenderTarget },
    RenderGBuffer { targets: GBufferTargets },
    RenderShadowMap { kernel_len: usize },
    SetViewport { width: u32, height: u32 },
}

#[derive(Debug, Default)]
struct PassState {
    label: String,
    shader: String,
    uniforms: FxHashMap<String, UniformValue>,
    defines: FxHashMap<(ShaderStage, String), Option<String>>,
}

/// Headless backend that records everything it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    textures: FxHashMap<TextureId, TextureDesc>,
    framebuffers: FxHashMap<FramebufferId, Vec<TextureId>>,
    passes: FxHashMap<PassId, PassState>,
    written: FxHashSet<TextureId>,
    commands: Vec<Command>,
    texture_allocations: usize,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// Commands submitted since creation or the last [`clear_commands`](Self::clear_commands).
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Labels of the fullscreen passes drawn, in submission order.
    #[must_use]
    pub fn drawn_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawPass { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Target of the most recent draw of the pass labelled `label`.
    #[must_use]
    pub fn last_draw_target(&self, label: &str) -> Option<&RenderTarget> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::DrawPass { label: l, target, .. } if l == label => Some(target),
            _ => None,
        })
    }

    /// Number of commands matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    #[must_use]
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    #[must_use]
    pub fn live_pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Total number of `create_texture` calls ever made.
    #[must_use]
    pub fn texture_allocations(&self) -> usize {
        self.texture_allocations
    }

    #[must_use]
    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture)
    }

    #[must_use]
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|d| (d.width, d.height))
    }

    #[must_use]
    pub fn texture_written(&self, texture: TextureId) -> bool {
        self.written.contains(&texture)
    }

    #[must_use]
    pub fn framebuffer_attachments(&self, framebuffer: FramebufferId) -> Option<&[TextureId]> {
        self.framebuffers.get(&framebuffer).map(Vec::as_slice)
    }

    /// Finds a live pass by label.
    #[must_use]
    pub fn pass_by_label(&self, label: &str) -> Option<PassId> {
        self.passes
            .iter()
            .find(|(_, state)| state.label == label)
            .map(|(id, _)| *id)
    }

    #[must_use]
    pub fn pass_shader(&self, pass: PassId) -> Option<&str> {
        self.passes.get(&pass).map(|s| s.shader.as_str())
    }

    /// Uniform value last flushed to the pass.
    #[must_use]
    pub fn pass_uniform(&self, pass: PassId, name: &str) -> Option<&UniformValue> {
        self.passes.get(&pass).and_then(|s| s.uniforms.get(name))
    }

    /// Returns `Some(value)` when the macro is defined on the pass.
    #[must_use]
    pub fn pass_define(&self, pass: PassId, stage: ShaderStage, name: &str) -> Option<Option<&str>> {
        self.passes
            .get(&pass)
            .and_then(|s| s.defines.get(&(stage, name.to_string())))
            .map(Option::as_deref)
    }
}

impl RenderBackend for RecordingBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(id, desc.clone());
        self.texture_allocations += 1;
        id
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        if let Some(desc) = self.textures.get_mut(&texture) {
            desc.width = width.max(1);
            desc.height = height.max(1);
        } else {
            log::warn!("resize of unknown texture {texture:?}");
        }
    }

    fn write_texture(&mut self, texture: TextureId, _data: &[u8]) {
        self.written.insert(texture);
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            log::warn!("destroy of unknown texture {texture:?}");
        }
        self.written.remove(&texture);
    }

    fn create_framebuffer(&mut self, color: &[TextureId], depth: Option<TextureId>) -> FramebufferId {
        let id = FramebufferId(self.next());
        let mut attachments = color.to_vec();
        attachments.extend(depth);
        self.framebuffers.insert(id, attachments);
        id
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
    }

    fn create_pass(&mut self, desc: &PassDesc<'_>) -> PassId {
        let id = PassId(self.next());
        self.passes.insert(
            id,
            PassState {
                label: desc.label.to_string(),
                shader: desc.shader.to_string(),
                ..Default::default()
            },
        );
        id
    }

    fn destroy_pass(&mut self, pass: PassId) {
        self.passes.remove(&pass);
    }

    fn set_uniform(&mut self, pass: PassId, name: &str, value: &UniformValue) {
        if let Some(state) = self.passes.get_mut(&pass) {
            state.uniforms.insert(name.to_string(), value.clone());
        }
    }

    fn unset_uniform(&mut self, pass: PassId, name: &str) {
        if let Some(state) = self.passes.get_mut(&pass) {
            state.uniforms.remove(name);
        }
    }

    fn define(&mut self, pass: PassId, stage: ShaderStage, name: &str, value: Option<&str>) {
        if let Some(state) = self.passes.get_mut(&pass) {
            state
                .defines
                .insert((stage, name.to_string()), value.map(str::to_string));
        }
    }

    fn undefine(&mut self, pass: PassId, stage: ShaderStage, name: &str) {
        if let Some(state) = self.passes.get_mut(&pass) {
            state.defines.remove(&(stage, name.to_string()));
        }
    }

    fn draw_pass(&mut self, pass: PassId, target: &RenderTarget) {
        let label = self
            .passes
            .get(&pass)
            .map(|s| s.label.clone())
            .unwrap_or_default();
        self.commands.push(Command::DrawPass {
            pass,
            label,
            target: target.clone(),
        });
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.commands.push(Command::SetViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    fn clear_target(&mut self, target: &RenderTarget, color: [f32; 4]) {
        self.commands.push(Command::Clear {
            target: target.clone(),
            color,
        });
    }

    fn render_scene(&mut self, _scene: &Scene, _camera: &Camera, target: &RenderTarget) {
        self.commands.push(Command::RenderScene {
            target: target.clone(),
        });
    }

    fn render_gbuffer(&mut self, _scene: &Scene, _camera: &Camera, targets: &GBufferTargets) {
        self.commands.push(Command::RenderGBuffer { targets: *targets });
    }

    fn render_shadow_map(&mut self, _scene: &Scene, _camera: &Camera, pcf_kernel: &[Vec2]) {
        self.commands.push(Command::RenderShadowMap {
            kernel_len: pcf_kernel.len(),
        });
    }
}
