//! GPU Backend Boundary
//!
//! The compositor never issues raw draw calls. Everything it does on the GPU
//! goes through [`RenderBackend`], which the hosting engine implements on top
//! of its own device, shader compiler and scene renderer.
//!
//! # Resource Model
//!
//! ```text
//! ┌──────────────────────┐   create/resize/destroy   ┌──────────────────┐
//! │  EffectCompositor    │ ────────────────────────► │  RenderBackend   │
//! │  (owns every id it   │   set_uniform / define    │  (owns the real  │
//! │   allocated)         │ ────────────────────────► │   GPU objects)   │
//! │                      │   draw_pass / render_*    │                  │
//! └──────────────────────┘ ────────────────────────► └──────────────────┘
//! ```
//!
//! Ids are plain copyable handles. Whoever created an id is responsible for
//! destroying it; passes borrow ids for the duration of one call and never
//! keep them across frames (the SSR history pair is the one owned exception).
//!
//! A headless [`RecordingBackend`](recording::RecordingBackend) is provided for
//! tests and tooling.

pub mod recording;

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::scene::{Camera, Scene, Viewport};

// ============================================================================
// Handles
// ============================================================================

/// Handle to a backend texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub u32);

/// Handle to a backend framebuffer (a set of attachments).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

/// Handle to a backend fullscreen pass (compiled shader + material state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub u32);

// ============================================================================
// Descriptors
// ============================================================================

/// Shader stage a macro definition applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Texture allocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub label: &'static str,
}

impl TextureDesc {
    /// A sampled color attachment of the given size and format.
    #[must_use]
    pub fn color(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            label,
        }
    }

    /// A sampled depth attachment.
    #[must_use]
    pub fn depth(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            label,
        }
    }

    /// A small texture filled from CPU data (noise, lookup tables).
    #[must_use]
    pub fn data(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            label,
        }
    }
}

/// How a fullscreen pass writes into its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PassBlend {
    /// Overwrite the target.
    #[default]
    Replace,
    /// Premultiplied-alpha "over" blending with the existing contents.
    PremultipliedOver,
}

/// Request for a fullscreen pass.
#[derive(Clone, Copy, Debug)]
pub struct PassDesc<'a> {
    /// Shader binding name (resolved by the backend's shader library).
    pub shader: &'a str,
    pub label: &'a str,
    pub blend: PassBlend,
}

impl<'a> PassDesc<'a> {
    #[must_use]
    pub fn new(label: &'a str, shader: &'a str) -> Self {
        Self {
            shader,
            label,
            blend: PassBlend::Replace,
        }
    }

    #[must_use]
    pub fn with_blend(mut self, blend: PassBlend) -> Self {
        self.blend = blend;
        self
    }
}

/// Where a draw lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    /// The current viewport of the default framebuffer.
    Screen,
    /// A framebuffer owned by the caller.
    Framebuffer(FramebufferId),
    /// Ad-hoc color attachments (one per output slot).
    Textures(SmallVec<[TextureId; 2]>),
}

impl RenderTarget {
    /// A single texture attachment.
    #[must_use]
    pub fn texture(id: TextureId) -> Self {
        let mut attachments = SmallVec::new();
        attachments.push(id);
        Self::Textures(attachments)
    }
}

/// Attachments written by the geometry-buffer pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBufferTargets {
    pub normal: TextureId,
    pub depth: TextureId,
    pub albedo: Option<TextureId>,
}

/// A shader parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    FloatArray(Vec<f32>),
    Texture(TextureId),
}

impl UniformValue {
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_texture(&self) -> Option<TextureId> {
        match self {
            Self::Texture(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

impl From<TextureId> for UniformValue {
    fn from(v: TextureId) -> Self {
        Self::Texture(v)
    }
}

// ============================================================================
// RenderBackend
// ============================================================================

/// The GPU capability the compositor calls into.
///
/// Implementations are expected to be infallible from the caller's point of
/// view: resource exhaustion and device loss are handled (or reported) inside
/// the backend, and the compositor performs no retries.
pub trait RenderBackend {
    // --- Textures & framebuffers ---
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;
    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32);
    fn write_texture(&mut self, texture: TextureId, data: &[u8]);
    fn destroy_texture(&mut self, texture: TextureId);

    fn create_framebuffer(&mut self, color: &[TextureId], depth: Option<TextureId>) -> FramebufferId;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    // --- Fullscreen passes ---
    fn create_pass(&mut self, desc: &PassDesc<'_>) -> PassId;
    fn destroy_pass(&mut self, pass: PassId);
    fn set_uniform(&mut self, pass: PassId, name: &str, value: &UniformValue);
    fn unset_uniform(&mut self, pass: PassId, name: &str);
    fn define(&mut self, pass: PassId, stage: ShaderStage, name: &str, value: Option<&str>);
    fn undefine(&mut self, pass: PassId, stage: ShaderStage, name: &str);
    fn draw_pass(&mut self, pass: PassId, target: &RenderTarget);

    // --- Frame state ---
    fn set_viewport(&mut self, viewport: &Viewport);
    fn clear_target(&mut self, target: &RenderTarget, color: [f32; 4]);

    // --- Scene rendering (engine-owned) ---
    fn render_scene(&mut self, scene: &Scene, camera: &Camera, target: &RenderTarget);
    fn render_gbuffer(&mut self, scene: &Scene, camera: &Camera, targets: &GBufferTargets);
    fn render_shadow_map(&mut self, scene: &Scene, camera: &Camera, pcf_kernel: &[Vec2]);
}
