//! Geometry Buffer
//!
//! Per-pixel normal (+ glossiness in `w`), depth and optionally albedo,
//! written by the engine's geometry pass and read by SSAO, SSR and edge
//! detection.

use crate::backend::{GBufferTargets, RenderBackend, TextureDesc, TextureId};
use crate::scene::{Camera, Scene};

const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug)]
pub struct GBuffer {
    normal: TextureId,
    depth: TextureId,
    albedo: Option<TextureId>,
    width: u32,
    height: u32,
}

impl GBuffer {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        Self {
            normal: backend.create_texture(&TextureDesc::color("gbuffer_normal", width, height, NORMAL_FORMAT)),
            depth: backend.create_texture(&TextureDesc::depth("gbuffer_depth", width, height)),
            albedo: None,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Allocates or releases the albedo attachment.
    pub fn set_albedo_enabled(&mut self, backend: &mut dyn RenderBackend, enabled: bool) {
        match (enabled, self.albedo) {
            (true, None) => {
                self.albedo = Some(backend.create_texture(&TextureDesc::color(
                    "gbuffer_albedo",
                    self.width,
                    self.height,
                    ALBEDO_FORMAT,
                )));
            }
            (false, Some(albedo)) => {
                backend.destroy_texture(albedo);
                self.albedo = None;
            }
            _ => {}
        }
    }

    /// Resizes every attachment. No-op when the size is unchanged.
    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        backend.resize_texture(self.normal, width, height);
        backend.resize_texture(self.depth, width, height);
        if let Some(albedo) = self.albedo {
            backend.resize_texture(albedo, width, height);
        }
    }

    /// Renders the geometry pass for `scene`.
    pub fn update(&self, backend: &mut dyn RenderBackend, scene: &Scene, camera: &Camera) {
        backend.render_gbuffer(scene, camera, &self.targets());
    }

    #[must_use]
    pub fn targets(&self) -> GBufferTargets {
        GBufferTargets {
            normal: self.normal,
            depth: self.depth,
            albedo: self.albedo,
        }
    }

    #[inline]
    #[must_use]
    pub fn normal_texture(&self) -> TextureId {
        self.normal
    }

    #[inline]
    #[must_use]
    pub fn depth_texture(&self) -> TextureId {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn albedo_texture(&self) -> Option<TextureId> {
        self.albedo
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        backend.destroy_texture(self.normal);
        backend.destroy_texture(self.depth);
        if let Some(albedo) = self.albedo {
            backend.destroy_texture(albedo);
        }
    }
}
