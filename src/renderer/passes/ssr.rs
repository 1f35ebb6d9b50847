//! Temporal Screen Space Reflection Pass
//!
//! Each update traces `sample_per_frame` reflection rays per pixel, blends
//! the result with the accumulated history and blurs it:
//!
//! ```text
//!              frame 0: source ─┐
//!   frame ≥ 1: history.previous ┤
//!                               ▼
//!  GBuffer ──────────────► trace ──► raw
//!                                     │
//!  history.previous ──► blend(new 2, history 0|1) ──► history.current
//!                                                          │
//!                                  blur H ──► blur V (+SSAO) ──► target
//!                                                          │
//!                                                   history.swap()
//! ```
//!
//! From the second frame on, the trace reflects the previous *blended*
//! result instead of the raw source. Reflections therefore pick up
//! multi-bounce light and their noise drops as frames accumulate.
//!
//! The history pair is the only texture state that survives between frames.

use glam::Vec2;

use super::gbuffer::GBuffer;
use super::history::HistoryBuffer;
use crate::backend::{PassDesc, RenderBackend, RenderTarget, ShaderStage, TextureDesc, TextureId};
use crate::renderer::pass::FullscreenPass;
use crate::renderer::sampling;
use crate::resources::QualityTier;
use crate::scene::Camera;

pub const DEFAULT_TOTAL_SAMPLES: u32 = 2048;
pub const DEFAULT_SAMPLE_PER_FRAME: u32 = 10;

const SSR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const NORMAL_DISTRIBUTION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

// ============================================================================
// History
// ============================================================================

/// Weights applied when blending a fresh trace into the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub new: f32,
    pub history: f32,
}

/// History contributes nothing on frame 0, whose `previous` texture holds
/// stale data.
#[must_use]
pub fn history_blend_weights(frame: u32) -> BlendWeights {
    BlendWeights {
        new: 2.0,
        history: if frame >= 1 { 1.0 } else { 0.0 },
    }
}

// ============================================================================
// SsrPass
// ============================================================================

#[derive(Debug)]
pub struct SsrPass {
    trace: FullscreenPass,
    blend: FullscreenPass,
    blur: FullscreenPass,

    raw: TextureId,
    blurred: TextureId,
    target: TextureId,
    history: HistoryBuffer,
    width: u32,
    height: u32,

    total_samples: u32,
    sample_per_frame: u32,
    max_iteration: u32,
    pixel_stride: u32,
    min_glossiness: f32,

    physically_correct: bool,
    /// Built on the first switch to the physical trace, then kept.
    normal_distribution: Option<TextureId>,
    ssao_texture: Option<TextureId>,
    ambient_cubemap: Option<(TextureId, f32)>,
}

impl SsrPass {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        Self::with_sampling(backend, width, height, DEFAULT_TOTAL_SAMPLES, DEFAULT_SAMPLE_PER_FRAME)
    }

    pub fn with_sampling(
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
        total_samples: u32,
        sample_per_frame: u32,
    ) -> Self {
        let total_samples = total_samples.max(1);
        let sample_per_frame = sample_per_frame.clamp(1, total_samples);
        let tier = QualityTier::default();

        let mut trace = FullscreenPass::new(backend, &PassDesc::new("ssr.trace", "ssr.trace"));
        trace.define(ShaderStage::Fragment, "TOTAL_SAMPLES", Some(&total_samples.to_string()));
        trace.define(ShaderStage::Fragment, "SAMPLE_PER_FRAME", Some(&sample_per_frame.to_string()));

        let mut pass = Self {
            trace,
            blend: FullscreenPass::new(backend, &PassDesc::new("ssr.blend", "ssr.blend")),
            blur: FullscreenPass::new(backend, &PassDesc::new("ssr.blur", "ssr.blur")),
            raw: backend.create_texture(&TextureDesc::color("ssr_raw", width, height, SSR_FORMAT)),
            blurred: backend.create_texture(&TextureDesc::color("ssr_blur", width, height, SSR_FORMAT)),
            target: backend.create_texture(&TextureDesc::color("ssr_target", width, height, SSR_FORMAT)),
            history: HistoryBuffer::new(backend, width, height, SSR_FORMAT),
            width: width.max(1),
            height: height.max(1),
            total_samples,
            sample_per_frame,
            max_iteration: 0,
            pixel_stride: 0,
            min_glossiness: 0.2,
            physically_correct: false,
            normal_distribution: None,
            ssao_texture: None,
            ambient_cubemap: None,
        };
        pass.set_max_iteration(tier.ssr_max_iteration());
        pass.set_pixel_stride(tier.ssr_pixel_stride());
        pass.set_min_glossiness(pass.min_glossiness);
        pass
    }

    /// Traces, blends and blurs one frame, then swaps the history.
    pub fn update(
        &mut self,
        backend: &mut dyn RenderBackend,
        camera: &Camera,
        gbuffer: &GBuffer,
        source: TextureId,
        frame: u32,
    ) {
        let viewport_size = Vec2::new(self.width as f32, self.height as f32);
        let color_input = if frame == 0 { source } else { self.history.previous() };
        let sample_offset = self.sample_offset(frame);

        let trace = &mut self.trace;
        trace.set_uniform("colorTex", color_input);
        trace.set_uniform("gBufferTexture1", gbuffer.normal_texture());
        trace.set_uniform("gBufferTexture2", gbuffer.depth_texture());
        match gbuffer.albedo_texture() {
            Some(albedo) => trace.set_uniform("gBufferTexture3", albedo),
            None => trace.unset_uniform("gBufferTexture3"),
        }
        trace.set_uniform("projection", camera.projection());
        trace.set_uniform("projectionInv", camera.inv_projection());
        trace.set_uniform("toViewSpace", camera.view());
        trace.set_uniform("toWorldSpace", camera.world_transform);
        trace.set_uniform("nearZ", camera.near);
        trace.set_uniform("viewportSize", viewport_size);
        trace.set_uniform("sampleOffset", sample_offset as i32);
        match self.ambient_cubemap {
            Some((cubemap, intensity)) => {
                trace.define(ShaderStage::Fragment, "SPECULAR_CUBEMAP", None);
                trace.set_uniform("specularCubemap", cubemap);
                trace.set_uniform("specularIntensity", intensity);
            }
            None => {
                trace.undefine(ShaderStage::Fragment, "SPECULAR_CUBEMAP");
                trace.unset_uniform("specularCubemap");
            }
        }
        trace.render(backend, &RenderTarget::texture(self.raw));

        let weights = history_blend_weights(frame);
        let blend = &mut self.blend;
        blend.set_uniform("texture1", self.raw);
        blend.set_uniform("texture2", self.history.previous());
        blend.set_uniform("weight1", weights.new);
        blend.set_uniform("weight2", weights.history);
        blend.render(backend, &RenderTarget::texture(self.history.current()));

        let blur = &mut self.blur;
        blur.set_uniform("textureSize", viewport_size);
        blur.set_uniform("gBufferTexture1", gbuffer.normal_texture());
        blur.set_uniform("gBufferTexture2", gbuffer.depth_texture());
        blur.set_uniform("projection", camera.projection());

        blur.undefine(ShaderStage::Fragment, "SSAO_ATTENUATION");
        blur.unset_uniform("ssaoTex");
        blur.set_uniform("texture", self.history.current());
        blur.set_uniform("blurDir", 0);
        blur.render(backend, &RenderTarget::texture(self.blurred));

        if let Some(ssao) = self.ssao_texture {
            blur.define(ShaderStage::Fragment, "SSAO_ATTENUATION", None);
            blur.set_uniform("ssaoTex", ssao);
        }
        blur.set_uniform("texture", self.blurred);
        blur.set_uniform("blurDir", 1);
        blur.render(backend, &RenderTarget::texture(self.target));

        self.history.swap();
    }

    /// First table entry traced at `frame`.
    #[must_use]
    pub fn sample_offset(&self, frame: u32) -> u32 {
        ((u64::from(frame) * u64::from(self.sample_per_frame)) % u64::from(self.total_samples)) as u32
    }

    /// True once every table entry has been traced.
    #[must_use]
    pub fn is_finished(&self, frame: u32) -> bool {
        frame > self.total_samples / self.sample_per_frame
    }

    /// Switches between the cheap mirror trace and the importance-sampled one.
    pub fn set_physically_correct(&mut self, backend: &mut dyn RenderBackend, enabled: bool) {
        self.physically_correct = enabled;
        if !enabled {
            self.trace.undefine(ShaderStage::Fragment, "PHYSICALLY_CORRECT");
            return;
        }
        self.trace.define(ShaderStage::Fragment, "PHYSICALLY_CORRECT", None);
        let texture = match self.normal_distribution {
            Some(texture) => texture,
            None => {
                let texture = self.build_normal_distribution(backend);
                self.normal_distribution = Some(texture);
                texture
            }
        };
        self.trace.set_uniform("normalDistribution", texture);
    }

    fn build_normal_distribution(&self, backend: &mut dyn RenderBackend) -> TextureId {
        let normals = sampling::normal_distribution(self.total_samples as usize);
        let bytes: Vec<u8> = normals
            .iter()
            .flat_map(|n| [n.x, n.y, n.z, 1.0])
            .flat_map(f32::to_le_bytes)
            .collect();
        let texture = backend.create_texture(&TextureDesc::data(
            "ssr_normal_distribution",
            self.total_samples,
            1,
            NORMAL_DISTRIBUTION_FORMAT,
        ));
        backend.write_texture(texture, &bytes);
        log::debug!("SSR normal distribution built ({} samples)", self.total_samples);
        texture
    }

    pub fn set_max_iteration(&mut self, max_iteration: u32) {
        self.max_iteration = max_iteration;
        self.trace
            .define(ShaderStage::Fragment, "MAX_ITERATION", Some(&max_iteration.to_string()));
    }

    pub fn set_pixel_stride(&mut self, pixel_stride: u32) {
        self.pixel_stride = pixel_stride;
        self.trace.set_uniform("pixelStride", pixel_stride as f32);
    }

    pub fn set_min_glossiness(&mut self, min_glossiness: f32) {
        self.min_glossiness = min_glossiness;
        self.trace.set_uniform("minGlossiness", min_glossiness);
    }

    /// AO texture used to attenuate reflections in the vertical blur.
    pub fn set_ssao_texture(&mut self, texture: Option<TextureId>) {
        self.ssao_texture = texture;
    }

    /// Fallback environment for rays that leave the screen.
    pub fn set_ambient_cubemap(&mut self, cubemap: Option<TextureId>, intensity: f32) {
        self.ambient_cubemap = cubemap.map(|c| (c, intensity));
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        for texture in [self.raw, self.blurred, self.target] {
            backend.resize_texture(texture, width, height);
        }
        self.history.resize(backend, width, height);
    }

    #[must_use]
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    #[inline]
    #[must_use]
    pub fn target_texture(&self) -> TextureId {
        self.target
    }

    #[must_use]
    pub fn total_samples(&self) -> u32 {
        self.total_samples
    }

    #[must_use]
    pub fn sample_per_frame(&self) -> u32 {
        self.sample_per_frame
    }

    #[must_use]
    pub fn max_iteration(&self) -> u32 {
        self.max_iteration
    }

    #[must_use]
    pub fn pixel_stride(&self) -> u32 {
        self.pixel_stride
    }

    #[must_use]
    pub fn min_glossiness(&self) -> f32 {
        self.min_glossiness
    }

    #[must_use]
    pub fn is_physically_correct(&self) -> bool {
        self.physically_correct
    }

    #[must_use]
    pub fn normal_distribution_texture(&self) -> Option<TextureId> {
        self.normal_distribution
    }

    #[must_use]
    pub fn ssao_texture(&self) -> Option<TextureId> {
        self.ssao_texture
    }

    #[must_use]
    pub fn ambient_cubemap(&self) -> Option<(TextureId, f32)> {
        self.ambient_cubemap
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.trace.dispose(backend);
        self.blend.dispose(backend);
        self.blur.dispose(backend);
        for texture in [self.raw, self.blurred, self.target] {
            backend.destroy_texture(texture);
        }
        if let Some(texture) = self.normal_distribution {
            backend.destroy_texture(texture);
        }
        self.history.dispose(backend);
    }
}
