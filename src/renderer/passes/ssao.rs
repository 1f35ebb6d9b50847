//! Screen Space Ambient Occlusion Pass
//!
//! Progressive SSAO in three sub-passes:
//!
//! ```text
//!  GBuffer depth ──┬──► estimate (half res) ──► blur H ──► blur V ──► target
//!  GBuffer normal ─┘         ▲                     ▲          ▲
//!                     kernel[frame % 30]        depth/normal-aware
//!                     + 4×4 rotation noise
//! ```
//!
//! Each frame of an accumulation uses a different hemisphere kernel out of
//! 30 precomputed ones, so the accumulated result converges to a kernel 30
//! times larger.
//!
//! While SSAO is disabled the target is kept at "no occlusion" (white), since
//! materials may still sample it.

use glam::Vec2;

use super::gbuffer::GBuffer;
use crate::backend::{
    PassDesc, RenderBackend, RenderTarget, ShaderStage, TextureDesc, TextureId, UniformValue,
};
use crate::renderer::pass::FullscreenPass;
use crate::renderer::sampling;
use crate::resources::QualityTier;
use crate::scene::Camera;

/// Number of frame-indexed hemisphere kernels.
pub const SSAO_KERNEL_FRAMES: usize = 30;

const DEFAULT_NOISE_SIZE: u32 = 4;
const DEFAULT_RADIUS: f32 = 0.2;
const DEFAULT_INTENSITY: f32 = 1.0;

const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
const NOISE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug)]
pub struct SsaoPass {
    estimate: FullscreenPass,
    blur: FullscreenPass,

    raw: TextureId,
    blurred: TextureId,
    target: TextureId,
    noise: TextureId,
    width: u32,
    height: u32,

    /// Flattened `[x, y, z, …]` kernels, one per frame slot.
    kernels: Vec<Vec<f32>>,
    kernel_size: u32,
    noise_size: u32,
    radius: f32,
    intensity: f32,

    /// The target currently holds the neutral value.
    neutral: bool,
}

impl SsaoPass {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        let (half_w, half_h) = half_size(width, height);
        let mut pass = Self {
            estimate: FullscreenPass::new(backend, &PassDesc::new("ssao.estimate", "ssao.estimate")),
            blur: FullscreenPass::new(backend, &PassDesc::new("ssao.blur", "ssao.blur")),
            raw: backend.create_texture(&TextureDesc::color("ssao_raw", half_w, half_h, AO_FORMAT)),
            blurred: backend.create_texture(&TextureDesc::color("ssao_blur", width, height, AO_FORMAT)),
            target: backend.create_texture(&TextureDesc::color("ssao_target", width, height, AO_FORMAT)),
            noise: backend.create_texture(&TextureDesc::data(
                "ssao_noise",
                DEFAULT_NOISE_SIZE,
                DEFAULT_NOISE_SIZE,
                NOISE_FORMAT,
            )),
            width: width.max(1),
            height: height.max(1),
            kernels: Vec::new(),
            kernel_size: 0,
            noise_size: 0,
            radius: DEFAULT_RADIUS,
            intensity: DEFAULT_INTENSITY,
            neutral: false,
        };
        pass.set_kernel_size(QualityTier::default().ssao_kernel_size());
        pass.set_noise_size(backend, DEFAULT_NOISE_SIZE);
        pass.set_radius(DEFAULT_RADIUS);
        pass.set_intensity(DEFAULT_INTENSITY);
        pass
    }

    /// Renders the AO for `frame` into the target texture.
    pub fn update(&mut self, backend: &mut dyn RenderBackend, camera: &Camera, gbuffer: &GBuffer, frame: u32) {
        let kernel = &self.kernels[frame as usize % self.kernels.len()];
        let (gbuffer_w, gbuffer_h) = gbuffer.size();

        let estimate = &mut self.estimate;
        estimate.set_uniform("kernel", UniformValue::FloatArray(kernel.clone()));
        estimate.set_uniform("depthTex", gbuffer.depth_texture());
        estimate.set_uniform("normalTex", gbuffer.normal_texture());
        estimate.set_uniform("noiseTex", self.noise);
        estimate.set_uniform("depthTexSize", Vec2::new(gbuffer_w as f32, gbuffer_h as f32));
        estimate.set_uniform("projection", camera.projection());
        estimate.set_uniform("projectionInv", camera.inv_projection());
        estimate.set_uniform("viewInverseTranspose", camera.world_transform.transpose());
        estimate.render(backend, &RenderTarget::texture(self.raw));

        let blur = &mut self.blur;
        blur.set_uniform("textureSize", Vec2::new(self.width as f32, self.height as f32));
        blur.set_uniform("depthTex", gbuffer.depth_texture());
        blur.set_uniform("normalTex", gbuffer.normal_texture());
        blur.set_uniform("projection", camera.projection());

        blur.set_uniform("direction", 0);
        blur.set_uniform("ssaoTexture", self.raw);
        blur.render(backend, &RenderTarget::texture(self.blurred));

        blur.set_uniform("direction", 1);
        blur.set_uniform("ssaoTexture", self.blurred);
        blur.render(backend, &RenderTarget::texture(self.target));

        self.neutral = false;
    }

    /// Resets the target to "no occlusion", once per disable.
    pub fn clear(&mut self, backend: &mut dyn RenderBackend) {
        if !self.neutral {
            backend.clear_target(&RenderTarget::texture(self.target), [1.0; 4]);
            self.neutral = true;
        }
    }

    /// Sets the hemisphere kernel size and regenerates the frame kernels.
    pub fn set_kernel_size(&mut self, size: u32) {
        let size = size.max(1);
        if size == self.kernel_size && !self.kernels.is_empty() {
            return;
        }
        self.kernel_size = size;
        self.estimate
            .define(ShaderStage::Fragment, "KERNEL_SIZE", Some(&size.to_string()));

        let mut rng = sampling::ssao_rng();
        self.kernels = (0..SSAO_KERNEL_FRAMES)
            .map(|i| {
                sampling::hemisphere_kernel(size as usize, i * size as usize, true, &mut rng)
                    .into_iter()
                    .flat_map(|v| [v.x, v.y, v.z])
                    .collect()
            })
            .collect();
        log::debug!("SSAO kernel size set to {size}");
    }

    /// Sets the sampling radius; the depth bias follows as `radius / 200`.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.estimate.set_uniform("radius", radius);
        self.estimate.set_uniform("bias", radius / 200.0);
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.estimate.set_uniform("ssaoIntensity", intensity);
    }

    /// Regenerates the rotation noise tile.
    pub fn set_noise_size(&mut self, backend: &mut dyn RenderBackend, size: u32) {
        let size = size.max(1);
        if size == self.noise_size {
            return;
        }
        if self.noise_size != 0 {
            backend.destroy_texture(self.noise);
            self.noise = backend.create_texture(&TextureDesc::data("ssao_noise", size, size, NOISE_FORMAT));
        }
        self.noise_size = size;
        let mut rng = sampling::ssao_rng();
        backend.write_texture(self.noise, &sampling::rotation_noise(size as usize, &mut rng));
        self.estimate
            .set_uniform("noiseTexSize", Vec2::new(size as f32, size as f32));
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        let (half_w, half_h) = half_size(width, height);
        backend.resize_texture(self.raw, half_w, half_h);
        backend.resize_texture(self.blurred, width, height);
        backend.resize_texture(self.target, width, height);
        // Resized contents are undefined.
        self.neutral = false;
    }

    /// Converged once every frame kernel has been used.
    #[must_use]
    pub fn is_finished(&self, frame: u32) -> bool {
        frame > SSAO_KERNEL_FRAMES as u32
    }

    #[must_use]
    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    /// The flattened kernel used at `frame`.
    #[must_use]
    pub fn kernel(&self, frame: u32) -> &[f32] {
        &self.kernels[frame as usize % self.kernels.len()]
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[must_use]
    pub fn bias(&self) -> f32 {
        self.radius / 200.0
    }

    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    #[must_use]
    pub fn noise_size(&self) -> u32 {
        self.noise_size
    }

    #[inline]
    #[must_use]
    pub fn target_texture(&self) -> TextureId {
        self.target
    }

    #[must_use]
    pub fn estimate_pass(&self) -> &FullscreenPass {
        &self.estimate
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.estimate.dispose(backend);
        self.blur.dispose(backend);
        for texture in [self.raw, self.blurred, self.target, self.noise] {
            backend.destroy_texture(texture);
        }
    }
}

fn half_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}
