//! Temporal Super Sampling
//!
//! Accumulates jittered renders of a static view into a converged image.
//!
//! ```text
//!  frame n:  camera.projection ← translate(jitter[n]) × projection
//!            scene / compositor ──► source framebuffer
//!            blend(source × 0.1, history.previous × 0.9) ──► history.current
//!            output(history.current) ──► viewport
//!            swap, n += 1
//! ```
//!
//! Frame 0 copies the source through unweighted, so a fresh view never shows
//! the previous accumulation.

use glam::Vec2;

use super::history::HistoryBuffer;
use crate::backend::{
    FramebufferId, PassBlend, PassDesc, RenderBackend, RenderTarget, TextureDesc, TextureId,
};
use crate::renderer::pass::FullscreenPass;
use crate::renderer::sampling;
use crate::scene::{Camera, Viewport};

/// Number of jitter offsets, and frames to convergence.
pub const DEFAULT_TSS_FRAMES: usize = 30;

const HISTORY_WEIGHT: f32 = 0.9;
const SOURCE_WEIGHT: f32 = 0.1;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Debug)]
pub struct TemporalSuperSampling {
    jitters: Vec<Vec2>,
    frame: u32,

    source_color: TextureId,
    source_depth: TextureId,
    source_framebuffer: FramebufferId,
    history: HistoryBuffer,

    blend: FullscreenPass,
    output: FullscreenPass,
    width: u32,
    height: u32,
}

impl TemporalSuperSampling {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        Self::with_frames(backend, width, height, DEFAULT_TSS_FRAMES)
    }

    pub fn with_frames(backend: &mut dyn RenderBackend, width: u32, height: u32, frames: usize) -> Self {
        let source_color = backend.create_texture(&TextureDesc::color("tss_source", width, height, COLOR_FORMAT));
        let source_depth = backend.create_texture(&TextureDesc::depth("tss_depth", width, height));
        Self {
            jitters: sampling::jitter_sequence(frames.max(1)),
            frame: 0,
            source_color,
            source_depth,
            source_framebuffer: backend.create_framebuffer(&[source_color], Some(source_depth)),
            history: HistoryBuffer::new(backend, width, height, COLOR_FORMAT),
            blend: FullscreenPass::new(backend, &PassDesc::new("tss.blend", "blend")),
            output: FullscreenPass::new(
                backend,
                &PassDesc::new("tss.output", "output").with_blend(PassBlend::PremultipliedOver),
            ),
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Offsets the camera projection by this frame's sub-pixel jitter.
    pub fn jitter_projection(&self, camera: &mut Camera, viewport: &Viewport) {
        let (width, height) = viewport.physical_size();
        let h = self.jitters[self.frame as usize % self.jitters.len()];
        let offset = Vec2::new(
            (h.x * 2.0 - 1.0) / width as f32,
            (h.y * 2.0 - 1.0) / height as f32,
        );
        log::trace!("TSS jitter frame {}: {offset}", self.frame);
        camera.jitter(offset);
    }

    /// Resolves `source` into the history and presents it, then advances.
    pub fn render(&mut self, backend: &mut dyn RenderBackend, viewport: &Viewport, source: TextureId) {
        let (new_weight, history_weight) = if self.frame == 0 {
            (1.0, 0.0)
        } else {
            (SOURCE_WEIGHT, HISTORY_WEIGHT)
        };

        self.blend.set_uniform("texture1", source);
        self.blend.set_uniform("texture2", self.history.previous());
        self.blend.set_uniform("weight1", new_weight);
        self.blend.set_uniform("weight2", history_weight);
        self.blend
            .render(backend, &RenderTarget::texture(self.history.current()));

        backend.set_viewport(viewport);
        self.output.set_uniform("texture", self.history.current());
        self.output.render(backend, &RenderTarget::Screen);

        self.history.swap();
        self.next_frame();
    }

    #[inline]
    pub fn next_frame(&mut self) {
        self.frame += 1;
    }

    #[inline]
    pub fn reset_frame(&mut self) {
        self.frame = 0;
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Every jitter offset has been accumulated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.frame as usize >= self.jitters.len()
    }

    #[must_use]
    pub fn jitter_count(&self) -> usize {
        self.jitters.len()
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        backend.resize_texture(self.source_color, width, height);
        backend.resize_texture(self.source_depth, width, height);
        self.history.resize(backend, width, height);
        log::debug!("TSS resized to {width}x{height}");
    }

    /// Framebuffer the scene (or compositor) renders into while accumulating.
    #[inline]
    #[must_use]
    pub fn source_framebuffer(&self) -> FramebufferId {
        self.source_framebuffer
    }

    #[inline]
    #[must_use]
    pub fn source_texture(&self) -> TextureId {
        self.source_color
    }

    /// The most recently resolved frame.
    #[must_use]
    pub fn output_texture(&self) -> TextureId {
        self.history.previous()
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.blend.dispose(backend);
        self.output.dispose(backend);
        backend.destroy_framebuffer(self.source_framebuffer);
        backend.destroy_texture(self.source_color);
        backend.destroy_texture(self.source_depth);
        self.history.dispose(backend);
    }
}
