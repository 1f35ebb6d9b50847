//! Per-View Render Loop
//!
//! [`RenderMain`] owns the camera, the shadow kernels, the compositor and
//! temporal supersampling for one view, and decides each frame which of
//! them run.
//!
//! # Frame Classes
//!
//! ```text
//!  scene or camera changed ──► prepare_render()   frame = 0
//!                                   │
//!                                   ▼
//!  render(accumulating = false)    fresh frame, shadow map rendered
//!  render(accumulating = true)  ┐
//!  render(accumulating = true)  ├  accumulation frames, shadow map reused,
//!  ...                          ┘  until is_accumulate_finished()
//! ```
//!
//! # Color Pass Target
//!
//! | post effects | accumulating | scene renders into            | then                     |
//! |--------------|--------------|-------------------------------|--------------------------|
//! | on           | TSS on       | compositor source             | composite → TSS → screen |
//! | on           | TSS off      | compositor source             | composite → screen       |
//! | off          | yes          | TSS source                    | TSS → screen             |
//! | off          | no           | screen                        |                          |

use glam::Vec4;

use super::compositor::EffectCompositor;
use super::passes::{ShadowMapPass, TemporalSuperSampling};
use super::settings::{RenderMainSettings, TemporalSuperSamplingMode};
use crate::backend::{RenderBackend, RenderTarget};
use crate::errors::Result;
use crate::resources::{
    BloomParam, ColorCorrectionParam, DofParam, EdgeParam, ParamValue, PostEffectConfig, SsaoParam,
    SsrParam,
};
use crate::scene::{Camera, Scene, Viewport};

/// Material binding through which opaque surfaces read ambient occlusion.
pub const SSAO_MAP_BINDING: &str = "ssaoMap";

#[derive(Debug)]
pub struct RenderMain {
    camera: Camera,
    viewport: Viewport,
    settings: RenderMainSettings,

    shadow: ShadowMapPass,
    compositor: EffectCompositor,
    tss: TemporalSuperSampling,

    post_effect: bool,
    tss_mode: TemporalSuperSamplingMode,
    needs_progressive_sort: bool,
    frame: u32,
}

impl RenderMain {
    pub fn new(backend: &mut dyn RenderBackend, viewport: Viewport, settings: RenderMainSettings) -> Result<Self> {
        let mut compositor = EffectCompositor::new(backend)?;
        compositor.resize(backend, viewport.width, viewport.height, viewport.dpr);
        let (width, height) = viewport.physical_size();
        let tss = TemporalSuperSampling::with_frames(backend, width, height, settings.temporal_frames);

        let mut camera = Camera::default();
        camera.aspect = viewport.aspect();
        camera.update();

        Ok(Self {
            camera,
            viewport,
            shadow: ShadowMapPass::new(settings.pcf_kernel_count, settings.pcf_kernel_size),
            settings,
            compositor,
            tss,
            post_effect: false,
            tss_mode: TemporalSuperSamplingMode::Auto,
            needs_progressive_sort: false,
            frame: 0,
        })
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Starts a new accumulation sequence.
    pub fn prepare_render(&mut self, backend: &mut dyn RenderBackend, scene: &mut Scene) {
        self.camera.aspect = self.viewport.aspect();
        self.camera.update();

        self.frame = 0;
        self.tss.reset_frame();

        let hide_cubemaps = self.post_effect && self.compositor.is_ssr_enabled();
        for light in scene.lights.iter_mut().filter(|l| l.is_ambient_cubemap()) {
            light.invisible = hide_cubemaps;
        }

        if self.post_effect {
            let Viewport { width, height, dpr } = self.viewport;
            self.compositor.resize(backend, width, height, dpr);
        }
        let (width, height) = self.viewport.physical_size();
        self.tss.resize(backend, width, height);

        self.needs_progressive_sort = scene.transparent.iter().any(|item| {
            item.geometry
                .as_ref()
                .is_some_and(|g| g.needs_progressive_sort())
        });
    }

    /// Renders one frame, fresh or accumulating.
    pub fn render(&mut self, backend: &mut dyn RenderBackend, scene: &mut Scene, accumulating: bool) {
        let frame = self.frame;
        let tss_on = self.needs_temporal_ss();
        // Drops last frame's jitter.
        self.camera.update();

        self.sort_transparent(scene, frame);

        if self.settings.shadow {
            if !accumulating {
                self.shadow.render(backend, scene, &self.camera);
            }
            self.shadow.set_kernel_for_frame(scene, frame);
        }

        if tss_on {
            self.tss.jitter_projection(&mut self.camera, &self.viewport);
        }
        if self.post_effect {
            self.compositor
                .update_normal(backend, scene, &self.camera, frame);
        }

        self.compositor
            .update_ssao(backend, &self.camera, frame, self.post_effect);
        let ssao = (self.post_effect && self.compositor.is_ssao_enabled())
            .then(|| self.compositor.ssao_texture());
        for item in &mut scene.opaque {
            match ssao {
                Some(texture) => item.material.set(SSAO_MAP_BINDING, texture),
                None => {
                    item.material.unset(SSAO_MAP_BINDING);
                }
            }
        }

        let scene_target = if self.post_effect {
            RenderTarget::Framebuffer(self.compositor.source_framebuffer())
        } else if self.needs_accumulate() {
            RenderTarget::Framebuffer(self.tss.source_framebuffer())
        } else {
            backend.set_viewport(&self.viewport);
            RenderTarget::Screen
        };
        backend.clear_target(&scene_target, self.settings.clear_color);
        backend.render_scene(scene, &self.camera, &scene_target);

        if self.post_effect {
            if tss_on {
                let target = RenderTarget::Framebuffer(self.tss.source_framebuffer());
                self.compositor
                    .composite(backend, scene, &self.camera, &target, frame);
                let resolved = self.tss.source_texture();
                self.tss.render(backend, &self.viewport, resolved);
            } else {
                backend.set_viewport(&self.viewport);
                self.compositor
                    .composite(backend, scene, &self.camera, &RenderTarget::Screen, frame);
            }
        } else if self.needs_accumulate() {
            let source = self.tss.source_texture();
            self.tss.render(backend, &self.viewport, source);
        }

        log::trace!("frame {frame} rendered (accumulating: {accumulating})");
        self.frame += 1;
    }

    fn sort_transparent(&self, scene: &mut Scene, frame: u32) {
        let camera_position = self.camera.position();
        for item in &mut scene.transparent {
            let Some(geometry) = item.geometry.as_mut() else {
                continue;
            };
            let local = item
                .world_transform
                .inverse()
                .transform_point3(camera_position);
            if geometry.needs_sort_vertices_progressively() {
                geometry.sort_vertices_progressively(local, frame);
            }
            if geometry.needs_sort_triangles_progressively() {
                geometry.sort_triangles_progressively(local, frame);
            } else if geometry.needs_sort_triangles() {
                geometry.sort_triangles(local, frame);
            }
        }
    }

    // ========================================================================
    // Accumulation policy
    // ========================================================================

    #[must_use]
    pub fn needs_accumulate(&self) -> bool {
        self.needs_temporal_ss() || self.needs_progressive_sort
    }

    #[must_use]
    pub fn needs_temporal_ss(&self) -> bool {
        self.tss_mode.resolve(self.post_effect)
    }

    #[must_use]
    pub fn is_accumulate_finished(&self) -> bool {
        if self.needs_temporal_ss() {
            self.tss.is_finished()
        } else {
            self.frame > self.settings.accumulation_cap
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Applies an option document. Absent keys leave their setting alone.
    pub fn set_post_effect(&mut self, backend: &mut dyn RenderBackend, config: &PostEffectConfig) {
        if let Some(enable) = config.enable {
            self.post_effect = enable;
        }
        let compositor = &mut self.compositor;

        if let Some(bloom) = &config.bloom {
            match bloom.enable {
                Some(true) => compositor.enable_bloom(),
                Some(false) => compositor.disable_bloom(),
                None => {}
            }
            compositor.set_bloom_parameter(BloomParam::Intensity, bloom.intensity.map(ParamValue::from));
        }

        if let Some(dof) = &config.depth_of_field {
            match dof.enable {
                Some(true) => compositor.enable_dof(),
                Some(false) => compositor.disable_dof(),
                None => {}
            }
            compositor.set_dof_parameter(DofParam::FocalDistance, dof.focal_distance.map(ParamValue::from));
            compositor.set_dof_parameter(DofParam::FocalRange, dof.focal_range.map(ParamValue::from));
            compositor.set_dof_parameter(DofParam::BlurRadius, dof.blur_radius.map(ParamValue::from));
            compositor.set_dof_parameter(DofParam::Fstop, dof.fstop.map(ParamValue::from));
            compositor.set_dof_parameter(DofParam::Quality, dof.quality.clone().map(ParamValue::from));
        }

        if let Some(ssao) = &config.screen_space_ambient_occlusion {
            match ssao.enable {
                Some(true) => compositor.enable_ssao(),
                Some(false) => compositor.disable_ssao(),
                None => {}
            }
            compositor.set_ssao_parameter(SsaoParam::Radius, ssao.radius.map(ParamValue::from));
            compositor.set_ssao_parameter(SsaoParam::Quality, ssao.quality.clone().map(ParamValue::from));
            compositor.set_ssao_parameter(SsaoParam::Intensity, ssao.intensity.map(ParamValue::from));
        }

        if let Some(ssr) = &config.screen_space_reflection {
            match ssr.enable {
                Some(true) => compositor.enable_ssr(),
                Some(false) => compositor.disable_ssr(),
                None => {}
            }
            compositor.set_ssr_parameter(backend, SsrParam::Quality, ssr.quality.clone().map(ParamValue::from));
            compositor.set_ssr_parameter(backend, SsrParam::MaxRoughness, ssr.max_roughness.map(ParamValue::from));
            compositor.set_ssr_parameter(backend, SsrParam::Physical, ssr.physical.map(ParamValue::from));
        }

        if let Some(fxaa) = &config.fxaa {
            match fxaa.enable {
                Some(true) => compositor.enable_fxaa(),
                Some(false) => compositor.disable_fxaa(),
                None => {}
            }
        }

        if let Some(cc) = &config.color_correction {
            match cc.enable {
                Some(true) => compositor.enable_color_correction(),
                Some(false) => compositor.disable_color_correction(),
                None => {}
            }
            let params = [
                (ColorCorrectionParam::Exposure, cc.exposure),
                (ColorCorrectionParam::Brightness, cc.brightness),
                (ColorCorrectionParam::Contrast, cc.contrast),
                (ColorCorrectionParam::Saturation, cc.saturation),
            ];
            for (param, value) in params {
                compositor.set_color_correction_parameter(param, value.map(ParamValue::from));
            }
            compositor.set_color_correction_parameter(
                ColorCorrectionParam::LookupTexture,
                cc.lookup_texture.map(ParamValue::from),
            );
        }

        if let Some(edge) = &config.edge {
            match edge.enable {
                Some(true) => compositor.enable_edge(),
                Some(false) => compositor.disable_edge(),
                None => {}
            }
            compositor.set_edge_parameter(
                EdgeParam::Color,
                edge.color.map(|c| ParamValue::from(Vec4::from_array(c))),
            );
        }

        if let Some(mode) = config
            .temporal_super_sampling
            .as_ref()
            .and_then(|tss| tss.enable)
        {
            self.set_temporal_super_sampling(mode);
        }
    }

    pub fn set_temporal_super_sampling(&mut self, mode: TemporalSuperSamplingMode) {
        self.tss_mode = mode;
    }

    #[must_use]
    pub fn temporal_super_sampling(&self) -> TemporalSuperSamplingMode {
        self.tss_mode
    }

    #[must_use]
    pub fn is_post_effect_enabled(&self) -> bool {
        self.post_effect
    }

    /// Focuses depth of field at view-space `depth`.
    ///
    /// Returns `false` when post effects are off or `depth` lies outside the
    /// camera's near/far range.
    pub fn set_dof_focus_on_point(&mut self, depth: f32) -> bool {
        if !self.post_effect || depth < self.camera.near || depth > self.camera.far {
            return false;
        }
        self.compositor
            .set_dof_parameter(DofParam::FocalDistance, Some(depth.into()));
        true
    }

    /// The scene renders in linear space whenever post effects run, since
    /// the composite pass does the final encode.
    #[must_use]
    pub fn is_linear_space(&self) -> bool {
        self.post_effect
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, viewport: Viewport) {
        self.viewport = viewport;
        self.camera.aspect = viewport.aspect();
        self.camera.update();
        self.compositor
            .resize(backend, viewport.width, viewport.height, viewport.dpr);
        let (width, height) = viewport.physical_size();
        self.tss.resize(backend, width, height);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[must_use]
    pub fn compositor(&self) -> &EffectCompositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut EffectCompositor {
        &mut self.compositor
    }

    #[must_use]
    pub fn temporal(&self) -> &TemporalSuperSampling {
        &self.tss
    }

    #[must_use]
    pub fn shadow(&self) -> &ShadowMapPass {
        &self.shadow
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.compositor.dispose(backend);
        self.tss.dispose(backend);
    }
}
